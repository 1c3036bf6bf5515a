use alloc::vec::Vec;

use axaddrspace::HostPhysAddr;
use axerrno::{ax_err, AxResult};
use log::debug;
use spin::Mutex;

use crate::catalogue::ControllerInstance;
use crate::clock::Hertz;
use crate::consts::SPI_DRIVER_NAME;
use crate::utils::window_end;

/// A hardware resource owned by a platform device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resource {
    /// Interrupt line.
    Irq(u32),
    /// Memory-mapped register window, `end` inclusive.
    Mem {
        start: HostPhysAddr,
        end: HostPhysAddr,
    },
}

/// A controller with its input clock resolved, ready to be published.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpiDescriptor {
    /// Driver name the device binds to.
    pub name: &'static str,
    pub instance: ControllerInstance,
    /// Frequency of the bus clock feeding the controller.
    pub frequency: Hertz,
}

impl SpiDescriptor {
    pub fn new(instance: ControllerInstance, frequency: Hertz) -> Self {
        Self {
            name: SPI_DRIVER_NAME,
            instance,
            frequency,
        }
    }

    pub fn index(&self) -> usize {
        self.instance.index
    }

    /// The interrupt line followed by the register window.
    pub fn resources(&self) -> [Resource; 2] {
        [
            Resource::Irq(self.instance.irq),
            Resource::Mem {
                start: self.instance.reg_base,
                end: self.instance.reg_end(),
            },
        ]
    }

    fn window_fits(&self) -> bool {
        window_end(self.instance.reg_base.as_usize(), self.instance.reg_size).is_some()
    }

    fn conflicts_with(&self, other: &Self) -> bool {
        let (a, b) = (&self.instance, &other.instance);
        a.irq == b.irq || a.overlaps(b)
    }
}

/// The platform device layer generic drivers bind against.
pub trait PlatformRegistrar {
    /// Publishes `descriptor`. On success the registrar owns it for the rest
    /// of the system's lifetime; on failure nothing is published.
    fn register(&self, descriptor: SpiDescriptor) -> AxResult;
}

/// In-memory platform bus holding published SPI controllers.
pub struct PlatformBus {
    devices: Mutex<Vec<SpiDescriptor>>,
}

impl PlatformBus {
    pub const fn new() -> Self {
        Self {
            devices: Mutex::new(Vec::new()),
        }
    }

    /// The published controller with the given index.
    pub fn find(&self, index: usize) -> Option<SpiDescriptor> {
        self.devices.lock().iter().find(|d| d.index() == index).copied()
    }

    /// All published controllers, in publication order.
    pub fn devices(&self) -> Vec<SpiDescriptor> {
        self.devices.lock().clone()
    }

    /// Number of published controllers.
    pub fn len(&self) -> usize {
        self.devices.lock().len()
    }

    /// Whether nothing has been published yet.
    pub fn is_empty(&self) -> bool {
        self.devices.lock().is_empty()
    }
}

impl Default for PlatformBus {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformRegistrar for PlatformBus {
    fn register(&self, descriptor: SpiDescriptor) -> AxResult {
        if !descriptor.window_fits() {
            return ax_err!(InvalidInput, "SPI register window exceeds the address space");
        }
        let mut devices = self.devices.lock();
        if devices.iter().any(|d| d.index() == descriptor.index()) {
            return ax_err!(AlreadyExists, "SPI controller already registered");
        }
        if devices.iter().any(|d| d.conflicts_with(&descriptor)) {
            return ax_err!(ResourceBusy, "SPI controller resources already claimed");
        }
        debug!(
            "platform bus: {}.{} registered",
            descriptor.name,
            descriptor.index()
        );
        devices.push(descriptor);
        Ok(())
    }
}
