//! Platform registration of the STM32 SPI controllers.
//!
//! The board's SPI controllers are described by a build-time [`Catalogue`].
//! During bring-up, [`run`] resolves the bus clock of each enabled controller
//! and publishes its [`SpiDescriptor`] to the platform device layer, where the
//! generic `spi_stm32` driver picks it up.
//!
//! The default build enables no controller; test a populated board with e.g.
//! `--features spi1,spi3,spi6`.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod catalogue;
pub mod clock;
mod consts;
pub mod platform;
mod utils;

pub use catalogue::{enabled_instances, Catalogue, ConfigError, ControllerInstance, SPI_TEMPLATE};
pub use clock::{BusClocks, ClockDomain, ClockSource, Hertz};
pub use consts::*;
pub use platform::{PlatformBus, PlatformRegistrar, Resource, SpiDescriptor};

use alloc::vec::Vec;
use core::fmt;

use axerrno::AxError;
use log::{info, warn};

/// Why a single controller could not be published.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstanceError {
    /// The controller's bus clock could not be resolved; it was never offered
    /// to the platform layer.
    ClockResolution(AxError),
    /// The platform layer rejected the descriptor.
    Registration(AxError),
}

impl fmt::Display for InstanceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClockResolution(err) => write!(f, "clock resolution failed: {err}"),
            Self::Registration(err) => write!(f, "registration failed: {err}"),
        }
    }
}

/// A controller that did not make it onto the platform bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegistrationFailure {
    pub index: usize,
    pub error: InstanceError,
}

/// Publishes every controller selected for this build.
///
/// Must run exactly once, after the clock tree is up and before drivers
/// probe. A second call offers every controller again and the registrar
/// will normally reject each one.
///
/// Controllers are processed in ascending index order and independently of
/// each other: a failed controller is reported in the returned list and the
/// rest are still published. Whether any failure is fatal is up to the caller.
pub fn run(
    clocks: &impl ClockSource,
    registrar: &impl PlatformRegistrar,
) -> Vec<RegistrationFailure> {
    register_catalogue(&Catalogue::board(), clocks, registrar)
}

/// Publishes the controllers of `catalogue`, see [`run`].
pub fn register_catalogue(
    catalogue: &Catalogue,
    clocks: &impl ClockSource,
    registrar: &impl PlatformRegistrar,
) -> Vec<RegistrationFailure> {
    let mut failures = Vec::new();
    for instance in catalogue.instances() {
        if let Err(error) = register_instance(instance, clocks, registrar) {
            warn!("SPI{}: {}", instance.index + 1, error);
            failures.push(RegistrationFailure {
                index: instance.index,
                error,
            });
        }
    }
    failures
}

fn register_instance(
    instance: ControllerInstance,
    clocks: &impl ClockSource,
    registrar: &impl PlatformRegistrar,
) -> Result<(), InstanceError> {
    let frequency = clocks
        .clock_frequency(instance.clock_domain)
        .map_err(InstanceError::ClockResolution)?;
    registrar
        .register(SpiDescriptor::new(instance, frequency))
        .map_err(InstanceError::Registration)?;
    info!(
        "SPI{}: irq {}, regs [{:#x}, {:#x}], clock {} Hz",
        instance.index + 1,
        instance.irq,
        instance.reg_base.as_usize(),
        instance.reg_end().as_usize(),
        frequency.to_Hz(),
    );
    Ok(())
}
