use core::fmt;

use axaddrspace::HostPhysAddr;
use bitmaps::Bitmap;
use log::debug;

use crate::clock::ClockDomain;
use crate::consts::*;
use crate::utils::{window_end, windows_overlap};

/// Hardware resources owned by one SPI controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ControllerInstance {
    /// Ordinal of the controller (SPI1 is 0). Also the bus number drivers see.
    pub index: usize,
    /// NVIC interrupt line.
    pub irq: u32,
    /// Start of the register window.
    pub reg_base: HostPhysAddr,
    /// Size of the register window in bytes, always [`SPI_REGS_SIZE`].
    pub reg_size: usize,
    /// Bus clock the controller is wired to.
    pub clock_domain: ClockDomain,
}

impl ControllerInstance {
    pub const fn new(index: usize, irq: u32, reg_base: usize, clock_domain: ClockDomain) -> Self {
        Self {
            index,
            irq,
            reg_base: HostPhysAddr::from_usize(reg_base),
            reg_size: SPI_REGS_SIZE,
            clock_domain,
        }
    }

    /// Last byte of the register window, clamped to the top of the address space.
    pub const fn reg_end(&self) -> HostPhysAddr {
        match window_end(self.reg_base.as_usize(), self.reg_size) {
            Some(end) => HostPhysAddr::from_usize(end),
            None => HostPhysAddr::from_usize(usize::MAX),
        }
    }

    /// Whether `addr` falls inside the register window.
    pub const fn contains(&self, addr: HostPhysAddr) -> bool {
        let addr = addr.as_usize();
        let base = self.reg_base.as_usize();
        addr >= base && addr - base < self.reg_size
    }

    /// Whether the two register windows intersect. A window that does not fit
    /// in the address space conflicts with everything.
    pub(crate) const fn overlaps(&self, other: &Self) -> bool {
        match windows_overlap(
            self.reg_base.as_usize(),
            self.reg_size,
            other.reg_base.as_usize(),
            other.reg_size,
        ) {
            Some(overlap) => overlap,
            None => true,
        }
    }
}

/// Every SPI controller of the family, in index order.
pub const SPI_TEMPLATE: [ControllerInstance; SPI_MAX_INSTANCES] = [
    ControllerInstance::new(0, SPI1_IRQ, SPI1_REGS, ClockDomain::Pclk2),
    ControllerInstance::new(1, SPI2_IRQ, SPI2_REGS, ClockDomain::Pclk1),
    ControllerInstance::new(2, SPI3_IRQ, SPI3_REGS, ClockDomain::Pclk1),
    ControllerInstance::new(3, SPI4_IRQ, SPI4_REGS, ClockDomain::Pclk2),
    ControllerInstance::new(4, SPI5_IRQ, SPI5_REGS, ClockDomain::Pclk2),
    ControllerInstance::new(5, SPI6_IRQ, SPI6_REGS, ClockDomain::Pclk2),
];

/// Controllers selected for this build, indexed like [`SPI_TEMPLATE`].
pub const SPI_ENABLED: [bool; SPI_MAX_INSTANCES] = [
    cfg!(feature = "spi1"),
    cfg!(feature = "spi2"),
    cfg!(feature = "spi3"),
    cfg!(feature = "spi4"),
    cfg!(feature = "spi5"),
    cfg!(feature = "spi6"),
];

// Reject a conflicting board table at compile time.
const _: () = match validate(&SPI_TEMPLATE, &SPI_ENABLED) {
    Ok(()) => (),
    Err(_) => panic!("SPI controller table has conflicting or malformed resources"),
};

/// A defect in a board's controller table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// An enabled controller has an index beyond [`SPI_MAX_INSTANCES`].
    IndexOutOfRange(usize),
    /// An index is enabled but the table has no controller for it.
    MissingInstance(usize),
    /// Two enabled controllers share an index.
    DuplicateIndex(usize),
    /// Two enabled controllers share an interrupt line.
    DuplicateIrq { irq: u32, first: usize, second: usize },
    /// A register window runs past the end of the address space.
    WindowOutOfRange { index: usize },
    /// Two enabled controllers have intersecting register windows.
    OverlappingWindow { first: usize, second: usize },
    /// A register window is not [`SPI_REGS_SIZE`] bytes.
    InvalidWindowSize { index: usize, size: usize },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::IndexOutOfRange(index) => write!(f, "SPI index {index} out of range"),
            Self::MissingInstance(index) => write!(f, "SPI{} is enabled but not described", index + 1),
            Self::DuplicateIndex(index) => write!(f, "SPI index {index} described twice"),
            Self::DuplicateIrq { irq, first, second } => {
                write!(f, "IRQ {irq} shared by SPI index {first} and {second}")
            }
            Self::WindowOutOfRange { index } => {
                write!(f, "register window of SPI index {index} exceeds the address space")
            }
            Self::OverlappingWindow { first, second } => {
                write!(f, "register windows of SPI index {first} and {second} overlap")
            }
            Self::InvalidWindowSize { index, size } => {
                write!(f, "SPI index {index} has a {size:#x} byte window, expected {SPI_REGS_SIZE:#x}")
            }
        }
    }
}

const fn is_enabled(enabled: &[bool], index: usize) -> bool {
    index < enabled.len() && enabled[index]
}

/// Checks the controllers of `table` selected by `enabled` against each other.
///
/// `enabled[i]` selects the controller whose index is `i`.
pub const fn validate(table: &[ControllerInstance], enabled: &[bool]) -> Result<(), ConfigError> {
    let mut idx = 0;
    while idx < enabled.len() {
        if enabled[idx] {
            if idx >= SPI_MAX_INSTANCES {
                return Err(ConfigError::IndexOutOfRange(idx));
            }
            let mut found = false;
            let mut i = 0;
            while i < table.len() {
                if table[i].index == idx {
                    found = true;
                }
                i += 1;
            }
            if !found {
                return Err(ConfigError::MissingInstance(idx));
            }
        }
        idx += 1;
    }

    let mut i = 0;
    while i < table.len() {
        let a = &table[i];
        if is_enabled(enabled, a.index) {
            if a.reg_size != SPI_REGS_SIZE {
                return Err(ConfigError::InvalidWindowSize {
                    index: a.index,
                    size: a.reg_size,
                });
            }
            if window_end(a.reg_base.as_usize(), a.reg_size).is_none() {
                return Err(ConfigError::WindowOutOfRange { index: a.index });
            }
        }
        i += 1;
    }

    let mut i = 0;
    while i < table.len() {
        let a = &table[i];
        if !is_enabled(enabled, a.index) {
            i += 1;
            continue;
        }
        let mut j = i + 1;
        while j < table.len() {
            let b = &table[j];
            if is_enabled(enabled, b.index) {
                if a.index == b.index {
                    return Err(ConfigError::DuplicateIndex(a.index));
                }
                if a.irq == b.irq {
                    return Err(ConfigError::DuplicateIrq {
                        irq: a.irq,
                        first: a.index,
                        second: b.index,
                    });
                }
                if a.overlaps(b) {
                    return Err(ConfigError::OverlappingWindow {
                        first: a.index,
                        second: b.index,
                    });
                }
            }
            j += 1;
        }
        i += 1;
    }
    Ok(())
}

/// A validated, read-only selection of controllers.
#[derive(Clone, Debug)]
pub struct Catalogue<'a> {
    template: &'a [ControllerInstance],
    enabled: Bitmap<SPI_MAX_INSTANCES>,
}

impl<'a> Catalogue<'a> {
    /// Selects the controllers of `template` whose index is set in `enabled`.
    pub fn new(
        template: &'a [ControllerInstance],
        enabled: Bitmap<SPI_MAX_INSTANCES>,
    ) -> Result<Self, ConfigError> {
        let mut mask = [false; SPI_MAX_INSTANCES];
        for (idx, on) in mask.iter_mut().enumerate() {
            *on = enabled.get(idx);
        }
        validate(template, &mask)?;
        debug!("SPI catalogue: {} controller(s) enabled", enabled.len());
        Ok(Self { template, enabled })
    }

    /// Enabled controllers in ascending index order.
    pub fn instances(&self) -> impl Iterator<Item = ControllerInstance> + '_ {
        (0..SPI_MAX_INSTANCES)
            .filter(move |&idx| self.enabled.get(idx))
            .filter_map(move |idx| self.get(idx))
    }

    /// The enabled controller with the given index.
    pub fn get(&self, index: usize) -> Option<ControllerInstance> {
        if index >= SPI_MAX_INSTANCES || !self.enabled.get(index) {
            return None;
        }
        self.template.iter().find(|c| c.index == index).copied()
    }

    /// Number of enabled controllers.
    pub fn len(&self) -> usize {
        self.enabled.len()
    }

    /// Whether no controller is enabled.
    pub fn is_empty(&self) -> bool {
        self.enabled.is_empty()
    }
}

impl Catalogue<'static> {
    /// The controllers selected by the cargo features of this build.
    pub fn board() -> Self {
        let mut enabled = Bitmap::new();
        for (idx, on) in SPI_ENABLED.iter().enumerate() {
            enabled.set(idx, *on);
        }
        // Already checked by the const assertion above.
        Self {
            template: &SPI_TEMPLATE,
            enabled,
        }
    }
}

/// Controllers enabled for this build, in ascending index order.
pub fn enabled_instances() -> impl Iterator<Item = ControllerInstance> {
    let board = Catalogue::board();
    (0..SPI_MAX_INSTANCES).filter_map(move |idx| board.get(idx))
}

#[cfg(test)]
pub(crate) fn mask(indices: &[usize]) -> Bitmap<SPI_MAX_INSTANCES> {
    let mut enabled = Bitmap::new();
    for &idx in indices {
        enabled.set(idx, true);
    }
    enabled
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::vec::Vec;

    fn indices(catalogue: &Catalogue) -> Vec<usize> {
        catalogue.instances().map(|c| c.index).collect()
    }

    #[test]
    fn template_has_no_conflicts() {
        assert_eq!(validate(&SPI_TEMPLATE, &[true; SPI_MAX_INSTANCES]), Ok(()));
    }

    #[test]
    fn only_enabled_instances_in_index_order() {
        let catalogue = Catalogue::new(&SPI_TEMPLATE, mask(&[5, 0, 2])).unwrap();
        assert_eq!(indices(&catalogue), [0, 2, 5]);
        assert_eq!(catalogue.len(), 3);
        assert!(catalogue.get(1).is_none());
        assert_eq!(catalogue.get(2).map(|c| c.irq), Some(51));
    }

    #[test]
    fn order_does_not_depend_on_template_order() {
        let mut reversed = SPI_TEMPLATE;
        reversed.reverse();
        let catalogue = Catalogue::new(&reversed, mask(&[0, 1, 3])).unwrap();
        assert_eq!(indices(&catalogue), [0, 1, 3]);
    }

    #[test]
    fn repeated_iteration_is_identical() {
        let catalogue = Catalogue::new(&SPI_TEMPLATE, mask(&[1, 4])).unwrap();
        let first: Vec<_> = catalogue.instances().collect();
        let second: Vec<_> = catalogue.instances().collect();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_selection_is_valid() {
        let catalogue = Catalogue::new(&SPI_TEMPLATE, Bitmap::new()).unwrap();
        assert!(catalogue.is_empty());
        assert_eq!(catalogue.instances().count(), 0);
    }

    fn check_selected(selected: bool, index: usize, irq: u32, base: usize) {
        let found = enabled_instances().find(|c| c.index == index);
        if selected {
            let c = found.expect("controller of an enabled feature is missing");
            assert_eq!((c.irq, c.reg_base.as_usize()), (irq, base));
        } else {
            assert!(found.is_none(), "controller {index} present without its feature");
        }
    }

    // Run with e.g. `--features spi1,spi3,spi6` to cover a populated board.
    #[test]
    fn each_feature_selects_its_controller() {
        check_selected(cfg!(feature = "spi1"), 0, 35, 0x4001_3000);
        check_selected(cfg!(feature = "spi2"), 1, 36, 0x4000_3800);
        check_selected(cfg!(feature = "spi3"), 2, 51, 0x4000_3C00);
        check_selected(cfg!(feature = "spi4"), 3, 84, 0x4001_3400);
        check_selected(cfg!(feature = "spi5"), 4, 85, 0x4001_5000);
        check_selected(cfg!(feature = "spi6"), 5, 86, 0x4001_5400);
    }

    #[test]
    fn board_catalogue_is_ordered_and_unique() {
        let found: Vec<usize> = enabled_instances().map(|c| c.index).collect();
        assert!(found.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(found.len(), SPI_ENABLED.iter().filter(|on| **on).count());
        assert_eq!(found.len(), Catalogue::board().len());
    }

    #[cfg(all(feature = "spi1", feature = "spi3", not(feature = "spi2")))]
    #[test]
    fn disabled_controller_leaves_a_gap() {
        let found: Vec<usize> = enabled_instances().map(|c| c.index).take(2).collect();
        assert_eq!(found, [0, 2]);
    }

    #[test]
    fn hardware_wiring() {
        let spi1 = SPI_TEMPLATE[0];
        assert_eq!(spi1.irq, 35);
        assert_eq!(spi1.reg_base.as_usize(), 0x4001_3000);
        assert_eq!(spi1.reg_end().as_usize(), 0x4001_33FF);
        assert_eq!(spi1.clock_domain, ClockDomain::Pclk2);
        assert_eq!(SPI_TEMPLATE[2].clock_domain, ClockDomain::Pclk1);
        assert!(SPI_TEMPLATE.iter().all(|c| c.reg_size == 0x400));
    }

    #[test]
    fn window_containment() {
        let spi3 = SPI_TEMPLATE[2];
        assert!(spi3.contains(HostPhysAddr::from_usize(0x4000_3C00)));
        assert!(spi3.contains(HostPhysAddr::from_usize(0x4000_3FFF)));
        assert!(!spi3.contains(HostPhysAddr::from_usize(0x4000_4000)));
        assert!(!spi3.contains(HostPhysAddr::from_usize(0x4000_3BFF)));
    }

    #[test]
    fn shared_irq_is_rejected() {
        let mut table = SPI_TEMPLATE;
        table[3].irq = table[0].irq;
        assert_eq!(
            Catalogue::new(&table, mask(&[0, 3])).map(|_| ()),
            Err(ConfigError::DuplicateIrq {
                irq: 35,
                first: 0,
                second: 3
            })
        );
        // Only enabled controllers are compared.
        assert!(Catalogue::new(&table, mask(&[0, 1])).is_ok());
    }

    #[test]
    fn overlapping_window_is_rejected() {
        let mut table = SPI_TEMPLATE;
        table[4].reg_base = HostPhysAddr::from_usize(0x4001_3200);
        assert_eq!(
            validate(&table, &[true; SPI_MAX_INSTANCES]),
            Err(ConfigError::OverlappingWindow { first: 0, second: 4 })
        );
    }

    #[test]
    fn malformed_entries_are_rejected() {
        let mut table = SPI_TEMPLATE;
        table[1].reg_size = 0x3FF;
        assert_eq!(
            Catalogue::new(&table, mask(&[1])).map(|_| ()),
            Err(ConfigError::InvalidWindowSize { index: 1, size: 0x3FF })
        );

        let mut table = SPI_TEMPLATE;
        table[1].irq = 200;
        assert!(Catalogue::new(&table, mask(&[1])).is_ok());

        let mut table = SPI_TEMPLATE;
        table[5].index = 4;
        assert_eq!(
            validate(&table, &[false, false, false, false, true, false]),
            Err(ConfigError::DuplicateIndex(4))
        );
    }

    #[test]
    fn window_past_address_space_is_rejected() {
        let mut table = SPI_TEMPLATE;
        table[1].reg_base = HostPhysAddr::from_usize(usize::MAX - 0xFF);
        assert_eq!(
            Catalogue::new(&table, mask(&[0, 1])).map(|_| ()),
            Err(ConfigError::WindowOutOfRange { index: 1 })
        );
        assert_eq!(table[1].reg_end().as_usize(), usize::MAX);

        // A window ending exactly at the top of the address space still fits.
        table[1].reg_base = HostPhysAddr::from_usize(usize::MAX - 0x3FF);
        assert!(Catalogue::new(&table, mask(&[0, 1])).is_ok());
    }

    #[test]
    fn enabled_index_without_entry_is_rejected() {
        assert_eq!(
            Catalogue::new(&SPI_TEMPLATE[..2], mask(&[0, 3])).map(|_| ()),
            Err(ConfigError::MissingInstance(3))
        );
        assert_eq!(
            validate(&SPI_TEMPLATE, &[false, false, false, false, false, false, true]),
            Err(ConfigError::IndexOutOfRange(6))
        );
    }
}
