// Register map of the STM32 SPI controllers as wired on the F4/F7 family.

/// Number of SPI controllers the family can carry (SPI1 .. SPI6).
pub const SPI_MAX_INSTANCES: usize = 6;

/// Size of the register window of every SPI controller, in bytes.
/// The window of a controller at `base` covers [base, base + 0x3FF].
pub const SPI_REGS_SIZE: usize = 0x400;

/// Name under which the controllers are published; the generic driver binds by it.
pub const SPI_DRIVER_NAME: &str = "spi_stm32";

// --- SPI1 (APB2) ---
pub const SPI1_IRQ: u32 = 35;
pub const SPI1_REGS: usize = 0x4001_3000;

// --- SPI2 (APB1) ---
pub const SPI2_IRQ: u32 = 36;
pub const SPI2_REGS: usize = 0x4000_3800;

// --- SPI3 (APB1) ---
pub const SPI3_IRQ: u32 = 51;
pub const SPI3_REGS: usize = 0x4000_3C00;

// --- SPI4 (APB2) ---
pub const SPI4_IRQ: u32 = 84;
pub const SPI4_REGS: usize = 0x4001_3400;

// --- SPI5 (APB2) ---
pub const SPI5_IRQ: u32 = 85;
pub const SPI5_REGS: usize = 0x4001_5000;

// --- SPI6 (APB2) ---
pub const SPI6_IRQ: u32 = 86;
pub const SPI6_REGS: usize = 0x4001_5400;
