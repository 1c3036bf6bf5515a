use axerrno::{ax_err, AxResult};

/// A clock frequency in hertz.
pub use fugit::HertzU32 as Hertz;

/// Internal bus clock feeding a peripheral.
///
/// Which domain a controller sits on is fixed by the silicon, not by board
/// configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClockDomain {
    /// APB1 peripheral clock (low-speed bus).
    Pclk1,
    /// APB2 peripheral clock (high-speed bus).
    Pclk2,
}

/// The clock-management service consulted during bring-up.
pub trait ClockSource {
    /// Returns the current frequency of `domain`.
    ///
    /// Fails if the domain is unknown to the clock tree or the tree has not
    /// been initialised yet.
    fn clock_frequency(&self, domain: ClockDomain) -> AxResult<Hertz>;
}

/// Bus clock frequencies as computed by the RCC setup code.
///
/// A clock left at `None` has not been configured; resolving it fails with
/// [`axerrno::AxError::BadState`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BusClocks {
    pub pclk1: Option<Hertz>,
    pub pclk2: Option<Hertz>,
}

impl BusClocks {
    pub const fn new(pclk1: Hertz, pclk2: Hertz) -> Self {
        Self {
            pclk1: Some(pclk1),
            pclk2: Some(pclk2),
        }
    }

    /// Clock tree before the RCC has been programmed.
    pub const fn uninit() -> Self {
        Self {
            pclk1: None,
            pclk2: None,
        }
    }
}

impl ClockSource for BusClocks {
    fn clock_frequency(&self, domain: ClockDomain) -> AxResult<Hertz> {
        let freq = match domain {
            ClockDomain::Pclk1 => self.pclk1,
            ClockDomain::Pclk2 => self.pclk2,
        };
        match freq {
            Some(freq) => Ok(freq),
            None => ax_err!(BadState, "bus clock not initialised"),
        }
    }
}
