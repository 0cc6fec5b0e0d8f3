//! Master clock configuration.

use crate::Ticks;

/// Master clock configuration for a system.
///
/// Each system has a master crystal that drives all timing. Bit cells,
/// disk revolutions and scheduler horizons are all expressed in its ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterClock {
    /// Crystal frequency in Hz (e.g., `12_000_000` for the 8050 controller).
    pub frequency_hz: u64,
}

impl MasterClock {
    #[must_use]
    pub const fn new(frequency_hz: u64) -> Self {
        Self { frequency_hz }
    }

    /// Ticks in the given number of microseconds (integer division),
    /// saturating at [`Ticks::NEVER`].
    #[must_use]
    pub const fn ticks_from_micros(&self, micros: u64) -> Ticks {
        Ticks::new((self.frequency_hz / 1_000).saturating_mul(micros) / 1_000)
    }

    /// Like [`ticks_from_micros`](Self::ticks_from_micros), but `None` when
    /// the product does not fit in a `u64`.
    #[must_use]
    pub const fn checked_ticks_from_micros(&self, micros: u64) -> Option<Ticks> {
        match (self.frequency_hz / 1_000).checked_mul(micros) {
            Some(scaled) => Some(Ticks::new(scaled / 1_000)),
            None => None,
        }
    }
}
