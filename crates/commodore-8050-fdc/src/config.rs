//! Controller construction parameters.

use emu_core::{MasterClock, Ticks};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 8050 controller master clock (12 MHz crystal).
pub const DEFAULT_CLOCK_HZ: u64 = 12_000_000;

/// One revolution at 300 RPM.
pub const DEFAULT_LOOKAHEAD_US: u64 = 200_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("clock frequency must be non-zero")]
    ZeroClock,
    #[error("lookahead must be non-zero")]
    ZeroLookahead,
    #[error("lookahead of {lookahead_us} us overflows the tick counter at {clock_hz} Hz")]
    LookaheadOverflow { clock_hz: u64, lookahead_us: u64 },
}

/// Timing parameters for an [`Fdc8050`](crate::Fdc8050).
///
/// Missing JSON fields take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FdcConfig {
    /// Tick rate of the timeline, in Hz.
    pub clock_hz: u64,
    /// How far past `now` a register write lets the decoder run ahead.
    pub lookahead_us: u64,
}

impl Default for FdcConfig {
    fn default() -> Self {
        Self {
            clock_hz: DEFAULT_CLOCK_HZ,
            lookahead_us: DEFAULT_LOOKAHEAD_US,
        }
    }
}

impl FdcConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clock_hz == 0 {
            return Err(ConfigError::ZeroClock);
        }
        if self.lookahead_us == 0 {
            return Err(ConfigError::ZeroLookahead);
        }
        if self.clock().checked_ticks_from_micros(self.lookahead_us).is_none() {
            return Err(ConfigError::LookaheadOverflow {
                clock_hz: self.clock_hz,
                lookahead_us: self.lookahead_us,
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn clock(&self) -> MasterClock {
        MasterClock::new(self.clock_hz)
    }

    /// Lookahead horizon in ticks (at least one).
    #[must_use]
    pub fn lookahead(&self) -> Ticks {
        self.clock().ticks_from_micros(self.lookahead_us).max(Ticks::new(1))
    }
}
