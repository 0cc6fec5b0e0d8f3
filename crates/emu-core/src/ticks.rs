//! The fundamental unit of time in the emulator.

use std::fmt;

/// A count of master clock ticks.
///
/// `Ticks::NEVER` stands for "no scheduled instant". Arithmetic saturates,
/// so anything added to `NEVER` stays `NEVER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Ticks(pub u64);

impl Ticks {
    pub const ZERO: Self = Self(0);
    pub const NEVER: Self = Self(u64::MAX);

    #[must_use]
    pub const fn new(count: u64) -> Self {
        Self(count)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn is_never(self) -> bool {
        self.0 == u64::MAX
    }

    /// Time elapsed since `earlier`, or zero if `earlier` is later.
    #[must_use]
    pub const fn since(self, earlier: Self) -> Self {
        Self(self.0.saturating_sub(earlier.0))
    }
}

impl core::ops::Add for Ticks {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl core::ops::Add<u64> for Ticks {
    type Output = Self;

    fn add(self, rhs: u64) -> Self {
        Self(self.0.saturating_add(rhs))
    }
}

impl core::ops::AddAssign for Ticks {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl core::ops::Sub for Ticks {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        self.since(rhs)
    }
}

impl fmt::Display for Ticks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_never() {
            f.write_str("never")
        } else {
            write!(f, "{}t", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_absorbs_addition() {
        assert_eq!(Ticks::NEVER + Ticks::new(5), Ticks::NEVER);
        assert_eq!(Ticks::NEVER + 1, Ticks::NEVER);
        assert!((Ticks::NEVER + 1).is_never());
    }

    #[test]
    fn never_orders_after_everything() {
        assert!(Ticks::new(u64::MAX - 1) < Ticks::NEVER);
        assert!(Ticks::ZERO < Ticks::NEVER);
    }

    #[test]
    fn subtraction_saturates() {
        assert_eq!(Ticks::new(3) - Ticks::new(10), Ticks::ZERO);
        assert_eq!(Ticks::new(10).since(Ticks::new(3)), Ticks::new(7));
    }

    #[test]
    fn display() {
        assert_eq!(Ticks::new(42).to_string(), "42t");
        assert_eq!(Ticks::NEVER.to_string(), "never");
    }
}
