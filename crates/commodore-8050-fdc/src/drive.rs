//! Floppy drive mechanism seen by the controller.
//!
//! The controller only talks to a drive through [`FloppyDrive`]: spindle
//! motor, head side, stepper direction and step pulses, plus flux access
//! for the PLL. [`FluxDrive`] is an in-memory drive that stores each
//! track as flux transition positions within one revolution.

use emu_core::Ticks;

/// Flux-level floppy drive interface.
pub trait FloppyDrive {
    /// Spindle motor control (true = spinning).
    fn set_motor(&mut self, on: bool);

    /// Head side select (true = upper head).
    fn set_side(&mut self, side: bool);

    /// Stepper direction (true = outward, toward cylinder 0).
    fn set_direction(&mut self, outward: bool);

    /// Step input level. The head moves on the falling edge.
    fn set_step(&mut self, level: bool);

    /// One complete step waveform: rising then falling.
    fn pulse_step(&mut self) {
        self.set_step(true);
        self.set_step(false);
    }

    /// First flux transition at or after `from` under the active head.
    ///
    /// `None` when the disk is not turning or the track holds no flux.
    fn next_transition(&self, from: Ticks) -> Option<Ticks>;

    /// Replace the flux in `[start, end)` with `transitions`.
    fn write_flux(&mut self, start: Ticks, end: Ticks, transitions: &[Ticks]);
}

/// In-memory double-sided drive holding flux transitions per track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FluxDrive {
    /// Transition positions (ticks into the revolution), sorted, indexed
    /// by `cylinder * 2 + side`.
    tracks: Vec<Vec<u64>>,
    /// Ticks per revolution.
    revolution: u64,
    cylinders: u8,
    cylinder: u8,
    side: bool,
    motor_on: bool,
    outward: bool,
    step_level: bool,
    /// Completed step pulses (for diagnostics).
    steps: u32,
}

impl FluxDrive {
    /// Create a blank drive. `revolution` must be non-zero.
    #[must_use]
    pub fn new(cylinders: u8, revolution: Ticks) -> Self {
        let cylinders = cylinders.max(1);
        Self {
            tracks: vec![Vec::new(); usize::from(cylinders) * 2],
            revolution: revolution.get().max(1),
            cylinders,
            cylinder: 0,
            side: false,
            motor_on: false,
            outward: false,
            step_level: false,
            steps: 0,
        }
    }

    /// Replace a whole track. Positions outside one revolution are dropped.
    pub fn insert_track(&mut self, cylinder: u8, side: bool, mut positions: Vec<u64>) {
        let Some(index) = self.index(cylinder, side) else {
            return;
        };
        positions.retain(|&p| p < self.revolution);
        positions.sort_unstable();
        positions.dedup();
        self.tracks[index] = positions;
    }

    /// Transition positions of a track.
    #[must_use]
    pub fn track(&self, cylinder: u8, side: bool) -> &[u64] {
        match self.index(cylinder, side) {
            Some(index) => &self.tracks[index],
            None => &[],
        }
    }

    #[must_use]
    pub fn cylinder(&self) -> u8 {
        self.cylinder
    }

    #[must_use]
    pub fn side(&self) -> bool {
        self.side
    }

    #[must_use]
    pub fn motor_on(&self) -> bool {
        self.motor_on
    }

    #[must_use]
    pub fn steps(&self) -> u32 {
        self.steps
    }

    fn index(&self, cylinder: u8, side: bool) -> Option<usize> {
        (cylinder < self.cylinders).then(|| usize::from(cylinder) * 2 + usize::from(side))
    }

    fn active_track(&self) -> &[u64] {
        self.track(self.cylinder, self.side)
    }
}

impl FloppyDrive for FluxDrive {
    fn set_motor(&mut self, on: bool) {
        self.motor_on = on;
    }

    fn set_side(&mut self, side: bool) {
        self.side = side;
    }

    fn set_direction(&mut self, outward: bool) {
        self.outward = outward;
    }

    fn set_step(&mut self, level: bool) {
        let falling = self.step_level && !level;
        self.step_level = level;
        if !falling {
            return;
        }
        self.steps += 1;
        if self.outward {
            self.cylinder = self.cylinder.saturating_sub(1);
        } else if self.cylinder + 1 < self.cylinders {
            self.cylinder += 1;
        }
    }

    fn next_transition(&self, from: Ticks) -> Option<Ticks> {
        let track = self.active_track();
        if !self.motor_on || from.is_never() || track.is_empty() {
            return None;
        }
        let angle = from.get() % self.revolution;
        let base = from.get() - angle;
        let pos = track.partition_point(|&p| p < angle);
        let next = match track.get(pos) {
            Some(&p) => base + p,
            None => base + self.revolution + track[0],
        };
        Some(Ticks::new(next))
    }

    fn write_flux(&mut self, start: Ticks, end: Ticks, transitions: &[Ticks]) {
        if !self.motor_on || end.is_never() || end <= start {
            return;
        }
        let Some(index) = self.index(self.cylinder, self.side) else {
            return;
        };
        let rev = self.revolution;
        // Only the last revolution of a long write survives.
        let start = start.max(end - Ticks::new(rev));
        let a0 = start.get() % rev;
        let a1 = end.get() % rev;

        let track = &mut self.tracks[index];
        if end - start >= Ticks::new(rev) {
            track.clear();
        } else if a0 < a1 {
            track.retain(|&p| p < a0 || p >= a1);
        } else {
            track.retain(|&p| p >= a1 && p < a0);
        }

        track.extend(
            transitions
                .iter()
                .filter(|&&t| t >= start && t < end)
                .map(|t| t.get() % rev),
        );
        track.sort_unstable();
        track.dedup();
    }
}
