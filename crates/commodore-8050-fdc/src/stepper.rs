//! Head positioning from the two-bit stepper phase.
//!
//! Each drive's stepper is driven by a quadrature phase pair. Walking the
//! cycle 0 → 1 → 3 → 2 → 0 moves the head one track inward per change;
//! walking it backwards moves outward. Repeats and diagonal jumps
//! (0 ↔ 3, 1 ↔ 2) do not move the head.

use crate::drive::FloppyDrive;

/// Track delta (-1, 0 or +1) for a phase change.
#[must_use]
pub const fn quadrature_delta(old: u8, new: u8) -> i8 {
    match (old & 0x03, new & 0x03) {
        (0, 1) | (1, 3) | (3, 2) | (2, 0) => 1,
        (0, 2) | (2, 3) | (3, 1) | (1, 0) => -1,
        _ => 0,
    }
}

/// Apply a new phase to a drive's stepper.
///
/// Movement only happens while the drive's motor is energized. The stored
/// phase is updated either way. A move sets the direction and issues one
/// step pulse. Returns the delta applied.
pub fn step<D: FloppyDrive>(drive: Option<&mut D>, motor_on: bool, phase: &mut u8, new: u8) -> i8 {
    let new = new & 0x03;
    let delta = if motor_on {
        quadrature_delta(*phase, new)
    } else {
        0
    };
    *phase = new;

    if delta != 0 {
        if let Some(drive) = drive {
            drive.set_direction(delta < 0);
            drive.pulse_step();
        }
    }
    delta
}
