//! Bit-cell phase-locked loop.
//!
//! The PLL turns flux transitions into bit cells and bit cells back into
//! flux. The timeline only drives it through [`BitPll`] and saves or
//! restores it whole; it never looks inside.

use emu_core::Ticks;

use crate::drive::FloppyDrive;

/// Phase-tracking bit decoder/encoder.
pub trait BitPll: Clone {
    /// Restart cell tracking at `when`, dropping any write in progress.
    fn reset(&mut self, when: Ticks);

    /// Set the nominal bit-cell period.
    fn set_clock(&mut self, period: Ticks);

    /// Begin buffering written cells from `when`.
    fn start_writing(&mut self, when: Ticks);

    /// Commit buffered cells up to `when`, then stop writing.
    fn stop_writing<D: FloppyDrive>(&mut self, drive: Option<&mut D>, when: Ticks);

    /// Flush buffered cells written before `when` to the medium.
    fn commit<D: FloppyDrive>(&mut self, drive: Option<&mut D>, when: Ticks);

    /// Decode the next bit cell, advancing `tm` to its end.
    ///
    /// Returns `None` without side effects if the cell would end after
    /// `limit`.
    fn get_next_bit<D: FloppyDrive>(
        &mut self,
        tm: &mut Ticks,
        drive: Option<&D>,
        limit: Ticks,
    ) -> Option<bool>;

    /// Encode one bit cell, advancing `tm` to its end.
    ///
    /// Returns true if the cell would end after `limit` (nothing written).
    fn write_next_bit<D: FloppyDrive>(
        &mut self,
        bit: bool,
        tm: &mut Ticks,
        drive: Option<&mut D>,
        limit: Ticks,
    ) -> bool;

    /// Whether a write operation is active.
    fn is_writing(&self) -> bool;
}

/// Simple digital PLL: fixed-period cells, re-centred on every transition.
///
/// A transition inside a cell reads as 1 and pulls the next cell boundary
/// towards half a period after it, by at most an eighth of a period.
/// Written 1 bits are placed in the middle of their cell.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FluxPll {
    /// Start of the current cell.
    ctime: Ticks,
    period: Ticks,
    write_start: Option<Ticks>,
    write_buffer: Vec<Ticks>,
}

impl FluxPll {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write transitions not yet committed to the medium.
    #[must_use]
    pub fn pending_writes(&self) -> &[Ticks] {
        &self.write_buffer
    }
}

impl BitPll for FluxPll {
    fn reset(&mut self, when: Ticks) {
        self.ctime = when;
        self.write_start = None;
        self.write_buffer.clear();
    }

    fn set_clock(&mut self, period: Ticks) {
        self.period = period;
    }

    fn start_writing(&mut self, when: Ticks) {
        self.write_start = Some(when);
        self.write_buffer.clear();
    }

    fn stop_writing<D: FloppyDrive>(&mut self, drive: Option<&mut D>, when: Ticks) {
        self.commit(drive, when);
        self.write_start = None;
        self.write_buffer.clear();
    }

    fn commit<D: FloppyDrive>(&mut self, drive: Option<&mut D>, when: Ticks) {
        let Some(start) = self.write_start else {
            return;
        };
        if when.is_never() || when <= start {
            return;
        }
        if let Some(drive) = drive {
            drive.write_flux(start, when, &self.write_buffer);
        }
        self.write_buffer.retain(|&t| t >= when);
        self.write_start = Some(when);
    }

    fn get_next_bit<D: FloppyDrive>(
        &mut self,
        tm: &mut Ticks,
        drive: Option<&D>,
        limit: Ticks,
    ) -> Option<bool> {
        let period = self.period.get();
        if period == 0 {
            return None;
        }
        let end = self.ctime + period;
        let edge = drive
            .and_then(|d| d.next_transition(self.ctime))
            .filter(|&edge| edge < end);

        let next = match edge {
            Some(edge) => {
                let slack = Ticks::new(period / 8);
                (edge + period / 2).clamp(end - slack, end + slack)
            }
            None => end,
        };
        if next > limit {
            return None;
        }

        self.ctime = next;
        *tm = next;
        Some(edge.is_some())
    }

    fn write_next_bit<D: FloppyDrive>(
        &mut self,
        bit: bool,
        tm: &mut Ticks,
        _drive: Option<&mut D>,
        limit: Ticks,
    ) -> bool {
        let period = self.period.get();
        let end = self.ctime + period;
        if period == 0 || end > limit {
            return true;
        }
        if bit && self.write_start.is_some() {
            self.write_buffer.push(self.ctime + period / 2);
        }
        self.ctime = end;
        *tm = end;
        false
    }

    fn is_writing(&self) -> bool {
        self.write_start.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drive::FluxDrive;

    fn drive_with(positions: Vec<u64>) -> FluxDrive {
        let mut drive = FluxDrive::new(1, Ticks::new(10_000));
        drive.set_motor(true);
        drive.insert_track(0, false, positions);
        drive
    }

    fn pll_at(when: u64) -> FluxPll {
        let mut pll = FluxPll::new();
        pll.reset(Ticks::new(when));
        pll.set_clock(Ticks::new(16));
        pll
    }

    #[test]
    fn reads_centred_transitions_as_ones() {
        let drive = drive_with(vec![8, 40, 56]);
        let mut pll = pll_at(0);
        let mut tm = Ticks::ZERO;
        let bits: Vec<bool> = (0..4)
            .map(|_| pll.get_next_bit(&mut tm, Some(&drive), Ticks::NEVER).unwrap_or(false))
            .collect();
        assert_eq!(bits, [true, false, true, true]);
        assert_eq!(tm, Ticks::new(64));
    }

    #[test]
    fn limit_stops_without_advancing() {
        let drive = drive_with(vec![8]);
        let mut pll = pll_at(0);
        let mut tm = Ticks::ZERO;
        assert_eq!(pll.get_next_bit(&mut tm, Some(&drive), Ticks::new(15)), None);
        assert_eq!(tm, Ticks::ZERO);
        assert_eq!(pll.get_next_bit(&mut tm, Some(&drive), Ticks::new(16)), Some(true));
        assert_eq!(tm, Ticks::new(16));
    }

    #[test]
    fn early_transition_pulls_cell_boundary() {
        // Transition 4 ticks early: boundary moves back by the slack (2).
        let drive = drive_with(vec![4]);
        let mut pll = pll_at(0);
        let mut tm = Ticks::ZERO;
        assert_eq!(pll.get_next_bit(&mut tm, Some(&drive), Ticks::NEVER), Some(true));
        assert_eq!(tm, Ticks::new(14));
    }

    #[test]
    fn no_drive_reads_zeros() {
        let mut pll = pll_at(0);
        let mut tm = Ticks::ZERO;
        assert_eq!(pll.get_next_bit::<FluxDrive>(&mut tm, None, Ticks::NEVER), Some(false));
    }

    #[test]
    fn written_cells_commit_to_medium() {
        let mut drive = drive_with(vec![]);
        let mut pll = pll_at(0);
        pll.start_writing(Ticks::ZERO);
        let mut tm = Ticks::ZERO;
        for bit in [true, false, true] {
            assert!(!pll.write_next_bit(bit, &mut tm, Some(&mut drive), Ticks::NEVER));
        }
        assert_eq!(pll.pending_writes(), &[Ticks::new(8), Ticks::new(40)]);

        pll.commit(Some(&mut drive), tm);
        assert!(pll.pending_writes().is_empty());
        assert_eq!(drive.track(0, false), &[8, 40]);

        pll.stop_writing(Some(&mut drive), tm);
        assert!(!pll.is_writing());
    }

    #[test]
    fn write_limit_reports_stop() {
        let mut pll = pll_at(0);
        pll.start_writing(Ticks::ZERO);
        let mut tm = Ticks::ZERO;
        assert!(pll.write_next_bit::<FluxDrive>(true, &mut tm, None, Ticks::new(10)));
        assert!(pll.pending_writes().is_empty());
    }

    #[test]
    fn commit_before_write_start_is_ignored() {
        let mut drive = drive_with(vec![100]);
        let mut pll = pll_at(0);
        pll.start_writing(Ticks::new(50));
        pll.commit(Some(&mut drive), Ticks::new(20));
        assert_eq!(drive.track(0, false), &[100]);
        assert!(pll.is_writing());
    }
}
