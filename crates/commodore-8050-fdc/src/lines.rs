//! READY, SYNC and ERROR outputs to the host.
//!
//! All three lines are active low and idle high. The timeline reports
//! them at synchronization points only, stamped with the simulated
//! instant of the bit cell that changed them.

use emu_core::Ticks;

/// Host side of the controller's status outputs.
pub trait StatusLines {
    fn set_ready(&mut self, at: Ticks, level: bool);
    fn set_sync(&mut self, at: Ticks, level: bool);
    fn set_error(&mut self, at: Ticks, level: bool);
}

/// Unconnected outputs.
impl StatusLines for () {
    fn set_ready(&mut self, _at: Ticks, _level: bool) {}
    fn set_sync(&mut self, _at: Ticks, _level: bool) {}
    fn set_error(&mut self, _at: Ticks, _level: bool) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Ready,
    Sync,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineEvent {
    pub at: Ticks,
    pub line: Line,
    pub level: bool,
}

/// Records every level the controller drives onto its outputs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineLog {
    events: Vec<LineEvent>,
}

impl LineLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn events(&self) -> &[LineEvent] {
        &self.events
    }

    /// Last level driven on `line`, if it was ever driven.
    #[must_use]
    pub fn level(&self, line: Line) -> Option<bool> {
        self.events.iter().rev().find(|e| e.line == line).map(|e| e.level)
    }

    /// Instants at which `line` went from high to low.
    pub fn assertions(&self, line: Line) -> impl Iterator<Item = Ticks> + '_ {
        let mut prev = true;
        self.events
            .iter()
            .filter(move |e| e.line == line)
            .filter_map(move |e| {
                let asserted = prev && !e.level;
                prev = e.level;
                asserted.then_some(e.at)
            })
    }

    fn push(&mut self, at: Ticks, line: Line, level: bool) {
        self.events.push(LineEvent { at, line, level });
    }
}

impl StatusLines for LineLog {
    fn set_ready(&mut self, at: Ticks, level: bool) {
        self.push(at, Line::Ready, level);
    }

    fn set_sync(&mut self, at: Ticks, level: bool) {
        self.push(at, Line::Sync, level);
    }

    fn set_error(&mut self, at: Ticks, level: bool) {
        self.push(at, Line::Error, level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assertions_track_falling_edges_per_line() {
        let mut log = LineLog::new();
        log.set_ready(Ticks::new(10), false);
        log.set_sync(Ticks::new(10), true);
        log.set_ready(Ticks::new(20), true);
        log.set_ready(Ticks::new(30), true);
        log.set_ready(Ticks::new(40), false);

        let ready: Vec<Ticks> = log.assertions(Line::Ready).collect();
        assert_eq!(ready, [Ticks::new(10), Ticks::new(40)]);
        assert_eq!(log.assertions(Line::Sync).count(), 0);
        assert_eq!(log.level(Line::Ready), Some(false));
        assert_eq!(log.level(Line::Error), None);
    }
}
