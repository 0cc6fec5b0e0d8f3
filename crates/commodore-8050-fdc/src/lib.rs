//! Commodore 8050 floppy disk controller.
//!
//! Timing model of the 8050/8250 drive's read/write electronics: a bit-cell
//! timeline that pulls flux through a PLL, frames 10-bit GCR words, and
//! raises READY, SYNC and ERROR for the drive's 6502, plus the stepper
//! logic for both mechanisms.
//!
//! The host owns time. Every entry point takes the current instant in
//! master-clock ticks; the controller may run ahead of it speculatively and
//! rolls back whenever a register write lands inside that window.
//!
//! # Register interface
//!
//! | Signal     | Width | Meaning                                        |
//! |------------|-------|------------------------------------------------|
//! | `MTR0/1`   | 1     | Spindle motor, active low                      |
//! | `STP0/1`   | 2     | Stepper phase, quadrature                      |
//! | `DS`       | 2     | Density select, bit cell = `16 - DS` ticks     |
//! | `DRV SEL`  | 1     | Drive whose flux the timeline reads or writes  |
//! | `MODE SEL` | 1     | Write sync marks instead of data               |
//! | `R/W SEL`  | 1     | 1 = read, 0 = write                            |
//! | `ODD HD`   | 1     | Head select, inverted onto the drive side line |
//! | `PI`       | 8     | Data latch for write mode                      |
//!
//! Reading returns the GCR ROM output for the last framed word, packed so
//! that a valid word reads back as its data byte.
//!
//! # Status lines
//!
//! READY drops for one cell at each byte boundary, SYNC stays low while the
//! read shift register holds ten one bits, ERROR drops at a byte boundary
//! when the word is not valid GCR. All three are reported through
//! [`StatusLines`] with the exact cell instant.

pub mod config;
pub mod drive;
pub mod gcr;
pub mod lines;
pub mod live;
pub mod pll;
pub mod snapshot;
pub mod stepper;

use emu_core::{Observable, Ticks, Value};

pub use config::{ConfigError, FdcConfig};
pub use drive::{FloppyDrive, FluxDrive};
pub use lines::{Line, LineEvent, LineLog, StatusLines};
pub use live::{Checkpoint, LiveEngine, LivePhase, LiveState, cell_period};
pub use pll::{BitPll, FluxPll};
pub use snapshot::{RestoreError, SavedState};

use live::LiveContext;

/// One of the two drive mechanisms sharing the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Drive0,
    Drive1,
}

impl Unit {
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Drive0 => 0,
            Self::Drive1 => 1,
        }
    }
}

/// Authoritative register file, as last written by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    /// Motor lines per unit (active low).
    pub mtr: [bool; 2],
    /// Stepper phase per unit.
    pub stp: [u8; 2],
    pub ds: u8,
    pub drv_sel: bool,
    pub mode_sel: bool,
    pub rw_sel: bool,
    pub odd_hd: bool,
    pub pi: u8,
}

impl Default for Registers {
    fn default() -> Self {
        Self {
            mtr: [true, true],
            stp: [0, 0],
            ds: 0,
            drv_sel: false,
            mode_sel: false,
            rw_sel: true,
            odd_hd: false,
            pi: 0,
        }
    }
}

impl Registers {
    /// Whether either spindle is commanded on.
    #[must_use]
    pub fn any_motor_on(&self) -> bool {
        !self.mtr[0] || !self.mtr[1]
    }
}

/// 8050 controller with two drive slots.
pub struct Fdc8050<D = FluxDrive, P = FluxPll, L = LineLog> {
    regs: Registers,
    live: LiveEngine<P>,
    drives: [Option<D>; 2],
    lines: L,
    lookahead: Ticks,
}

impl Fdc8050 {
    /// Controller with the in-memory PLL and a recording line log.
    #[must_use]
    pub fn with_config(config: &FdcConfig) -> Self {
        Self::new(config, FluxPll::new(), LineLog::new())
    }
}

impl Default for Fdc8050 {
    fn default() -> Self {
        Self::with_config(&FdcConfig::default())
    }
}

impl<D: FloppyDrive, P: BitPll, L: StatusLines> Fdc8050<D, P, L> {
    #[must_use]
    pub fn new(config: &FdcConfig, pll: P, lines: L) -> Self {
        Self {
            regs: Registers::default(),
            live: LiveEngine::new(pll),
            drives: [None, None],
            lines,
            lookahead: config.lookahead(),
        }
    }

    /// Insert a drive mechanism at `now`, returning the one it replaces.
    ///
    /// The drive picks up the current motor and side lines. Cells up to
    /// `now` are committed against the old medium first.
    pub fn attach_drive(&mut self, now: Ticks, unit: Unit, mut drive: D) -> Option<D> {
        drive.set_motor(!self.regs.mtr[unit.index()]);
        drive.set_side(!self.regs.odd_hd);
        tracing::debug!(%now, ?unit, "attach drive");
        let mut replaced = None;
        self.update(now, |_, _, drives| {
            replaced = drives[unit.index()].replace(drive);
        });
        replaced
    }

    #[must_use]
    pub fn drive(&self, unit: Unit) -> Option<&D> {
        self.drives[unit.index()].as_ref()
    }

    pub fn drive_mut(&mut self, unit: Unit) -> Option<&mut D> {
        self.drives[unit.index()].as_mut()
    }

    #[must_use]
    pub fn lines(&self) -> &L {
        &self.lines
    }

    #[must_use]
    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    /// Last committed timeline state.
    #[must_use]
    pub fn checkpoint(&self) -> &Checkpoint<P> {
        self.live.checkpointed()
    }

    /// When the host scheduler should next call [`timer_fired`](Self::timer_fired).
    #[must_use]
    pub fn next_wakeup(&self) -> Option<Ticks> {
        self.live.wakeup()
    }

    /// Scheduler callback.
    pub fn timer_fired(&mut self, now: Ticks) {
        let limit = now + self.lookahead;
        let Self { live, drives, lines, .. } = self;
        let mut ctx = LiveContext::new(drives, lines);
        live.sync(&mut ctx, now);
        live.run(&mut ctx, now, limit);
    }

    /// Device reset: stop the timeline. Registers keep their values.
    pub fn reset(&mut self, now: Ticks) {
        let Self { live, drives, lines, .. } = self;
        let mut ctx = LiveContext::new(drives, lines);
        live.abort(&mut ctx, now);
    }

    /// Data byte for the last framed word.
    #[must_use]
    pub fn read(&self) -> u8 {
        let live = &self.checkpoint().live;
        gcr::pack_read(live.e, live.i)
    }

    /// READY line (active low).
    #[must_use]
    pub fn ready(&self) -> bool {
        self.checkpoint().live.ready
    }

    /// SYNC line (active low).
    #[must_use]
    pub fn sync_line(&self) -> bool {
        self.checkpoint().live.sync
    }

    /// ERROR line (active low).
    #[must_use]
    pub fn error(&self) -> bool {
        self.checkpoint().live.error
    }

    /// Write the PI data latch.
    pub fn write(&mut self, now: Ticks, data: u8) {
        if self.regs.pi == data {
            return;
        }
        tracing::trace!(%now, data, "pi write");
        self.update(now, |regs, live, _| {
            regs.pi = data;
            live.live_mut().pi = data;
        });
    }

    pub fn set_drv_sel(&mut self, now: Ticks, state: bool) {
        if self.regs.drv_sel == state {
            return;
        }
        tracing::trace!(%now, state, "drv_sel");
        self.update(now, |regs, live, _| {
            regs.drv_sel = state;
            live.live_mut().drv_sel = state;
        });
    }

    pub fn set_mode_sel(&mut self, now: Ticks, state: bool) {
        if self.regs.mode_sel == state {
            return;
        }
        tracing::trace!(%now, state, "mode_sel");
        self.update(now, |regs, live, _| {
            regs.mode_sel = state;
            live.live_mut().mode_sel = state;
        });
    }

    /// Read/write select: true reads, false enables the write gate.
    pub fn set_rw_sel(&mut self, now: Ticks, state: bool) {
        if self.regs.rw_sel == state {
            return;
        }
        tracing::trace!(%now, state, "rw_sel");
        self.update(now, |regs, live, drives| {
            regs.rw_sel = state;
            live.live_mut().rw_sel = state;
            if !live.is_running() {
                return;
            }
            let drive = drives[usize::from(live.live().drv_sel)].as_mut();
            if state {
                live.pll_mut().stop_writing(drive, now);
            } else {
                live.pll_mut().start_writing(now);
            }
        });
    }

    pub fn set_odd_hd(&mut self, now: Ticks, state: bool) {
        if self.regs.odd_hd == state {
            return;
        }
        tracing::trace!(%now, state, "odd_hd");
        self.update(now, |regs, live, drives| {
            regs.odd_hd = state;
            live.live_mut().odd_hd = state;
            for drive in drives.iter_mut().flatten() {
                drive.set_side(!state);
            }
        });
    }

    /// Density select (0-3).
    pub fn set_ds(&mut self, now: Ticks, ds: u8) {
        let ds = ds & 0x03;
        if self.regs.ds == ds {
            return;
        }
        tracing::trace!(%now, ds, "ds");
        self.update(now, |regs, live, _| {
            regs.ds = ds;
            live.live_mut().ds = ds;
            live.pll_mut().set_clock(cell_period(ds));
        });
    }

    /// Motor line for a unit (active low).
    ///
    /// The timeline starts when the first motor comes on and stops when
    /// both are off.
    pub fn set_mtr(&mut self, now: Ticks, unit: Unit, state: bool) {
        let index = unit.index();
        if self.regs.mtr[index] == state {
            return;
        }
        tracing::trace!(%now, ?unit, state, "mtr");

        let limit = now + self.lookahead;
        let Self { regs, live, drives, lines, .. } = self;
        let mut ctx = LiveContext::new(drives, lines);
        live.sync(&mut ctx, now);

        regs.mtr[index] = state;
        if let Some(drive) = ctx.drives[index].as_mut() {
            drive.set_motor(!state);
        }

        if !regs.any_motor_on() {
            live.abort(&mut ctx, now);
        } else if live.is_running() {
            live.checkpoint(&mut ctx);
            live.run(&mut ctx, now, limit);
        } else {
            live.start(&mut ctx, regs, now, limit);
        }
    }

    /// Stepper phase for a unit (0-3).
    pub fn set_stp(&mut self, now: Ticks, unit: Unit, phase: u8) {
        let index = unit.index();
        let phase = phase & 0x03;
        if self.regs.stp[index] == phase {
            return;
        }
        tracing::trace!(%now, ?unit, phase, "stp");
        self.update(now, |regs, _, drives| {
            let motor_on = !regs.mtr[index];
            stepper::step(drives[index].as_mut(), motor_on, &mut regs.stp[index], phase);
        });
    }

    /// Sync, apply a register change, checkpoint, run ahead.
    fn update<F>(&mut self, now: Ticks, apply: F)
    where
        F: FnOnce(&mut Registers, &mut LiveEngine<P>, &mut [Option<D>; 2]),
    {
        let limit = now + self.lookahead;
        let Self { regs, live, drives, lines, .. } = self;
        let mut ctx = LiveContext::new(drives, lines);
        live.sync(&mut ctx, now);
        apply(&mut *regs, &mut *live, &mut *ctx.drives);
        live.checkpoint(&mut ctx);
        live.run(&mut ctx, now, limit);
    }
}

impl<D: FloppyDrive, P: BitPll, L: StatusLines> Observable for Fdc8050<D, P, L> {
    fn query(&self, path: &str) -> Option<Value> {
        let live = &self.live.checkpointed().live;
        let regs = &self.regs;
        match path {
            "state" => Some(live.state.name().into()),
            "timestamp" => Some(live.tm.get().into()),
            "ready" => Some(live.ready.into()),
            "sync" => Some(live.sync.into()),
            "error" => Some(live.error.into()),
            "shift_reg" => Some(live.shift_reg.into()),
            "bit_counter" => Some(live.bit_counter.into()),
            "drv_sel" => Some(regs.drv_sel.into()),
            "mode_sel" => Some(regs.mode_sel.into()),
            "rw_sel" => Some(regs.rw_sel.into()),
            "odd_hd" => Some(regs.odd_hd.into()),
            "ds" => Some(regs.ds.into()),
            "pi" => Some(regs.pi.into()),
            "mtr0" => Some(regs.mtr[0].into()),
            "mtr1" => Some(regs.mtr[1].into()),
            "stp0" => Some(regs.stp[0].into()),
            "stp1" => Some(regs.stp[1].into()),
            "data" => Some(gcr::pack_read(live.e, live.i).into()),
            _ => None,
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "state", "timestamp", "ready", "sync", "error", "shift_reg", "bit_counter", "drv_sel",
            "mode_sel", "rw_sel", "odd_hd", "ds", "pi", "mtr0", "mtr1", "stp0", "stp1", "data",
        ]
    }
}
