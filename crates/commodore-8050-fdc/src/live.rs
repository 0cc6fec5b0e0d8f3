//! Live timeline: bit-cell stepping with checkpoint and rollback.
//!
//! The engine keeps two whole copies of its state: the live snapshot,
//! which may run ahead of real time, and a checkpoint that never does.
//! Host events first [`sync`](LiveEngine::sync) the snapshot to the
//! event's instant (rolling back and replaying if it ran ahead), mutate,
//! checkpoint, and let the engine run ahead again.
//!
//! A synchronization point is any cell where READY, SYNC or ERROR changes
//! level. Points at or before real time are reported to the host in
//! place; later ones are parked in `next_state` and surface through
//! [`wakeup`](LiveEngine::wakeup).

use emu_core::Ticks;

use crate::Registers;
use crate::drive::FloppyDrive;
use crate::gcr::{self, VALID, WORD_MASK};
use crate::lines::StatusLines;
use crate::pll::BitPll;

/// Shift register bit that goes out to the PLL in write mode.
const WRITE_MSB: u16 = 0x200;

/// Bit-cell period for a density select value.
#[must_use]
pub fn cell_period(ds: u8) -> Ticks {
    Ticks::new(16 - u64::from(ds & 0x03))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LivePhase {
    #[default]
    Idle,
    Running,
    /// Report the status lines, then continue running.
    RunningSyncpoint,
}

impl LivePhase {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::RunningSyncpoint => "running_syncpoint",
        }
    }
}

/// Everything the timeline needs to replay from an instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveState {
    pub state: LivePhase,
    pub next_state: Option<LivePhase>,
    /// End of the last processed cell, or `NEVER` while idle.
    pub tm: Ticks,

    pub ds: u8,
    pub drv_sel: bool,
    pub mode_sel: bool,
    pub rw_sel: bool,
    pub odd_hd: bool,
    pub pi: u8,

    pub shift_reg: u16,
    pub shift_reg_write: u16,
    /// Byte boundaries crossed.
    pub cycle_counter: u64,
    /// Bit cells processed.
    pub cell_counter: u64,
    /// Position within the current 10-bit word (0-9).
    pub bit_counter: u8,

    // Active low.
    pub ready: bool,
    pub sync: bool,
    pub error: bool,

    /// GCR ROM output and the index it was looked up with.
    pub e: u8,
    pub i: u16,
}

impl Default for LiveState {
    fn default() -> Self {
        Self {
            state: LivePhase::Idle,
            next_state: None,
            tm: Ticks::NEVER,
            ds: 0,
            drv_sel: false,
            mode_sel: false,
            rw_sel: true,
            odd_hd: false,
            pi: 0,
            shift_reg: 0,
            shift_reg_write: 0,
            cycle_counter: 0,
            cell_counter: 0,
            bit_counter: 0,
            ready: true,
            sync: true,
            error: true,
            e: 0,
            i: 0,
        }
    }
}

impl LiveState {
    fn lines(&self) -> (bool, bool, bool) {
        (self.ready, self.sync, self.error)
    }
}

/// Committed snapshot: live state plus the PLL's phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint<P> {
    pub live: LiveState,
    pub pll: P,
}

/// Borrowed surroundings the engine drives: both drive slots and the
/// host's status lines.
pub struct LiveContext<'a, D, L> {
    pub drives: &'a mut [Option<D>; 2],
    pub lines: &'a mut L,
}

impl<'a, D: FloppyDrive, L: StatusLines> LiveContext<'a, D, L> {
    #[must_use]
    pub fn new(drives: &'a mut [Option<D>; 2], lines: &'a mut L) -> Self {
        Self { drives, lines }
    }

    fn drive(&self, drv_sel: bool) -> Option<&D> {
        self.drives[usize::from(drv_sel)].as_ref()
    }

    fn drive_mut(&mut self, drv_sel: bool) -> Option<&mut D> {
        self.drives[usize::from(drv_sel)].as_mut()
    }
}

#[derive(Debug, Clone)]
pub struct LiveEngine<P> {
    cur: LiveState,
    pll: P,
    saved: Checkpoint<P>,
    wakeup: Option<Ticks>,
}

impl<P: BitPll> LiveEngine<P> {
    #[must_use]
    pub fn new(pll: P) -> Self {
        Self {
            cur: LiveState::default(),
            saved: Checkpoint {
                live: LiveState::default(),
                pll: pll.clone(),
            },
            pll,
            wakeup: None,
        }
    }

    /// The live (possibly speculative) snapshot.
    #[must_use]
    pub fn live(&self) -> &LiveState {
        &self.cur
    }

    /// Live snapshot for register mirroring. Callers must have synced.
    pub fn live_mut(&mut self) -> &mut LiveState {
        &mut self.cur
    }

    pub fn pll_mut(&mut self) -> &mut P {
        &mut self.pll
    }

    #[must_use]
    pub fn checkpointed(&self) -> &Checkpoint<P> {
        &self.saved
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.cur.state != LivePhase::Idle
    }

    /// When the host should next call back: a parked synchronization
    /// point or the horizon the last run stopped at.
    #[must_use]
    pub fn wakeup(&self) -> Option<Ticks> {
        self.wakeup
    }

    /// Begin a live operation at `now` from the register file.
    pub fn start<D, L>(&mut self, ctx: &mut LiveContext<'_, D, L>, regs: &Registers, now: Ticks, limit: Ticks)
    where
        D: FloppyDrive,
        L: StatusLines,
    {
        self.cur = LiveState {
            state: LivePhase::Running,
            next_state: None,
            tm: now,
            ds: regs.ds,
            drv_sel: regs.drv_sel,
            mode_sel: regs.mode_sel,
            rw_sel: regs.rw_sel,
            odd_hd: regs.odd_hd,
            pi: regs.pi,
            ..LiveState::default()
        };

        self.pll.reset(now);
        self.pll.set_clock(cell_period(regs.ds));
        if !regs.rw_sel {
            self.pll.start_writing(now);
        }
        tracing::debug!(%now, ds = regs.ds, rw_sel = regs.rw_sel, "live start");

        self.checkpoint(ctx);
        self.run(ctx, now, limit);
    }

    /// Bring the live snapshot to the last cell boundary at or before
    /// `now` and commit it.
    pub fn sync<D, L>(&mut self, ctx: &mut LiveContext<'_, D, L>, now: Ticks)
    where
        D: FloppyDrive,
        L: StatusLines,
    {
        if self.cur.tm.is_never() {
            return;
        }
        self.catch_up(ctx, now);

        if self.cur.state == LivePhase::Idle {
            let drive = ctx.drive_mut(self.cur.drv_sel);
            self.pll.stop_writing(drive, self.cur.tm);
            self.cur.tm = Ticks::NEVER;
            self.wakeup = None;
        }
        self.cur.next_state = None;
        self.checkpoint(ctx);
    }

    /// Stop all activity at `now` and force the lines high.
    pub fn abort<D, L>(&mut self, ctx: &mut LiveContext<'_, D, L>, now: Ticks)
    where
        D: FloppyDrive,
        L: StatusLines,
    {
        let was_running = !self.cur.tm.is_never();
        if was_running {
            self.catch_up(ctx, now);
            let drive = ctx.drive_mut(self.cur.drv_sel);
            self.pll.stop_writing(drive, self.cur.tm);
            tracing::debug!(%now, cells = self.cur.cell_counter, "live abort");
        }

        self.cur.tm = Ticks::NEVER;
        self.cur.state = LivePhase::Idle;
        self.cur.next_state = None;
        self.cur.ready = true;
        self.cur.sync = true;
        self.cur.error = true;
        self.wakeup = None;

        if was_running {
            ctx.lines.set_ready(now, true);
            ctx.lines.set_sync(now, true);
            ctx.lines.set_error(now, true);
        }
        self.checkpoint(ctx);
    }

    /// Flush written cells up to the live timestamp and save the whole
    /// engine state.
    pub fn checkpoint<D, L>(&mut self, ctx: &mut LiveContext<'_, D, L>)
    where
        D: FloppyDrive,
        L: StatusLines,
    {
        if !self.cur.tm.is_never() {
            let drive = ctx.drive_mut(self.cur.drv_sel);
            self.pll.commit(drive, self.cur.tm);
        }
        self.saved.live = self.cur;
        self.saved.pll.clone_from(&self.pll);
    }

    /// Discard everything since the last checkpoint.
    pub fn rollback(&mut self) {
        self.cur = self.saved.live;
        self.pll.clone_from(&self.saved.pll);
    }

    /// Advance cell by cell up to `limit`.
    ///
    /// Synchronization points after `now` are parked rather than reported.
    pub fn run<D, L>(&mut self, ctx: &mut LiveContext<'_, D, L>, now: Ticks, limit: Ticks)
    where
        D: FloppyDrive,
        L: StatusLines,
    {
        if self.cur.state == LivePhase::Idle || self.cur.next_state.is_some() {
            return;
        }

        loop {
            match self.cur.state {
                LivePhase::Idle => return,

                LivePhase::Running => {
                    let before = self.cur.lines();
                    if !self.step(ctx, limit) {
                        self.wakeup = (!limit.is_never()).then_some(limit);
                        return;
                    }
                    if self.cur.lines() == before {
                        continue;
                    }
                    if self.cur.tm > now {
                        self.cur.next_state = Some(LivePhase::RunningSyncpoint);
                        self.wakeup = Some(self.cur.tm);
                        return;
                    }
                    self.cur.state = LivePhase::RunningSyncpoint;
                }

                LivePhase::RunningSyncpoint => {
                    let tm = self.cur.tm;
                    ctx.lines.set_ready(tm, self.cur.ready);
                    ctx.lines.set_sync(tm, self.cur.sync);
                    ctx.lines.set_error(tm, self.cur.error);
                    self.cur.state = LivePhase::Running;
                    self.checkpoint(ctx);
                }
            }
        }
    }

    fn catch_up<D, L>(&mut self, ctx: &mut LiveContext<'_, D, L>, now: Ticks)
    where
        D: FloppyDrive,
        L: StatusLines,
    {
        if self.cur.tm > now {
            tracing::debug!(%now, from = %self.cur.tm, to = %self.saved.live.tm, "live rollback");
            self.rollback();
        } else if let Some(next) = self.cur.next_state {
            self.cur.state = next;
        }
        self.cur.next_state = None;
        self.run(ctx, now, now);
    }

    /// Process one bit cell. False if the cell would end past `limit`.
    fn step<D, L>(&mut self, ctx: &mut LiveContext<'_, D, L>, limit: Ticks) -> bool
    where
        D: FloppyDrive,
        L: StatusLines,
    {
        let drv_sel = self.cur.drv_sel;
        let bit = if self.cur.rw_sel {
            match self.pll.get_next_bit(&mut self.cur.tm, ctx.drive(drv_sel), limit) {
                Some(bit) => bit,
                None => return false,
            }
        } else {
            let bit = self.cur.shift_reg_write & WRITE_MSB != 0;
            if self.pll.write_next_bit(bit, &mut self.cur.tm, ctx.drive_mut(drv_sel), limit) {
                return false;
            }
            false
        };

        let cur = &mut self.cur;
        cur.shift_reg = ((cur.shift_reg << 1) | u16::from(bit)) & WORD_MASK;

        let sync = !(cur.rw_sel && cur.shift_reg == WORD_MASK);
        if !sync {
            cur.bit_counter = 0;
        } else if cur.sync {
            cur.bit_counter = (cur.bit_counter + 1) % 10;
        }
        let ready = cur.bit_counter != 9;

        cur.i = if cur.rw_sel {
            cur.shift_reg
        } else {
            gcr::write_index(cur.pi, cur.mode_sel)
        };
        cur.e = gcr::lookup(cur.i, !cur.rw_sel);

        let error = ready || !cur.rw_sel || cur.e & VALID != 0;

        if ready {
            cur.shift_reg_write = (cur.shift_reg_write << 1) & WORD_MASK;
        } else {
            cur.shift_reg_write = if cur.rw_sel {
                0
            } else {
                gcr::encode_word(cur.e, cur.i)
            };
            cur.cycle_counter += 1;
        }
        cur.cell_counter += 1;

        cur.ready = ready;
        cur.sync = sync;
        cur.error = error;
        true
    }
}
