//! Persisted register state.
//!
//! Only the host-visible register file is saved. The timeline is rebuilt
//! from it on restore: a running controller restarts its bit-cell clock at
//! the restore instant.

use emu_core::Ticks;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::drive::FloppyDrive;
use crate::lines::StatusLines;
use crate::live::LiveContext;
use crate::pll::BitPll;
use crate::{Fdc8050, Registers};

#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("stepper phase {value} for unit {unit} is out of range")]
    StepPhase { unit: usize, value: u8 },
    #[error("density select {0} is out of range")]
    Density(u8),
    #[error("invalid saved state JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Flat key/value image of the register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedState {
    pub mtr0: bool,
    pub mtr1: bool,
    pub stp0: u8,
    pub stp1: u8,
    pub ds: u8,
    pub drv_sel: bool,
    pub mode_sel: bool,
    pub rw_sel: bool,
    pub odd_hd: bool,
    pub pi: u8,
}

impl SavedState {
    pub fn to_json(&self) -> Result<String, RestoreError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, RestoreError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl From<Registers> for SavedState {
    fn from(regs: Registers) -> Self {
        let Registers {
            mtr,
            stp,
            ds,
            drv_sel,
            mode_sel,
            rw_sel,
            odd_hd,
            pi,
        } = regs;
        Self {
            mtr0: mtr[0],
            mtr1: mtr[1],
            stp0: stp[0],
            stp1: stp[1],
            ds,
            drv_sel,
            mode_sel,
            rw_sel,
            odd_hd,
            pi,
        }
    }
}

impl TryFrom<SavedState> for Registers {
    type Error = RestoreError;

    fn try_from(state: SavedState) -> Result<Self, Self::Error> {
        for (unit, value) in [state.stp0, state.stp1].into_iter().enumerate() {
            if value > 3 {
                return Err(RestoreError::StepPhase { unit, value });
            }
        }
        if state.ds > 3 {
            return Err(RestoreError::Density(state.ds));
        }
        Ok(Self {
            mtr: [state.mtr0, state.mtr1],
            stp: [state.stp0, state.stp1],
            ds: state.ds,
            drv_sel: state.drv_sel,
            mode_sel: state.mode_sel,
            rw_sel: state.rw_sel,
            odd_hd: state.odd_hd,
            pi: state.pi,
        })
    }
}

impl<D: FloppyDrive, P: BitPll, L: StatusLines> Fdc8050<D, P, L> {
    #[must_use]
    pub fn save(&self) -> SavedState {
        self.regs.into()
    }

    /// Replace the register file at `now`.
    ///
    /// Any live operation is aborted first. Drives pick up the restored
    /// motor and side lines without stepping. On error nothing changes.
    pub fn restore(&mut self, now: Ticks, state: SavedState) -> Result<(), RestoreError> {
        let regs = Registers::try_from(state).inspect_err(|err| {
            tracing::warn!(%err, "rejected saved state");
        })?;

        let limit = now + self.lookahead;
        let Self {
            regs: current,
            live,
            drives,
            lines,
            ..
        } = self;
        let mut ctx = LiveContext::new(drives, lines);
        live.abort(&mut ctx, now);

        *current = regs;
        for (index, drive) in ctx.drives.iter_mut().enumerate() {
            if let Some(drive) = drive {
                drive.set_motor(!regs.mtr[index]);
                drive.set_side(!regs.odd_hd);
            }
        }
        if regs.any_motor_on() {
            live.start(&mut ctx, &regs, now, limit);
        }
        tracing::debug!(%now, ?state, "restored");
        Ok(())
    }
}
