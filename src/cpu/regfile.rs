//! Windowed integer register file
//!
//! Physical layout: 8 globals followed by `16 * nwindows` windowed
//! registers. A window's outs are the next-lower window's ins, so
//! decrementing CWP (SAVE) makes the caller's outs the callee's ins.
//! The logical-to-physical mapping is recomputed from CWP on every access.

use serde::{Deserialize, Serialize};

use super::special::PSR_CWP_MASK;

pub const NUM_GLOBALS: usize = 8;

/// Physical index of logical register `logical` (0..32) in window `cwp`
#[inline(always)]
pub fn physical(logical: u32, cwp: u32, nwindows: u32) -> usize {
    let logical = logical & 0x1F;
    if logical < 8 {
        logical as usize
    } else {
        let span = 16 * nwindows;
        NUM_GLOBALS + ((cwp * 16 + logical - 8) % span) as usize
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterFile {
    regs: Vec<u32>,
    nwindows: u32,
}

impl RegisterFile {
    pub fn new(nwindows: u32) -> Self {
        RegisterFile {
            regs: vec![0; NUM_GLOBALS + 16 * nwindows as usize],
            nwindows,
        }
    }

    pub fn nwindows(&self) -> u32 {
        self.nwindows
    }

    /// Read logical register; %g0 always reads 0
    #[inline(always)]
    pub fn read(&self, logical: u32, cwp: u32) -> u32 {
        self.regs[physical(logical, cwp, self.nwindows)]
    }

    /// Write logical register; writes to %g0 are discarded
    #[inline(always)]
    pub fn write(&mut self, logical: u32, cwp: u32, value: u32) {
        let idx = physical(logical, cwp, self.nwindows);
        if idx != 0 {
            self.regs[idx] = value;
        }
    }

    /// Rebuild from raw physical storage; `None` if the length does not
    /// match `nwindows`
    pub fn from_physical(nwindows: u32, regs: Vec<u32>) -> Option<Self> {
        if regs.len() != NUM_GLOBALS + 16 * nwindows as usize {
            return None;
        }
        let mut rf = RegisterFile { regs, nwindows };
        rf.regs[0] = 0;
        Some(rf)
    }

    /// Raw physical storage, globals first
    pub fn physical_regs(&self) -> &[u32] {
        &self.regs
    }

    pub fn reset(&mut self) {
        self.regs.fill(0);
    }
}

/// CWP + 1 (RESTORE, RETT). Fails without touching PSR if the new window
/// is marked invalid in WIM.
pub fn increment_window(psr: &mut u32, wim: u32, nwindows: u32) -> bool {
    let new_cwp = ((*psr & PSR_CWP_MASK) + 1) % nwindows;
    move_window(psr, wim, new_cwp)
}

/// CWP - 1 (SAVE)
pub fn decrement_window(psr: &mut u32, wim: u32, nwindows: u32) -> bool {
    let new_cwp = ((*psr & PSR_CWP_MASK) + nwindows - 1) % nwindows;
    move_window(psr, wim, new_cwp)
}

fn move_window(psr: &mut u32, wim: u32, new_cwp: u32) -> bool {
    if wim & (1 << new_cwp) != 0 {
        return false;
    }
    *psr = (*psr & !PSR_CWP_MASK) | new_cwp;
    true
}
