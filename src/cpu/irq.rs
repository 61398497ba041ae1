//! Interrupt sampling
//!
//! The integer unit sees a single 4-bit interrupt level, sampled once per
//! fetch, and answers with an acknowledge carrying the level it took.

use serde::{Deserialize, Serialize};

use super::special::SpecialRegisters;
use super::trap::ExceptionId;

/// External interrupt controller as seen by the integer unit
pub trait InterruptLine {
    /// Highest pending level, 0 when idle
    fn level(&self) -> u8;
    /// Called when the trap for `level` is taken
    fn acknowledge(&mut self, level: u8);
}

/// Minimal IRQMP: a pending mask, highest level wins, cleared on ack
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrqLine {
    pending: u16,
    last_ack: Option<u8>,
}

impl IrqLine {
    pub fn new() -> Self {
        IrqLine::default()
    }

    pub fn assert_level(&mut self, level: u8) {
        if (1..=15).contains(&level) {
            self.pending |= 1 << level;
        }
    }

    pub fn clear_level(&mut self, level: u8) {
        if (1..=15).contains(&level) {
            self.pending &= !(1 << level);
        }
    }

    /// Drop everything pending and replace it with `level` (0 clears)
    pub fn set_level(&mut self, level: u8) {
        self.pending = 0;
        self.assert_level(level);
    }

    pub fn last_acknowledged(&self) -> Option<u8> {
        self.last_ack
    }
}

impl InterruptLine for IrqLine {
    fn level(&self) -> u8 {
        if self.pending == 0 {
            0
        } else {
            (15 - self.pending.leading_zeros()) as u8
        }
    }

    fn acknowledge(&mut self, level: u8) {
        self.clear_level(level);
        self.last_ack = Some(level);
    }
}

/// Level 15 is non-maskable; anything else must beat PIL. ET gates all.
pub fn accepts(sregs: &SpecialRegisters, level: u8) -> bool {
    sregs.traps_enabled() && (level == 15 || (level > 0 && level as u32 > sregs.pil()))
}

/// Exception to raise for the sampled level, if the PSR lets it through
pub fn sample(sregs: &SpecialRegisters, line: &dyn InterruptLine) -> Option<ExceptionId> {
    let level = line.level();
    if level != 0 && accepts(sregs, level) {
        ExceptionId::from_irq_level(level)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sregs(psr: u32) -> SpecialRegisters {
        let mut regs = SpecialRegisters::new(8, false);
        regs.psr = psr;
        regs
    }

    #[test]
    fn test_highest_level_wins() {
        let mut line = IrqLine::new();
        assert_eq!(line.level(), 0);
        line.assert_level(3);
        line.assert_level(12);
        assert_eq!(line.level(), 12);
        line.acknowledge(12);
        assert_eq!(line.level(), 3);
        assert_eq!(line.last_acknowledged(), Some(12));
    }

    #[test]
    fn test_set_level_replaces() {
        let mut line = IrqLine::new();
        line.assert_level(9);
        line.set_level(2);
        assert_eq!(line.level(), 2);
        line.set_level(0);
        assert_eq!(line.level(), 0);
    }

    #[test]
    fn test_masking_by_pil() {
        // PIL=15: only NMI
        assert!(!accepts(&sregs(0xf20), 1));
        assert!(!accepts(&sregs(0xf20), 14));
        assert!(accepts(&sregs(0xf20), 15));
        // PIL=8
        assert!(!accepts(&sregs(0x8a0), 8));
        assert!(accepts(&sregs(0x8a0), 9));
    }

    #[test]
    fn test_et_gates_everything() {
        assert!(!accepts(&sregs(0x000), 15));
        assert!(!accepts(&sregs(0x800), 10));
    }

    #[test]
    fn test_sample_maps_level_to_exception() {
        let mut line = IrqLine::new();
        line.assert_level(10);
        assert_eq!(sample(&sregs(0x827), &line), Some(ExceptionId::IrqLev10));
        assert_eq!(sample(&sregs(0xa27), &line), None);
    }
}
