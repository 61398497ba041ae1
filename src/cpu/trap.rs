//! Trap handling (exceptions and interrupts)
//!
//! Single-fault model: every trap source hands an exception id to
//! [`Cpu::raise`], which saves PC/NPC in the new window and vectors
//! through TBR. There is no priority arbitration between simultaneous
//! faults because an instruction raises at most one.

use serde::{Deserialize, Serialize};

use super::irq::InterruptLine;
use super::special::{PSR_ET, PSR_PS, PSR_S};
use super::Cpu;
use crate::console_log;
use crate::error::{Result, SimError};

/// Exception identifiers, numbered as in the LEON3 model
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ExceptionId {
    Reset = 0,
    DataStoreError = 1,
    InstrAccessMmuMiss = 2,
    InstrAccessError = 3,
    RRegisterAccessError = 4,
    InstrAccessExc = 5,
    PriviledgeInstr = 6,
    IllegalInstr = 7,
    FpDisabled = 8,
    CpDisabled = 9,
    UnimplFlush = 10,
    WatchpointDetected = 11,
    WindowOverflow = 12,
    WindowUnderflow = 13,
    MemAddrNotAligned = 14,
    FpException = 15,
    CpException = 16,
    DataAccessError = 17,
    DataAccessMmuMiss = 18,
    DataAccessExc = 19,
    TagOverflow = 20,
    DivZero = 21,
    TrapInstruction = 22,
    IrqLev15 = 23,
    IrqLev14 = 24,
    IrqLev13 = 25,
    IrqLev12 = 26,
    IrqLev11 = 27,
    IrqLev10 = 28,
    IrqLev9 = 29,
    IrqLev8 = 30,
    IrqLev7 = 31,
    IrqLev6 = 32,
    IrqLev5 = 33,
    IrqLev4 = 34,
    IrqLev3 = 35,
    IrqLev2 = 36,
    IrqLev1 = 37,
    ImplDepExc = 38,
}

/// Interrupt exceptions indexed by level - 1
const IRQ_IDS: [ExceptionId; 15] = [
    ExceptionId::IrqLev1,
    ExceptionId::IrqLev2,
    ExceptionId::IrqLev3,
    ExceptionId::IrqLev4,
    ExceptionId::IrqLev5,
    ExceptionId::IrqLev6,
    ExceptionId::IrqLev7,
    ExceptionId::IrqLev8,
    ExceptionId::IrqLev9,
    ExceptionId::IrqLev10,
    ExceptionId::IrqLev11,
    ExceptionId::IrqLev12,
    ExceptionId::IrqLev13,
    ExceptionId::IrqLev14,
    ExceptionId::IrqLev15,
];

impl ExceptionId {
    #[inline(always)]
    pub fn id(self) -> u8 {
        self as u8
    }

    /// Exception for interrupt level 1..=15 (id = 38 - level)
    pub fn from_irq_level(level: u8) -> Option<Self> {
        match level {
            1..=15 => Some(IRQ_IDS[level as usize - 1]),
            _ => None,
        }
    }

    /// Interrupt level of an IRQ exception
    pub fn irq_level(self) -> Option<u8> {
        let id = self.id();
        if id > ExceptionId::TrapInstruction.id() && id < ExceptionId::ImplDepExc.id() {
            Some(ExceptionId::ImplDepExc.id() - id)
        } else {
            None
        }
    }

    /// Trap type written to TBR.TT; `None` for RESET, which leaves TT alone
    pub fn tt(self, offset: u8) -> Option<u8> {
        use ExceptionId::*;
        let tt = match self {
            Reset => return None,
            DataStoreError => 0x2b,
            InstrAccessMmuMiss => 0x3c,
            InstrAccessError => 0x21,
            RRegisterAccessError => 0x20,
            InstrAccessExc => 0x01,
            PriviledgeInstr => 0x03,
            IllegalInstr => 0x02,
            FpDisabled => 0x04,
            CpDisabled => 0x24,
            UnimplFlush => 0x25,
            WatchpointDetected => 0x0b,
            WindowOverflow => 0x05,
            WindowUnderflow => 0x06,
            MemAddrNotAligned => 0x07,
            FpException => 0x08,
            CpException => 0x28,
            DataAccessError => 0x29,
            DataAccessMmuMiss => 0x2c,
            DataAccessExc => 0x09,
            TagOverflow => 0x0a,
            DivZero => 0x2a,
            TrapInstruction => 0x80 + (offset & 0x7F),
            ImplDepExc => 0x60u8.wrapping_add(offset),
            irq => 0x10 + irq.irq_level().unwrap_or(0),
        };
        Some(tt)
    }
}

/// Trap request carried out of an instruction handler
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrapSignal {
    pub id: ExceptionId,
    pub offset: u8,
}

impl From<ExceptionId> for TrapSignal {
    fn from(id: ExceptionId) -> Self {
        TrapSignal { id, offset: 0 }
    }
}

impl Cpu {
    /// Vector a trap. `pc`/`npc` are the values captured when the faulting
    /// instruction was fetched.
    pub fn raise(
        &mut self,
        pc: u32,
        npc: u32,
        id: ExceptionId,
        offset: u8,
        irq: &mut dyn InterruptLine,
    ) -> Result<()> {
        if !self.sregs.traps_enabled() {
            if id < ExceptionId::IrqLev15 {
                let err = SimError::TrapWhileDisabled {
                    id,
                    pc,
                    npc,
                    psr: self.sregs.psr,
                };
                crate::console_error!("{}", err);
                return Err(err);
            }
            // interrupts stay pending while ET=0
            return Ok(());
        }

        let mut psr = self.sregs.psr;
        psr = if psr & PSR_S != 0 { psr | PSR_PS } else { psr & !PSR_PS };
        psr |= PSR_S;
        psr &= !PSR_ET;
        self.sregs.psr = psr;
        // no WIM check: the handler owns window spilling
        let cwp = (self.sregs.cwp() + self.nwindows - 1) % self.nwindows;
        self.sregs.set_cwp(cwp);

        self.write_reg(17, pc);
        self.write_reg(18, npc);

        if let Some(tt) = id.tt(offset) {
            self.sregs.set_tt(tt);
        }
        self.pc = if id == ExceptionId::Reset { 0 } else { self.sregs.tbr };
        self.npc = self.pc.wrapping_add(4);

        if let Some(level) = id.irq_level() {
            irq.acknowledge(level);
        }
        self.trap_count += 1;

        if self.trace {
            console_log!(
                "trap {:?} tt=0x{:02x} pc=0x{:08x} npc=0x{:08x} -> 0x{:08x}",
                id,
                self.sregs.tt(),
                pc,
                npc,
                self.pc
            );
        }
        Ok(())
    }
}
