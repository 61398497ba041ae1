//! LEON3 integer unit
//!
//! SPARC V8 with register windows, the LEON3 MAC/divide extensions and a
//! single-fault trap model. Two execution strategies drive the same
//! instruction semantics: [`Functional`] retires one instruction per step,
//! [`Pipelined`] models the seven-stage pipeline clock by clock.

pub mod alu;
pub mod decode;
mod execute;
pub mod icache;
pub mod irq;
mod lsu;
pub mod pipeline;
pub mod regfile;
pub mod special;
pub mod trap;

pub use decode::Instruction;
pub use icache::ICache;
pub use irq::{InterruptLine, IrqLine};
pub use pipeline::Pipelined;
pub use regfile::RegisterFile;
pub use special::SpecialRegisters;
pub use trap::ExceptionId;

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::error::Result;
use crate::memory::Bus;

/// What an executed instruction asks of the driver
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstructionOutcome {
    Continue,
    /// Hold the execute stage for extra cycles
    Stall(u32),
    /// Discard younger instructions and refetch from PC
    Flush,
    /// The delay slot is skipped
    Annul,
    /// Vector a trap; PC/NPC are untouched
    Trap { id: ExceptionId, offset: u8 },
    /// Stop the simulation
    Halt,
}

impl InstructionOutcome {
    /// Extra cycles beyond the base cycle of `insn`
    pub fn latency(&self, insn: &Instruction) -> u32 {
        match *self {
            InstructionOutcome::Stall(n) => n,
            InstructionOutcome::Trap { .. } => insn.trap_stall(),
            _ => 0,
        }
    }
}

/// CPU state
#[derive(Clone, Serialize, Deserialize)]
pub struct Cpu {
    pub pc: u32,
    pub npc: u32,
    pub regs: RegisterFile,
    pub sregs: SpecialRegisters,
    pub nwindows: u32,

    pub mult_size_16: bool,
    pub pipelined_mult: bool,
    pub tsim_compat: bool,
    pub entry_point: u32,

    /// Retired instructions (traps and IRQs excluded)
    pub instruction_count: u64,
    pub trap_count: u64,
    /// Set by `ta` in TSIM mode
    pub halted: bool,

    /// Log every vectored trap
    #[serde(skip)]
    pub trace: bool,

    #[serde(skip)]
    pub icache: ICache,
}

impl Cpu {
    /// Build a CPU in its reset state; rejects configurations the register
    /// file cannot represent
    pub fn new(config: &SimConfig) -> Result<Self> {
        config.validate()?;
        let nwindows = config.num_reg_win;
        Ok(Cpu {
            pc: config.entry_point,
            npc: config.entry_point.wrapping_add(4),
            regs: RegisterFile::new(nwindows),
            sregs: SpecialRegisters::new(nwindows, config.tsim_compat),
            nwindows,
            mult_size_16: config.mult_size_16,
            pipelined_mult: config.pipelined_mult,
            tsim_compat: config.tsim_compat,
            entry_point: config.entry_point,
            instruction_count: 0,
            trap_count: 0,
            halted: false,
            trace: false,
            icache: ICache::new(),
        })
    }

    /// Read logical register in the current window (%g0 reads 0)
    #[inline(always)]
    pub fn read_reg(&self, reg: u32) -> u32 {
        self.regs.read(reg, self.sregs.cwp())
    }

    /// Write logical register in the current window (%g0 writes are ignored)
    #[inline(always)]
    pub fn write_reg(&mut self, reg: u32, value: u32) {
        let cwp = self.sregs.cwp();
        self.regs.write(reg, cwp, value);
    }

    /// Physical register backing `reg` in the current window
    #[inline(always)]
    pub fn physical_reg(&self, reg: u32) -> usize {
        regfile::physical(reg, self.sregs.cwp(), self.nwindows)
    }

    /// CWP + 1 if WIM allows it
    pub fn increment_window(&mut self) -> bool {
        regfile::increment_window(&mut self.sregs.psr, self.sregs.wim, self.nwindows)
    }

    /// CWP - 1 if WIM allows it
    pub fn decrement_window(&mut self) -> bool {
        regfile::decrement_window(&mut self.sregs.psr, self.sregs.wim, self.nwindows)
    }

    /// Execute `insn` at the current PC and vector any trap it reports
    pub fn issue(
        &mut self,
        insn: Instruction,
        bus: &mut dyn Bus,
        irq: &mut dyn InterruptLine,
    ) -> Result<InstructionOutcome> {
        let (pc, npc) = (self.pc, self.npc);
        let outcome = self.execute(insn, bus)?;
        match outcome {
            InstructionOutcome::Trap { id, offset } => self.raise(pc, npc, id, offset, irq)?,
            InstructionOutcome::Halt => {}
            _ => self.instruction_count += 1,
        }
        Ok(outcome)
    }

    /// Take the interrupt on the line if the PSR lets it through.
    /// Returns true when a trap was vectored.
    pub fn poll_interrupt(&mut self, irq: &mut dyn InterruptLine) -> Result<bool> {
        match irq::sample(&self.sregs, irq) {
            Some(id) => {
                let (pc, npc) = (self.pc, self.npc);
                self.raise(pc, npc, id, 0, irq)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Execute one instruction (functional timing). Returns cycles consumed.
    pub fn step(&mut self, bus: &mut dyn Bus, irq: &mut dyn InterruptLine) -> Result<u32> {
        if self.poll_interrupt(irq)? {
            return Ok(1);
        }
        let pc = self.pc;
        let raw = bus.read32(pc);
        let insn = self.icache.get_or_decode(pc, raw);
        let outcome = self.issue(insn, bus, irq)?;
        Ok(1 + outcome.latency(&insn))
    }

    /// Reset CPU state
    pub fn reset(&mut self) {
        self.pc = self.entry_point;
        self.npc = self.entry_point.wrapping_add(4);
        self.regs.reset();
        self.sregs.reset(self.nwindows, self.tsim_compat);
        self.instruction_count = 0;
        self.trap_count = 0;
        self.halted = false;
        self.icache.reset();
    }
}

/// A way of advancing the CPU through time
pub trait ExecutionStrategy {
    /// Advance by one step; returns the cycles it took
    fn step(
        &mut self,
        cpu: &mut Cpu,
        bus: &mut dyn Bus,
        irq: &mut dyn InterruptLine,
    ) -> Result<u32>;

    /// Drop in-flight state and restart from the CPU's PC/NPC
    fn reset(&mut self, cpu: &Cpu);

    fn name(&self) -> &'static str;
}

/// One instruction per step, cycles = 1 + documented stalls
#[derive(Clone, Copy, Debug, Default)]
pub struct Functional;

impl ExecutionStrategy for Functional {
    fn step(
        &mut self,
        cpu: &mut Cpu,
        bus: &mut dyn Bus,
        irq: &mut dyn InterruptLine,
    ) -> Result<u32> {
        cpu.step(bus, irq)
    }

    fn reset(&mut self, _cpu: &Cpu) {}

    fn name(&self) -> &'static str {
        "functional"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Memory;

    #[test]
    fn test_cpu_creation() {
        let cpu = Cpu::new(&SimConfig::default()).unwrap();
        assert_eq!(cpu.pc, 0x4000_0000);
        assert_eq!(cpu.npc, 0x4000_0004);
        assert_eq!(cpu.sregs.psr, 0xF300_0080);
        assert_eq!(cpu.sregs.asr[17], 0x307);
        assert_eq!(cpu.read_reg(0), 0);
    }

    #[test]
    fn test_cpu_rejects_invalid_window_count() {
        let config = SimConfig {
            num_reg_win: 0,
            ..SimConfig::default()
        };
        assert!(matches!(Cpu::new(&config), Err(crate::error::SimError::Config(_))));
    }

    #[test]
    fn test_g0_always_zero() {
        let mut cpu = Cpu::new(&SimConfig::default()).unwrap();
        cpu.write_reg(0, 0xDEADBEEF);
        assert_eq!(cpu.read_reg(0), 0);

        cpu.write_reg(1, 0x12345678);
        assert_eq!(cpu.read_reg(1), 0x12345678);
    }

    #[test]
    fn test_window_wrappers() {
        let mut cpu = Cpu::new(&SimConfig::default()).unwrap();
        assert!(cpu.decrement_window());
        assert_eq!(cpu.sregs.cwp(), 7);
        cpu.sregs.wim = 1;
        assert!(!cpu.increment_window());
        assert_eq!(cpu.sregs.cwp(), 7);
    }

    #[test]
    fn test_step_counts_stalls() {
        let mut cpu = Cpu::new(&SimConfig::default()).unwrap();
        let mut mem = Memory::new(0x4000_0000, 1);
        let mut irq = IrqLine::new();
        mem.write32(0x4000_0000, 0x0100_0000); // nop
        mem.write32(0x4000_0004, 0xC438_4000); // std %g2, [%g1]
        cpu.write_reg(1, 0x4000_0100);
        assert_eq!(cpu.step(&mut mem, &mut irq).unwrap(), 1);
        assert_eq!(cpu.step(&mut mem, &mut irq).unwrap(), 3);
        assert_eq!(cpu.instruction_count, 2);
    }

    #[test]
    fn test_step_takes_interrupt_before_fetch() {
        let mut cpu = Cpu::new(&SimConfig::default()).unwrap();
        let mut mem = Memory::new(0x4000_0000, 1);
        let mut irq = IrqLine::new();
        cpu.sregs.psr = 0xF300_00A0;
        cpu.sregs.tbr = 0x4000_0000;
        irq.assert_level(4);
        cpu.step(&mut mem, &mut irq).unwrap();
        assert_eq!(cpu.pc, 0x4000_0140);
        assert_eq!(cpu.instruction_count, 0);
        assert_eq!(irq.level(), 0);
    }

    #[test]
    fn test_reset_restores_entry() {
        let mut cpu = Cpu::new(&SimConfig::default()).unwrap();
        cpu.pc = 0x1234;
        cpu.write_reg(9, 1);
        cpu.halted = true;
        cpu.reset();
        assert_eq!(cpu.pc, 0x4000_0000);
        assert_eq!(cpu.read_reg(9), 0);
        assert!(!cpu.halted);
    }
}
