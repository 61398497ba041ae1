//! Instruction execution
//!
//! Implements the SPARC V8 integer instruction semantics plus the LEON3
//! MAC extension. Handlers commit their results and move PC/NPC on
//! success; when a handler reports a trap nothing has been committed and
//! PC/NPC still hold the values from fetch.

use super::alu::{self, AluOp};
use super::decode::{Instruction, LoadKind, Operand, StoreKind};
use super::regfile::{decrement_window, increment_window};
use super::special::{ASR_MAC_LO, PSR_CWP_MASK, PSR_ET, PSR_PS};
use super::trap::ExceptionId;
use super::{Cpu, InstructionOutcome};
use crate::console_error;
use crate::error::{Result, SimError};
use crate::memory::Bus;

#[inline(always)]
fn trap(id: ExceptionId) -> InstructionOutcome {
    InstructionOutcome::Trap { id, offset: 0 }
}

#[inline(always)]
fn stall(cycles: u32) -> InstructionOutcome {
    if cycles == 0 {
        InstructionOutcome::Continue
    } else {
        InstructionOutcome::Stall(cycles)
    }
}

impl Cpu {
    #[inline(always)]
    fn operand(&self, op2: Operand) -> u32 {
        match op2 {
            Operand::Reg(r) => self.read_reg(r as u32),
            Operand::Imm(imm) => imm as u32,
        }
    }

    /// rs1 + op2
    #[inline(always)]
    fn address(&self, rs1: u8, op2: Operand) -> u32 {
        self.read_reg(rs1 as u32).wrapping_add(self.operand(op2))
    }

    /// Sequential PC update
    #[inline(always)]
    fn advance(&mut self) {
        self.pc = self.npc;
        self.npc = self.npc.wrapping_add(4);
    }

    /// Delayed transfer to `target` after the instruction at NPC
    #[inline(always)]
    fn transfer(&mut self, target: u32) {
        self.pc = self.npc;
        self.npc = target;
    }

    /// Execute one decoded instruction located at `self.pc`
    pub fn execute(&mut self, insn: Instruction, bus: &mut dyn Bus) -> Result<InstructionOutcome> {
        let outcome = match insn {
            Instruction::Call { disp30 } => {
                let target = self.pc.wrapping_add(disp30 << 2);
                self.write_reg(15, self.pc);
                self.transfer(target);
                InstructionOutcome::Continue
            }

            Instruction::Sethi { rd, imm22 } => {
                self.write_reg(rd as u32, alu::sethi(imm22));
                self.advance();
                InstructionOutcome::Continue
            }

            Instruction::Branch { cond, annul, disp22 } => self.branch(cond, annul, disp22),

            Instruction::Alu { op, cc, rd, rs1, op2 } => self.alu(op, cc, rd, rs1, op2),

            Instruction::Mac { signed, rd, rs1, op2 } => {
                let a = self.read_reg(rs1 as u32);
                let b = self.operand(op2);
                let acc_lo = self.sregs.asr[ASR_MAC_LO];
                let (result, y, lo) = alu::mac(a, b, self.sregs.y, acc_lo, signed);
                self.sregs.y = y;
                self.sregs.asr[ASR_MAC_LO] = lo;
                self.write_reg(rd as u32, result);
                self.advance();
                stall(1)
            }

            Instruction::Save { rd, rs1, op2 } | Instruction::Restore { rd, rs1, op2 } => {
                let save = matches!(insn, Instruction::Save { .. });
                // operands come from the old window
                let result = self.address(rs1, op2);
                let mut psr = self.sregs.psr;
                let moved = if save {
                    decrement_window(&mut psr, self.sregs.wim, self.nwindows)
                } else {
                    increment_window(&mut psr, self.sregs.wim, self.nwindows)
                };
                if !moved {
                    return Ok(trap(if save {
                        ExceptionId::WindowOverflow
                    } else {
                        ExceptionId::WindowUnderflow
                    }));
                }
                self.sregs.psr = psr;
                self.write_reg(rd as u32, result);
                self.advance();
                InstructionOutcome::Continue
            }

            Instruction::Jmpl { rd, rs1, op2 } => {
                let target = self.address(rs1, op2);
                if target & 3 != 0 {
                    return Ok(trap(ExceptionId::MemAddrNotAligned));
                }
                self.write_reg(rd as u32, self.pc);
                self.transfer(target);
                stall(2)
            }

            Instruction::Rett { rs1, op2 } => return self.rett(rs1, op2),

            Instruction::Ticc { cond, rs1, op2 } => {
                if alu::condition(cond, self.sregs.icc()) {
                    if self.tsim_compat && cond == 0x8 {
                        // TSIM stops on any `ta`, whatever the trap number
                        self.halted = true;
                        return Ok(InstructionOutcome::Halt);
                    }
                    let offset = (self.address(rs1, op2) & 0x7F) as u8;
                    return Ok(InstructionOutcome::Trap {
                        id: ExceptionId::TrapInstruction,
                        offset,
                    });
                }
                self.advance();
                InstructionOutcome::Continue
            }

            Instruction::Flush { .. } => {
                self.icache.invalidate_all();
                self.advance();
                InstructionOutcome::Flush
            }

            Instruction::Stbar => {
                self.advance();
                InstructionOutcome::Continue
            }

            Instruction::ReadY { rd } => {
                self.write_reg(rd as u32, self.sregs.y);
                self.advance();
                InstructionOutcome::Continue
            }

            Instruction::ReadAsr { rd, asr } => {
                self.write_reg(rd as u32, self.sregs.read_asr(asr as u32));
                self.advance();
                InstructionOutcome::Continue
            }

            Instruction::ReadPsr { rd } => self.read_privileged(rd, self.sregs.read_psr()),
            Instruction::ReadWim { rd } => self.read_privileged(rd, self.sregs.read_wim()),
            Instruction::ReadTbr { rd } => self.read_privileged(rd, self.sregs.read_tbr()),

            Instruction::WriteY { rs1, op2 } => {
                self.sregs.y = self.read_reg(rs1 as u32) ^ self.operand(op2);
                self.advance();
                InstructionOutcome::Continue
            }

            Instruction::WriteAsr { asr, rs1, op2 } => {
                let value = self.read_reg(rs1 as u32) ^ self.operand(op2);
                self.sregs.write_asr(asr as u32, value);
                self.advance();
                InstructionOutcome::Continue
            }

            Instruction::WritePsr { rs1, op2 } => {
                let value = self.read_reg(rs1 as u32) ^ self.operand(op2);
                match self.sregs.write_psr(value, self.nwindows) {
                    Ok(()) => {
                        self.advance();
                        // CWP/ET/PIL may have changed under younger instructions
                        InstructionOutcome::Flush
                    }
                    Err(id) => trap(id),
                }
            }

            Instruction::WriteWim { rs1, op2 } => {
                let value = self.read_reg(rs1 as u32) ^ self.operand(op2);
                let written = self.sregs.write_wim(value, self.nwindows);
                self.commit_write(written)
            }

            Instruction::WriteTbr { rs1, op2 } => {
                let value = self.read_reg(rs1 as u32) ^ self.operand(op2);
                let written = self.sregs.write_tbr(value);
                self.commit_write(written)
            }

            Instruction::Load { kind, alternate, rd, rs1, op2 } => {
                let addr = self.address(rs1, op2);
                match self.load(kind, alternate, rd, addr, bus) {
                    Ok(()) => {
                        self.advance();
                        stall(if kind == LoadKind::Double && !alternate { 1 } else { 0 })
                    }
                    Err(id) => trap(id),
                }
            }

            Instruction::Store { kind, alternate, rd, rs1, op2 } => {
                let addr = self.address(rs1, op2);
                match self.store(kind, alternate, rd, addr, bus) {
                    Ok(()) => {
                        self.advance();
                        stall(if kind == StoreKind::Double && !alternate { 2 } else { 1 })
                    }
                    Err(id) => trap(id),
                }
            }

            Instruction::Ldstub { alternate, rd, rs1, op2 } => {
                let addr = self.address(rs1, op2);
                match self.ldstub(alternate, rd, addr, bus) {
                    Ok(()) => {
                        self.advance();
                        stall(2)
                    }
                    Err(id) => trap(id),
                }
            }

            Instruction::Swap { alternate, rd, rs1, op2 } => {
                let addr = self.address(rs1, op2);
                match self.swap(alternate, rd, addr, bus) {
                    Ok(()) => {
                        self.advance();
                        stall(2)
                    }
                    Err(id) => trap(id),
                }
            }

            Instruction::Unimp { .. } | Instruction::Illegal => trap(ExceptionId::IllegalInstr),
            Instruction::FpDisabled => trap(ExceptionId::FpDisabled),
            Instruction::CpDisabled => trap(ExceptionId::CpDisabled),
        };
        Ok(outcome)
    }

    fn branch(&mut self, cond: u8, annul: bool, disp22: i32) -> InstructionOutcome {
        let target = self.pc.wrapping_add((disp22 << 2) as u32);
        let taken = alu::condition(cond, self.sregs.icc());
        if cond == 0x8 && annul {
            // ba,a: the delay slot is skipped
            self.pc = target;
            self.npc = target.wrapping_add(4);
            InstructionOutcome::Annul
        } else if taken {
            self.transfer(target);
            InstructionOutcome::Continue
        } else if annul {
            self.pc = self.npc.wrapping_add(4);
            self.npc = self.npc.wrapping_add(8);
            InstructionOutcome::Annul
        } else {
            self.advance();
            InstructionOutcome::Continue
        }
    }

    fn alu(&mut self, op: AluOp, cc: bool, rd: u8, rs1: u8, op2: Operand) -> InstructionOutcome {
        let a = self.read_reg(rs1 as u32);
        let b = match op2 {
            // the immediate count is used unmasked
            Operand::Reg(r) if op.is_shift() => self.read_reg(r as u32) & 0x1F,
            _ => self.operand(op2),
        };
        let res = alu::evaluate(op, cc, a, b, self.sregs.icc(), self.sregs.y);
        if let Some(id) = res.trap {
            return trap(id);
        }
        self.write_reg(rd as u32, res.value);
        if let Some(icc) = res.icc {
            self.sregs.set_icc(icc);
        }
        if let Some(y) = res.y {
            self.sregs.y = y;
        }
        self.advance();
        if op.is_divide() {
            stall(34)
        } else if op.is_multiply() && self.mult_size_16 {
            stall(3)
        } else {
            InstructionOutcome::Continue
        }
    }

    fn read_privileged(
        &mut self,
        rd: u8,
        value: std::result::Result<u32, ExceptionId>,
    ) -> InstructionOutcome {
        match value {
            Ok(v) => {
                self.write_reg(rd as u32, v);
                self.advance();
                InstructionOutcome::Continue
            }
            Err(id) => trap(id),
        }
    }

    fn commit_write(&mut self, written: std::result::Result<(), ExceptionId>) -> InstructionOutcome {
        match written {
            Ok(()) => {
                self.advance();
                InstructionOutcome::Continue
            }
            Err(id) => trap(id),
        }
    }

    /// RETT: only legal with traps disabled in supervisor mode. With ET=0
    /// any other failure leaves the processor in a state we cannot model.
    fn rett(&mut self, rs1: u8, op2: Operand) -> Result<InstructionOutcome> {
        let target = self.address(rs1, op2);
        let psr = self.sregs.psr;
        let supervisor = self.sregs.supervisor();

        if self.sregs.traps_enabled() {
            return Ok(trap(if supervisor {
                ExceptionId::IllegalInstr
            } else {
                ExceptionId::PriviledgeInstr
            }));
        }

        let mut moved = psr;
        if !supervisor || target & 3 != 0 || !increment_window(&mut moved, self.sregs.wim, self.nwindows) {
            let err = SimError::InvalidProcessorMode {
                pc: self.pc,
                psr,
                wim: self.sregs.wim,
                target,
            };
            console_error!("{}", err);
            return Err(err);
        }

        let new_cwp = moved & PSR_CWP_MASK;
        // S <- PS, ET <- 1
        self.sregs.psr = (psr & 0xFFFF_FF40) | new_cwp | PSR_ET | ((psr & PSR_PS) << 1);
        self.transfer(target);
        Ok(stall(2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::cpu::decode::decode;
    use crate::cpu::special::{PSR_S, PSR_Z};
    use crate::memory::Memory;

    const BASE: u32 = 0x4000_0000;

    fn setup() -> (Cpu, Memory) {
        let cpu = Cpu::new(&SimConfig::default()).unwrap();
        (cpu, Memory::new(BASE, 1))
    }

    fn exec(cpu: &mut Cpu, mem: &mut Memory, raw: u32) -> InstructionOutcome {
        cpu.execute(decode(raw), mem).unwrap()
    }

    #[test]
    fn test_sequential_pc_update() {
        let (mut cpu, mut mem) = setup();
        assert_eq!(exec(&mut cpu, &mut mem, 0x0100_0000), InstructionOutcome::Continue);
        assert_eq!(cpu.pc, BASE + 4);
        assert_eq!(cpu.npc, BASE + 8);
    }

    #[test]
    fn test_call_links_and_delays() {
        let (mut cpu, mut mem) = setup();
        exec(&mut cpu, &mut mem, 0x4000_0010); // call +0x40
        assert_eq!(cpu.read_reg(15), BASE);
        assert_eq!(cpu.pc, BASE + 4);
        assert_eq!(cpu.npc, BASE + 0x40);
    }

    #[test]
    fn test_branch_forms() {
        let (mut cpu, mut mem) = setup();
        // ba,a -4: jumps straight to the target
        assert_eq!(exec(&mut cpu, &mut mem, 0x30BF_FFFF), InstructionOutcome::Annul);
        assert_eq!((cpu.pc, cpu.npc), (BASE - 4, BASE));

        // bne +8 with Z set: not taken, delay slot executes
        let (mut cpu, mut mem) = setup();
        cpu.sregs.psr |= PSR_Z;
        exec(&mut cpu, &mut mem, 0x1280_0002);
        assert_eq!((cpu.pc, cpu.npc), (BASE + 4, BASE + 8));

        // bne,a +8 with Z set: not taken, delay slot annulled
        let (mut cpu, mut mem) = setup();
        cpu.sregs.psr |= PSR_Z;
        assert_eq!(exec(&mut cpu, &mut mem, 0x3280_0002), InstructionOutcome::Annul);
        assert_eq!((cpu.pc, cpu.npc), (BASE + 8, BASE + 12));

        // bne +8 with Z clear: taken after the delay slot
        let (mut cpu, mut mem) = setup();
        exec(&mut cpu, &mut mem, 0x1280_0002);
        assert_eq!((cpu.pc, cpu.npc), (BASE + 4, BASE + 8));
        let (mut cpu, mut mem) = setup();
        exec(&mut cpu, &mut mem, 0x1280_0004);
        assert_eq!((cpu.pc, cpu.npc), (BASE + 4, BASE + 16));
    }

    #[test]
    fn test_jmpl_alignment() {
        let (mut cpu, mut mem) = setup();
        cpu.write_reg(15, BASE + 0x102);
        // jmpl %o7 + 8, %g1
        let out = exec(&mut cpu, &mut mem, 0x83C3_E008);
        assert_eq!(out, InstructionOutcome::Trap { id: ExceptionId::MemAddrNotAligned, offset: 0 });
        assert_eq!(cpu.read_reg(1), 0);
        assert_eq!(cpu.pc, BASE);

        cpu.write_reg(15, BASE + 0x100);
        assert_eq!(exec(&mut cpu, &mut mem, 0x83C3_E008), InstructionOutcome::Stall(2));
        assert_eq!(cpu.read_reg(1), BASE);
        assert_eq!(cpu.npc, BASE + 0x108);
    }

    #[test]
    fn test_divide_by_zero_leaves_state() {
        let (mut cpu, mut mem) = setup();
        cpu.write_reg(1, 100);
        cpu.write_reg(2, 0xAA);
        cpu.sregs.y = 5;
        let psr = cpu.sregs.psr;
        // udivcc %g1, %g0, %g2
        let out = exec(&mut cpu, &mut mem, 0x84F0_4000);
        assert_eq!(out, InstructionOutcome::Trap { id: ExceptionId::DivZero, offset: 0 });
        assert_eq!(cpu.read_reg(2), 0xAA);
        assert_eq!(cpu.sregs.y, 5);
        assert_eq!(cpu.sregs.psr, psr);
    }

    #[test]
    fn test_divide_latency() {
        let (mut cpu, mut mem) = setup();
        cpu.write_reg(1, 100);
        cpu.write_reg(3, 7);
        // udiv %g1, %g3, %g2
        assert_eq!(exec(&mut cpu, &mut mem, 0x8470_4003), InstructionOutcome::Stall(34));
        assert_eq!(cpu.read_reg(2), 14);
    }

    #[test]
    fn test_multiply_latency_follows_multiplier_size() {
        let (mut cpu, mut mem) = setup();
        cpu.write_reg(1, 6);
        cpu.write_reg(3, 7);
        // umul %g1, %g3, %g2
        assert_eq!(exec(&mut cpu, &mut mem, 0x8450_4003), InstructionOutcome::Continue);
        assert_eq!(cpu.read_reg(2), 42);

        let config = SimConfig {
            mult_size_16: true,
            ..SimConfig::default()
        };
        let mut cpu = Cpu::new(&config).unwrap();
        cpu.write_reg(1, 6);
        cpu.write_reg(3, 7);
        assert_eq!(exec(&mut cpu, &mut mem, 0x8450_4003), InstructionOutcome::Stall(3));
        // smul %g1, %g3, %g2
        assert_eq!(exec(&mut cpu, &mut mem, 0x8458_4003), InstructionOutcome::Stall(3));
        assert_eq!(cpu.read_reg(2), 42);
    }

    #[test]
    fn test_shift_immediate_is_unmasked() {
        let (mut cpu, mut mem) = setup();
        cpu.write_reg(1, 0xFFFF_FFFF);
        // sll %g1, 32, %g2 (shcnt field carries 0x20)
        exec(&mut cpu, &mut mem, 0x8528_6020);
        assert_eq!(cpu.read_reg(2), 0);
        // register form masks to 5 bits: sll %g1, %g3 with %g3 = 33
        cpu.write_reg(3, 33);
        exec(&mut cpu, &mut mem, 0x8528_4003);
        assert_eq!(cpu.read_reg(2), 0xFFFF_FFFE);
    }

    #[test]
    fn test_save_restore_windows() {
        let (mut cpu, mut mem) = setup();
        cpu.write_reg(14, 0x4000_1000); // %sp
        // save %sp, -96, %sp
        exec(&mut cpu, &mut mem, 0x9DE3_BFA0);
        assert_eq!(cpu.sregs.cwp(), 7);
        assert_eq!(cpu.read_reg(14), 0x4000_1000 - 96);
        assert_eq!(cpu.read_reg(30), 0x4000_1000); // %fp is the old %sp
        // restore
        exec(&mut cpu, &mut mem, 0x81E8_0000);
        assert_eq!(cpu.sregs.cwp(), 0);
    }

    #[test]
    fn test_save_overflow_restore_underflow() {
        let (mut cpu, mut mem) = setup();
        cpu.sregs.wim = 1 << 7;
        cpu.write_reg(14, 0x1234);
        let out = exec(&mut cpu, &mut mem, 0x9DE3_BFA0);
        assert_eq!(out, InstructionOutcome::Trap { id: ExceptionId::WindowOverflow, offset: 0 });
        assert_eq!(cpu.sregs.cwp(), 0);
        assert_eq!(cpu.read_reg(14), 0x1234);

        cpu.sregs.wim = 1 << 1;
        let out = exec(&mut cpu, &mut mem, 0x81E8_0000);
        assert_eq!(out, InstructionOutcome::Trap { id: ExceptionId::WindowUnderflow, offset: 0 });
        assert_eq!(cpu.sregs.cwp(), 0);
    }

    #[test]
    fn test_ticc() {
        let (mut cpu, mut mem) = setup();
        cpu.write_reg(1, 0x7E);
        // ta %g1 + 3 -> offset (0x7e + 3) & 0x7f
        let out = exec(&mut cpu, &mut mem, 0x91D0_6003);
        assert_eq!(out, InstructionOutcome::Trap { id: ExceptionId::TrapInstruction, offset: 0x01 });
        assert_eq!(cpu.pc, BASE);
        // tn never traps
        assert_eq!(exec(&mut cpu, &mut mem, 0x81D0_2005), InstructionOutcome::Continue);
        assert_eq!(cpu.pc, BASE + 4);
    }

    #[test]
    fn test_ta_halts_in_tsim_mode() {
        let config = SimConfig {
            tsim_compat: true,
            ..SimConfig::default()
        };
        let mut cpu = Cpu::new(&config).unwrap();
        let mut mem = Memory::new(BASE, 1);
        assert_eq!(exec(&mut cpu, &mut mem, 0x91D0_2000), InstructionOutcome::Halt);
        assert!(cpu.halted);
    }

    #[test]
    fn test_wrpsr_filters_and_flushes() {
        let (mut cpu, mut mem) = setup();
        cpu.write_reg(1, 0x0F00_3FA3);
        // wr %g1, 0, %psr
        assert_eq!(exec(&mut cpu, &mut mem, 0x8188_6000), InstructionOutcome::Flush);
        assert_eq!(cpu.sregs.psr, 0xF300_0FA3);

        // CWP out of range
        cpu.write_reg(1, 0x0000_00A9);
        let out = exec(&mut cpu, &mut mem, 0x8188_6000);
        assert_eq!(out, InstructionOutcome::Trap { id: ExceptionId::IllegalInstr, offset: 0 });
        assert_eq!(cpu.sregs.psr, 0xF300_0FA3);

        // user mode: privilege wins over the bad CWP
        cpu.sregs.psr &= !PSR_S;
        let out = exec(&mut cpu, &mut mem, 0x8188_6000);
        assert_eq!(out, InstructionOutcome::Trap { id: ExceptionId::PriviledgeInstr, offset: 0 });
    }

    #[test]
    fn test_rdpsr_requires_supervisor() {
        let (mut cpu, mut mem) = setup();
        // rd %psr, %g1
        exec(&mut cpu, &mut mem, 0x8348_0000);
        assert_eq!(cpu.read_reg(1), cpu.sregs.psr);
        cpu.sregs.psr &= !PSR_S;
        let out = exec(&mut cpu, &mut mem, 0x8348_0000);
        assert_eq!(out, InstructionOutcome::Trap { id: ExceptionId::PriviledgeInstr, offset: 0 });
    }

    #[test]
    fn test_wry_uses_xor() {
        let (mut cpu, mut mem) = setup();
        cpu.write_reg(1, 0xF0);
        // wr %g1, 0xff, %y
        exec(&mut cpu, &mut mem, 0x8180_60FF);
        assert_eq!(cpu.sregs.y, 0x0F);
    }

    #[test]
    fn test_rett_success() {
        let (mut cpu, mut mem) = setup();
        // in a trap handler: S=1, PS=0, ET=0, CWP=7
        cpu.sregs.psr = 0xF300_0087;
        cpu.write_reg(18, 0x4000_0200);
        // rett %l2 + 4
        assert_eq!(exec(&mut cpu, &mut mem, 0x81CC_A004), InstructionOutcome::Stall(2));
        assert_eq!(cpu.sregs.cwp(), 0);
        assert!(cpu.sregs.traps_enabled());
        assert!(!cpu.sregs.supervisor());
        assert_eq!(cpu.npc, 0x4000_0204);
    }

    #[test]
    fn test_rett_with_traps_enabled() {
        let (mut cpu, mut mem) = setup();
        cpu.sregs.psr = 0xF300_00A0;
        let out = exec(&mut cpu, &mut mem, 0x81CC_A004);
        assert_eq!(out, InstructionOutcome::Trap { id: ExceptionId::IllegalInstr, offset: 0 });
        cpu.sregs.psr = 0xF300_0020;
        let out = exec(&mut cpu, &mut mem, 0x81CC_A004);
        assert_eq!(out, InstructionOutcome::Trap { id: ExceptionId::PriviledgeInstr, offset: 0 });
    }

    #[test]
    fn test_rett_into_invalid_window_is_fatal() {
        let (mut cpu, mut mem) = setup();
        cpu.sregs.psr = 0xF300_0087;
        cpu.sregs.wim = 1;
        let err = cpu.execute(decode(0x81CC_A004), &mut mem).unwrap_err();
        assert!(matches!(err, SimError::InvalidProcessorMode { .. }));
    }

    #[test]
    fn test_mac_accumulates() {
        let (mut cpu, mut mem) = setup();
        cpu.write_reg(1, 3);
        cpu.sregs.asr[ASR_MAC_LO] = 10;
        // umac %g1, 4, %g2
        assert_eq!(exec(&mut cpu, &mut mem, 0x85F0_6004), InstructionOutcome::Stall(1));
        assert_eq!(cpu.read_reg(2), 22);
        assert_eq!(cpu.sregs.asr[ASR_MAC_LO], 22);
    }

    #[test]
    fn test_store_latencies() {
        let (mut cpu, mut mem) = setup();
        cpu.write_reg(1, BASE + 0x100);
        // st %g2, [%g1]
        assert_eq!(exec(&mut cpu, &mut mem, 0xC420_4000), InstructionOutcome::Stall(1));
        // std %g2, [%g1]
        assert_eq!(exec(&mut cpu, &mut mem, 0xC438_4000), InstructionOutcome::Stall(2));
        // ldd [%g1], %g2
        assert_eq!(exec(&mut cpu, &mut mem, 0xC418_4000), InstructionOutcome::Stall(1));
        // ld [%g1], %g2
        assert_eq!(exec(&mut cpu, &mut mem, 0xC400_4000), InstructionOutcome::Continue);
        // swap [%g1], %g2
        assert_eq!(exec(&mut cpu, &mut mem, 0xC478_4000), InstructionOutcome::Stall(2));
    }

    #[test]
    fn test_fp_and_unimp_trap() {
        let (mut cpu, mut mem) = setup();
        assert_eq!(
            exec(&mut cpu, &mut mem, 0xC100_6000),
            InstructionOutcome::Trap { id: ExceptionId::FpDisabled, offset: 0 }
        );
        assert_eq!(
            exec(&mut cpu, &mut mem, 0x0000_0000),
            InstructionOutcome::Trap { id: ExceptionId::IllegalInstr, offset: 0 }
        );
    }
}
