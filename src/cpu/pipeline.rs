//! Cycle-accurate pipeline model
//!
//! Seven stages: fetch, decode, register access, execute, memory,
//! exception, write-back. One `step` is one clock; stages are advanced
//! oldest first so a slot never overtakes the one ahead of it.
//!
//! Architectural effects are applied in order when an instruction enters
//! execute, so correctness never depends on the hazard logic. Register
//! locks, stalls and flushes only shape the timing:
//! - a slot leaving decode locks the physical registers it writes late
//!   (loads, divides, MAC) until write-back plus the write delay
//! - decode holds while one of its sources is locked
//! - after each execute the younger slots are checked against the new
//!   PC/NPC and anything fetched down the wrong path is dropped

use super::decode::Instruction;
use super::irq;
use super::{Cpu, ExecutionStrategy, InstructionOutcome, InterruptLine};
use crate::error::Result;
use crate::memory::Bus;

const FETCH: usize = 0;
const DECODE: usize = 1;
const REGS: usize = 2;
const EXECUTE: usize = 3;
const MEMORY: usize = 4;
const EXCEPTION: usize = 5;
const WRITE_BACK: usize = 6;
const NUM_STAGES: usize = 7;

#[derive(Clone, Copy, Debug)]
enum SlotKind {
    Insn(Instruction),
    /// Interrupt request sampled at fetch; it occupies a slot but no PC
    Irq,
}

#[derive(Clone, Copy, Debug)]
struct Slot {
    pc: u32,
    kind: SlotKind,
    locks: [Option<usize>; 2],
    write_delay: u32,
}

impl Slot {
    fn new(pc: u32, kind: SlotKind) -> Self {
        Slot {
            pc,
            kind,
            locks: [None, None],
            write_delay: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub cycles: u64,
    /// Cycles the execute stage was held by an instruction latency
    pub stall_cycles: u64,
    /// Cycles decode waited on a locked register
    pub interlock_cycles: u64,
    /// Slots discarded as wrong-path or by a flush
    pub flushed: u64,
}

pub struct Pipelined {
    stages: [Option<Slot>; NUM_STAGES],
    fetch_pc: u32,
    fetch_npc: u32,
    /// Remaining cycles the execute stage is held
    stall: u32,
    /// Lock count per physical register
    locks: Vec<u8>,
    /// (physical register, cycles until release)
    delayed_releases: Vec<(usize, u32)>,
    irq_in_flight: bool,
    pub stats: PipelineStats,
}

impl Pipelined {
    pub fn new(cpu: &Cpu) -> Self {
        let mut pipeline = Pipelined {
            stages: [None; NUM_STAGES],
            fetch_pc: 0,
            fetch_npc: 0,
            stall: 0,
            locks: Vec::new(),
            delayed_releases: Vec::new(),
            irq_in_flight: false,
            stats: PipelineStats::default(),
        };
        pipeline.restart(cpu);
        pipeline
    }

    fn restart(&mut self, cpu: &Cpu) {
        self.stages = [None; NUM_STAGES];
        self.fetch_pc = cpu.pc;
        self.fetch_npc = cpu.npc;
        self.stall = 0;
        self.locks = vec![0; cpu.regs.physical_regs().len()];
        self.delayed_releases.clear();
        self.irq_in_flight = false;
    }

    /// Number of occupied stages
    pub fn occupancy(&self) -> usize {
        self.stages.iter().filter(|s| s.is_some()).count()
    }

    fn release(&mut self, reg: usize) {
        if let Some(count) = self.locks.get_mut(reg) {
            *count = count.saturating_sub(1);
        }
    }

    fn is_locked(&self, reg: usize) -> bool {
        self.locks.get(reg).map_or(false, |&count| count > 0)
    }

    fn discard(&mut self, slot: Slot) {
        for reg in slot.locks.iter().flatten() {
            self.release(*reg);
        }
        if let SlotKind::Irq = slot.kind {
            self.irq_in_flight = false;
        }
        self.stats.flushed += 1;
    }

    /// Drop `stage` and every younger stage
    fn flush_from(&mut self, stage: usize) {
        for s in (FETCH..=stage).rev() {
            if let Some(slot) = self.stages[s].take() {
                self.discard(slot);
            }
        }
    }

    /// Check the slots behind execute against the architectural PC/NPC
    /// and refetch from the first one that is off the path
    fn resync(&mut self, cpu: &Cpu) {
        let (mut pc, mut npc) = (cpu.pc, cpu.npc);
        for stage in (FETCH..=REGS).rev() {
            let Some(slot) = self.stages[stage] else {
                continue;
            };
            if slot.pc != pc {
                self.flush_from(stage);
                break;
            }
            if let SlotKind::Insn(_) = slot.kind {
                pc = npc;
                npc = npc.wrapping_add(4);
            }
        }
        self.fetch_pc = pc;
        self.fetch_npc = npc;
    }

    /// Late destinations of `insn` and how long they stay locked after
    /// write-back
    fn lock_plan(insn: &Instruction, cpu: &Cpu) -> ([Option<u8>; 2], u32) {
        match *insn {
            // the non-pipelined multiplier delivers one cycle late
            Instruction::Alu { op, rd, .. } if op.is_multiply() && !cpu.pipelined_mult => {
                ([Some(rd), None], 1)
            }
            _ => (insn.late_destinations(), insn.write_delay()),
        }
    }

    /// Move the slot in register access into execute, applying it
    fn enter_execute(
        &mut self,
        cpu: &mut Cpu,
        bus: &mut dyn Bus,
        irq_line: &mut dyn InterruptLine,
    ) -> Result<()> {
        let Some(slot) = self.stages[REGS].take() else {
            return Ok(());
        };

        if slot.pc != cpu.pc || cpu.halted {
            self.discard(slot);
            self.resync(cpu);
            return Ok(());
        }

        match slot.kind {
            SlotKind::Irq => {
                self.irq_in_flight = false;
                // the level may have dropped or PIL risen since fetch
                if cpu.poll_interrupt(irq_line)? {
                    self.resync(cpu);
                }
            }
            SlotKind::Insn(insn) => {
                let outcome = cpu.issue(insn, bus, irq_line)?;
                self.stall = outcome.latency(&insn);
                self.stages[EXECUTE] = Some(slot);
                match outcome {
                    InstructionOutcome::Flush
                    | InstructionOutcome::Trap { .. }
                    | InstructionOutcome::Halt => {
                        self.flush_from(DECODE);
                        self.fetch_pc = cpu.pc;
                        self.fetch_npc = cpu.npc;
                    }
                    _ => self.resync(cpu),
                }
            }
        }
        Ok(())
    }

    fn enter_regs(&mut self, cpu: &Cpu) {
        if self.stages[REGS].is_some() {
            return;
        }
        let Some(mut slot) = self.stages[DECODE] else {
            return;
        };
        if let SlotKind::Insn(insn) = slot.kind {
            let blocked = insn
                .sources()
                .iter()
                .flatten()
                .any(|&r| self.is_locked(cpu.physical_reg(r as u32)));
            if blocked {
                self.stats.interlock_cycles += 1;
                return;
            }
            let (dests, delay) = Self::lock_plan(&insn, cpu);
            for (lock, dest) in slot.locks.iter_mut().zip(dests.iter()) {
                // %g0 is never written, so never locked
                *lock = dest.map(|r| cpu.physical_reg(r as u32)).filter(|&p| p != 0);
            }
            for reg in slot.locks.iter().flatten() {
                self.locks[*reg] += 1;
            }
            slot.write_delay = delay;
        }
        self.stages[DECODE] = None;
        self.stages[REGS] = Some(slot);
    }

    fn fetch(&mut self, cpu: &mut Cpu, bus: &mut dyn Bus, irq_line: &dyn InterruptLine) {
        if self.stages[FETCH].is_some() || cpu.halted {
            return;
        }
        if !self.irq_in_flight && irq::sample(&cpu.sregs, irq_line).is_some() {
            self.irq_in_flight = true;
            self.stages[FETCH] = Some(Slot::new(self.fetch_pc, SlotKind::Irq));
            return;
        }
        let pc = self.fetch_pc;
        let raw = bus.read32(pc);
        let insn = cpu.icache.get_or_decode(pc, raw);
        self.stages[FETCH] = Some(Slot::new(pc, SlotKind::Insn(insn)));
        self.fetch_pc = self.fetch_npc;
        self.fetch_npc = self.fetch_npc.wrapping_add(4);
    }

    /// Advance the pipeline by one clock
    pub fn tick(
        &mut self,
        cpu: &mut Cpu,
        bus: &mut dyn Bus,
        irq_line: &mut dyn InterruptLine,
    ) -> Result<()> {
        self.stats.cycles += 1;

        // delayed write-backs
        let mut due = Vec::new();
        self.delayed_releases.retain_mut(|(reg, left)| {
            *left -= 1;
            if *left == 0 {
                due.push(*reg);
                false
            } else {
                true
            }
        });
        for reg in due {
            self.release(reg);
        }

        if let Some(slot) = self.stages[WRITE_BACK].take() {
            for reg in slot.locks.iter().flatten() {
                if slot.write_delay == 0 {
                    self.release(*reg);
                } else {
                    self.delayed_releases.push((*reg, slot.write_delay));
                }
            }
        }
        self.stages[WRITE_BACK] = self.stages[EXCEPTION].take();
        self.stages[EXCEPTION] = self.stages[MEMORY].take();

        if self.stall > 0 {
            self.stall -= 1;
            self.stats.stall_cycles += 1;
            return Ok(());
        }

        self.stages[MEMORY] = self.stages[EXECUTE].take();
        self.enter_execute(cpu, bus, irq_line)?;
        self.enter_regs(cpu);
        if self.stages[DECODE].is_none() {
            self.stages[DECODE] = self.stages[FETCH].take();
        }
        self.fetch(cpu, bus, irq_line);
        Ok(())
    }
}

impl ExecutionStrategy for Pipelined {
    fn step(
        &mut self,
        cpu: &mut Cpu,
        bus: &mut dyn Bus,
        irq: &mut dyn InterruptLine,
    ) -> Result<u32> {
        self.tick(cpu, bus, irq)?;
        Ok(1)
    }

    fn reset(&mut self, cpu: &Cpu) {
        self.restart(cpu);
        self.stats = PipelineStats::default();
    }

    fn name(&self) -> &'static str {
        "cycle-accurate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use crate::cpu::IrqLine;
    use crate::memory::Memory;

    const BASE: u32 = 0x4000_0000;
    const NOP: u32 = 0x0100_0000;
    /// ta 0 (halts in TSIM mode)
    const HALT: u32 = 0x91D0_2000;

    fn tsim() -> SimConfig {
        SimConfig {
            tsim_compat: true,
            ..SimConfig::default()
        }
    }

    fn machine(program: &[u32]) -> (Cpu, Memory, Pipelined) {
        machine_with(&tsim(), program)
    }

    fn machine_with(config: &SimConfig, program: &[u32]) -> (Cpu, Memory, Pipelined) {
        let cpu = Cpu::new(config).unwrap();
        let mut mem = Memory::new(BASE, 1);
        for (i, word) in program.iter().enumerate() {
            mem.write32(BASE + 4 * i as u32, *word);
        }
        let pipeline = Pipelined::new(&cpu);
        (cpu, mem, pipeline)
    }

    /// Clocks until the halt instruction executes
    fn run(program: &[u32]) -> (Cpu, u64) {
        run_with(&tsim(), program)
    }

    fn run_with(config: &SimConfig, program: &[u32]) -> (Cpu, u64) {
        let (mut cpu, mut mem, mut pipeline) = machine_with(config, program);
        let mut irq = IrqLine::new();
        let mut cycles = 0;
        while !cpu.halted && cycles < 10_000 {
            pipeline.step(&mut cpu, &mut mem, &mut irq).unwrap();
            cycles += 1;
        }
        assert!(cpu.halted, "program did not halt");
        (cpu, cycles)
    }

    #[test]
    fn test_straight_line_fills_pipeline() {
        let (cpu, cycles) = run(&[NOP, NOP, NOP, HALT]);
        // fetch, decode and regs before the first execute
        assert_eq!(cycles, 4 + 3);
        assert_eq!(cpu.instruction_count, 3);
    }

    #[test]
    fn test_occupancy_grows_one_stage_per_clock() {
        let (mut cpu, mut mem, mut pipeline) = machine(&[NOP; 16]);
        let mut irq = IrqLine::new();
        assert_eq!(pipeline.occupancy(), 0);
        for clock in 1..=NUM_STAGES {
            pipeline.step(&mut cpu, &mut mem, &mut irq).unwrap();
            assert_eq!(pipeline.occupancy(), clock);
        }
        // full: one in, one out
        pipeline.step(&mut cpu, &mut mem, &mut irq).unwrap();
        assert_eq!(pipeline.occupancy(), NUM_STAGES);
    }

    #[test]
    fn test_small_multiplier_holds_execute() {
        let umul = 0x8450_4001; // umul %g1, %g1, %g2
        let small = SimConfig {
            mult_size_16: true,
            ..tsim()
        };
        let (_, fast) = run(&[NOP, umul, NOP, HALT]);
        let (_, slow) = run_with(&small, &[NOP, umul, NOP, HALT]);
        assert_eq!(slow - fast, 3);
    }

    #[test]
    fn test_mac_latency() {
        let umac = 0x85F0_4003; // umac %g1, %g3, %g2
        let (_, base) = run(&[NOP, NOP, NOP, HALT]);
        let (_, with_mac) = run(&[NOP, umac, NOP, HALT]);
        assert_eq!(with_mac - base, 1);
    }

    #[test]
    fn test_non_pipelined_multiplier_locks_result() {
        let ld = 0xC400_4000; // ld [%g1], %g2
        let umul = 0x8450_4001; // umul %g1, %g1, %g2
        let use_g2 = 0x8600_A001; // add %g2, 1, %g3
        let indep = 0x8800_6001; // add %g1, 1, %g4
        let serial = SimConfig {
            pipelined_mult: false,
            ..tsim()
        };

        // pipelined: the product is available to the next instruction
        let (_, independent) = run(&[umul, indep, NOP, HALT]);
        let (_, dependent) = run(&[umul, use_g2, NOP, HALT]);
        assert_eq!(dependent, independent);

        // otherwise rd stays locked one cycle past a load's write-back
        let (_, after_load) = run_with(&serial, &[ld, use_g2, NOP, HALT]);
        let (cpu, after_mul) = run_with(&serial, &[umul, use_g2, NOP, HALT]);
        assert_eq!(after_mul, after_load + 1);
        assert_eq!(cpu.read_reg(3), 1);
    }

    #[test]
    fn test_divide_holds_execute() {
        let set_g3 = 0x8610_2007; // or %g0, 7, %g3
        let udiv = 0x8470_4003; // udiv %g1, %g3, %g2
        let (_, base) = run(&[set_g3, NOP, NOP, NOP, HALT]);
        let (cpu, with_div) = run(&[set_g3, udiv, NOP, NOP, HALT]);
        assert_eq!(with_div - base, 34);
        assert_eq!(cpu.trap_count, 0);
    }

    #[test]
    fn test_std_and_ldd_latency() {
        let std = 0xC438_4000; // std %g2, [%g1]
        let ldd = 0xC418_4000; // ldd [%g1], %g2
        let (_, base) = run(&[NOP, NOP, NOP, HALT]);
        let (_, with_std) = run(&[NOP, std, NOP, HALT]);
        let (_, with_ldd) = run(&[NOP, ldd, NOP, HALT]);
        assert_eq!(with_std - base, 2);
        assert_eq!(with_ldd - base, 1);
    }

    #[test]
    fn test_load_use_interlock() {
        let ld = 0xC400_4000; // ld [%g1], %g2
        let use_g2 = 0x8600_A001; // add %g2, 1, %g3
        let indep = 0x8800_6001; // add %g1, 1, %g4
        let (_, independent) = run(&[ld, indep, NOP, HALT]);
        let (_, dependent) = run(&[ld, use_g2, NOP, HALT]);
        assert!(dependent > independent);
    }

    #[test]
    fn test_taken_branch_follows_target() {
        // ba +12; nop (delay); or %g0, 1, %g1 (skipped); or %g0, 2, %g2; ta 0
        let program = [0x1080_0003, NOP, 0x8210_2001, 0x8410_2002, HALT];
        let (cpu, _) = run(&program);
        assert_eq!(cpu.read_reg(1), 0);
        assert_eq!(cpu.read_reg(2), 2);
    }

    #[test]
    fn test_annulled_delay_slot() {
        // ba,a +8; or %g0, 1, %g1 (annulled); ta 0
        let program = [0x3080_0002, 0x8210_2001, HALT];
        let (cpu, _) = run(&program);
        assert_eq!(cpu.read_reg(1), 0);
    }

    #[test]
    fn test_matches_functional_results() {
        let program = [
            0x8210_2005, // or %g0, 5, %g1
            0x8410_2007, // or %g0, 7, %g2
            0x8600_4002, // add %g1, %g2, %g3
            0x80A0_6005, // cmp %g1, 5
            0x1280_0002, // bne +8
            0x8800_E001, // add %g3, 1, %g4 (delay slot)
            0x8A21_0001, // sub %g4, %g1, %g5
            HALT,
        ];
        let (piped, _) = run(&program);

        let (mut cpu, mut mem, _) = machine(&program);
        let mut irq = IrqLine::new();
        while !cpu.halted {
            cpu.step(&mut mem, &mut irq).unwrap();
        }
        for reg in 1..6 {
            assert_eq!(piped.read_reg(reg), cpu.read_reg(reg), "%g{}", reg);
        }
        assert_eq!(cpu.read_reg(5), 8);
        assert_eq!(piped.instruction_count, cpu.instruction_count);
    }

    #[test]
    fn test_interrupt_is_taken_in_order() {
        let (mut cpu, mut mem, mut pipeline) = machine(&[NOP; 16]);
        let mut irq = IrqLine::new();
        cpu.sregs.tbr = 0x4000_1000;
        irq.assert_level(15);
        // four clocks bring the request from fetch into execute
        for _ in 0..4 {
            pipeline.step(&mut cpu, &mut mem, &mut irq).unwrap();
        }
        assert_eq!(cpu.trap_count, 1);
        assert_eq!(cpu.sregs.tt(), 0x1F);
        assert_eq!(irq.last_acknowledged(), Some(15));
        // the interrupted instruction is saved in %l1
        assert_eq!(cpu.read_reg(17), BASE);
    }
}
