//! System orchestrator
//!
//! Brings together the CPU, RAM, the interrupt line and the execution
//! strategy selected by the configuration.

use std::collections::HashMap;

use crate::config::{Fidelity, SimConfig};
use crate::console_log;
use crate::cpu::{Cpu, ExecutionStrategy, Functional, IrqLine, Pipelined, RegisterFile};
use crate::error::{Result, SimError};
use crate::memory::Memory;
use crate::snapshot::{CpuSnapshot, Snapshot, PAGE_SIZE};

fn make_strategy(fidelity: Fidelity, cpu: &Cpu) -> Box<dyn ExecutionStrategy> {
    match fidelity {
        Fidelity::Functional => Box::new(Functional),
        Fidelity::CycleAccurate => Box::new(Pipelined::new(cpu)),
    }
}

/// System state
pub struct System {
    config: SimConfig,
    pub cpu: Cpu,
    memory: Memory,
    pub irq: IrqLine,
    strategy: Box<dyn ExecutionStrategy>,
    cycles: u64,
}

impl System {
    pub fn new(config: SimConfig) -> Result<Self> {
        config.validate()?;
        let cpu = Cpu::new(&config)?;
        let memory = Memory::new(config.ram_base, config.ram_size_mb);
        let strategy = make_strategy(config.fidelity, &cpu);
        Ok(System {
            config,
            cpu,
            memory,
            irq: IrqLine::new(),
            strategy,
            cycles: 0,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Load a binary at the specified address
    pub fn load_binary(&mut self, data: &[u8], addr: u32) -> Result<()> {
        self.memory.load_binary(data, addr)?;
        self.cpu.icache.invalidate_all();
        Ok(())
    }

    /// Load a list of instruction words at `addr` (big-endian)
    pub fn load_words(&mut self, words: &[u32], addr: u32) -> Result<()> {
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();
        self.load_binary(&bytes, addr)
    }

    /// Redirect execution; drops anything in flight
    pub fn set_pc(&mut self, pc: u32) -> Result<()> {
        if pc & 3 != 0 {
            return Err(SimError::Config(format!("unaligned PC 0x{:08x}", pc)));
        }
        self.cpu.pc = pc;
        self.cpu.npc = pc.wrapping_add(4);
        self.strategy.reset(&self.cpu);
        Ok(())
    }

    /// Switch between functional and cycle-accurate execution
    pub fn set_fidelity(&mut self, fidelity: Fidelity) {
        self.config.fidelity = fidelity;
        self.strategy = make_strategy(fidelity, &self.cpu);
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Run the simulator for a specified number of cycles
    /// Returns the number of cycles actually executed
    pub fn run(&mut self, max_cycles: u32) -> Result<u32> {
        let mut cycles = 0u32;
        self.cpu.trace = std::env::var("LEON3_DEBUG").is_ok();

        while cycles < max_cycles && !self.cpu.halted {
            let spent = self
                .strategy
                .step(&mut self.cpu, &mut self.memory, &mut self.irq)?;
            cycles = cycles.saturating_add(spent);
        }
        self.cycles += cycles as u64;

        if self.cpu.halted && self.cpu.trace {
            console_log!(
                "halted at pc=0x{:08x} after {} instructions",
                self.cpu.pc,
                self.cpu.instruction_count
            );
        }
        Ok(cycles)
    }

    /// One strategy step (an instruction, or a clock when cycle accurate)
    pub fn step(&mut self) -> Result<u32> {
        let spent = self
            .strategy
            .step(&mut self.cpu, &mut self.memory, &mut self.irq)?;
        self.cycles += spent as u64;
        Ok(spent)
    }

    pub fn is_halted(&self) -> bool {
        self.cpu.halted
    }

    /// Get current PC
    pub fn get_pc(&self) -> u32 {
        self.cpu.pc
    }

    pub fn get_instruction_count(&self) -> u64 {
        self.cpu.instruction_count
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Decoded instruction cache (hits, misses)
    pub fn icache_stats(&self) -> (u64, u64) {
        (self.cpu.icache.hits, self.cpu.icache.misses)
    }

    /// Logical registers r0-r31 of the current window
    pub fn get_registers(&self) -> Vec<u32> {
        (0..32).map(|r| self.cpu.read_reg(r)).collect()
    }

    /// Read debugging memory (no side effects)
    pub fn read_memory(&self, addr: u32, size: u32) -> Vec<u8> {
        self.memory.read_bytes(addr, size)
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    /// Replace the pending interrupt level (0 clears)
    pub fn set_irq_level(&mut self, level: u8) {
        self.irq.set_level(level);
    }

    /// Reset the system
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.memory.reset();
        self.irq = IrqLine::new();
        self.cycles = 0;
        self.strategy.reset(&self.cpu);
    }

    /// Capture CPU state and the non-zero RAM pages
    pub fn create_snapshot(&self) -> Snapshot {
        let cpu = CpuSnapshot {
            pc: self.cpu.pc,
            npc: self.cpu.npc,
            nwindows: self.cpu.nwindows,
            regs: self.cpu.regs.physical_regs().to_vec(),
            sregs: self.cpu.sregs.clone(),
            instruction_count: self.cpu.instruction_count,
            trap_count: self.cpu.trap_count,
            halted: self.cpu.halted,
        };

        let base = self.memory.ram_base();
        let size = self.memory.ram_size() as u32;
        let mut pages = HashMap::new();
        let mut offset = 0;
        while offset < size {
            let page = self.memory.read_bytes(base.wrapping_add(offset), PAGE_SIZE);
            if page.iter().any(|&b| b != 0) {
                pages.insert(base.wrapping_add(offset), page);
            }
            offset += PAGE_SIZE;
        }

        Snapshot {
            version: Snapshot::VERSION,
            cpu,
            irq: self.irq.clone(),
            cycles: self.cycles,
            ram_base: base,
            ram_size: size,
            pages,
        }
    }

    /// Restore a snapshot taken from a system with the same window count
    /// and RAM layout
    pub fn restore_snapshot(&mut self, snapshot: &Snapshot) -> Result<()> {
        let snap = &snapshot.cpu;
        if snap.nwindows != self.cpu.nwindows {
            return Err(SimError::Snapshot(format!(
                "snapshot has {} register windows, system has {}",
                snap.nwindows, self.cpu.nwindows
            )));
        }
        if snapshot.ram_base != self.memory.ram_base()
            || snapshot.ram_size as usize != self.memory.ram_size()
        {
            return Err(SimError::Snapshot("RAM layout mismatch".to_string()));
        }
        let regs = RegisterFile::from_physical(snap.nwindows, snap.regs.clone())
            .ok_or_else(|| SimError::Snapshot("register file size mismatch".to_string()))?;

        // nothing is touched until every page is known to fit
        for (&addr, data) in &snapshot.pages {
            if data.len() != PAGE_SIZE as usize || !self.memory.maps(addr, data.len()) {
                return Err(SimError::ImageOutOfRange {
                    addr,
                    len: data.len(),
                });
            }
        }

        self.memory.reset();
        for (&addr, data) in &snapshot.pages {
            self.memory.load_binary(data, addr)?;
        }

        self.cpu.pc = snap.pc;
        self.cpu.npc = snap.npc;
        self.cpu.regs = regs;
        self.cpu.sregs = snap.sregs.clone();
        self.cpu.instruction_count = snap.instruction_count;
        self.cpu.trap_count = snap.trap_count;
        self.cpu.halted = snap.halted;
        self.cpu.icache.reset();
        self.irq = snapshot.irq.clone();
        self.cycles = snapshot.cycles;
        self.strategy.reset(&self.cpu);
        Ok(())
    }
}
