//! Snapshot system
//!
//! Saves CPU state, the interrupt line and the non-zero RAM pages, then
//! compresses the bincode image with zstd. RAM pages that are all zero are
//! skipped, so a snapshot of a small program stays small.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::cpu::{IrqLine, SpecialRegisters};
use crate::error::{Result, SimError};

/// Page size for RAM capture (4KB)
pub const PAGE_SIZE: u32 = 4096;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub pc: u32,
    pub npc: u32,
    pub nwindows: u32,
    /// Physical register file, globals first
    pub regs: Vec<u32>,
    pub sregs: SpecialRegisters,
    pub instruction_count: u64,
    pub trap_count: u64,
    pub halted: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Snapshot {
    /// Version for compatibility checking
    pub version: u32,
    pub cpu: CpuSnapshot,
    pub irq: IrqLine,
    pub cycles: u64,
    pub ram_base: u32,
    pub ram_size: u32,
    /// Non-zero RAM pages (page address -> contents)
    pub pages: HashMap<u32, Vec<u8>>,
}

impl Snapshot {
    pub const VERSION: u32 = 1;

    /// Serialize to bytes (compressed with zstd)
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let serialized = bincode::serialize(self)
            .map_err(|e| SimError::Snapshot(format!("serialization error: {}", e)))?;

        zstd::stream::encode_all(&serialized[..], 3)
            .map_err(|e| SimError::Snapshot(format!("compression error: {}", e)))
    }

    /// Deserialize from bytes (compressed with zstd)
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let decompressed = zstd::stream::decode_all(data)
            .map_err(|e| SimError::Snapshot(format!("decompression error: {}", e)))?;

        let snapshot: Snapshot = bincode::deserialize(&decompressed)
            .map_err(|e| SimError::Snapshot(format!("deserialization error: {}", e)))?;
        if snapshot.version != Self::VERSION {
            return Err(SimError::Snapshot(format!(
                "unsupported snapshot version {} (expected {})",
                snapshot.version,
                Self::VERSION
            )));
        }
        Ok(snapshot)
    }
}
