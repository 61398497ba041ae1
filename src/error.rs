//! Simulator error type
//!
//! Architectural traps never show up here: they are vectored through the
//! trap table and execution continues in guest code. `SimError` covers the
//! conditions that stop the simulator itself.

use thiserror::Error;

use crate::cpu::trap::ExceptionId;

#[derive(Debug, Error)]
pub enum SimError {
    /// A synchronous trap arrived while PSR.ET was clear (SPARC error mode)
    #[error("{id:?} raised with traps disabled (pc=0x{pc:08x} npc=0x{npc:08x} psr=0x{psr:08x})")]
    TrapWhileDisabled {
        id: ExceptionId,
        pc: u32,
        npc: u32,
        psr: u32,
    },

    /// RETT reached a state not covered by its privilege/illegal checks
    #[error("RETT in invalid processor mode (pc=0x{pc:08x} psr=0x{psr:08x} wim=0x{wim:08x} target=0x{target:08x})")]
    InvalidProcessorMode {
        pc: u32,
        psr: u32,
        wim: u32,
        target: u32,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to parse {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("image of {len} bytes at 0x{addr:08x} does not fit in RAM")]
    ImageOutOfRange { addr: u32, len: usize },

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SimError {
    /// True for conditions raised by the guest program rather than the host
    pub fn is_guest_fatal(&self) -> bool {
        matches!(
            self,
            SimError::TrapWhileDisabled { .. } | SimError::InvalidProcessorMode { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_fatal_classification() {
        let trap = SimError::TrapWhileDisabled {
            id: ExceptionId::IllegalInstr,
            pc: 0x60,
            npc: 0x64,
            psr: 0xF300_0086,
        };
        assert!(trap.is_guest_fatal());
        assert!(trap.to_string().contains("pc=0x00000060"));
        assert!(!SimError::ImageOutOfRange { addr: 0, len: 4 }.is_guest_fatal());
        assert!(!SimError::Config("x".to_string()).is_guest_fatal());
    }
}
