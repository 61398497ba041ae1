//! Simulator configuration
//!
//! Values are fixed when a `System` is built. They come from, lowest
//! priority first:
//! 1. Built-in defaults
//! 2. `./leon3.toml` (or the file passed to [`SimConfig::from_file`])
//! 3. Environment variables (`LEON3_NUM_REG_WIN`, `LEON3_ENTRY_POINT`,
//!    `LEON3_FIDELITY`, `LEON3_TSIM`)
//!
//! ```toml
//! num_reg_win = 8
//! fidelity = "cycle-accurate"
//! entry_point = 0x40000000
//! mult_size_16 = false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::console_log;
use crate::error::{Result, SimError};

/// Default location of LEON3 SDRAM
pub const DEFAULT_RAM_BASE: u32 = 0x4000_0000;

/// Project-local config file name
pub const LOCAL_CONFIG: &str = "leon3.toml";

/// Execution strategy selected at build time of the `System`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Fidelity {
    /// One instruction per step, cycles = 1 + stall
    #[default]
    Functional,
    /// Seven-stage pipeline with hazards and register locks
    CycleAccurate,
}

impl std::str::FromStr for Fidelity {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "functional" | "func" | "lt" => Ok(Fidelity::Functional),
            "cycle-accurate" | "cycle" | "acc" | "pipelined" => Ok(Fidelity::CycleAccurate),
            other => Err(SimError::Config(format!("unknown fidelity '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Number of register windows (NWINDOWS)
    pub num_reg_win: u32,
    /// Multiplier is pipelined (timing only)
    pub pipelined_mult: bool,
    /// 16x16 multiplier: UMUL/SMUL take 3 extra cycles
    pub mult_size_16: bool,
    /// Initial PC; NPC starts at entry_point + 4
    pub entry_point: u32,
    pub fidelity: Fidelity,
    /// TSIM behaviour: `ta` stops the simulation, reset sets PSR.ET and WIM=2
    pub tsim_compat: bool,
    pub ram_base: u32,
    pub ram_size_mb: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            num_reg_win: 8,
            pipelined_mult: true,
            mult_size_16: false,
            entry_point: DEFAULT_RAM_BASE,
            fidelity: Fidelity::Functional,
            tsim_compat: false,
            ram_base: DEFAULT_RAM_BASE,
            ram_size_mb: 16,
        }
    }
}

impl SimConfig {
    /// Defaults, then `./leon3.toml` if present, then environment overrides
    pub fn load() -> Result<Self> {
        let local = Path::new(LOCAL_CONFIG);
        let mut config = if local.exists() {
            Self::from_file(local)?
        } else {
            Self::default()
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SimConfig = toml::from_str(&content).map_err(|e| SimError::ConfigParse {
            path: path.display().to_string(),
            source: e,
        })?;
        console_log!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SimConfig = toml::from_str(content).map_err(|e| SimError::ConfigParse {
            path: "<inline>".to_string(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `LEON3_*` environment variables on top of the current values
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(v) = std::env::var("LEON3_NUM_REG_WIN") {
            self.num_reg_win = parse_u32(&v)
                .ok_or_else(|| SimError::Config(format!("LEON3_NUM_REG_WIN='{}'", v)))?;
        }
        if let Ok(v) = std::env::var("LEON3_ENTRY_POINT") {
            self.entry_point = parse_u32(&v)
                .ok_or_else(|| SimError::Config(format!("LEON3_ENTRY_POINT='{}'", v)))?;
        }
        if let Ok(v) = std::env::var("LEON3_FIDELITY") {
            self.fidelity = v.parse()?;
        }
        if let Ok(v) = std::env::var("LEON3_TSIM") {
            self.tsim_compat = matches!(v.as_str(), "1" | "true" | "yes");
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(2..=32).contains(&self.num_reg_win) {
            return Err(SimError::Config(format!(
                "num_reg_win must be in 2..=32, got {}",
                self.num_reg_win
            )));
        }
        if self.entry_point & 3 != 0 {
            return Err(SimError::Config(format!(
                "entry point 0x{:08x} is not word aligned",
                self.entry_point
            )));
        }
        if self.ram_size_mb == 0 || self.ram_size_mb > 2048 {
            return Err(SimError::Config(format!("invalid RAM size: {}MB", self.ram_size_mb)));
        }
        Ok(())
    }
}

/// Parse a decimal or `0x`-prefixed hexadecimal number
pub fn parse_u32(s: &str) -> Option<u32> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}
