//! LEON3 Instruction-Set Simulator
//!
//! A SPARC V8 / LEON3 integer unit simulator that runs natively and in the
//! browser. Instruction semantics, register windows and the trap model are
//! shared by a functional and a cycle-accurate execution strategy.

use wasm_bindgen::prelude::*;

pub mod config;
pub mod cpu;
pub mod error;
pub mod memory;
pub mod snapshot;
mod system;

pub use config::{Fidelity, SimConfig};
pub use error::SimError;
pub use system::System;

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Log to browser console
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console)]
    fn log(s: &str);

    #[wasm_bindgen(js_namespace = console)]
    fn error(s: &str);
}

#[cfg(not(target_arch = "wasm32"))]
pub fn log(s: &str) {
    println!("LOG: {}", s);
}

#[cfg(not(target_arch = "wasm32"))]
pub fn error(s: &str) {
    eprintln!("ERROR: {}", s);
}

/// Helper macro for console logging
#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => (crate::log(&format!($($t)*)))
}

#[macro_export]
macro_rules! console_error {
    ($($t:tt)*) => (crate::error(&format!($($t)*)))
}

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Unpack a program image if it is gzip or zstd compressed; raw images are
/// returned unchanged
pub fn unpack_image(data: &[u8]) -> error::Result<Vec<u8>> {
    if data.starts_with(&GZIP_MAGIC) {
        use std::io::Read;
        let mut decoder = flate2::read::GzDecoder::new(data);
        let mut result = Vec::new();
        decoder.read_to_end(&mut result)?;
        Ok(result)
    } else if data.starts_with(&ZSTD_MAGIC) {
        Ok(zstd::stream::decode_all(data)?)
    } else {
        Ok(data.to_vec())
    }
}

fn js_error(e: SimError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// Main simulator interface exposed to JavaScript
#[wasm_bindgen]
pub struct Emulator {
    system: System,
}

#[wasm_bindgen]
impl Emulator {
    /// Create a new simulator instance with default settings
    #[wasm_bindgen(constructor)]
    pub fn new(memory_size_mb: u32) -> Result<Emulator, JsValue> {
        console_log!("Creating LEON3 simulator with {}MB RAM", memory_size_mb);

        let config = SimConfig {
            ram_size_mb: memory_size_mb,
            ..SimConfig::default()
        };
        let system = System::new(config).map_err(js_error)?;
        Ok(Emulator { system })
    }

    /// Load a raw, gzip or zstd program image and point PC at `load_addr`
    pub fn load_program(&mut self, data: &[u8], load_addr: u32) -> Result<(), JsValue> {
        let image = unpack_image(data).map_err(js_error)?;
        self.system.load_binary(&image, load_addr).map_err(js_error)?;
        self.system.set_pc(load_addr).map_err(js_error)
    }

    /// Run the simulator for a specified number of cycles
    /// Returns the number of cycles actually executed
    pub fn run(&mut self, cycles: u32) -> Result<u32, JsValue> {
        self.system.run(cycles).map_err(js_error)
    }

    /// "functional" or "cycle-accurate"
    pub fn set_fidelity(&mut self, name: &str) -> Result<(), JsValue> {
        let fidelity: Fidelity = name.parse().map_err(js_error)?;
        self.system.set_fidelity(fidelity);
        Ok(())
    }

    /// Stopped by `ta` in TSIM mode
    pub fn is_halted(&self) -> bool {
        self.system.is_halted()
    }

    /// Get current PC for debugging
    pub fn get_pc(&self) -> u32 {
        self.system.get_pc()
    }

    pub fn get_instruction_count(&self) -> u32 {
        self.system.get_instruction_count() as u32
    }

    /// r0-r31 of the current window
    pub fn get_registers(&self) -> Vec<u32> {
        self.system.get_registers()
    }

    /// PSR, WIM, TBR, Y and the ASRs as a plain JS object
    pub fn get_special_registers(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.system.cpu.sregs).map_err(|e| e.into())
    }

    /// Drive the interrupt line (0 clears)
    pub fn set_irq_level(&mut self, level: u8) {
        self.system.set_irq_level(level);
    }

    pub fn read_memory(&self, addr: u32, size: u32) -> Vec<u8> {
        self.system.read_memory(addr, size)
    }

    pub fn reset(&mut self) {
        self.system.reset();
    }

    /// Snapshot of CPU state and non-zero RAM (bincode + zstd)
    pub fn create_snapshot(&self) -> Result<Vec<u8>, JsValue> {
        self.system.create_snapshot().to_bytes().map_err(js_error)
    }

    pub fn restore_snapshot(&mut self, snapshot_data: &[u8]) -> Result<(), JsValue> {
        let snapshot = snapshot::Snapshot::from_bytes(snapshot_data).map_err(js_error)?;
        self.system.restore_snapshot(&snapshot).map_err(js_error)
    }
}

/// Decompress zstd-compressed data
/// Useful for loading compressed program images in the browser
#[wasm_bindgen]
pub fn decompress_zstd(data: &[u8]) -> Result<Vec<u8>, JsValue> {
    zstd::stream::decode_all(data)
        .map_err(|e| JsValue::from_str(&format!("Zstd decompression error: {}", e)))
}

/// Decompress gzip-compressed data
#[wasm_bindgen]
pub fn decompress_gzip(data: &[u8]) -> Result<Vec<u8>, JsValue> {
    use std::io::Read;

    let mut decoder = flate2::read::GzDecoder::new(data);
    let mut result = Vec::new();
    decoder
        .read_to_end(&mut result)
        .map_err(|e| JsValue::from_str(&format!("Gzip decompression error: {}", e)))?;
    Ok(result)
}
