//! Memory subsystem
//!
//! Flat big-endian RAM seen by the integer unit through the [`Bus`] trait.
//! Default layout (LEON3 SDRAM):
//! 0x40000000 - ...: RAM
//!
//! Unmapped reads return 0 and unmapped writes are dropped; the core has no
//! bus-error model.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Bus interface for CPU memory access
///
/// All data is big-endian. `read64` returns the word at `addr` in the low
/// 32 bits and the word at `addr + 4` in the high 32 bits; `write64` takes
/// the same layout. The doubleword register pairing in the load/store unit
/// depends on this.
pub trait Bus {
    fn read8(&mut self, addr: u32) -> u8;
    fn write8(&mut self, addr: u32, value: u8);
    fn read16(&mut self, addr: u32) -> u16;
    fn write16(&mut self, addr: u32, value: u16);
    fn read32(&mut self, addr: u32) -> u32;
    fn write32(&mut self, addr: u32, value: u32);
    fn read64(&mut self, addr: u32) -> u64;
    fn write64(&mut self, addr: u32, value: u64);
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Memory {
    ram: Vec<u8>,
    ram_base: u32,
}

impl Bus for Memory {
    fn read8(&mut self, addr: u32) -> u8 {
        Memory::read8(self, addr)
    }

    fn write8(&mut self, addr: u32, value: u8) {
        Memory::write8(self, addr, value)
    }

    fn read16(&mut self, addr: u32) -> u16 {
        Memory::read16(self, addr)
    }

    fn write16(&mut self, addr: u32, value: u16) {
        Memory::write16(self, addr, value)
    }

    fn read32(&mut self, addr: u32) -> u32 {
        Memory::read32(self, addr)
    }

    fn write32(&mut self, addr: u32, value: u32) {
        Memory::write32(self, addr, value)
    }

    fn read64(&mut self, addr: u32) -> u64 {
        Memory::read64(self, addr)
    }

    fn write64(&mut self, addr: u32, value: u64) {
        Memory::write64(self, addr, value)
    }
}

impl Memory {
    pub fn new(ram_base: u32, ram_size_mb: u32) -> Self {
        let ram_size = (ram_size_mb as usize) * 1024 * 1024;
        Memory {
            ram: vec![0u8; ram_size],
            ram_base,
        }
    }

    pub fn ram_base(&self) -> u32 {
        self.ram_base
    }

    /// Get RAM size in bytes
    pub fn ram_size(&self) -> usize {
        self.ram.len()
    }

    /// Offset of `[addr, addr + len)` inside RAM, if fully mapped
    #[inline(always)]
    fn ram_offset(&self, addr: u32, len: usize) -> Option<usize> {
        let offset = addr.checked_sub(self.ram_base)? as usize;
        if offset.checked_add(len)? <= self.ram.len() {
            Some(offset)
        } else {
            None
        }
    }

    /// True if `[addr, addr + len)` lies entirely in RAM
    pub fn maps(&self, addr: u32, len: usize) -> bool {
        self.ram_offset(addr, len).is_some()
    }

    /// Load binary data into RAM
    pub fn load_binary(&mut self, data: &[u8], addr: u32) -> Result<()> {
        let offset = self.ram_offset(addr, data.len()).ok_or(SimError::ImageOutOfRange {
            addr,
            len: data.len(),
        })?;
        self.ram[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Copy `size` bytes out of RAM; unmapped bytes read as 0
    pub fn read_bytes(&self, addr: u32, size: u32) -> Vec<u8> {
        (0..size).map(|i| self.read8(addr.wrapping_add(i))).collect()
    }

    pub fn read8(&self, addr: u32) -> u8 {
        match self.ram_offset(addr, 1) {
            Some(offset) => self.ram[offset],
            None => 0,
        }
    }

    pub fn write8(&mut self, addr: u32, value: u8) {
        if let Some(offset) = self.ram_offset(addr, 1) {
            self.ram[offset] = value;
        }
    }

    /// Read 16 bits (big endian)
    pub fn read16(&self, addr: u32) -> u16 {
        match self.ram_offset(addr, 2) {
            Some(offset) => u16::from_be_bytes([self.ram[offset], self.ram[offset + 1]]),
            None => 0,
        }
    }

    /// Write 16 bits (big endian)
    pub fn write16(&mut self, addr: u32, value: u16) {
        if let Some(offset) = self.ram_offset(addr, 2) {
            self.ram[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
        }
    }

    /// Read 32 bits (big endian)
    pub fn read32(&self, addr: u32) -> u32 {
        match self.ram_offset(addr, 4) {
            Some(offset) => u32::from_be_bytes([
                self.ram[offset],
                self.ram[offset + 1],
                self.ram[offset + 2],
                self.ram[offset + 3],
            ]),
            None => 0,
        }
    }

    /// Write 32 bits (big endian)
    pub fn write32(&mut self, addr: u32, value: u32) {
        if let Some(offset) = self.ram_offset(addr, 4) {
            self.ram[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
        }
    }

    /// Two big-endian words: `addr` in bits 31:0, `addr + 4` in bits 63:32
    pub fn read64(&self, addr: u32) -> u64 {
        let lo = self.read32(addr) as u64;
        let hi = self.read32(addr.wrapping_add(4)) as u64;
        lo | (hi << 32)
    }

    pub fn write64(&mut self, addr: u32, value: u64) {
        self.write32(addr, value as u32);
        self.write32(addr.wrapping_add(4), (value >> 32) as u32);
    }

    pub fn reset(&mut self) {
        self.ram.fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: u32 = 0x4000_0000;

    #[test]
    fn test_ram_is_big_endian() {
        let mut mem = Memory::new(BASE, 1);
        mem.write32(BASE, 0xDEADBEEF);
        assert_eq!(mem.read8(BASE), 0xDE);
        assert_eq!(mem.read8(BASE + 3), 0xEF);
        assert_eq!(mem.read16(BASE + 2), 0xBEEF);
    }

    #[test]
    fn test_dword_word_order() {
        let mut mem = Memory::new(BASE, 1);
        mem.write32(BASE + 8, 0x1111_1111);
        mem.write32(BASE + 12, 0x2222_2222);
        assert_eq!(mem.read64(BASE + 8), 0x2222_2222_1111_1111);

        mem.write64(BASE + 16, 0xAAAA_AAAA_BBBB_BBBB);
        assert_eq!(mem.read32(BASE + 16), 0xBBBB_BBBB);
        assert_eq!(mem.read32(BASE + 20), 0xAAAA_AAAA);
    }

    #[test]
    fn test_unmapped_access() {
        let mut mem = Memory::new(BASE, 1);
        assert_eq!(mem.read32(0x1000), 0);
        mem.write32(0x1000, 0x1234);
        // straddling the end of RAM
        let end = BASE + mem.ram_size() as u32;
        assert_eq!(mem.read32(end - 2), 0);
    }

    #[test]
    fn test_load_binary() {
        let mut mem = Memory::new(BASE, 1);
        let data = [0x01, 0x00, 0x00, 0x00]; // nop
        mem.load_binary(&data, BASE).unwrap();
        assert_eq!(mem.read32(BASE), 0x0100_0000);

        assert!(mem.load_binary(&data, BASE - 4).is_err());
        let end = BASE + mem.ram_size() as u32;
        assert!(mem.load_binary(&data, end - 2).is_err());
    }
}
