//! Load/store unit
//!
//! Every access checks privilege (alternate space forms) before alignment,
//! so at most one trap comes out of an instruction. Register writes happen
//! only after the bus access, which leaves rd untouched on a trap.

use super::decode::{LoadKind, StoreKind};
use super::trap::ExceptionId;
use super::Cpu;
use crate::memory::Bus;

impl Cpu {
    #[inline(always)]
    fn check_access(&self, alternate: bool, addr: u32, align_mask: u32) -> Result<(), ExceptionId> {
        if alternate && !self.sregs.supervisor() {
            return Err(ExceptionId::PriviledgeInstr);
        }
        if addr & align_mask != 0 {
            return Err(ExceptionId::MemAddrNotAligned);
        }
        Ok(())
    }

    /// LD/LDUB/LDSB/LDUH/LDSH/LDD and their alternate forms
    pub(super) fn load(
        &mut self,
        kind: LoadKind,
        alternate: bool,
        rd: u8,
        addr: u32,
        bus: &mut dyn Bus,
    ) -> Result<(), ExceptionId> {
        self.check_access(alternate, addr, kind.align_mask())?;
        let rd = rd as u32;
        match kind {
            LoadKind::SByte => self.write_reg(rd, bus.read8(addr) as i8 as i32 as u32),
            LoadKind::UByte => self.write_reg(rd, bus.read8(addr) as u32),
            LoadKind::SHalf => self.write_reg(rd, bus.read16(addr) as i16 as i32 as u32),
            LoadKind::UHalf => self.write_reg(rd, bus.read16(addr) as u32),
            LoadKind::Word => self.write_reg(rd, bus.read32(addr)),
            LoadKind::Double => {
                let dword = bus.read64(addr);
                // word at addr goes to the even register of the pair
                self.write_reg(rd & !1, dword as u32);
                self.write_reg(rd | 1, (dword >> 32) as u32);
            }
        }
        Ok(())
    }

    /// ST/STB/STH/STD and their alternate forms
    pub(super) fn store(
        &mut self,
        kind: StoreKind,
        alternate: bool,
        rd: u8,
        addr: u32,
        bus: &mut dyn Bus,
    ) -> Result<(), ExceptionId> {
        self.check_access(alternate, addr, kind.align_mask())?;
        let rd = rd as u32;
        let len = match kind {
            StoreKind::Byte => {
                bus.write8(addr, self.read_reg(rd) as u8);
                1
            }
            StoreKind::Half => {
                bus.write16(addr, self.read_reg(rd) as u16);
                2
            }
            StoreKind::Word => {
                bus.write32(addr, self.read_reg(rd));
                4
            }
            StoreKind::Double => {
                let lo = self.read_reg(rd & !1) as u64;
                let hi = self.read_reg(rd | 1) as u64;
                bus.write64(addr, (hi << 32) | lo);
                8
            }
        };
        self.icache.invalidate_range(addr, len);
        Ok(())
    }

    /// LDSTUB(A): read the byte, then set it to 0xFF
    pub(super) fn ldstub(
        &mut self,
        alternate: bool,
        rd: u8,
        addr: u32,
        bus: &mut dyn Bus,
    ) -> Result<(), ExceptionId> {
        self.check_access(alternate, addr, 0)?;
        let old = bus.read8(addr);
        bus.write8(addr, 0xFF);
        self.icache.invalidate_range(addr, 1);
        self.write_reg(rd as u32, old as u32);
        Ok(())
    }

    /// SWAP(A): exchange rd with the word in memory
    pub(super) fn swap(
        &mut self,
        alternate: bool,
        rd: u8,
        addr: u32,
        bus: &mut dyn Bus,
    ) -> Result<(), ExceptionId> {
        self.check_access(alternate, addr, 3)?;
        let rd = rd as u32;
        let old = bus.read32(addr);
        bus.write32(addr, self.read_reg(rd));
        self.icache.invalidate_range(addr, 4);
        self.write_reg(rd, old);
        Ok(())
    }
}
