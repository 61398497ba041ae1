//! Special registers: PSR, WIM, TBR, Y and the ancillary state registers
//!
//! Software writes go through the `write_*` methods, which apply the LEON3
//! filtering rules and report the trap a rejected write raises. The trap
//! controller updates TT and the PSR trap fields directly.

use serde::{Deserialize, Serialize};

use super::trap::ExceptionId;

// PSR fields
pub const PSR_CWP_MASK: u32 = 0x1F;
pub const PSR_ET: u32 = 1 << 5;
pub const PSR_PS: u32 = 1 << 6;
pub const PSR_S: u32 = 1 << 7;
pub const PSR_PIL_SHIFT: u32 = 8;
pub const PSR_PIL_MASK: u32 = 0xF << PSR_PIL_SHIFT;
pub const PSR_EF: u32 = 1 << 12;
pub const PSR_EC: u32 = 1 << 13;
pub const PSR_C: u32 = 1 << 20;
pub const PSR_V: u32 = 1 << 21;
pub const PSR_Z: u32 = 1 << 22;
pub const PSR_N: u32 = 1 << 23;
pub const PSR_ICC_MASK: u32 = PSR_N | PSR_Z | PSR_V | PSR_C;

/// Bits software may change through WRPSR (EC/EF and IMPL/VER excluded)
pub const PSR_WRITE_MASK: u32 = 0x00FF_CFFF;
/// IMPL=0xF, VER=3
pub const PSR_IMPL_VER: u32 = 0xF300_0000;
pub const PSR_RESET: u32 = 0xF300_0080;
pub const PSR_RESET_TSIM: u32 = 0xF300_00E0;

// TBR fields
pub const TBR_TBA_MASK: u32 = 0xFFFF_F000;
pub const TBR_TT_SHIFT: u32 = 4;
pub const TBR_TT_MASK: u32 = 0xFF << TBR_TT_SHIFT;

/// Processor configuration register (read only)
pub const ASR_CONFIG: usize = 17;
/// MAC accumulator, low word
pub const ASR_MAC_LO: usize = 18;

/// Integer condition codes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Icc {
    pub n: bool,
    pub z: bool,
    pub v: bool,
    pub c: bool,
}

impl Icc {
    pub fn from_psr(psr: u32) -> Self {
        Icc {
            n: psr & PSR_N != 0,
            z: psr & PSR_Z != 0,
            v: psr & PSR_V != 0,
            c: psr & PSR_C != 0,
        }
    }

    /// PSR bits 23:20
    pub fn bits(self) -> u32 {
        let mut bits = 0;
        if self.n {
            bits |= PSR_N;
        }
        if self.z {
            bits |= PSR_Z;
        }
        if self.v {
            bits |= PSR_V;
        }
        if self.c {
            bits |= PSR_C;
        }
        bits
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialRegisters {
    pub psr: u32,
    pub wim: u32,
    pub tbr: u32,
    pub y: u32,
    pub asr: [u32; 32],
}

impl SpecialRegisters {
    pub fn new(nwindows: u32, tsim_compat: bool) -> Self {
        let mut regs = SpecialRegisters {
            psr: 0,
            wim: 0,
            tbr: 0,
            y: 0,
            asr: [0; 32],
        };
        regs.reset(nwindows, tsim_compat);
        regs
    }

    pub fn reset(&mut self, nwindows: u32, tsim_compat: bool) {
        if tsim_compat {
            // TSIM enables traps and marks window 1 invalid on its own
            self.psr = PSR_RESET_TSIM;
            self.wim = 2;
        } else {
            self.psr = PSR_RESET;
            self.wim = 0;
        }
        self.tbr = 0;
        self.y = 0;
        self.asr = [0; 32];
        self.asr[ASR_CONFIG] = 0x0000_0300 + (nwindows - 1);
    }

    #[inline(always)]
    pub fn cwp(&self) -> u32 {
        self.psr & PSR_CWP_MASK
    }

    #[inline(always)]
    pub fn set_cwp(&mut self, cwp: u32) {
        self.psr = (self.psr & !PSR_CWP_MASK) | (cwp & PSR_CWP_MASK);
    }

    #[inline(always)]
    pub fn supervisor(&self) -> bool {
        self.psr & PSR_S != 0
    }

    #[inline(always)]
    pub fn traps_enabled(&self) -> bool {
        self.psr & PSR_ET != 0
    }

    pub fn pil(&self) -> u32 {
        (self.psr & PSR_PIL_MASK) >> PSR_PIL_SHIFT
    }

    #[inline(always)]
    pub fn icc(&self) -> Icc {
        Icc::from_psr(self.psr)
    }

    #[inline(always)]
    pub fn set_icc(&mut self, icc: Icc) {
        self.psr = (self.psr & !PSR_ICC_MASK) | icc.bits();
    }

    pub fn tt(&self) -> u8 {
        ((self.tbr & TBR_TT_MASK) >> TBR_TT_SHIFT) as u8
    }

    pub fn set_tt(&mut self, tt: u8) {
        self.tbr = (self.tbr & !TBR_TT_MASK) | ((tt as u32) << TBR_TT_SHIFT);
    }

    pub fn read_psr(&self) -> Result<u32, ExceptionId> {
        self.privileged(self.psr)
    }

    pub fn read_wim(&self) -> Result<u32, ExceptionId> {
        self.privileged(self.wim)
    }

    pub fn read_tbr(&self) -> Result<u32, ExceptionId> {
        self.privileged(self.tbr)
    }

    fn privileged(&self, value: u32) -> Result<u32, ExceptionId> {
        if self.supervisor() {
            Ok(value)
        } else {
            Err(ExceptionId::PriviledgeInstr)
        }
    }

    /// WRPSR: privilege is checked before the CWP range, one trap at most
    pub fn write_psr(&mut self, value: u32, nwindows: u32) -> Result<(), ExceptionId> {
        let filtered = (value & PSR_WRITE_MASK) | PSR_IMPL_VER;
        if !self.supervisor() {
            return Err(ExceptionId::PriviledgeInstr);
        }
        if (filtered & PSR_CWP_MASK) >= nwindows {
            return Err(ExceptionId::IllegalInstr);
        }
        self.psr = filtered;
        Ok(())
    }

    /// WRWIM: only the bits of implemented windows are kept
    pub fn write_wim(&mut self, value: u32, nwindows: u32) -> Result<(), ExceptionId> {
        if !self.supervisor() {
            return Err(ExceptionId::PriviledgeInstr);
        }
        self.wim = value & window_mask(nwindows);
        Ok(())
    }

    /// WRTBR: TBA is replaced, TT is left to the trap controller
    pub fn write_tbr(&mut self, value: u32) -> Result<(), ExceptionId> {
        if !self.supervisor() {
            return Err(ExceptionId::PriviledgeInstr);
        }
        self.tbr = (self.tbr & !TBR_TBA_MASK) | (value & TBR_TBA_MASK);
        Ok(())
    }

    pub fn read_asr(&self, n: u32) -> u32 {
        self.asr[(n & 0x1F) as usize]
    }

    pub fn write_asr(&mut self, n: u32, value: u32) {
        let n = (n & 0x1F) as usize;
        if n != ASR_CONFIG {
            self.asr[n] = value;
        }
    }
}

/// WIM bits backed by implemented windows
pub fn window_mask(nwindows: u32) -> u32 {
    if nwindows >= 32 {
        u32::MAX
    } else {
        (1u32 << nwindows) - 1
    }
}
