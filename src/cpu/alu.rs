//! Integer unit arithmetic
//!
//! Pure functions from operands (and the incoming condition codes / Y) to a
//! result. Nothing here touches the register file; the execute stage decides
//! what to commit.

use super::special::Icc;
use super::trap::ExceptionId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AluOp {
    Add,
    And,
    Or,
    Xor,
    Sub,
    AndN,
    OrN,
    XNor,
    AddX,
    UMul,
    SMul,
    SubX,
    UDiv,
    SDiv,
    TAdd,
    TSub,
    TAddTv,
    TSubTv,
    MulS,
    Sll,
    Srl,
    Sra,
}

impl AluOp {
    pub fn is_shift(self) -> bool {
        matches!(self, AluOp::Sll | AluOp::Srl | AluOp::Sra)
    }

    pub fn is_divide(self) -> bool {
        matches!(self, AluOp::UDiv | AluOp::SDiv)
    }

    pub fn is_multiply(self) -> bool {
        matches!(self, AluOp::UMul | AluOp::SMul)
    }
}

/// What an ALU operation wants committed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AluResult {
    pub value: u32,
    /// New condition codes, for `cc` forms only
    pub icc: Option<Icc>,
    /// New Y register
    pub y: Option<u32>,
    /// Set when the operation traps; nothing else may be committed then
    pub trap: Option<ExceptionId>,
}

impl AluResult {
    fn value(value: u32) -> Self {
        AluResult {
            value,
            icc: None,
            y: None,
            trap: None,
        }
    }

    fn trap(id: ExceptionId) -> Self {
        AluResult {
            value: 0,
            icc: None,
            y: None,
            trap: Some(id),
        }
    }
}

#[inline(always)]
fn msb(x: u32) -> bool {
    x & 0x8000_0000 != 0
}

/// n and z from the result, v = c = 0
#[inline(always)]
pub fn logic_icc(r: u32) -> Icc {
    Icc {
        n: msb(r),
        z: r == 0,
        v: false,
        c: false,
    }
}

#[inline(always)]
pub fn add_icc(a: u32, b: u32, r: u32) -> Icc {
    Icc {
        n: msb(r),
        z: r == 0,
        v: msb((a & b & !r) | (!a & !b & r)),
        c: msb((a & b) | ((a | b) & !r)),
    }
}

#[inline(always)]
pub fn sub_icc(a: u32, b: u32, r: u32) -> Icc {
    Icc {
        n: msb(r),
        z: r == 0,
        v: msb((a & !b & !r) | (!a & b & r)),
        c: msb((!a & b) | ((!a | b) & r)),
    }
}

/// Condition table shared by Bicc and Ticc
pub fn condition(cond: u8, icc: Icc) -> bool {
    let Icc { n, z, v, c } = icc;
    match cond & 0xF {
        0x0 => false,
        0x1 => z,
        0x2 => z || (n != v),
        0x3 => n != v,
        0x4 => c || z,
        0x5 => c,
        0x6 => n,
        0x7 => v,
        0x8 => true,
        0x9 => !z,
        0xA => !z && (n == v),
        0xB => n == v,
        0xC => !c && !z,
        0xD => !c,
        0xE => !n,
        _ => !v,
    }
}

/// Shift by an unmasked count: 32 and above shift everything out
pub fn shift(op: AluOp, a: u32, count: u32) -> u32 {
    match op {
        AluOp::Sll => a.checked_shl(count).unwrap_or(0),
        AluOp::Srl => a.checked_shr(count).unwrap_or(0),
        _ => {
            let fill = if msb(a) { -1 } else { 0 };
            (a as i32).checked_shr(count).unwrap_or(fill) as u32
        }
    }
}

/// One step of the shift-and-add multiply; returns (rd, icc, new Y)
pub fn mulscc(a: u32, b: u32, y: u32, icc: Icc) -> (u32, Icc, u32) {
    let new_y = (y >> 1) | (a << 31);
    let op1 = (((icc.n ^ icc.v) as u32) << 31) | (a >> 1);
    let op2 = if y & 1 != 0 { b } else { 0 };
    let r = op1.wrapping_add(op2);
    (r, add_icc(op1, op2, r), new_y)
}

/// Tagged add; the flag is set on arithmetic overflow or a nonzero tag
pub fn tagged_add(a: u32, b: u32) -> (u32, Icc) {
    let r = a.wrapping_add(b);
    let mut icc = add_icc(a, b, r);
    icc.v |= (a | b) & 3 != 0;
    (r, icc)
}

pub fn tagged_sub(a: u32, b: u32) -> (u32, Icc) {
    let r = a.wrapping_sub(b);
    let mut icc = sub_icc(a, b, r);
    icc.v |= (a | b) & 3 != 0;
    (r, icc)
}

/// {Y:a} / b unsigned. `None` on divide by zero, otherwise (quotient, overflow)
pub fn udiv(y: u32, a: u32, b: u32) -> Option<(u32, bool)> {
    if b == 0 {
        return None;
    }
    let dividend = ((y as u64) << 32) | a as u64;
    let q = dividend / b as u64;
    if q > u32::MAX as u64 {
        Some((0xFFFF_FFFF, true))
    } else {
        Some((q as u32, false))
    }
}

/// {Y:a} / b signed, clamped to the 32-bit range on overflow
pub fn sdiv(y: u32, a: u32, b: u32) -> Option<(u32, bool)> {
    if b == 0 {
        return None;
    }
    let dividend = (((y as u64) << 32) | a as u64) as i64;
    // i64::MIN / -1 is the only other failure and overflows upwards
    let q = dividend.checked_div(b as i32 as i64).unwrap_or(i64::MAX);
    if q > i32::MAX as i64 {
        Some((0x7FFF_FFFF, true))
    } else if q < i32::MIN as i64 {
        Some((0x8000_0000, true))
    } else {
        Some((q as u32, false))
    }
}

/// 16x16 multiply-accumulate into the 40-bit {Y[7:0]:ASR18}.
/// Returns (rd, new Y, new ASR18).
pub fn mac(a: u32, b: u32, y: u32, acc_lo: u32, signed: bool) -> (u32, u32, u32) {
    let product: i64 = if signed {
        (a as u16 as i16 as i64) * (b as u16 as i16 as i64)
    } else {
        (a & 0xFFFF) as i64 * (b & 0xFFFF) as i64
    };
    let acc = ((((y & 0xFF) as u64) << 32) | acc_lo as u64) as i64;
    let sum = acc.wrapping_add(product) as u64;
    let lo = sum as u32;
    (lo, ((sum >> 32) & 0xFF) as u32, lo)
}

/// SETHI: imm22 into bits 31:10
#[inline(always)]
pub fn sethi(imm22: u32) -> u32 {
    (imm22 << 10) & 0xFFFF_FC00
}

/// Evaluate an arithmetic/logical/shift op. `cc` selects the flag-setting
/// form; the caller passes the shift count already masked or not.
pub fn evaluate(op: AluOp, cc: bool, a: u32, b: u32, icc_in: Icc, y: u32) -> AluResult {
    let flags = |icc: Icc| if cc { Some(icc) } else { None };
    match op {
        AluOp::And | AluOp::Or | AluOp::Xor | AluOp::AndN | AluOp::OrN | AluOp::XNor => {
            let r = match op {
                AluOp::And => a & b,
                AluOp::Or => a | b,
                AluOp::Xor => a ^ b,
                AluOp::AndN => a & !b,
                AluOp::OrN => a | !b,
                _ => !(a ^ b),
            };
            AluResult {
                icc: flags(logic_icc(r)),
                ..AluResult::value(r)
            }
        }
        AluOp::Add | AluOp::AddX => {
            let carry = (op == AluOp::AddX && icc_in.c) as u32;
            let r = a.wrapping_add(b).wrapping_add(carry);
            AluResult {
                icc: flags(add_icc(a, b, r)),
                ..AluResult::value(r)
            }
        }
        AluOp::Sub | AluOp::SubX => {
            let borrow = (op == AluOp::SubX && icc_in.c) as u32;
            let r = a.wrapping_sub(b).wrapping_sub(borrow);
            AluResult {
                icc: flags(sub_icc(a, b, r)),
                ..AluResult::value(r)
            }
        }
        AluOp::TAdd | AluOp::TSub => {
            let (r, icc) = if op == AluOp::TAdd {
                tagged_add(a, b)
            } else {
                tagged_sub(a, b)
            };
            AluResult {
                icc: Some(icc),
                ..AluResult::value(r)
            }
        }
        AluOp::TAddTv | AluOp::TSubTv => {
            let (r, mut icc) = if op == AluOp::TAddTv {
                tagged_add(a, b)
            } else {
                tagged_sub(a, b)
            };
            if icc.v {
                return AluResult::trap(ExceptionId::TagOverflow);
            }
            icc.v = false;
            AluResult {
                icc: Some(icc),
                ..AluResult::value(r)
            }
        }
        AluOp::MulS => {
            let (r, icc, new_y) = mulscc(a, b, y, icc_in);
            AluResult {
                value: r,
                icc: Some(icc),
                y: Some(new_y),
                trap: None,
            }
        }
        AluOp::UMul | AluOp::SMul => {
            let product = if op == AluOp::UMul {
                a as u64 * b as u64
            } else {
                (a as i32 as i64 * b as i32 as i64) as u64
            };
            let r = product as u32;
            AluResult {
                value: r,
                icc: flags(logic_icc(r)),
                y: Some((product >> 32) as u32),
                trap: None,
            }
        }
        AluOp::UDiv | AluOp::SDiv => {
            let quotient = if op == AluOp::UDiv {
                udiv(y, a, b)
            } else {
                sdiv(y, a, b)
            };
            match quotient {
                None => AluResult::trap(ExceptionId::DivZero),
                Some((r, overflow)) => AluResult {
                    icc: flags(Icc {
                        n: msb(r),
                        z: r == 0,
                        v: overflow,
                        c: false,
                    }),
                    ..AluResult::value(r)
                },
            }
        }
        AluOp::Sll | AluOp::Srl | AluOp::Sra => AluResult::value(shift(op, a, b)),
    }
}
