//! Instruction decoder
//!
//! Decodes SPARC V8 words into the closed [`Instruction`] enum. Format 3
//! opcodes (op=2 and op=3) are looked up in two static 64-entry tables
//! indexed by op3.

use super::alu::AluOp;

/// Second operand: rs2 (i=0) or sign-extended simm13 (i=1)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operand {
    Reg(u8),
    Imm(i32),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadKind {
    SByte,
    UByte,
    SHalf,
    UHalf,
    Word,
    Double,
}

impl LoadKind {
    /// Required alignment mask
    pub fn align_mask(self) -> u32 {
        match self {
            LoadKind::SByte | LoadKind::UByte => 0,
            LoadKind::SHalf | LoadKind::UHalf => 1,
            LoadKind::Word => 3,
            LoadKind::Double => 7,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreKind {
    Byte,
    Half,
    Word,
    Double,
}

impl StoreKind {
    pub fn align_mask(self) -> u32 {
        match self {
            StoreKind::Byte => 0,
            StoreKind::Half => 1,
            StoreKind::Word => 3,
            StoreKind::Double => 7,
        }
    }
}

/// Decoded instruction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Instruction {
    Call { disp30: u32 },
    Sethi { rd: u8, imm22: u32 },
    Branch { cond: u8, annul: bool, disp22: i32 },
    Alu { op: AluOp, cc: bool, rd: u8, rs1: u8, op2: Operand },
    Mac { signed: bool, rd: u8, rs1: u8, op2: Operand },
    Save { rd: u8, rs1: u8, op2: Operand },
    Restore { rd: u8, rs1: u8, op2: Operand },
    Jmpl { rd: u8, rs1: u8, op2: Operand },
    Rett { rs1: u8, op2: Operand },
    Ticc { cond: u8, rs1: u8, op2: Operand },
    Flush { rs1: u8, op2: Operand },
    Stbar,
    ReadY { rd: u8 },
    ReadAsr { rd: u8, asr: u8 },
    ReadPsr { rd: u8 },
    ReadWim { rd: u8 },
    ReadTbr { rd: u8 },
    WriteY { rs1: u8, op2: Operand },
    WriteAsr { asr: u8, rs1: u8, op2: Operand },
    WritePsr { rs1: u8, op2: Operand },
    WriteWim { rs1: u8, op2: Operand },
    WriteTbr { rs1: u8, op2: Operand },
    Load { kind: LoadKind, alternate: bool, rd: u8, rs1: u8, op2: Operand },
    Store { kind: StoreKind, alternate: bool, rd: u8, rs1: u8, op2: Operand },
    Ldstub { alternate: bool, rd: u8, rs1: u8, op2: Operand },
    Swap { alternate: bool, rd: u8, rs1: u8, op2: Operand },
    /// UNIMP (op=0, op2=0)
    Unimp { const22: u32 },
    /// FBfcc, FPop, LDF/STF family
    FpDisabled,
    /// CBccc, CPop, LDC/STC family
    CpDisabled,
    Illegal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Arith {
    Alu(AluOp, bool),
    Mac(bool),
    Read,
    ReadPsr,
    ReadWim,
    ReadTbr,
    Write,
    WritePsr,
    WriteWim,
    WriteTbr,
    Fp,
    Cp,
    Jmpl,
    Rett,
    Ticc,
    Flush,
    Save,
    Restore,
    Illegal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mem {
    Load(LoadKind),
    Store(StoreKind),
    Ldstub,
    Swap,
    Fp,
    Cp,
    Illegal,
}

const fn arith_entry(op3: u8) -> Arith {
    use AluOp::*;
    let base = match op3 & 0x0F {
        0x0 => Some(Add),
        0x1 => Some(And),
        0x2 => Some(Or),
        0x3 => Some(Xor),
        0x4 => Some(Sub),
        0x5 => Some(AndN),
        0x6 => Some(OrN),
        0x7 => Some(XNor),
        0x8 => Some(AddX),
        0xA => Some(UMul),
        0xB => Some(SMul),
        0xC => Some(SubX),
        0xE => Some(UDiv),
        0xF => Some(SDiv),
        _ => None,
    };
    if op3 < 0x20 {
        return match base {
            Some(op) => Arith::Alu(op, op3 & 0x10 != 0),
            None => Arith::Illegal,
        };
    }
    match op3 {
        0x20 => Arith::Alu(TAdd, true),
        0x21 => Arith::Alu(TSub, true),
        0x22 => Arith::Alu(TAddTv, true),
        0x23 => Arith::Alu(TSubTv, true),
        0x24 => Arith::Alu(MulS, true),
        0x25 => Arith::Alu(Sll, false),
        0x26 => Arith::Alu(Srl, false),
        0x27 => Arith::Alu(Sra, false),
        0x28 => Arith::Read,
        0x29 => Arith::ReadPsr,
        0x2A => Arith::ReadWim,
        0x2B => Arith::ReadTbr,
        0x30 => Arith::Write,
        0x31 => Arith::WritePsr,
        0x32 => Arith::WriteWim,
        0x33 => Arith::WriteTbr,
        0x34 | 0x35 => Arith::Fp,
        0x36 | 0x37 => Arith::Cp,
        0x38 => Arith::Jmpl,
        0x39 => Arith::Rett,
        0x3A => Arith::Ticc,
        0x3B => Arith::Flush,
        0x3C => Arith::Save,
        0x3D => Arith::Restore,
        0x3E => Arith::Mac(false),
        0x3F => Arith::Mac(true),
        _ => Arith::Illegal,
    }
}

const fn mem_entry(op3: u8) -> Mem {
    if op3 >= 0x20 {
        return match op3 & 0x30 {
            0x20 => Mem::Fp,
            0x30 => Mem::Cp,
            _ => Mem::Illegal,
        };
    }
    // bit 4 selects the alternate-space form, same table otherwise
    match op3 & 0x0F {
        0x0 => Mem::Load(LoadKind::Word),
        0x1 => Mem::Load(LoadKind::UByte),
        0x2 => Mem::Load(LoadKind::UHalf),
        0x3 => Mem::Load(LoadKind::Double),
        0x4 => Mem::Store(StoreKind::Word),
        0x5 => Mem::Store(StoreKind::Byte),
        0x6 => Mem::Store(StoreKind::Half),
        0x7 => Mem::Store(StoreKind::Double),
        0x9 => Mem::Load(LoadKind::SByte),
        0xA => Mem::Load(LoadKind::SHalf),
        0xD => Mem::Ldstub,
        0xF => Mem::Swap,
        _ => Mem::Illegal,
    }
}

const fn build_arith_table() -> [Arith; 64] {
    let mut table = [Arith::Illegal; 64];
    let mut op3 = 0;
    while op3 < 64 {
        table[op3] = arith_entry(op3 as u8);
        op3 += 1;
    }
    table
}

const fn build_mem_table() -> [Mem; 64] {
    let mut table = [Mem::Illegal; 64];
    let mut op3 = 0;
    while op3 < 64 {
        table[op3] = mem_entry(op3 as u8);
        op3 += 1;
    }
    table
}

static ARITH_TABLE: [Arith; 64] = build_arith_table();
static MEM_TABLE: [Mem; 64] = build_mem_table();

// Field extraction
#[inline(always)]
fn rd(raw: u32) -> u8 {
    ((raw >> 25) & 0x1F) as u8
}

#[inline(always)]
fn rs1(raw: u32) -> u8 {
    ((raw >> 14) & 0x1F) as u8
}

#[inline(always)]
fn imm_bit(raw: u32) -> bool {
    raw & (1 << 13) != 0
}

#[inline(always)]
fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

#[inline(always)]
fn operand2(raw: u32) -> Operand {
    if imm_bit(raw) {
        Operand::Imm(sign_extend(raw & 0x1FFF, 13))
    } else {
        Operand::Reg((raw & 0x1F) as u8)
    }
}

/// Decode one instruction word
pub fn decode(raw: u32) -> Instruction {
    match raw >> 30 {
        1 => Instruction::Call {
            disp30: raw & 0x3FFF_FFFF,
        },
        0 => decode_format2(raw),
        2 => decode_arith(raw),
        _ => decode_mem(raw),
    }
}

fn decode_format2(raw: u32) -> Instruction {
    match (raw >> 22) & 0x7 {
        0 => Instruction::Unimp {
            const22: raw & 0x3F_FFFF,
        },
        2 => Instruction::Branch {
            cond: ((raw >> 25) & 0xF) as u8,
            annul: raw & (1 << 29) != 0,
            disp22: sign_extend(raw & 0x3F_FFFF, 22),
        },
        4 => Instruction::Sethi {
            rd: rd(raw),
            imm22: raw & 0x3F_FFFF,
        },
        6 => Instruction::FpDisabled,
        7 => Instruction::CpDisabled,
        _ => Instruction::Illegal,
    }
}

fn decode_arith(raw: u32) -> Instruction {
    let op3 = ((raw >> 19) & 0x3F) as usize;
    let (rd, rs1, op2) = (rd(raw), rs1(raw), operand2(raw));
    match ARITH_TABLE[op3] {
        Arith::Alu(op, cc) => Instruction::Alu { op, cc, rd, rs1, op2 },
        Arith::Mac(signed) => Instruction::Mac { signed, rd, rs1, op2 },
        Arith::Read => match rs1 {
            0 => Instruction::ReadY { rd },
            15 if rd == 0 => Instruction::Stbar,
            asr => Instruction::ReadAsr { rd, asr },
        },
        Arith::ReadPsr => Instruction::ReadPsr { rd },
        Arith::ReadWim => Instruction::ReadWim { rd },
        Arith::ReadTbr => Instruction::ReadTbr { rd },
        Arith::Write => match rd {
            0 => Instruction::WriteY { rs1, op2 },
            asr => Instruction::WriteAsr { asr, rs1, op2 },
        },
        Arith::WritePsr => Instruction::WritePsr { rs1, op2 },
        Arith::WriteWim => Instruction::WriteWim { rs1, op2 },
        Arith::WriteTbr => Instruction::WriteTbr { rs1, op2 },
        Arith::Fp => Instruction::FpDisabled,
        Arith::Cp => Instruction::CpDisabled,
        Arith::Jmpl => Instruction::Jmpl { rd, rs1, op2 },
        Arith::Rett => Instruction::Rett { rs1, op2 },
        Arith::Ticc => {
            let cond = ((raw >> 25) & 0xF) as u8;
            let op2 = if imm_bit(raw) {
                Operand::Imm(sign_extend(raw & 0x7F, 7))
            } else {
                op2
            };
            Instruction::Ticc { cond, rs1, op2 }
        }
        Arith::Flush => Instruction::Flush { rs1, op2 },
        Arith::Save => Instruction::Save { rd, rs1, op2 },
        Arith::Restore => Instruction::Restore { rd, rs1, op2 },
        Arith::Illegal => Instruction::Illegal,
    }
}

fn decode_mem(raw: u32) -> Instruction {
    let op3 = ((raw >> 19) & 0x3F) as usize;
    let alternate = op3 & 0x10 != 0 && op3 < 0x20;
    // alternate space takes its ASI from the instruction, so i=1 is undefined
    if alternate && imm_bit(raw) {
        return Instruction::Illegal;
    }
    let (rd, rs1, op2) = (rd(raw), rs1(raw), operand2(raw));
    match MEM_TABLE[op3] {
        Mem::Load(kind) => Instruction::Load { kind, alternate, rd, rs1, op2 },
        Mem::Store(kind) => Instruction::Store { kind, alternate, rd, rs1, op2 },
        Mem::Ldstub => Instruction::Ldstub { alternate, rd, rs1, op2 },
        Mem::Swap => Instruction::Swap { alternate, rd, rs1, op2 },
        Mem::Fp => Instruction::FpDisabled,
        Mem::Cp => Instruction::CpDisabled,
        Mem::Illegal => Instruction::Illegal,
    }
}

impl Instruction {
    /// Registers whose value arrives late and must be locked in the
    /// pipeline until write-back (loads, divides, MAC)
    pub fn late_destinations(&self) -> [Option<u8>; 2] {
        match *self {
            Instruction::Load { kind: LoadKind::Double, rd, .. } => [Some(rd & !1), Some(rd | 1)],
            Instruction::Load { rd, .. }
            | Instruction::Ldstub { rd, .. }
            | Instruction::Swap { rd, .. }
            | Instruction::Mac { rd, .. } => [Some(rd), None],
            Instruction::Alu { op, rd, .. } if op.is_divide() => [Some(rd), None],
            _ => [None, None],
        }
    }

    /// Extra cycles the destination stays locked after write-back
    pub fn write_delay(&self) -> u32 {
        match *self {
            Instruction::Alu { op, .. } if op.is_divide() => 33,
            _ => 0,
        }
    }

    /// Registers read by the instruction, for hazard checks
    pub fn sources(&self) -> [Option<u8>; 4] {
        let reg = |op2: Operand| match op2 {
            Operand::Reg(r) => Some(r),
            Operand::Imm(_) => None,
        };
        match *self {
            Instruction::Alu { rs1, op2, .. }
            | Instruction::Mac { rs1, op2, .. }
            | Instruction::Save { rs1, op2, .. }
            | Instruction::Restore { rs1, op2, .. }
            | Instruction::Jmpl { rs1, op2, .. }
            | Instruction::Rett { rs1, op2 }
            | Instruction::Ticc { rs1, op2, .. }
            | Instruction::Flush { rs1, op2 }
            | Instruction::WriteY { rs1, op2 }
            | Instruction::WriteAsr { rs1, op2, .. }
            | Instruction::WritePsr { rs1, op2 }
            | Instruction::WriteWim { rs1, op2 }
            | Instruction::WriteTbr { rs1, op2 }
            | Instruction::Load { rs1, op2, .. }
            | Instruction::Ldstub { rs1, op2, .. } => [Some(rs1), reg(op2), None, None],
            Instruction::Store { kind: StoreKind::Double, rd, rs1, op2, .. } => {
                [Some(rs1), reg(op2), Some(rd & !1), Some(rd | 1)]
            }
            Instruction::Store { rd, rs1, op2, .. }
            | Instruction::Swap { rd, rs1, op2, .. } => [Some(rs1), reg(op2), Some(rd), None],
            _ => [None; 4],
        }
    }

    /// Cycles spent before a trap reported by this instruction is taken
    pub fn trap_stall(&self) -> u32 {
        match *self {
            Instruction::Ticc { .. } => 4,
            // the divider runs to completion before DIV_ZERO is signalled
            Instruction::Alu { op, .. } if op.is_divide() => 34,
            _ => 0,
        }
    }
}
