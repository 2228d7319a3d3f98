//! The opcode classifier.
//!
//! A single dispatch over the first opcode byte (plus the 0F and 0F 3A
//! escapes and the ModR/M reg-field groups) produces a typed `Opcode` with
//! its operands attached, together with the address of the first byte after
//! the instruction.

use crate::error::*;
use crate::il::*;
use crate::translator::x86::operand::{self, Operand};
use crate::translator::x86::prefix::Prefixes;
use crate::translator::ByteOracle;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum AluOp {
    Add,
    Or,
    Adc,
    Sbb,
    And,
    Sub,
    Xor,
    Cmp,
}

const ALU_OPS: [AluOp; 8] = [
    AluOp::Add,
    AluOp::Or,
    AluOp::Adc,
    AluOp::Sbb,
    AluOp::And,
    AluOp::Sub,
    AluOp::Xor,
    AluOp::Cmp,
];

/// Shift-group operations. The through-carry rotates RCL/RCR are not
/// classified; their encodings are rejected as unsupported.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ShiftOp {
    Rol,
    Ror,
    Shl,
    Shr,
    Sar,
}

/// The base conditions of the condition-code table. Odd low nibbles negate.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Cc {
    Overflow,
    Below,
    Zero,
    BelowOrEqual,
    Sign,
    Less,
    LessOrEqual,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Condition {
    pub cc: Cc,
    pub negate: bool,
}

impl Condition {
    /// Decode a condition from the low nibble of an opcode byte. Nibble 0xA
    /// (and its negation 0xB) have no condition here.
    fn from_nibble(nibble: u8) -> Option<Condition> {
        let cc = match nibble & 0xe {
            0x0 => Cc::Overflow,
            0x2 => Cc::Below,
            0x4 => Cc::Zero,
            0x6 => Cc::BelowOrEqual,
            0x8 => Cc::Sign,
            0xc => Cc::Less,
            0xe => Cc::LessOrEqual,
            _ => return None,
        };
        Some(Condition {
            cc,
            negate: nibble & 1 == 1,
        })
    }

    fn suffix(&self) -> &'static str {
        match (self.cc, self.negate) {
            (Cc::Overflow, false) => "o",
            (Cc::Overflow, true) => "no",
            (Cc::Below, false) => "b",
            (Cc::Below, true) => "ae",
            (Cc::Zero, false) => "z",
            (Cc::Zero, true) => "nz",
            (Cc::BelowOrEqual, false) => "be",
            (Cc::BelowOrEqual, true) => "a",
            (Cc::Sign, false) => "s",
            (Cc::Sign, true) => "ns",
            (Cc::Less, false) => "l",
            (Cc::Less, true) => "ge",
            (Cc::LessOrEqual, false) => "le",
            (Cc::LessOrEqual, true) => "g",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum StringOp {
    Movs,
    Cmps,
    Scas,
    Stos,
    Lods,
}

/// A classified instruction with operands attached.
///
/// Register operands are register numbers; the register file they index
/// (general purpose, MMX, XMM) follows from the opcode, and the width from
/// the `bits` field.
#[derive(Clone, Debug)]
pub(crate) enum Opcode {
    Alu {
        op: AluOp,
        bits: usize,
        dst: Operand,
        src: Operand,
    },
    Test {
        bits: usize,
        lhs: Operand,
        rhs: Operand,
    },
    Not {
        bits: usize,
        dst: Operand,
    },
    Neg {
        bits: usize,
        dst: Operand,
    },
    Mov {
        bits: usize,
        dst: Operand,
        src: Operand,
    },
    /// movzx/movsx: `src` is read at `src_bits` and extended to `bits`.
    Movx {
        sign: bool,
        bits: usize,
        src_bits: usize,
        dst: usize,
        src: Operand,
    },
    Lea {
        bits: usize,
        dst: usize,
        ea: Expression,
    },
    Shift {
        op: ShiftOp,
        bits: usize,
        dst: Operand,
        count: Operand,
    },
    /// shld/shrd: `fill` supplies the bits shifted in.
    Shiftd {
        left: bool,
        bits: usize,
        dst: Operand,
        fill: usize,
        count: Operand,
    },
    Inc {
        bits: usize,
        dst: Operand,
    },
    Dec {
        bits: usize,
        dst: Operand,
    },
    Push {
        bits: usize,
        src: Operand,
    },
    Pop {
        bits: usize,
        dst: Operand,
    },
    Pushf {
        bits: usize,
    },
    Popf {
        bits: usize,
    },
    Sahf,
    Lahf,
    Xchg {
        bits: usize,
        lhs: Operand,
        rhs: usize,
    },
    Xadd {
        bits: usize,
        dst: Operand,
        src: usize,
    },
    Cmpxchg {
        bits: usize,
        dst: Operand,
        src: usize,
    },
    Cmpxchg8b {
        dst: Operand,
    },
    /// Two- and three-operand imul. The single-operand form is rejected.
    Imul {
        bits: usize,
        dst: usize,
        lhs: Operand,
        rhs: Operand,
    },
    Mul {
        bits: usize,
        src: Operand,
    },
    Div {
        bits: usize,
        signed: bool,
        src: Operand,
    },
    Jcc {
        condition: Condition,
        target: u64,
    },
    Jmp {
        target: Operand,
    },
    Call {
        target: Operand,
    },
    Ret {
        pop: u16,
    },
    Setcc {
        condition: Condition,
        dst: Operand,
    },
    String {
        op: StringOp,
        bits: usize,
    },
    /// 98: sign-extend al into ax (16-bit operand size) or ax into eax.
    Cbw {
        bits: usize,
    },
    /// 99: sign-split ax into dx:ax or eax into edx:eax.
    Cwd {
        bits: usize,
    },
    Clc,
    Stc,
    Cmc,
    Cld,
    Std,
    Leave,
    Halt,
    Int {
        vector: u8,
    },
    Sysenter,
    Cpuid,
    Rdtsc,
    Nop,
    /// bt/bts. A memory base addresses the bit string at `base + (offset >> 3)`.
    Bt {
        set: bool,
        bits: usize,
        base: Operand,
        offset: Operand,
    },
    /// bsf, and bsr when `reverse`.
    Bsf {
        reverse: bool,
        bits: usize,
        dst: usize,
        src: Operand,
    },
    /// movaps/movdqa/movdqu/movq between SIMD registers and memory.
    MovSimd {
        bits: usize,
        dst: Operand,
        src: Operand,
    },
    /// movd r/m32 into a SIMD register (zero-extended).
    MovdToSimd {
        bits: usize,
        dst: usize,
        src: Operand,
    },
    /// movd low 32 bits of a SIMD register into r/m32.
    MovdFromSimd {
        bits: usize,
        dst: Operand,
        src: usize,
    },
    Pxor {
        bits: usize,
        dst: usize,
        src: Operand,
    },
    Pcmpeq {
        lane_bits: usize,
        bits: usize,
        dst: usize,
        src: Operand,
    },
    /// pshufd/pshufw: four lanes selected by the two-bit fields of `order`.
    Pshuf {
        bits: usize,
        dst: usize,
        src: Operand,
        order: u8,
    },
    Palignr {
        bits: usize,
        dst: usize,
        src: Operand,
        shift: u8,
    },
    Pmovmskb {
        bits: usize,
        dst: usize,
        src: usize,
    },
    Ldmxcsr {
        src: Operand,
    },
    Stmxcsr {
        dst: Operand,
    },
    Fldcw {
        src: Operand,
    },
    Fnstcw {
        dst: Operand,
    },
}

impl Opcode {
    /// A disassembly-style mnemonic for attribute tagging.
    pub fn mnemonic(&self) -> String {
        match self {
            Opcode::Alu { op, .. } => match op {
                AluOp::Add => "add",
                AluOp::Or => "or",
                AluOp::Adc => "adc",
                AluOp::Sbb => "sbb",
                AluOp::And => "and",
                AluOp::Sub => "sub",
                AluOp::Xor => "xor",
                AluOp::Cmp => "cmp",
            }
            .to_string(),
            Opcode::Test { .. } => "test".to_string(),
            Opcode::Not { .. } => "not".to_string(),
            Opcode::Neg { .. } => "neg".to_string(),
            Opcode::Mov { .. } => "mov".to_string(),
            Opcode::Movx { sign, .. } => {
                if *sign {
                    "movsx".to_string()
                } else {
                    "movzx".to_string()
                }
            }
            Opcode::Lea { .. } => "lea".to_string(),
            Opcode::Shift { op, .. } => match op {
                ShiftOp::Rol => "rol",
                ShiftOp::Ror => "ror",
                ShiftOp::Shl => "shl",
                ShiftOp::Shr => "shr",
                ShiftOp::Sar => "sar",
            }
            .to_string(),
            Opcode::Shiftd { left, .. } => {
                if *left {
                    "shld".to_string()
                } else {
                    "shrd".to_string()
                }
            }
            Opcode::Inc { .. } => "inc".to_string(),
            Opcode::Dec { .. } => "dec".to_string(),
            Opcode::Push { .. } => "push".to_string(),
            Opcode::Pop { .. } => "pop".to_string(),
            Opcode::Pushf { .. } => "pushfd".to_string(),
            Opcode::Popf { .. } => "popfd".to_string(),
            Opcode::Sahf => "sahf".to_string(),
            Opcode::Lahf => "lahf".to_string(),
            Opcode::Xchg { .. } => "xchg".to_string(),
            Opcode::Xadd { .. } => "xadd".to_string(),
            Opcode::Cmpxchg { .. } => "cmpxchg".to_string(),
            Opcode::Cmpxchg8b { .. } => "cmpxchg8b".to_string(),
            Opcode::Imul { .. } => "imul".to_string(),
            Opcode::Mul { .. } => "mul".to_string(),
            Opcode::Div { signed, .. } => {
                if *signed {
                    "idiv".to_string()
                } else {
                    "div".to_string()
                }
            }
            Opcode::Jcc { condition, .. } => format!("j{}", condition.suffix()),
            Opcode::Jmp { .. } => "jmp".to_string(),
            Opcode::Call { .. } => "call".to_string(),
            Opcode::Ret { .. } => "ret".to_string(),
            Opcode::Setcc { condition, .. } => format!("set{}", condition.suffix()),
            Opcode::String { op, bits } => {
                let size = match bits {
                    8 => "b",
                    16 => "w",
                    _ => "d",
                };
                let name = match op {
                    StringOp::Movs => "movs",
                    StringOp::Cmps => "cmps",
                    StringOp::Scas => "scas",
                    StringOp::Stos => "stos",
                    StringOp::Lods => "lods",
                };
                format!("{}{}", name, size)
            }
            Opcode::Cbw { bits } => {
                if *bits == 16 {
                    "cbw".to_string()
                } else {
                    "cwde".to_string()
                }
            }
            Opcode::Cwd { bits } => {
                if *bits == 16 {
                    "cwd".to_string()
                } else {
                    "cdq".to_string()
                }
            }
            Opcode::Clc => "clc".to_string(),
            Opcode::Stc => "stc".to_string(),
            Opcode::Cmc => "cmc".to_string(),
            Opcode::Cld => "cld".to_string(),
            Opcode::Std => "std".to_string(),
            Opcode::Leave => "leave".to_string(),
            Opcode::Halt => "hlt".to_string(),
            Opcode::Int { vector } => format!("int 0x{:x}", vector),
            Opcode::Sysenter => "sysenter".to_string(),
            Opcode::Cpuid => "cpuid".to_string(),
            Opcode::Rdtsc => "rdtsc".to_string(),
            Opcode::Nop => "nop".to_string(),
            Opcode::Bt { set, .. } => {
                if *set {
                    "bts".to_string()
                } else {
                    "bt".to_string()
                }
            }
            Opcode::Bsf { reverse, .. } => {
                if *reverse {
                    "bsr".to_string()
                } else {
                    "bsf".to_string()
                }
            }
            Opcode::MovSimd { bits, .. } => {
                if *bits == 128 {
                    "movdqa".to_string()
                } else {
                    "movq".to_string()
                }
            }
            Opcode::MovdToSimd { .. } | Opcode::MovdFromSimd { .. } => "movd".to_string(),
            Opcode::Pxor { .. } => "pxor".to_string(),
            Opcode::Pcmpeq { lane_bits, .. } => match lane_bits {
                8 => "pcmpeqb".to_string(),
                16 => "pcmpeqw".to_string(),
                _ => "pcmpeqd".to_string(),
            },
            Opcode::Pshuf { bits, .. } => {
                if *bits == 128 {
                    "pshufd".to_string()
                } else {
                    "pshufw".to_string()
                }
            }
            Opcode::Palignr { .. } => "palignr".to_string(),
            Opcode::Pmovmskb { .. } => "pmovmskb".to_string(),
            Opcode::Ldmxcsr { .. } => "ldmxcsr".to_string(),
            Opcode::Stmxcsr { .. } => "stmxcsr".to_string(),
            Opcode::Fldcw { .. } => "fldcw".to_string(),
            Opcode::Fnstcw { .. } => "fnstcw".to_string(),
        }
    }
}

fn unsupported(prefixes: &Prefixes, opcode_bytes: &[u8]) -> Error {
    ErrorKind::UnsupportedOpcode(prefixes.bytes().to_vec(), opcode_bytes.to_vec()).into()
}

/// A branch displacement added to the address following the instruction,
/// truncated to the 32-bit address space.
fn relative_target(next_address: u64, displacement: i64) -> u64 {
    next_address.wrapping_add(displacement as u64) & 0xffff_ffff
}

/// Classify the instruction whose first opcode byte is at `address`.
/// Prefixes have already been consumed.
pub(crate) fn classify<O: ByteOracle + ?Sized>(
    oracle: &O,
    address: u64,
    prefixes: &Prefixes,
) -> Result<(Opcode, u64)> {
    let v = prefixes.operand_bits();
    let (b1, address) = oracle.read_u8(address)?;

    match b1 {
        // the 00..3D arithmetic/logic family
        0x00..=0x3d if b1 & 7 < 6 => {
            let op = ALU_OPS[(b1 >> 3) as usize];
            let bits = if b1 & 1 == 0 { 8 } else { v };
            match b1 & 7 {
                0 | 1 => {
                    let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
                    let opcode = Opcode::Alu {
                        op,
                        bits,
                        dst: modrm.operand,
                        src: Operand::Register(modrm.reg),
                    };
                    Ok((opcode, address))
                }
                2 | 3 => {
                    let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
                    let opcode = Opcode::Alu {
                        op,
                        bits,
                        dst: Operand::Register(modrm.reg),
                        src: modrm.operand,
                    };
                    Ok((opcode, address))
                }
                _ => {
                    let (imm, address) = if bits == 8 {
                        operand::imm8(oracle, address)?
                    } else {
                        operand::immv(oracle, address, prefixes)?
                    };
                    let opcode = Opcode::Alu {
                        op,
                        bits,
                        dst: Operand::Register(0),
                        src: Operand::Immediate(imm),
                    };
                    Ok((opcode, address))
                }
            }
        }

        0x0f => classify_0f(oracle, address, prefixes),

        0x40..=0x47 => Ok((
            Opcode::Inc {
                bits: v,
                dst: Operand::Register((b1 & 7) as usize),
            },
            address,
        )),
        0x48..=0x4f => Ok((
            Opcode::Dec {
                bits: v,
                dst: Operand::Register((b1 & 7) as usize),
            },
            address,
        )),
        0x50..=0x57 => Ok((
            Opcode::Push {
                bits: v,
                src: Operand::Register((b1 & 7) as usize),
            },
            address,
        )),
        0x58..=0x5f => Ok((
            Opcode::Pop {
                bits: v,
                dst: Operand::Register((b1 & 7) as usize),
            },
            address,
        )),

        0x68 => {
            let (imm, address) = operand::immv(oracle, address, prefixes)?;
            Ok((
                Opcode::Push {
                    bits: v,
                    src: Operand::Immediate(imm),
                },
                address,
            ))
        }
        0x69 => {
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            let (imm, address) = operand::immv(oracle, address, prefixes)?;
            Ok((
                Opcode::Imul {
                    bits: v,
                    dst: modrm.reg,
                    lhs: modrm.operand,
                    rhs: Operand::Immediate(imm),
                },
                address,
            ))
        }
        0x6a => {
            let (imm, address) = operand::simm8(oracle, address, v)?;
            Ok((
                Opcode::Push {
                    bits: v,
                    src: Operand::Immediate(imm),
                },
                address,
            ))
        }
        0x6b => {
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            let (imm, address) = operand::simm8(oracle, address, v)?;
            Ok((
                Opcode::Imul {
                    bits: v,
                    dst: modrm.reg,
                    lhs: modrm.operand,
                    rhs: Operand::Immediate(imm),
                },
                address,
            ))
        }

        0x70..=0x7f => {
            let condition = Condition::from_nibble(b1 & 0xf)
                .ok_or_else(|| unsupported(prefixes, &[b1]))?;
            let (disp, address) = operand::simm8(oracle, address, 32)?;
            Ok((
                Opcode::Jcc {
                    condition,
                    target: relative_target(address, disp.value_i64()),
                },
                address,
            ))
        }

        // Grp 1
        0x80..=0x83 => {
            let bits = if b1 & 1 == 0 { 8 } else { v };
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            let (imm, address) = match b1 {
                0x81 => operand::immv(oracle, address, prefixes)?,
                0x83 => operand::simm8(oracle, address, v)?,
                _ => operand::imm8(oracle, address)?,
            };
            Ok((
                Opcode::Alu {
                    op: ALU_OPS[modrm.reg],
                    bits,
                    dst: modrm.operand,
                    src: Operand::Immediate(imm),
                },
                address,
            ))
        }

        0x84 | 0x85 => {
            let bits = if b1 & 1 == 0 { 8 } else { v };
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            Ok((
                Opcode::Test {
                    bits,
                    lhs: modrm.operand,
                    rhs: Operand::Register(modrm.reg),
                },
                address,
            ))
        }
        0x86 | 0x87 => {
            let bits = if b1 & 1 == 0 { 8 } else { v };
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            Ok((
                Opcode::Xchg {
                    bits,
                    lhs: modrm.operand,
                    rhs: modrm.reg,
                },
                address,
            ))
        }
        0x88 | 0x89 => {
            let bits = if b1 & 1 == 0 { 8 } else { v };
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            Ok((
                Opcode::Mov {
                    bits,
                    dst: modrm.operand,
                    src: Operand::Register(modrm.reg),
                },
                address,
            ))
        }
        0x8a | 0x8b => {
            let bits = if b1 & 1 == 0 { 8 } else { v };
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            Ok((
                Opcode::Mov {
                    bits,
                    dst: Operand::Register(modrm.reg),
                    src: modrm.operand,
                },
                address,
            ))
        }
        0x8d => {
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            match modrm.operand {
                Operand::Memory(ea) => Ok((
                    Opcode::Lea {
                        bits: v,
                        dst: modrm.reg,
                        ea,
                    },
                    address,
                )),
                _ => Err(ErrorKind::UnsupportedOperandForm(
                    "lea".to_string(),
                    "source must be a memory form".to_string(),
                )
                .into()),
            }
        }
        0x8f => {
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            if modrm.reg != 0 {
                bail!(ErrorKind::InvalidEncoding(format!(
                    "8f /{} is not pop",
                    modrm.reg
                )));
            }
            Ok((
                Opcode::Pop {
                    bits: v,
                    dst: modrm.operand,
                },
                address,
            ))
        }

        0x90 => Ok((Opcode::Nop, address)),
        0x91..=0x97 => Ok((
            Opcode::Xchg {
                bits: v,
                lhs: Operand::Register(0),
                rhs: (b1 & 7) as usize,
            },
            address,
        )),

        0x98 => Ok((Opcode::Cbw { bits: v }, address)),
        0x99 => Ok((Opcode::Cwd { bits: v }, address)),
        0x9c => Ok((Opcode::Pushf { bits: v }, address)),
        0x9d => Ok((Opcode::Popf { bits: v }, address)),
        0x9e => Ok((Opcode::Sahf, address)),
        0x9f => Ok((Opcode::Lahf, address)),

        // mov with direct memory offset
        0xa0..=0xa3 => {
            let bits = if b1 & 1 == 0 { 8 } else { v };
            let (offset, address) = if prefixes.address_bits() == 16 {
                let (offset, address) = oracle.read_u16(address)?;
                (offset as u64, address)
            } else {
                let (offset, address) = oracle.read_u32(address)?;
                (offset as u64, address)
            };
            let memory = Operand::Memory(expr_const(offset, 32));
            let accumulator = Operand::Register(0);
            let (dst, src) = if b1 & 2 == 0 {
                (accumulator, memory)
            } else {
                (memory, accumulator)
            };
            Ok((Opcode::Mov { bits, dst, src }, address))
        }

        0xa4 | 0xa5 => Ok((
            Opcode::String {
                op: StringOp::Movs,
                bits: if b1 & 1 == 0 { 8 } else { v },
            },
            address,
        )),
        0xa6 | 0xa7 => Ok((
            Opcode::String {
                op: StringOp::Cmps,
                bits: if b1 & 1 == 0 { 8 } else { v },
            },
            address,
        )),
        0xa8 | 0xa9 => {
            let bits = if b1 & 1 == 0 { 8 } else { v };
            let (imm, address) = if bits == 8 {
                operand::imm8(oracle, address)?
            } else {
                operand::immv(oracle, address, prefixes)?
            };
            Ok((
                Opcode::Test {
                    bits,
                    lhs: Operand::Register(0),
                    rhs: Operand::Immediate(imm),
                },
                address,
            ))
        }
        0xaa | 0xab => Ok((
            Opcode::String {
                op: StringOp::Stos,
                bits: if b1 & 1 == 0 { 8 } else { v },
            },
            address,
        )),
        0xac | 0xad => Ok((
            Opcode::String {
                op: StringOp::Lods,
                bits: if b1 & 1 == 0 { 8 } else { v },
            },
            address,
        )),
        0xae | 0xaf => Ok((
            Opcode::String {
                op: StringOp::Scas,
                bits: if b1 & 1 == 0 { 8 } else { v },
            },
            address,
        )),

        0xb0..=0xb7 => {
            let (imm, address) = operand::imm8(oracle, address)?;
            Ok((
                Opcode::Mov {
                    bits: 8,
                    dst: Operand::Register((b1 & 7) as usize),
                    src: Operand::Immediate(imm),
                },
                address,
            ))
        }
        0xb8..=0xbf => {
            let (imm, address) = operand::immv(oracle, address, prefixes)?;
            Ok((
                Opcode::Mov {
                    bits: v,
                    dst: Operand::Register((b1 & 7) as usize),
                    src: Operand::Immediate(imm),
                },
                address,
            ))
        }

        // Grp 2
        0xc0 | 0xc1 | 0xd0 | 0xd1 | 0xd2 | 0xd3 => {
            let bits = if b1 & 1 == 0 { 8 } else { v };
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            let (count, address) = match b1 {
                0xc0 | 0xc1 => {
                    let (imm, address) = operand::imm8(oracle, address)?;
                    (Operand::Immediate(imm), address)
                }
                0xd0 | 0xd1 => (Operand::Immediate(const_(1, 8)), address),
                // d2/d3 shift by cl
                _ => (Operand::Register(1), address),
            };
            let op = match modrm.reg {
                0 => ShiftOp::Rol,
                1 => ShiftOp::Ror,
                // rcl/rcr semantics are not modeled
                2 | 3 => return Err(unsupported(prefixes, &[b1])),
                4 => ShiftOp::Shl,
                5 => ShiftOp::Shr,
                7 => ShiftOp::Sar,
                _ => bail!(ErrorKind::InvalidEncoding(format!(
                    "shift group /{}",
                    modrm.reg
                ))),
            };
            Ok((
                Opcode::Shift {
                    op,
                    bits,
                    dst: modrm.operand,
                    count,
                },
                address,
            ))
        }

        0xc2 => {
            let (imm, address) = operand::imm16(oracle, address)?;
            Ok((
                Opcode::Ret {
                    pop: imm.value() as u16,
                },
                address,
            ))
        }
        0xc3 => Ok((Opcode::Ret { pop: 0 }, address)),

        0xc6 | 0xc7 => {
            let bits = if b1 & 1 == 0 { 8 } else { v };
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            if modrm.reg != 0 {
                bail!(ErrorKind::InvalidEncoding(format!(
                    "{:02x} /{} is not mov",
                    b1, modrm.reg
                )));
            }
            let (imm, address) = if bits == 8 {
                operand::imm8(oracle, address)?
            } else {
                operand::immv(oracle, address, prefixes)?
            };
            Ok((
                Opcode::Mov {
                    bits,
                    dst: modrm.operand,
                    src: Operand::Immediate(imm),
                },
                address,
            ))
        }

        0xc9 => Ok((Opcode::Leave, address)),
        0xcd => {
            let (vector, address) = oracle.read_u8(address)?;
            Ok((Opcode::Int { vector }, address))
        }

        // x87 control word only; the fp stack is not modeled
        0xd9 => {
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            match modrm.reg {
                5 if modrm.operand.is_memory() => Ok((
                    Opcode::Fldcw {
                        src: modrm.operand,
                    },
                    address,
                )),
                7 if modrm.operand.is_memory() => Ok((
                    Opcode::Fnstcw {
                        dst: modrm.operand,
                    },
                    address,
                )),
                _ => Err(unsupported(prefixes, &[b1])),
            }
        }

        0xe8 => {
            let (disp, address) = operand::immv(oracle, address, prefixes)?;
            let target = relative_target(address, disp.value_i64());
            Ok((
                Opcode::Call {
                    target: Operand::Immediate(const_(target, 32)),
                },
                address,
            ))
        }
        0xe9 => {
            let (disp, address) = operand::immv(oracle, address, prefixes)?;
            let target = relative_target(address, disp.value_i64());
            Ok((
                Opcode::Jmp {
                    target: Operand::Immediate(const_(target, 32)),
                },
                address,
            ))
        }
        0xeb => {
            let (disp, address) = operand::simm8(oracle, address, 32)?;
            let target = relative_target(address, disp.value_i64());
            Ok((
                Opcode::Jmp {
                    target: Operand::Immediate(const_(target, 32)),
                },
                address,
            ))
        }

        0xf4 => Ok((Opcode::Halt, address)),
        0xf5 => Ok((Opcode::Cmc, address)),

        // Grp 3
        0xf6 | 0xf7 => {
            let bits = if b1 & 1 == 0 { 8 } else { v };
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            match modrm.reg {
                0 => {
                    let (imm, address) = if bits == 8 {
                        operand::imm8(oracle, address)?
                    } else {
                        operand::immv(oracle, address, prefixes)?
                    };
                    Ok((
                        Opcode::Test {
                            bits,
                            lhs: modrm.operand,
                            rhs: Operand::Immediate(imm),
                        },
                        address,
                    ))
                }
                2 => Ok((
                    Opcode::Not {
                        bits,
                        dst: modrm.operand,
                    },
                    address,
                )),
                3 => Ok((
                    Opcode::Neg {
                        bits,
                        dst: modrm.operand,
                    },
                    address,
                )),
                4 => Ok((
                    Opcode::Mul {
                        bits,
                        src: modrm.operand,
                    },
                    address,
                )),
                // single-operand imul's dual-destination update is not modeled
                5 => Err(unsupported(prefixes, &[b1])),
                6 => Ok((
                    Opcode::Div {
                        bits,
                        signed: false,
                        src: modrm.operand,
                    },
                    address,
                )),
                7 => Ok((
                    Opcode::Div {
                        bits,
                        signed: true,
                        src: modrm.operand,
                    },
                    address,
                )),
                _ => bail!(ErrorKind::InvalidEncoding(format!(
                    "{:02x} /{}",
                    b1, modrm.reg
                ))),
            }
        }

        0xf8 => Ok((Opcode::Clc, address)),
        0xf9 => Ok((Opcode::Stc, address)),
        0xfc => Ok((Opcode::Cld, address)),
        0xfd => Ok((Opcode::Std, address)),

        // Grp 4
        0xfe => {
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            match modrm.reg {
                0 => Ok((
                    Opcode::Inc {
                        bits: 8,
                        dst: modrm.operand,
                    },
                    address,
                )),
                1 => Ok((
                    Opcode::Dec {
                        bits: 8,
                        dst: modrm.operand,
                    },
                    address,
                )),
                _ => bail!(ErrorKind::InvalidEncoding(format!("fe /{}", modrm.reg))),
            }
        }
        // Grp 5
        0xff => {
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            match modrm.reg {
                0 => Ok((
                    Opcode::Inc {
                        bits: v,
                        dst: modrm.operand,
                    },
                    address,
                )),
                1 => Ok((
                    Opcode::Dec {
                        bits: v,
                        dst: modrm.operand,
                    },
                    address,
                )),
                2 => Ok((
                    Opcode::Call {
                        target: modrm.operand,
                    },
                    address,
                )),
                4 => Ok((
                    Opcode::Jmp {
                        target: modrm.operand,
                    },
                    address,
                )),
                6 => Ok((
                    Opcode::Push {
                        bits: v,
                        src: modrm.operand,
                    },
                    address,
                )),
                // far call and far jmp
                3 | 5 => Err(unsupported(prefixes, &[b1])),
                _ => bail!(ErrorKind::InvalidEncoding(format!("ff /{}", modrm.reg))),
            }
        }

        _ => Err(unsupported(prefixes, &[b1])),
    }
}

/// Classify the 0F escape space.
fn classify_0f<O: ByteOracle + ?Sized>(
    oracle: &O,
    address: u64,
    prefixes: &Prefixes,
) -> Result<(Opcode, u64)> {
    let v = prefixes.operand_bits();
    let simd = if prefixes.repz() {
        128
    } else {
        prefixes.simd_bits()
    };
    let (b2, address) = oracle.read_u8(address)?;

    match b2 {
        // multi-byte nop; consumes its modrm form
        0x1f => {
            let (_, address) = operand::modrm(oracle, address, prefixes)?;
            Ok((Opcode::Nop, address))
        }

        0x28 => {
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            Ok((
                Opcode::MovSimd {
                    bits: 128,
                    dst: Operand::Register(modrm.reg),
                    src: modrm.operand,
                },
                address,
            ))
        }
        0x29 => {
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            Ok((
                Opcode::MovSimd {
                    bits: 128,
                    dst: modrm.operand,
                    src: Operand::Register(modrm.reg),
                },
                address,
            ))
        }

        0x31 => Ok((Opcode::Rdtsc, address)),
        0x34 => Ok((Opcode::Sysenter, address)),

        // 0F 3A escape
        0x3a => {
            let (b3, address) = oracle.read_u8(address)?;
            match b3 {
                0x0f => {
                    let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
                    let (shift, address) = oracle.read_u8(address)?;
                    Ok((
                        Opcode::Palignr {
                            bits: prefixes.simd_bits(),
                            dst: modrm.reg,
                            src: modrm.operand,
                            shift,
                        },
                        address,
                    ))
                }
                _ => Err(unsupported(prefixes, &[0x0f, 0x3a, b3])),
            }
        }

        0x6e => {
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            Ok((
                Opcode::MovdToSimd {
                    bits: prefixes.simd_bits(),
                    dst: modrm.reg,
                    src: modrm.operand,
                },
                address,
            ))
        }
        0x6f => {
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            Ok((
                Opcode::MovSimd {
                    bits: simd,
                    dst: Operand::Register(modrm.reg),
                    src: modrm.operand,
                },
                address,
            ))
        }
        0x70 => {
            if prefixes.repz() || prefixes.repnz() {
                // pshufhw/pshuflw
                return Err(unsupported(prefixes, &[0x0f, b2]));
            }
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            let (order, address) = oracle.read_u8(address)?;
            Ok((
                Opcode::Pshuf {
                    bits: prefixes.simd_bits(),
                    dst: modrm.reg,
                    src: modrm.operand,
                    order,
                },
                address,
            ))
        }
        0x74 | 0x75 | 0x76 => {
            let lane_bits = match b2 {
                0x74 => 8,
                0x75 => 16,
                _ => 32,
            };
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            Ok((
                Opcode::Pcmpeq {
                    lane_bits,
                    bits: prefixes.simd_bits(),
                    dst: modrm.reg,
                    src: modrm.operand,
                },
                address,
            ))
        }
        0x7e => {
            if prefixes.repz() {
                // movq xmm, xmm/m64
                return Err(unsupported(prefixes, &[0x0f, b2]));
            }
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            Ok((
                Opcode::MovdFromSimd {
                    bits: prefixes.simd_bits(),
                    dst: modrm.operand,
                    src: modrm.reg,
                },
                address,
            ))
        }
        0x7f => {
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            Ok((
                Opcode::MovSimd {
                    bits: simd,
                    dst: modrm.operand,
                    src: Operand::Register(modrm.reg),
                },
                address,
            ))
        }

        0x80..=0x8f => {
            let condition = Condition::from_nibble(b2 & 0xf)
                .ok_or_else(|| unsupported(prefixes, &[0x0f, b2]))?;
            let (disp, address) = operand::immv(oracle, address, prefixes)?;
            Ok((
                Opcode::Jcc {
                    condition,
                    target: relative_target(address, disp.value_i64()),
                },
                address,
            ))
        }

        0x90..=0x9f => {
            let condition = Condition::from_nibble(b2 & 0xf)
                .ok_or_else(|| unsupported(prefixes, &[0x0f, b2]))?;
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            Ok((
                Opcode::Setcc {
                    condition,
                    dst: modrm.operand,
                },
                address,
            ))
        }

        0xa2 => Ok((Opcode::Cpuid, address)),

        0xa3 | 0xab => {
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            Ok((
                Opcode::Bt {
                    set: b2 == 0xab,
                    bits: v,
                    base: modrm.operand,
                    offset: Operand::Register(modrm.reg),
                },
                address,
            ))
        }

        0xa4 | 0xa5 | 0xac | 0xad => {
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            let (count, address) = if b2 & 1 == 0 {
                let (imm, address) = operand::imm8(oracle, address)?;
                (Operand::Immediate(imm), address)
            } else {
                // shift count in cl
                (Operand::Register(1), address)
            };
            Ok((
                Opcode::Shiftd {
                    left: b2 < 0xac,
                    bits: v,
                    dst: modrm.operand,
                    fill: modrm.reg,
                    count,
                },
                address,
            ))
        }

        0xae => {
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            match modrm.reg {
                2 if modrm.operand.is_memory() => Ok((
                    Opcode::Ldmxcsr {
                        src: modrm.operand,
                    },
                    address,
                )),
                3 if modrm.operand.is_memory() => Ok((
                    Opcode::Stmxcsr {
                        dst: modrm.operand,
                    },
                    address,
                )),
                _ => Err(unsupported(prefixes, &[0x0f, b2])),
            }
        }

        0xaf => {
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            Ok((
                Opcode::Imul {
                    bits: v,
                    dst: modrm.reg,
                    lhs: modrm.operand,
                    rhs: Operand::Register(modrm.reg),
                },
                address,
            ))
        }

        0xb0 | 0xb1 => {
            let bits = if b2 & 1 == 0 { 8 } else { v };
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            Ok((
                Opcode::Cmpxchg {
                    bits,
                    dst: modrm.operand,
                    src: modrm.reg,
                },
                address,
            ))
        }

        0xb6 | 0xb7 | 0xbe | 0xbf => {
            let src_bits = if b2 & 1 == 0 { 8 } else { 16 };
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            Ok((
                Opcode::Movx {
                    sign: b2 >= 0xbe,
                    bits: v,
                    src_bits,
                    dst: modrm.reg,
                    src: modrm.operand,
                },
                address,
            ))
        }

        // Grp 8
        0xba => {
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            let (imm, address) = operand::imm8(oracle, address)?;
            match modrm.reg {
                4 | 5 => Ok((
                    Opcode::Bt {
                        set: modrm.reg == 5,
                        bits: v,
                        base: modrm.operand,
                        offset: Operand::Immediate(imm),
                    },
                    address,
                )),
                // btr/btc are not modeled
                6 | 7 => Err(unsupported(prefixes, &[0x0f, b2])),
                _ => bail!(ErrorKind::InvalidEncoding(format!(
                    "0f ba /{}",
                    modrm.reg
                ))),
            }
        }

        0xbc | 0xbd => {
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            Ok((
                Opcode::Bsf {
                    reverse: b2 == 0xbd,
                    bits: v,
                    dst: modrm.reg,
                    src: modrm.operand,
                },
                address,
            ))
        }

        0xc0 | 0xc1 => {
            let bits = if b2 & 1 == 0 { 8 } else { v };
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            Ok((
                Opcode::Xadd {
                    bits,
                    dst: modrm.operand,
                    src: modrm.reg,
                },
                address,
            ))
        }

        0xc7 => {
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            if modrm.reg != 1 {
                return Err(unsupported(prefixes, &[0x0f, b2]));
            }
            if !modrm.operand.is_memory() {
                bail!(ErrorKind::UnsupportedOperandForm(
                    "cmpxchg8b".to_string(),
                    "operand must be a memory form".to_string(),
                ));
            }
            Ok((
                Opcode::Cmpxchg8b {
                    dst: modrm.operand,
                },
                address,
            ))
        }

        0xd7 => {
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            match modrm.operand {
                Operand::Register(src) => Ok((
                    Opcode::Pmovmskb {
                        bits: prefixes.simd_bits(),
                        dst: modrm.reg,
                        src,
                    },
                    address,
                )),
                _ => Err(ErrorKind::UnsupportedOperandForm(
                    "pmovmskb".to_string(),
                    "source must be a register".to_string(),
                )
                .into()),
            }
        }

        0xef => {
            let (modrm, address) = operand::modrm(oracle, address, prefixes)?;
            Ok((
                Opcode::Pxor {
                    bits: prefixes.simd_bits(),
                    dst: modrm.reg,
                    src: modrm.operand,
                },
                address,
            ))
        }

        _ => Err(unsupported(prefixes, &[0x0f, b2])),
    }
}
