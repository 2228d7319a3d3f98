//! ModR/M, SIB, displacement and immediate decoding.
//!
//! Every function here is stateless: it takes the oracle and an address, and
//! returns the decoded value together with the address of the next undecoded
//! byte. There is no rewinding and no ambiguous state.

use crate::error::*;
use crate::il::*;
use crate::translator::x86::prefix::Prefixes;
use crate::translator::x86::register::get_register;
use crate::translator::ByteOracle;

/// A decoded instruction operand.
#[derive(Clone, Debug)]
pub(crate) enum Operand {
    /// A register number. Width and register file (general purpose, MMX,
    /// XMM) are determined by the opcode using it.
    Register(usize),
    /// A memory operand: the raw effective address, without segment base.
    Memory(Expression),
    /// An immediate.
    Immediate(Constant),
}

impl Operand {
    pub fn is_memory(&self) -> bool {
        matches!(self, Operand::Memory(_))
    }
}

/// A decoded ModR/M byte: the raw fields plus the register-or-memory operand
/// the mod and r/m fields select.
#[derive(Clone, Debug)]
pub(crate) struct ModRm {
    /// The reg field: a register number, or an opcode extension.
    pub reg: usize,
    /// The operand selected by mod and r/m.
    pub operand: Operand,
}

/// Decode a ModR/M byte and everything it implies (SIB, displacement),
/// honoring the address-size override.
pub(crate) fn modrm<O: ByteOracle + ?Sized>(
    oracle: &O,
    address: u64,
    prefixes: &Prefixes,
) -> Result<(ModRm, u64)> {
    let (byte, address) = oracle.read_u8(address)?;
    let mode = byte >> 6;
    let reg = ((byte >> 3) & 7) as usize;
    let rm = (byte & 7) as usize;

    if mode == 3 {
        return Ok((
            ModRm {
                reg,
                operand: Operand::Register(rm),
            },
            address,
        ));
    }

    let (ea, address) = if prefixes.address_bits() == 16 {
        effective_address_16(oracle, address, mode, rm)?
    } else {
        effective_address_32(oracle, address, mode, rm)?
    };

    Ok((
        ModRm {
            reg,
            operand: Operand::Memory(ea),
        },
        address,
    ))
}

/// 16-bit effective addresses. The sum is built at 16 bits, so BP+SI
/// overflow wraps at 16 bits as it does on hardware, and is then
/// zero-extended to the 32-bit address space.
fn effective_address_16<O: ByteOracle + ?Sized>(
    oracle: &O,
    address: u64,
    mode: u8,
    rm: usize,
) -> Result<(Expression, u64)> {
    // mod == 0, r/m == 6 is a direct 16-bit displacement
    if mode == 0 && rm == 6 {
        let (disp, address) = oracle.read_u16(address)?;
        return Ok((expr_const(disp as u64, 32), address));
    }

    let reg16 = |encoding: usize| -> Result<Expression> { get_register(encoding, 16)?.get() };

    let base = match rm {
        0 => Expression::add(reg16(3)?, reg16(6)?)?, // bx + si
        1 => Expression::add(reg16(3)?, reg16(7)?)?, // bx + di
        2 => Expression::add(reg16(5)?, reg16(6)?)?, // bp + si
        3 => Expression::add(reg16(5)?, reg16(7)?)?, // bp + di
        4 => reg16(6)?,                              // si
        5 => reg16(7)?,                              // di
        6 => reg16(5)?,                              // bp
        7 => reg16(3)?,                              // bx
        _ => unreachable!(),
    };

    let (ea, address) = match mode {
        0 => (base, address),
        1 => {
            let (disp, address) = oracle.read_u8(address)?;
            let disp = expr_const(disp as i8 as i64 as u64, 16);
            (Expression::add(base, disp)?, address)
        }
        2 => {
            let (disp, address) = oracle.read_u16(address)?;
            (Expression::add(base, expr_const(disp as u64, 16))?, address)
        }
        _ => unreachable!(),
    };

    Ok((Expression::zext(32, ea)?, address))
}

/// 32-bit effective addresses, including SIB forms.
fn effective_address_32<O: ByteOracle + ?Sized>(
    oracle: &O,
    address: u64,
    mode: u8,
    rm: usize,
) -> Result<(Expression, u64)> {
    // mod == 0, r/m == 5 is a direct 32-bit displacement
    if mode == 0 && rm == 5 {
        let (disp, address) = oracle.read_u32(address)?;
        return Ok((expr_const(disp as u64, 32), address));
    }

    let (base, address) = if rm == 4 {
        sib(oracle, address, mode)?
    } else {
        (get_register(rm, 32)?.get()?, address)
    };

    match mode {
        0 => Ok((base, address)),
        1 => {
            let (disp, address) = oracle.read_u8(address)?;
            let disp = expr_const(disp as i8 as i64 as u64, 32);
            Ok((Expression::add(base, disp)?, address))
        }
        2 => {
            let (disp, address) = oracle.read_u32(address)?;
            Ok((Expression::add(base, expr_const(disp as u64, 32))?, address))
        }
        _ => unreachable!(),
    }
}

/// Decode a SIB byte into `base + (index << scale)`.
///
/// index == 4 means no index. base == 5 under mod == 0 replaces the base
/// register with a 32-bit displacement.
fn sib<O: ByteOracle + ?Sized>(oracle: &O, address: u64, mode: u8) -> Result<(Expression, u64)> {
    let (byte, address) = oracle.read_u8(address)?;
    let scale = byte >> 6;
    let index = ((byte >> 3) & 7) as usize;
    let base = (byte & 7) as usize;

    let scaled_index = if index == 4 {
        None
    } else {
        Some(Expression::shl(
            get_register(index, 32)?.get()?,
            expr_const(scale as u64, 32),
        )?)
    };

    let (base, address) = if base == 5 && mode == 0 {
        let (disp, address) = oracle.read_u32(address)?;
        (expr_const(disp as u64, 32), address)
    } else {
        (get_register(base, 32)?.get()?, address)
    };

    match scaled_index {
        Some(scaled_index) => Ok((Expression::add(base, scaled_index)?, address)),
        None => Ok((base, address)),
    }
}

/// An unsigned 8-bit immediate.
pub(crate) fn imm8<O: ByteOracle + ?Sized>(oracle: &O, address: u64) -> Result<(Constant, u64)> {
    let (value, address) = oracle.read_u8(address)?;
    Ok((const_(value as u64, 8), address))
}

/// An 8-bit immediate, sign-extended to `bits`.
pub(crate) fn simm8<O: ByteOracle + ?Sized>(oracle: &O, address: u64, bits: usize) -> Result<(Constant, u64)> {
    let (value, address) = oracle.read_u8(address)?;
    Ok((const_(value as i8 as i64 as u64, bits), address))
}

/// A 16-bit immediate.
pub(crate) fn imm16<O: ByteOracle + ?Sized>(oracle: &O, address: u64) -> Result<(Constant, u64)> {
    let (value, address) = oracle.read_u16(address)?;
    Ok((const_(value as u64, 16), address))
}

/// A 32-bit immediate.
pub(crate) fn imm32<O: ByteOracle + ?Sized>(oracle: &O, address: u64) -> Result<(Constant, u64)> {
    let (value, address) = oracle.read_u32(address)?;
    Ok((const_(value as u64, 32), address))
}

/// An operand-sized immediate: 16 bits under the operand-size override, 32
/// otherwise. (The z and v immediate sizes coincide without 64-bit mode.)
pub(crate) fn immv<O: ByteOracle + ?Sized>(
    oracle: &O,
    address: u64,
    prefixes: &Prefixes,
) -> Result<(Constant, u64)> {
    if prefixes.operand_bits() == 16 {
        imm16(oracle, address)
    } else {
        imm32(oracle, address)
    }
}
