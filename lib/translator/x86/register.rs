//! The x86 register and flag model.
//!
//! The lifter's state is a fixed table of named variables. General purpose
//! registers are modeled at their full 32-bit width; sub-register reads and
//! writes go through `X86Register`, which preserves the untouched bits of the
//! enclosing register.

use crate::error::*;
use crate::il::*;

const REG32_NAMES: [&str; 8] = ["eax", "ecx", "edx", "ebx", "esp", "ebp", "esi", "edi"];

/// Struct for dealing with x86 registers.
///
/// `encoding` is the register number as it appears in ModR/M and opcode
/// fields. For 8-bit registers, encodings 4..=7 select the high byte of the
/// register with encoding `encoding & 3`.
pub(crate) struct X86Register {
    name: &'static str,
    encoding: usize,
    /// The encoding of the full 32-bit register this register aliases into.
    full_encoding: usize,
    /// The offset of this register within the full register, in bits.
    offset: usize,
    /// The size of this register in bits.
    bits: usize,
}

const X86REGISTERS: &[X86Register] = &[
    X86Register { name: "al", encoding: 0, full_encoding: 0, offset: 0, bits: 8 },
    X86Register { name: "cl", encoding: 1, full_encoding: 1, offset: 0, bits: 8 },
    X86Register { name: "dl", encoding: 2, full_encoding: 2, offset: 0, bits: 8 },
    X86Register { name: "bl", encoding: 3, full_encoding: 3, offset: 0, bits: 8 },
    X86Register { name: "ah", encoding: 4, full_encoding: 0, offset: 8, bits: 8 },
    X86Register { name: "ch", encoding: 5, full_encoding: 1, offset: 8, bits: 8 },
    X86Register { name: "dh", encoding: 6, full_encoding: 2, offset: 8, bits: 8 },
    X86Register { name: "bh", encoding: 7, full_encoding: 3, offset: 8, bits: 8 },
    X86Register { name: "ax", encoding: 0, full_encoding: 0, offset: 0, bits: 16 },
    X86Register { name: "cx", encoding: 1, full_encoding: 1, offset: 0, bits: 16 },
    X86Register { name: "dx", encoding: 2, full_encoding: 2, offset: 0, bits: 16 },
    X86Register { name: "bx", encoding: 3, full_encoding: 3, offset: 0, bits: 16 },
    X86Register { name: "sp", encoding: 4, full_encoding: 4, offset: 0, bits: 16 },
    X86Register { name: "bp", encoding: 5, full_encoding: 5, offset: 0, bits: 16 },
    X86Register { name: "si", encoding: 6, full_encoding: 6, offset: 0, bits: 16 },
    X86Register { name: "di", encoding: 7, full_encoding: 7, offset: 0, bits: 16 },
    X86Register { name: "eax", encoding: 0, full_encoding: 0, offset: 0, bits: 32 },
    X86Register { name: "ecx", encoding: 1, full_encoding: 1, offset: 0, bits: 32 },
    X86Register { name: "edx", encoding: 2, full_encoding: 2, offset: 0, bits: 32 },
    X86Register { name: "ebx", encoding: 3, full_encoding: 3, offset: 0, bits: 32 },
    X86Register { name: "esp", encoding: 4, full_encoding: 4, offset: 0, bits: 32 },
    X86Register { name: "ebp", encoding: 5, full_encoding: 5, offset: 0, bits: 32 },
    X86Register { name: "esi", encoding: 6, full_encoding: 6, offset: 0, bits: 32 },
    X86Register { name: "edi", encoding: 7, full_encoding: 7, offset: 0, bits: 32 },
];

/// Takes a register encoding and width and returns an `X86Register`.
pub(crate) fn get_register(encoding: usize, bits: usize) -> Result<&'static X86Register> {
    X86REGISTERS
        .iter()
        .find(|register| register.encoding == encoding && register.bits == bits)
        .ok_or_else(|| {
            ErrorKind::InvalidEncoding(format!("no register with encoding {}/{}", encoding, bits))
                .into()
        })
}

impl X86Register {
    /// Returns true if this is a full-width register (i.e. eax, ebx, etc).
    pub fn is_full(&self) -> bool {
        self.bits == 32
    }

    /// The full-width variable this register aliases into.
    pub fn full(&self) -> Variable {
        var(REG32_NAMES[self.full_encoding], 32)
    }

    /// Returns an expression which evaluates to the value of the register.
    ///
    /// This handles things like al/ah/ax/eax.
    pub fn get(&self) -> Result<Expression> {
        if self.is_full() {
            Ok(self.full().into())
        } else if self.offset == 0 {
            Expression::trun(self.bits, self.full().into())
        } else {
            let shifted = Expression::shr(
                self.full().into(),
                expr_const(self.offset as u64, 32),
            )?;
            Expression::trun(self.bits, shifted)
        }
    }

    /// Returns a statement setting the value of this register, preserving the
    /// bits of the full register it does not cover.
    pub fn set(&self, value: Expression) -> Result<Statement> {
        if self.is_full() {
            Statement::assign(self.full(), value)
        } else {
            let keep = !(((1u64 << self.bits) - 1) << self.offset) & 0xffff_ffff;
            let kept = Expression::and(self.full().into(), expr_const(keep, 32))?;
            let value = Expression::zext(32, value)?;
            let value = if self.offset == 0 {
                value
            } else {
                Expression::shl(value, expr_const(self.offset as u64, 32))?
            };
            Statement::assign(self.full(), Expression::or(kept, value)?)
        }
    }
}

pub(crate) fn eax() -> Variable {
    var("eax", 32)
}

pub(crate) fn ecx() -> Variable {
    var("ecx", 32)
}

pub(crate) fn edx() -> Variable {
    var("edx", 32)
}

pub(crate) fn ebx() -> Variable {
    var("ebx", 32)
}

pub(crate) fn esp() -> Variable {
    var("esp", 32)
}

pub(crate) fn ebp() -> Variable {
    var("ebp", 32)
}

pub(crate) fn esi() -> Variable {
    var("esi", 32)
}

pub(crate) fn edi() -> Variable {
    var("edi", 32)
}

pub(crate) fn cf() -> Variable {
    var("CF", 1)
}

pub(crate) fn pf() -> Variable {
    var("PF", 1)
}

pub(crate) fn af() -> Variable {
    var("AF", 1)
}

pub(crate) fn zf() -> Variable {
    var("ZF", 1)
}

pub(crate) fn sf() -> Variable {
    var("SF", 1)
}

pub(crate) fn of() -> Variable {
    var("OF", 1)
}

/// The direction pseudo-register: +1 after cld, -1 after std. String
/// operations multiply their stride by it.
pub(crate) fn dflag() -> Variable {
    var("DFLAG", 32)
}

pub(crate) fn fs_base() -> Variable {
    var("fs_base", 32)
}

pub(crate) fn gs_base() -> Variable {
    var("gs_base", 32)
}

pub(crate) fn xmm(encoding: usize) -> Variable {
    var(format!("xmm{}", encoding), 128)
}

pub(crate) fn mm(encoding: usize) -> Variable {
    var(format!("mm{}", encoding), 64)
}

pub(crate) fn fpu_control() -> Variable {
    var("fpu_control", 16)
}

pub(crate) fn mxcsr() -> Variable {
    var("mxcsr", 32)
}

/// The global memory variable. Little-endian, 32-bit addresses.
pub(crate) fn mem() -> Variable {
    Variable::new("mem", Type::Mem(32))
}

/// The full table of architectural variables the lifter reads and writes.
pub fn variables() -> Vec<Variable> {
    let mut variables: Vec<Variable> = REG32_NAMES.iter().map(|name| var(*name, 32)).collect();
    variables.push(var("eip", 32));
    variables.extend(vec![cf(), pf(), af(), zf(), sf(), of()]);
    variables.push(dflag());
    variables.push(fs_base());
    variables.push(gs_base());
    for encoding in 0..8 {
        variables.push(xmm(encoding));
    }
    for encoding in 0..8 {
        variables.push(mm(encoding));
    }
    variables.push(fpu_control());
    variables.push(mxcsr());
    // condition-code shadow registers, retained as opaque state
    variables.push(var("cc_op", 32));
    variables.push(var("cc_dep1", 32));
    variables.push(var("cc_dep2", 32));
    variables.push(var("cc_ndep", 32));
    variables.push(mem());
    variables
}
