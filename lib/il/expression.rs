//! An `Expression` is a pure, typed term over variables, constants and memory.

use crate::architecture::Endian;
use crate::error::*;
use crate::il::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An IL Expression.
///
/// Expressions are the building blocks of statements, and always evaluate to
/// some value. They are immutable and free of side effects; a `Store` does not
/// modify anything, it evaluates to a new memory.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Expression {
    Constant(Constant),
    Variable(Variable),

    /// A value read from a memory. Evaluates to a bit-vector of `bits`.
    Load {
        memory: Box<Expression>,
        index: Box<Expression>,
        endian: Endian,
        bits: usize,
    },
    /// A memory updated at one location. Evaluates to a new memory.
    Store {
        memory: Box<Expression>,
        index: Box<Expression>,
        value: Box<Expression>,
        endian: Endian,
        bits: usize,
    },

    /// Bitwise complement.
    Not(Box<Expression>),
    /// Two's complement negation.
    Neg(Box<Expression>),

    Add(Box<Expression>, Box<Expression>),
    Sub(Box<Expression>, Box<Expression>),
    Mul(Box<Expression>, Box<Expression>),
    Divu(Box<Expression>, Box<Expression>),
    Modu(Box<Expression>, Box<Expression>),
    Divs(Box<Expression>, Box<Expression>),
    Mods(Box<Expression>, Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Xor(Box<Expression>, Box<Expression>),
    Shl(Box<Expression>, Box<Expression>),
    Shr(Box<Expression>, Box<Expression>),
    Sra(Box<Expression>, Box<Expression>),

    Cmpeq(Box<Expression>, Box<Expression>),
    Cmpneq(Box<Expression>, Box<Expression>),
    Cmplts(Box<Expression>, Box<Expression>),
    Cmpltu(Box<Expression>, Box<Expression>),

    Zext(usize, Box<Expression>),
    Sext(usize, Box<Expression>),
    Trun(usize, Box<Expression>),

    /// The bits `hi..=lo` of the operand, as a bit-vector of `hi - lo + 1`
    /// bits.
    Extract(usize, usize, Box<Expression>),
    /// The concatenation of two bit-vectors. The first operand forms the high
    /// bits of the result.
    Concat(Box<Expression>, Box<Expression>),

    /// `condition` must be 1-bit; both cases must have the same sort.
    Ite {
        condition: Box<Expression>,
        true_case: Box<Expression>,
        false_case: Box<Expression>,
    },

    /// A havoc value of the given width. Downstream analyses must not assume
    /// any concrete bit pattern.
    Unknown { reason: String, bits: usize },

    /// A reference to a named label, used as a branch target.
    Lab(String),
}

impl Expression {
    /// Return the sort of this expression.
    pub fn sort(&self) -> Type {
        match self {
            Expression::Constant(constant) => Type::Reg(constant.bits()),
            Expression::Variable(variable) => variable.sort(),
            Expression::Load { bits, .. } => Type::Reg(*bits),
            Expression::Store { memory, .. } => memory.sort(),
            Expression::Not(src) | Expression::Neg(src) => src.sort(),
            Expression::Add(lhs, _)
            | Expression::Sub(lhs, _)
            | Expression::Mul(lhs, _)
            | Expression::Divu(lhs, _)
            | Expression::Modu(lhs, _)
            | Expression::Divs(lhs, _)
            | Expression::Mods(lhs, _)
            | Expression::And(lhs, _)
            | Expression::Or(lhs, _)
            | Expression::Xor(lhs, _)
            | Expression::Shl(lhs, _)
            | Expression::Shr(lhs, _)
            | Expression::Sra(lhs, _) => lhs.sort(),
            Expression::Cmpeq(_, _)
            | Expression::Cmpneq(_, _)
            | Expression::Cmplts(_, _)
            | Expression::Cmpltu(_, _) => Type::Reg(1),
            Expression::Zext(bits, _)
            | Expression::Sext(bits, _)
            | Expression::Trun(bits, _) => Type::Reg(*bits),
            Expression::Extract(hi, lo, _) => Type::Reg(hi - lo + 1),
            Expression::Concat(lhs, rhs) => Type::Reg(lhs.bits() + rhs.bits()),
            Expression::Ite { true_case, .. } => true_case.sort(),
            Expression::Unknown { bits, .. } => Type::Reg(*bits),
            Expression::Lab(_) => Type::Reg(32),
        }
    }

    /// Return the width of this expression in bits.
    ///
    /// For memory-sorted expressions this is the address width.
    pub fn bits(&self) -> usize {
        self.sort().bits()
    }

    /// Ensures both operands are bit-vectors of the same width.
    fn ensure_sort(operation: &str, lhs: &Expression, rhs: &Expression) -> Result<()> {
        if lhs.sort() != rhs.sort() {
            bail!(ErrorKind::WidthMismatch(format!(
                "{}: lhs is {}, rhs is {}",
                operation,
                lhs.sort(),
                rhs.sort()
            )));
        }
        if !lhs.sort().is_reg() {
            bail!(ErrorKind::WidthMismatch(format!(
                "{}: operands have memory sort",
                operation
            )));
        }
        Ok(())
    }

    /// Create a new expression from a constant.
    pub fn constant(constant: Constant) -> Expression {
        Expression::Constant(constant)
    }

    /// Create a new expression from a variable.
    pub fn variable(variable: Variable) -> Expression {
        Expression::Variable(variable)
    }

    /// Create a load expression of `bits` width from the given memory.
    pub fn load(
        memory: Expression,
        index: Expression,
        endian: Endian,
        bits: usize,
    ) -> Result<Expression> {
        if !memory.sort().is_mem() {
            bail!(ErrorKind::WidthMismatch(
                "load: memory operand is not memory-sorted".to_string()
            ));
        }
        if index.sort() != Type::Reg(memory.sort().bits()) {
            bail!(ErrorKind::WidthMismatch(format!(
                "load: index is {}, memory addresses are {} bits",
                index.sort(),
                memory.sort().bits()
            )));
        }
        Ok(Expression::Load {
            memory: Box::new(memory),
            index: Box::new(index),
            endian,
            bits,
        })
    }

    /// Create a store expression, evaluating to the updated memory.
    pub fn store(
        memory: Expression,
        index: Expression,
        value: Expression,
        endian: Endian,
    ) -> Result<Expression> {
        if !memory.sort().is_mem() {
            bail!(ErrorKind::WidthMismatch(
                "store: memory operand is not memory-sorted".to_string()
            ));
        }
        if index.sort() != Type::Reg(memory.sort().bits()) {
            bail!(ErrorKind::WidthMismatch(format!(
                "store: index is {}, memory addresses are {} bits",
                index.sort(),
                memory.sort().bits()
            )));
        }
        if !value.sort().is_reg() {
            bail!(ErrorKind::WidthMismatch(
                "store: stored value has memory sort".to_string()
            ));
        }
        let bits = value.bits();
        Ok(Expression::Store {
            memory: Box::new(memory),
            index: Box::new(index),
            value: Box::new(value),
            endian,
            bits,
        })
    }

    /// Create a bitwise complement expression.
    pub fn not(src: Expression) -> Result<Expression> {
        if !src.sort().is_reg() {
            bail!(ErrorKind::WidthMismatch(
                "not: operand has memory sort".to_string()
            ));
        }
        Ok(Expression::Not(Box::new(src)))
    }

    /// Create a two's complement negation expression.
    pub fn neg(src: Expression) -> Result<Expression> {
        if !src.sort().is_reg() {
            bail!(ErrorKind::WidthMismatch(
                "neg: operand has memory sort".to_string()
            ));
        }
        Ok(Expression::Neg(Box::new(src)))
    }

    /// Create an addition expression.
    pub fn add(lhs: Expression, rhs: Expression) -> Result<Expression> {
        Expression::ensure_sort("add", &lhs, &rhs)?;
        Ok(Expression::Add(Box::new(lhs), Box::new(rhs)))
    }

    /// Create a subtraction expression.
    pub fn sub(lhs: Expression, rhs: Expression) -> Result<Expression> {
        Expression::ensure_sort("sub", &lhs, &rhs)?;
        Ok(Expression::Sub(Box::new(lhs), Box::new(rhs)))
    }

    /// Create a multiplication expression.
    pub fn mul(lhs: Expression, rhs: Expression) -> Result<Expression> {
        Expression::ensure_sort("mul", &lhs, &rhs)?;
        Ok(Expression::Mul(Box::new(lhs), Box::new(rhs)))
    }

    /// Create an unsigned division expression.
    pub fn divu(lhs: Expression, rhs: Expression) -> Result<Expression> {
        Expression::ensure_sort("divu", &lhs, &rhs)?;
        Ok(Expression::Divu(Box::new(lhs), Box::new(rhs)))
    }

    /// Create an unsigned modulus expression.
    pub fn modu(lhs: Expression, rhs: Expression) -> Result<Expression> {
        Expression::ensure_sort("modu", &lhs, &rhs)?;
        Ok(Expression::Modu(Box::new(lhs), Box::new(rhs)))
    }

    /// Create a signed division expression.
    pub fn divs(lhs: Expression, rhs: Expression) -> Result<Expression> {
        Expression::ensure_sort("divs", &lhs, &rhs)?;
        Ok(Expression::Divs(Box::new(lhs), Box::new(rhs)))
    }

    /// Create a signed modulus expression.
    pub fn mods(lhs: Expression, rhs: Expression) -> Result<Expression> {
        Expression::ensure_sort("mods", &lhs, &rhs)?;
        Ok(Expression::Mods(Box::new(lhs), Box::new(rhs)))
    }

    /// Create a binary and expression.
    pub fn and(lhs: Expression, rhs: Expression) -> Result<Expression> {
        Expression::ensure_sort("and", &lhs, &rhs)?;
        Ok(Expression::And(Box::new(lhs), Box::new(rhs)))
    }

    /// Create a binary or expression.
    pub fn or(lhs: Expression, rhs: Expression) -> Result<Expression> {
        Expression::ensure_sort("or", &lhs, &rhs)?;
        Ok(Expression::Or(Box::new(lhs), Box::new(rhs)))
    }

    /// Create a binary xor expression.
    pub fn xor(lhs: Expression, rhs: Expression) -> Result<Expression> {
        Expression::ensure_sort("xor", &lhs, &rhs)?;
        Ok(Expression::Xor(Box::new(lhs), Box::new(rhs)))
    }

    /// Create a logical shift-left expression.
    pub fn shl(lhs: Expression, rhs: Expression) -> Result<Expression> {
        Expression::ensure_sort("shl", &lhs, &rhs)?;
        Ok(Expression::Shl(Box::new(lhs), Box::new(rhs)))
    }

    /// Create a logical shift-right expression.
    pub fn shr(lhs: Expression, rhs: Expression) -> Result<Expression> {
        Expression::ensure_sort("shr", &lhs, &rhs)?;
        Ok(Expression::Shr(Box::new(lhs), Box::new(rhs)))
    }

    /// Create an arithmetic shift-right expression.
    pub fn sra(lhs: Expression, rhs: Expression) -> Result<Expression> {
        Expression::ensure_sort("sra", &lhs, &rhs)?;
        Ok(Expression::Sra(Box::new(lhs), Box::new(rhs)))
    }

    /// Create an equality comparison expression, of width 1.
    pub fn cmpeq(lhs: Expression, rhs: Expression) -> Result<Expression> {
        Expression::ensure_sort("cmpeq", &lhs, &rhs)?;
        Ok(Expression::Cmpeq(Box::new(lhs), Box::new(rhs)))
    }

    /// Create an inequality comparison expression, of width 1.
    pub fn cmpneq(lhs: Expression, rhs: Expression) -> Result<Expression> {
        Expression::ensure_sort("cmpneq", &lhs, &rhs)?;
        Ok(Expression::Cmpneq(Box::new(lhs), Box::new(rhs)))
    }

    /// Create a signed less-than comparison expression, of width 1.
    pub fn cmplts(lhs: Expression, rhs: Expression) -> Result<Expression> {
        Expression::ensure_sort("cmplts", &lhs, &rhs)?;
        Ok(Expression::Cmplts(Box::new(lhs), Box::new(rhs)))
    }

    /// Create an unsigned less-than comparison expression, of width 1.
    pub fn cmpltu(lhs: Expression, rhs: Expression) -> Result<Expression> {
        Expression::ensure_sort("cmpltu", &lhs, &rhs)?;
        Ok(Expression::Cmpltu(Box::new(lhs), Box::new(rhs)))
    }

    /// Zero-extend src to the given number of bits.
    pub fn zext(bits: usize, src: Expression) -> Result<Expression> {
        if !src.sort().is_reg() || src.bits() >= bits {
            bail!(ErrorKind::WidthMismatch(format!(
                "zext: cannot extend {} to {} bits",
                src.sort(),
                bits
            )));
        }
        Ok(Expression::Zext(bits, Box::new(src)))
    }

    /// Sign-extend src to the given number of bits.
    pub fn sext(bits: usize, src: Expression) -> Result<Expression> {
        if !src.sort().is_reg() || src.bits() >= bits {
            bail!(ErrorKind::WidthMismatch(format!(
                "sext: cannot extend {} to {} bits",
                src.sort(),
                bits
            )));
        }
        Ok(Expression::Sext(bits, Box::new(src)))
    }

    /// Truncate src to the given number of bits, keeping the low bits.
    pub fn trun(bits: usize, src: Expression) -> Result<Expression> {
        if !src.sort().is_reg() || src.bits() <= bits {
            bail!(ErrorKind::WidthMismatch(format!(
                "trun: cannot truncate {} to {} bits",
                src.sort(),
                bits
            )));
        }
        Ok(Expression::Trun(bits, Box::new(src)))
    }

    /// Extract bits `hi..=lo` of src.
    pub fn extract(hi: usize, lo: usize, src: Expression) -> Result<Expression> {
        if !src.sort().is_reg() || hi < lo || hi >= src.bits() {
            bail!(ErrorKind::WidthMismatch(format!(
                "extract: bits {}..{} of {}",
                hi,
                lo,
                src.sort()
            )));
        }
        Ok(Expression::Extract(hi, lo, Box::new(src)))
    }

    /// Concatenate two bit-vectors; lhs forms the high bits of the result.
    pub fn concat(lhs: Expression, rhs: Expression) -> Result<Expression> {
        if !lhs.sort().is_reg() || !rhs.sort().is_reg() {
            bail!(ErrorKind::WidthMismatch(
                "concat: operands must be bit-vectors".to_string()
            ));
        }
        Ok(Expression::Concat(Box::new(lhs), Box::new(rhs)))
    }

    /// Create an if-then-else expression over a 1-bit condition.
    pub fn ite(
        condition: Expression,
        true_case: Expression,
        false_case: Expression,
    ) -> Result<Expression> {
        if condition.sort() != Type::Reg(1) {
            bail!(ErrorKind::WidthMismatch(format!(
                "ite: condition is {}, must be u1",
                condition.sort()
            )));
        }
        if true_case.sort() != false_case.sort() {
            bail!(ErrorKind::WidthMismatch(format!(
                "ite: true case is {}, false case is {}",
                true_case.sort(),
                false_case.sort()
            )));
        }
        Ok(Expression::Ite {
            condition: Box::new(condition),
            true_case: Box::new(true_case),
            false_case: Box::new(false_case),
        })
    }

    /// Create a havoc value of the given width.
    pub fn unknown<S>(reason: S, bits: usize) -> Expression
    where
        S: Into<String>,
    {
        Expression::Unknown {
            reason: reason.into(),
            bits,
        }
    }

    /// Create a reference to a named label.
    pub fn lab<S>(name: S) -> Expression
    where
        S: Into<String>,
    {
        Expression::Lab(name.into())
    }

    /// Recheck the width invariants of this expression tree.
    ///
    /// Expressions built through the constructors above always satisfy these;
    /// this walk exists so consumers can assert them over whole statement
    /// sequences.
    pub fn validate(&self) -> Result<()> {
        match self {
            Expression::Constant(_) | Expression::Variable(_) | Expression::Lab(_) => Ok(()),
            Expression::Unknown { .. } => Ok(()),
            Expression::Load { memory, index, .. } => {
                if !memory.sort().is_mem() || index.sort() != Type::Reg(memory.sort().bits()) {
                    bail!(ErrorKind::WidthMismatch("load".to_string()));
                }
                memory.validate()?;
                index.validate()
            }
            Expression::Store {
                memory,
                index,
                value,
                bits,
                ..
            } => {
                if !memory.sort().is_mem()
                    || index.sort() != Type::Reg(memory.sort().bits())
                    || value.sort() != Type::Reg(*bits)
                {
                    bail!(ErrorKind::WidthMismatch("store".to_string()));
                }
                memory.validate()?;
                index.validate()?;
                value.validate()
            }
            Expression::Not(src) | Expression::Neg(src) => {
                if !src.sort().is_reg() {
                    bail!(ErrorKind::WidthMismatch("unary".to_string()));
                }
                src.validate()
            }
            Expression::Add(lhs, rhs)
            | Expression::Sub(lhs, rhs)
            | Expression::Mul(lhs, rhs)
            | Expression::Divu(lhs, rhs)
            | Expression::Modu(lhs, rhs)
            | Expression::Divs(lhs, rhs)
            | Expression::Mods(lhs, rhs)
            | Expression::And(lhs, rhs)
            | Expression::Or(lhs, rhs)
            | Expression::Xor(lhs, rhs)
            | Expression::Shl(lhs, rhs)
            | Expression::Shr(lhs, rhs)
            | Expression::Sra(lhs, rhs)
            | Expression::Cmpeq(lhs, rhs)
            | Expression::Cmpneq(lhs, rhs)
            | Expression::Cmplts(lhs, rhs)
            | Expression::Cmpltu(lhs, rhs) => {
                if lhs.sort() != rhs.sort() || !lhs.sort().is_reg() {
                    bail!(ErrorKind::WidthMismatch(format!(
                        "binop: {} against {}",
                        lhs.sort(),
                        rhs.sort()
                    )));
                }
                lhs.validate()?;
                rhs.validate()
            }
            Expression::Zext(bits, src) | Expression::Sext(bits, src) => {
                if !src.sort().is_reg() || src.bits() >= *bits {
                    bail!(ErrorKind::WidthMismatch("extend".to_string()));
                }
                src.validate()
            }
            Expression::Trun(bits, src) => {
                if !src.sort().is_reg() || src.bits() <= *bits {
                    bail!(ErrorKind::WidthMismatch("trun".to_string()));
                }
                src.validate()
            }
            Expression::Extract(hi, lo, src) => {
                if !src.sort().is_reg() || hi < lo || *hi >= src.bits() {
                    bail!(ErrorKind::WidthMismatch("extract".to_string()));
                }
                src.validate()
            }
            Expression::Concat(lhs, rhs) => {
                if !lhs.sort().is_reg() || !rhs.sort().is_reg() {
                    bail!(ErrorKind::WidthMismatch("concat".to_string()));
                }
                lhs.validate()?;
                rhs.validate()
            }
            Expression::Ite {
                condition,
                true_case,
                false_case,
            } => {
                if condition.sort() != Type::Reg(1) || true_case.sort() != false_case.sort() {
                    bail!(ErrorKind::WidthMismatch("ite".to_string()));
                }
                condition.validate()?;
                true_case.validate()?;
                false_case.validate()
            }
        }
    }

    /// Returns all variables used in this expression.
    pub fn variables(&self) -> Vec<&Variable> {
        let mut variables: Vec<&Variable> = Vec::new();
        match self {
            Expression::Variable(variable) => variables.push(variable),
            Expression::Constant(_) | Expression::Unknown { .. } | Expression::Lab(_) => {}
            Expression::Load { memory, index, .. } => {
                variables.append(&mut memory.variables());
                variables.append(&mut index.variables());
            }
            Expression::Store {
                memory,
                index,
                value,
                ..
            } => {
                variables.append(&mut memory.variables());
                variables.append(&mut index.variables());
                variables.append(&mut value.variables());
            }
            Expression::Add(lhs, rhs)
            | Expression::Sub(lhs, rhs)
            | Expression::Mul(lhs, rhs)
            | Expression::Divu(lhs, rhs)
            | Expression::Modu(lhs, rhs)
            | Expression::Divs(lhs, rhs)
            | Expression::Mods(lhs, rhs)
            | Expression::And(lhs, rhs)
            | Expression::Or(lhs, rhs)
            | Expression::Xor(lhs, rhs)
            | Expression::Shl(lhs, rhs)
            | Expression::Shr(lhs, rhs)
            | Expression::Sra(lhs, rhs)
            | Expression::Cmpeq(lhs, rhs)
            | Expression::Cmpneq(lhs, rhs)
            | Expression::Cmplts(lhs, rhs)
            | Expression::Cmpltu(lhs, rhs)
            | Expression::Concat(lhs, rhs) => {
                variables.append(&mut lhs.variables());
                variables.append(&mut rhs.variables());
            }
            Expression::Not(src)
            | Expression::Neg(src)
            | Expression::Zext(_, src)
            | Expression::Sext(_, src)
            | Expression::Trun(_, src) => {
                variables.append(&mut src.variables());
            }
            Expression::Extract(_, _, src) => {
                variables.append(&mut src.variables());
            }
            Expression::Ite {
                condition,
                true_case,
                false_case,
            } => {
                variables.append(&mut condition.variables());
                variables.append(&mut true_case.variables());
                variables.append(&mut false_case.variables());
            }
        }
        variables
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Expression::Constant(c) => c.fmt(f),
            Expression::Variable(v) => v.fmt(f),
            Expression::Load { index, bits, .. } => write!(f, "[{}]:{}", index, bits),
            Expression::Store { index, value, .. } => {
                write!(f, "(mem with [{}] = {})", index, value)
            }
            Expression::Not(src) => write!(f, "~{}", src),
            Expression::Neg(src) => write!(f, "-{}", src),
            Expression::Add(lhs, rhs) => write!(f, "({} + {})", lhs, rhs),
            Expression::Sub(lhs, rhs) => write!(f, "({} - {})", lhs, rhs),
            Expression::Mul(lhs, rhs) => write!(f, "({} * {})", lhs, rhs),
            Expression::Divu(lhs, rhs) => write!(f, "({} /u {})", lhs, rhs),
            Expression::Modu(lhs, rhs) => write!(f, "({} %u {})", lhs, rhs),
            Expression::Divs(lhs, rhs) => write!(f, "({} /s {})", lhs, rhs),
            Expression::Mods(lhs, rhs) => write!(f, "({} %s {})", lhs, rhs),
            Expression::And(lhs, rhs) => write!(f, "({} & {})", lhs, rhs),
            Expression::Or(lhs, rhs) => write!(f, "({} | {})", lhs, rhs),
            Expression::Xor(lhs, rhs) => write!(f, "({} ^ {})", lhs, rhs),
            Expression::Shl(lhs, rhs) => write!(f, "({} << {})", lhs, rhs),
            Expression::Shr(lhs, rhs) => write!(f, "({} >> {})", lhs, rhs),
            Expression::Sra(lhs, rhs) => write!(f, "({} >>s {})", lhs, rhs),
            Expression::Cmpeq(lhs, rhs) => write!(f, "({} == {})", lhs, rhs),
            Expression::Cmpneq(lhs, rhs) => write!(f, "({} != {})", lhs, rhs),
            Expression::Cmplts(lhs, rhs) => write!(f, "({} <s {})", lhs, rhs),
            Expression::Cmpltu(lhs, rhs) => write!(f, "({} <u {})", lhs, rhs),
            Expression::Zext(bits, src) => write!(f, "zext.{}({})", bits, src),
            Expression::Sext(bits, src) => write!(f, "sext.{}({})", bits, src),
            Expression::Trun(bits, src) => write!(f, "trun.{}({})", bits, src),
            Expression::Extract(hi, lo, src) => write!(f, "extract.{}.{}({})", hi, lo, src),
            Expression::Concat(lhs, rhs) => write!(f, "({} @ {})", lhs, rhs),
            Expression::Ite {
                condition,
                true_case,
                false_case,
            } => write!(f, "ite({}, {}, {})", condition, true_case, false_case),
            Expression::Unknown { reason, bits } => write!(f, "unknown:{}({})", bits, reason),
            Expression::Lab(name) => write!(f, "lab({})", name),
        }
    }
}
