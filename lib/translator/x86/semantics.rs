//! The semantic emitter.
//!
//! Translates a classified `Opcode` into IL statements, including the six
//! arithmetic flags, string-operation repeat wrappers, segment-qualified
//! loads and stores, and bit-preserving sub-register writes.

use crate::architecture::Endian;
use crate::error::*;
use crate::il::*;
use crate::translator::x86::opcode::{AluOp, Cc, Condition, Opcode, ShiftOp, StringOp};
use crate::translator::x86::operand::Operand;
use crate::translator::x86::prefix::Prefixes;
use crate::translator::x86::register::{self, get_register};

pub(crate) struct Semantics<'p> {
    prefixes: &'p Prefixes,
    /// The address this instruction was lifted from.
    address: u64,
    /// The address of the following instruction.
    next_address: u64,
    /// Monotone counter for fresh temporaries, threaded through this lift.
    temp_index: u64,
    statements: Vec<Statement>,
}

impl<'p> Semantics<'p> {
    pub fn new(prefixes: &'p Prefixes, address: u64, next_address: u64) -> Semantics<'p> {
        Semantics {
            prefixes,
            address,
            next_address,
            temp_index: 0,
            statements: Vec::new(),
        }
    }

    pub fn into_statements(self) -> Vec<Statement> {
        self.statements
    }

    fn temp(&mut self, bits: usize) -> Variable {
        let temp = Variable::temp(self.address, self.temp_index, bits);
        self.temp_index += 1;
        temp
    }

    fn push(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    fn assign(&mut self, dst: Variable, src: Expression) -> Result<()> {
        let statement = Statement::assign(dst, src)?;
        self.push(statement);
        Ok(())
    }

    /// Assign an expression to a fresh temporary and return the temporary.
    fn capture(&mut self, src: Expression) -> Result<Variable> {
        let temp = self.temp(src.bits());
        self.assign(temp.clone(), src)?;
        Ok(temp)
    }

    /// The effective address with the prefix's segment base added, if any.
    fn segmented(&self, ea: Expression) -> Result<Expression> {
        match self.prefixes.segment_base() {
            Some(base) => Expression::add(base.into(), ea),
            None => Ok(ea),
        }
    }

    /// A load from the raw effective address, without segment base.
    fn load(&self, ea: Expression, bits: usize) -> Result<Expression> {
        Expression::load(register::mem().into(), ea, Endian::Little, bits)
    }

    /// A load honoring the instruction's segment override.
    fn load_s(&self, ea: Expression, bits: usize) -> Result<Expression> {
        let ea = self.segmented(ea)?;
        self.load(ea, bits)
    }

    /// Store to the raw effective address, without segment base.
    fn store(&mut self, ea: Expression, value: Expression) -> Result<()> {
        let mem = register::mem();
        let store = Expression::store(mem.clone().into(), ea, value, Endian::Little)?;
        self.assign(mem, store)
    }

    /// Store honoring the instruction's segment override.
    fn store_s(&mut self, ea: Expression, value: Expression) -> Result<()> {
        let ea = self.segmented(ea)?;
        self.store(ea, value)
    }

    /// Gets the value of an operand as an IL expression, performing any
    /// required loads.
    fn operand_value(&mut self, operand: &Operand, bits: usize) -> Result<Expression> {
        match operand {
            Operand::Register(encoding) => get_register(*encoding, bits)?.get(),
            Operand::Memory(ea) => self.load_s(ea.clone(), bits),
            Operand::Immediate(constant) => {
                if constant.bits() != bits {
                    bail!(ErrorKind::WidthMismatch(format!(
                        "immediate is {} bits, operand is {} bits",
                        constant.bits(),
                        bits
                    )));
                }
                Ok(constant.clone().into())
            }
        }
    }

    /// Stores a value in an operand, performing any stores as necessary.
    fn operand_store(&mut self, operand: &Operand, bits: usize, value: Expression) -> Result<()> {
        match operand {
            Operand::Register(encoding) => {
                let statement = get_register(*encoding, bits)?.set(value)?;
                self.push(statement);
                Ok(())
            }
            Operand::Memory(ea) => self.store_s(ea.clone(), value),
            Operand::Immediate(_) => Err(ErrorKind::UnsupportedOperandForm(
                "store".to_string(),
                "destination is an immediate".to_string(),
            )
            .into()),
        }
    }

    fn simd_register(&self, encoding: usize, bits: usize) -> Variable {
        if bits == 128 {
            register::xmm(encoding)
        } else {
            register::mm(encoding)
        }
    }

    fn simd_value(&mut self, operand: &Operand, bits: usize) -> Result<Expression> {
        match operand {
            Operand::Register(encoding) => Ok(self.simd_register(*encoding, bits).into()),
            Operand::Memory(ea) => self.load_s(ea.clone(), bits),
            Operand::Immediate(_) => Err(ErrorKind::UnsupportedOperandForm(
                "simd".to_string(),
                "operand is an immediate".to_string(),
            )
            .into()),
        }
    }

    fn simd_store(&mut self, operand: &Operand, bits: usize, value: Expression) -> Result<()> {
        match operand {
            Operand::Register(encoding) => {
                let register = self.simd_register(*encoding, bits);
                self.assign(register, value)
            }
            Operand::Memory(ea) => self.store_s(ea.clone(), value),
            Operand::Immediate(_) => Err(ErrorKind::UnsupportedOperandForm(
                "simd".to_string(),
                "destination is an immediate".to_string(),
            )
            .into()),
        }
    }

    /// The high bit of an expression, as a 1-bit value.
    fn high_bit(expression: Expression) -> Result<Expression> {
        let bits = expression.bits();
        Expression::extract(bits - 1, bits - 1, expression)
    }

    /// Even parity of the low 8 bits, by xor-cascade.
    fn parity_expression(result: Expression) -> Result<Expression> {
        let byte = if result.bits() > 8 {
            Expression::trun(8, result)?
        } else {
            result
        };
        let fold = Expression::xor(byte.clone(), Expression::shr(byte, expr_const(4, 8))?)?;
        let fold = Expression::xor(fold.clone(), Expression::shr(fold, expr_const(2, 8))?)?;
        let fold = Expression::xor(fold.clone(), Expression::shr(fold, expr_const(1, 8))?)?;
        Expression::cmpeq(
            Expression::and(fold, expr_const(1, 8))?,
            expr_const(0, 8),
        )
    }

    fn zf_expression(result: Expression) -> Result<Expression> {
        let bits = result.bits();
        Expression::cmpeq(result, expr_const(0, bits))
    }

    fn sf_expression(result: Expression) -> Result<Expression> {
        Semantics::high_bit(result)
    }

    /// AF is bit 4 of `result ^ lhs ^ rhs`, for both additions and
    /// subtractions.
    fn af_expression(result: Expression, lhs: Expression, rhs: Expression) -> Result<Expression> {
        let mix = Expression::xor(Expression::xor(result, lhs)?, rhs)?;
        Expression::extract(4, 4, mix)
    }

    fn of_add_expression(
        result: Expression,
        lhs: Expression,
        rhs: Expression,
    ) -> Result<Expression> {
        let same_sign = Expression::not(Expression::xor(lhs.clone(), rhs)?)?;
        let flipped = Expression::xor(lhs, result)?;
        Semantics::high_bit(Expression::and(same_sign, flipped)?)
    }

    fn of_sub_expression(
        result: Expression,
        lhs: Expression,
        rhs: Expression,
    ) -> Result<Expression> {
        let differing_sign = Expression::xor(lhs.clone(), rhs)?;
        let flipped = Expression::xor(lhs, result)?;
        Semantics::high_bit(Expression::and(differing_sign, flipped)?)
    }

    fn set_zf(&mut self, result: Expression) -> Result<()> {
        let expression = Semantics::zf_expression(result)?;
        self.assign(register::zf(), expression)
    }

    fn set_sf(&mut self, result: Expression) -> Result<()> {
        let expression = Semantics::sf_expression(result)?;
        self.assign(register::sf(), expression)
    }

    fn set_pf(&mut self, result: Expression) -> Result<()> {
        let expression = Semantics::parity_expression(result)?;
        self.assign(register::pf(), expression)
    }

    /// Set PF, SF and ZF from a result.
    fn set_pszf(&mut self, result: Expression) -> Result<()> {
        self.set_pf(result.clone())?;
        self.set_sf(result.clone())?;
        self.set_zf(result)
    }

    /// Set AF, PF, SF and ZF from a result and both operands.
    fn set_apszf(
        &mut self,
        result: Expression,
        lhs: Expression,
        rhs: Expression,
    ) -> Result<()> {
        let af = Semantics::af_expression(result.clone(), lhs, rhs)?;
        self.assign(register::af(), af)?;
        self.set_pszf(result)
    }

    /// Set AF, OF, PF, SF and ZF for an addition. CF is left alone, as inc
    /// requires.
    fn set_aopszf_add(
        &mut self,
        result: Expression,
        lhs: Expression,
        rhs: Expression,
    ) -> Result<()> {
        let of = Semantics::of_add_expression(result.clone(), lhs.clone(), rhs.clone())?;
        self.assign(register::of(), of)?;
        self.set_apszf(result, lhs, rhs)
    }

    /// Set AF, OF, PF, SF and ZF for a subtraction. CF is left alone, as dec
    /// requires.
    fn set_aopszf_sub(
        &mut self,
        result: Expression,
        lhs: Expression,
        rhs: Expression,
    ) -> Result<()> {
        let of = Semantics::of_sub_expression(result.clone(), lhs.clone(), rhs.clone())?;
        self.assign(register::of(), of)?;
        self.set_apszf(result, lhs, rhs)
    }

    /// Set all six flags for an addition.
    fn set_flags_add(
        &mut self,
        result: Expression,
        lhs: Expression,
        rhs: Expression,
    ) -> Result<()> {
        let cf = Expression::cmpltu(result.clone(), lhs.clone())?;
        self.assign(register::cf(), cf)?;
        self.set_aopszf_add(result, lhs, rhs)
    }

    /// Set all six flags for a subtraction.
    fn set_flags_sub(
        &mut self,
        result: Expression,
        lhs: Expression,
        rhs: Expression,
    ) -> Result<()> {
        let cf = Expression::cmpltu(lhs.clone(), rhs.clone())?;
        self.assign(register::cf(), cf)?;
        self.set_aopszf_sub(result, lhs, rhs)
    }

    fn set_flag_unknown(&mut self, flag: Variable, reason: &str) -> Result<()> {
        self.assign(flag, Expression::unknown(reason, 1))
    }

    /// The 1-bit expression for a condition code, over the current flags.
    fn condition_expression(&self, condition: &Condition) -> Result<Expression> {
        let cf: Expression = register::cf().into();
        let zf: Expression = register::zf().into();
        let sf: Expression = register::sf().into();
        let of: Expression = register::of().into();
        let expression = match condition.cc {
            Cc::Overflow => of,
            Cc::Below => cf,
            Cc::Zero => zf,
            Cc::BelowOrEqual => Expression::or(cf, zf)?,
            Cc::Sign => sf,
            Cc::Less => Expression::xor(sf, of)?,
            Cc::LessOrEqual => Expression::or(zf, Expression::xor(sf, of)?)?,
        };
        if condition.negate {
            Expression::cmpeq(expression, expr_const(0, 1))
        } else {
            Ok(expression)
        }
    }

    /// Emit the statements for one classified instruction.
    pub fn emit(&mut self, opcode: &Opcode) -> Result<()> {
        match opcode {
            Opcode::Alu { op, bits, dst, src } => self.alu(*op, *bits, dst, src),
            Opcode::Test { bits, lhs, rhs } => self.test(*bits, lhs, rhs),
            Opcode::Not { bits, dst } => self.not(*bits, dst),
            Opcode::Neg { bits, dst } => self.neg(*bits, dst),
            Opcode::Mov { bits, dst, src } => self.mov(*bits, dst, src),
            Opcode::Movx {
                sign,
                bits,
                src_bits,
                dst,
                src,
            } => self.movx(*sign, *bits, *src_bits, *dst, src),
            Opcode::Lea { bits, dst, ea } => self.lea(*bits, *dst, ea),
            Opcode::Shift {
                op,
                bits,
                dst,
                count,
            } => self.shift(*op, *bits, dst, count),
            Opcode::Shiftd {
                left,
                bits,
                dst,
                fill,
                count,
            } => self.shiftd(*left, *bits, dst, *fill, count),
            Opcode::Inc { bits, dst } => self.inc_dec(true, *bits, dst),
            Opcode::Dec { bits, dst } => self.inc_dec(false, *bits, dst),
            Opcode::Push { bits, src } => self.push_op(*bits, src),
            Opcode::Pop { bits, dst } => self.pop_op(*bits, dst),
            Opcode::Pushf { bits } => self.pushf(*bits),
            Opcode::Popf { bits } => self.popf(*bits),
            Opcode::Sahf => self.sahf(),
            Opcode::Lahf => self.lahf(),
            Opcode::Xchg { bits, lhs, rhs } => self.xchg(*bits, lhs, *rhs),
            Opcode::Xadd { bits, dst, src } => self.xadd(*bits, dst, *src),
            Opcode::Cmpxchg { bits, dst, src } => self.cmpxchg(*bits, dst, *src),
            Opcode::Cmpxchg8b { dst } => self.cmpxchg8b(dst),
            Opcode::Imul {
                bits,
                dst,
                lhs,
                rhs,
            } => self.imul(*bits, *dst, lhs, rhs),
            Opcode::Mul { bits, src } => self.mul(*bits, src),
            Opcode::Div { bits, signed, src } => self.div(*bits, *signed, src),
            Opcode::Jcc { condition, target } => self.jcc(condition, *target),
            Opcode::Jmp { target } => self.jmp(target),
            Opcode::Call { target } => self.call(target),
            Opcode::Ret { pop } => self.ret(*pop),
            Opcode::Setcc { condition, dst } => self.setcc(condition, dst),
            Opcode::String { op, bits } => self.string_op(*op, *bits),
            Opcode::Cbw { bits } => self.cbw(*bits),
            Opcode::Cwd { bits } => self.cwd(*bits),
            Opcode::Clc => self.assign(register::cf(), expr_const(0, 1)),
            Opcode::Stc => self.assign(register::cf(), expr_const(1, 1)),
            Opcode::Cmc => {
                let flipped =
                    Expression::xor(register::cf().into(), expr_const(1, 1))?;
                self.assign(register::cf(), flipped)
            }
            Opcode::Cld => self.assign(register::dflag(), expr_const(1, 32)),
            Opcode::Std => self.assign(register::dflag(), expr_const(0xffff_ffff, 32)),
            Opcode::Leave => self.leave(),
            Opcode::Halt => {
                self.push(Statement::branch(Expression::lab(
                    "General_protection_fault",
                )));
                Ok(())
            }
            Opcode::Int { vector } => {
                self.push(Statement::intrinsic(format!("int 0x{:x}", vector)));
                Ok(())
            }
            Opcode::Sysenter => {
                self.push(Statement::intrinsic("syscall"));
                Ok(())
            }
            Opcode::Cpuid => {
                for register in &[
                    register::eax(),
                    register::ebx(),
                    register::ecx(),
                    register::edx(),
                ] {
                    self.assign(register.clone(), Expression::unknown("cpuid", 32))?;
                }
                Ok(())
            }
            Opcode::Rdtsc => {
                self.assign(register::eax(), Expression::unknown("rdtsc", 32))?;
                self.assign(register::edx(), Expression::unknown("rdtsc", 32))
            }
            Opcode::Nop => Ok(()),
            Opcode::Bt {
                set,
                bits,
                base,
                offset,
            } => self.bt(*set, *bits, base, offset),
            Opcode::Bsf {
                reverse,
                bits,
                dst,
                src,
            } => self.bsf(*reverse, *bits, *dst, src),
            Opcode::MovSimd { bits, dst, src } => {
                let value = self.simd_value(src, *bits)?;
                self.simd_store(dst, *bits, value)
            }
            Opcode::MovdToSimd { bits, dst, src } => {
                let value = self.operand_value(src, 32)?;
                let register = self.simd_register(*dst, *bits);
                let value = Expression::zext(*bits, value)?;
                self.assign(register, value)
            }
            Opcode::MovdFromSimd { bits, dst, src } => {
                let register = self.simd_register(*src, *bits);
                let value = Expression::extract(31, 0, register.into())?;
                self.operand_store(dst, 32, value)
            }
            Opcode::Pxor { bits, dst, src } => {
                let lhs: Expression = self.simd_register(*dst, *bits).into();
                let rhs = self.simd_value(src, *bits)?;
                let register = self.simd_register(*dst, *bits);
                let value = Expression::xor(lhs, rhs)?;
                self.assign(register, value)
            }
            Opcode::Pcmpeq {
                lane_bits,
                bits,
                dst,
                src,
            } => self.pcmpeq(*lane_bits, *bits, *dst, src),
            Opcode::Pshuf {
                bits,
                dst,
                src,
                order,
            } => self.pshuf(*bits, *dst, src, *order),
            Opcode::Palignr {
                bits,
                dst,
                src,
                shift,
            } => self.palignr(*bits, *dst, src, *shift),
            Opcode::Pmovmskb { bits, dst, src } => self.pmovmskb(*bits, *dst, *src),
            Opcode::Ldmxcsr { src } => {
                let value = self.operand_value(src, 32)?;
                self.assign(register::mxcsr(), value)
            }
            Opcode::Stmxcsr { dst } => {
                self.operand_store(dst, 32, register::mxcsr().into())
            }
            Opcode::Fldcw { src } => {
                let value = self.operand_value(src, 16)?;
                self.assign(register::fpu_control(), value)
            }
            Opcode::Fnstcw { dst } => {
                self.operand_store(dst, 16, register::fpu_control().into())
            }
        }
    }

    fn alu(&mut self, op: AluOp, bits: usize, dst: &Operand, src: &Operand) -> Result<()> {
        // xor of a register with itself is an idiom for zeroing; short-circuit
        // to the architecturally defined constants
        if op == AluOp::Xor {
            if let (Operand::Register(d), Operand::Register(s)) = (dst, src) {
                if d == s {
                    let statement = get_register(*d, bits)?.set(expr_const(0, bits))?;
                    self.push(statement);
                    self.assign(register::zf(), expr_const(1, 1))?;
                    self.assign(register::pf(), expr_const(1, 1))?;
                    self.assign(register::sf(), expr_const(0, 1))?;
                    self.assign(register::cf(), expr_const(0, 1))?;
                    self.assign(register::of(), expr_const(0, 1))?;
                    self.set_flag_unknown(register::af(), "af after logic op")?;
                    return Ok(());
                }
            }
        }

        let lhs = self.operand_value(dst, bits)?;
        let lhs = self.capture(lhs)?;
        let rhs = self.operand_value(src, bits)?;
        let rhs = self.capture(rhs)?;

        // sbb subtracts rhs plus the carry in; fold the carry into rhs so the
        // subtraction flag rules apply unchanged
        let rhs = if op == AluOp::Sbb {
            let carry = Expression::zext(bits, register::cf().into())?;
            let sum = Expression::add(rhs.into(), carry)?;
            self.capture(sum)?
        } else {
            rhs
        };

        let expression = match op {
            AluOp::Add => Expression::add(lhs.clone().into(), rhs.clone().into())?,
            AluOp::Adc => {
                let carry = Expression::zext(bits, register::cf().into())?;
                let sum = Expression::add(lhs.clone().into(), rhs.clone().into())?;
                Expression::add(sum, carry)?
            }
            AluOp::Sub | AluOp::Sbb | AluOp::Cmp => {
                Expression::sub(lhs.clone().into(), rhs.clone().into())?
            }
            AluOp::And => Expression::and(lhs.clone().into(), rhs.clone().into())?,
            AluOp::Or => Expression::or(lhs.clone().into(), rhs.clone().into())?,
            AluOp::Xor => Expression::xor(lhs.clone().into(), rhs.clone().into())?,
        };
        let result = self.capture(expression)?;

        match op {
            AluOp::Add | AluOp::Adc => {
                self.set_flags_add(result.clone().into(), lhs.into(), rhs.into())?
            }
            AluOp::Sub | AluOp::Sbb | AluOp::Cmp => {
                self.set_flags_sub(result.clone().into(), lhs.into(), rhs.into())?
            }
            AluOp::And | AluOp::Or | AluOp::Xor => {
                self.assign(register::of(), expr_const(0, 1))?;
                self.assign(register::cf(), expr_const(0, 1))?;
                self.set_flag_unknown(register::af(), "af after logic op")?;
                self.set_pszf(result.clone().into())?;
            }
        }

        if op != AluOp::Cmp {
            self.operand_store(dst, bits, result.into())?;
        }
        Ok(())
    }

    fn test(&mut self, bits: usize, lhs: &Operand, rhs: &Operand) -> Result<()> {
        let lhs = self.operand_value(lhs, bits)?;
        let rhs = self.operand_value(rhs, bits)?;
        let result = self.capture(Expression::and(lhs, rhs)?)?;

        self.assign(register::of(), expr_const(0, 1))?;
        self.assign(register::cf(), expr_const(0, 1))?;
        self.set_flag_unknown(register::af(), "af after logic op")?;
        self.set_pszf(result.into())
    }

    fn not(&mut self, bits: usize, dst: &Operand) -> Result<()> {
        let value = self.operand_value(dst, bits)?;
        let result = Expression::not(value)?;
        self.operand_store(dst, bits, result)
    }

    fn neg(&mut self, bits: usize, dst: &Operand) -> Result<()> {
        let value = self.operand_value(dst, bits)?;
        let value = self.capture(value)?;
        let result = self.capture(Expression::neg(value.clone().into())?)?;
        self.set_flags_sub(
            result.clone().into(),
            expr_const(0, bits),
            value.into(),
        )?;
        self.operand_store(dst, bits, result.into())
    }

    fn mov(&mut self, bits: usize, dst: &Operand, src: &Operand) -> Result<()> {
        let value = self.operand_value(src, bits)?;
        self.operand_store(dst, bits, value)
    }

    fn movx(
        &mut self,
        sign: bool,
        bits: usize,
        src_bits: usize,
        dst: usize,
        src: &Operand,
    ) -> Result<()> {
        let value = self.operand_value(src, src_bits)?;
        let value = if src_bits == bits {
            // movzx r16, r/m16 under the operand-size override
            value
        } else if sign {
            Expression::sext(bits, value)?
        } else {
            Expression::zext(bits, value)?
        };
        let statement = get_register(dst, bits)?.set(value)?;
        self.push(statement);
        Ok(())
    }

    fn lea(&mut self, bits: usize, dst: usize, ea: &Expression) -> Result<()> {
        let value = if bits == 16 {
            Expression::trun(16, ea.clone())?
        } else {
            ea.clone()
        };
        let statement = get_register(dst, bits)?.set(value)?;
        self.push(statement);
        Ok(())
    }

    fn shift_count(&mut self, bits: usize, count: &Operand) -> Result<Expression> {
        let count = match count {
            Operand::Immediate(constant) => expr_const(constant.value(), bits),
            Operand::Register(encoding) => {
                let cl = get_register(*encoding, 8)?.get()?;
                if bits == 8 {
                    cl
                } else {
                    Expression::zext(bits, cl)?
                }
            }
            Operand::Memory(_) => {
                bail!(ErrorKind::UnsupportedOperandForm(
                    "shift".to_string(),
                    "count must be an immediate or cl".to_string(),
                ));
            }
        };
        Ok(Expression::and(count, expr_const(31, bits))?)
    }

    fn shift(&mut self, op: ShiftOp, bits: usize, dst: &Operand, count: &Operand) -> Result<()> {
        let value = self.operand_value(dst, bits)?;
        let value = self.capture(value)?;
        let count = self.shift_count(bits, count)?;
        let count = self.capture(count)?;

        let count_is_zero =
            Expression::cmpeq(count.clone().into(), expr_const(0, bits))?;
        let count_is_one = Expression::cmpeq(count.clone().into(), expr_const(1, bits))?;
        let back_count = Expression::sub(
            expr_const(bits as u64, bits),
            count.clone().into(),
        )?;

        let shifted = match op {
            ShiftOp::Shl => Expression::shl(value.clone().into(), count.clone().into())?,
            ShiftOp::Shr => Expression::shr(value.clone().into(), count.clone().into())?,
            ShiftOp::Sar => Expression::sra(value.clone().into(), count.clone().into())?,
            ShiftOp::Rol => {
                let rotated = Expression::or(
                    Expression::shl(value.clone().into(), count.clone().into())?,
                    Expression::shr(value.clone().into(), back_count.clone())?,
                )?;
                // a zero count would shift right by the full width
                Expression::ite(count_is_zero.clone(), value.clone().into(), rotated)?
            }
            ShiftOp::Ror => {
                let rotated = Expression::or(
                    Expression::shr(value.clone().into(), count.clone().into())?,
                    Expression::shl(value.clone().into(), back_count.clone())?,
                )?;
                Expression::ite(count_is_zero.clone(), value.clone().into(), rotated)?
            }
        };
        let result = self.capture(shifted)?;

        match op {
            ShiftOp::Rol | ShiftOp::Ror => {
                // the rotate carry chain is not modeled
                let cf = Expression::ite(
                    count_is_zero.clone(),
                    register::cf().into(),
                    Expression::unknown("rotate carry unmodeled", 1),
                )?;
                self.assign(register::cf(), cf)?;
                let of = Expression::ite(
                    count_is_zero,
                    register::of().into(),
                    Expression::unknown("rotate overflow unmodeled", 1),
                )?;
                self.assign(register::of(), of)?;
            }
            ShiftOp::Shl | ShiftOp::Shr | ShiftOp::Sar => {
                // the last bit shifted out
                let carried_out = match op {
                    ShiftOp::Shl => Expression::trun(
                        1,
                        Expression::shr(value.clone().into(), back_count)?,
                    )?,
                    _ => Expression::trun(
                        1,
                        Expression::shr(
                            value.clone().into(),
                            Expression::sub(
                                count.clone().into(),
                                expr_const(1, bits),
                            )?,
                        )?,
                    )?,
                };
                let cf = Expression::ite(
                    count_is_zero.clone(),
                    register::cf().into(),
                    carried_out.clone(),
                )?;
                self.assign(register::cf(), cf)?;

                // overflow is defined only for one-bit shifts
                let of_one = match op {
                    ShiftOp::Shl => Expression::xor(
                        Semantics::high_bit(result.clone().into())?,
                        carried_out,
                    )?,
                    ShiftOp::Shr => Semantics::high_bit(value.clone().into())?,
                    _ => expr_const(0, 1),
                };
                let of = Expression::ite(
                    count_is_zero.clone(),
                    register::of().into(),
                    Expression::ite(
                        count_is_one,
                        of_one,
                        Expression::unknown("of after shift by more than 1", 1),
                    )?,
                )?;
                self.assign(register::of(), of)?;

                let af = Expression::ite(
                    count_is_zero.clone(),
                    register::af().into(),
                    Expression::unknown("af after shift", 1),
                )?;
                self.assign(register::af(), af)?;

                let pf = Expression::ite(
                    count_is_zero.clone(),
                    register::pf().into(),
                    Semantics::parity_expression(result.clone().into())?,
                )?;
                self.assign(register::pf(), pf)?;
                let sf = Expression::ite(
                    count_is_zero.clone(),
                    register::sf().into(),
                    Semantics::sf_expression(result.clone().into())?,
                )?;
                self.assign(register::sf(), sf)?;
                let zf = Expression::ite(
                    count_is_zero,
                    register::zf().into(),
                    Semantics::zf_expression(result.clone().into())?,
                )?;
                self.assign(register::zf(), zf)?;
            }
        }

        self.operand_store(dst, bits, result.into())
    }

    fn shiftd(
        &mut self,
        left: bool,
        bits: usize,
        dst: &Operand,
        fill: usize,
        count: &Operand,
    ) -> Result<()> {
        let value = self.operand_value(dst, bits)?;
        let value = self.capture(value)?;
        let fill = get_register(fill, bits)?.get()?;
        let fill = self.capture(fill)?;
        let count = self.shift_count(bits, count)?;
        let count = self.capture(count)?;

        let count_is_zero =
            Expression::cmpeq(count.clone().into(), expr_const(0, bits))?;
        let back_count = Expression::sub(
            expr_const(bits as u64, bits),
            count.clone().into(),
        )?;

        let shifted = if left {
            Expression::or(
                Expression::shl(value.clone().into(), count.clone().into())?,
                Expression::shr(fill.clone().into(), back_count.clone())?,
            )?
        } else {
            Expression::or(
                Expression::shr(value.clone().into(), count.clone().into())?,
                Expression::shl(fill.clone().into(), back_count.clone())?,
            )?
        };
        let shifted = Expression::ite(count_is_zero.clone(), value.clone().into(), shifted)?;
        let result = self.capture(shifted)?;

        let carried_out = if left {
            Expression::trun(1, Expression::shr(value.clone().into(), back_count)?)?
        } else {
            Expression::trun(
                1,
                Expression::shr(
                    value.clone().into(),
                    Expression::sub(count.clone().into(), expr_const(1, bits))?,
                )?,
            )?
        };
        let cf = Expression::ite(count_is_zero.clone(), register::cf().into(), carried_out)?;
        self.assign(register::cf(), cf)?;

        let of = Expression::ite(
            count_is_zero.clone(),
            register::of().into(),
            Expression::unknown("of after double shift", 1),
        )?;
        self.assign(register::of(), of)?;
        let af = Expression::ite(
            count_is_zero.clone(),
            register::af().into(),
            Expression::unknown("af after double shift", 1),
        )?;
        self.assign(register::af(), af)?;

        let pf = Expression::ite(
            count_is_zero.clone(),
            register::pf().into(),
            Semantics::parity_expression(result.clone().into())?,
        )?;
        self.assign(register::pf(), pf)?;
        let sf = Expression::ite(
            count_is_zero.clone(),
            register::sf().into(),
            Semantics::sf_expression(result.clone().into())?,
        )?;
        self.assign(register::sf(), sf)?;
        let zf = Expression::ite(
            count_is_zero,
            register::zf().into(),
            Semantics::zf_expression(result.clone().into())?,
        )?;
        self.assign(register::zf(), zf)?;

        self.operand_store(dst, bits, result.into())
    }

    fn inc_dec(&mut self, increment: bool, bits: usize, dst: &Operand) -> Result<()> {
        let value = self.operand_value(dst, bits)?;
        let value = self.capture(value)?;
        let one = expr_const(1, bits);
        let expression = if increment {
            Expression::add(value.clone().into(), one.clone())?
        } else {
            Expression::sub(value.clone().into(), one.clone())?
        };
        let result = self.capture(expression)?;

        // CF is preserved
        if increment {
            self.set_aopszf_add(result.clone().into(), value.into(), one)?;
        } else {
            self.set_aopszf_sub(result.clone().into(), value.into(), one)?;
        }
        self.operand_store(dst, bits, result.into())
    }

    /// Push a value onto the stack. The value is captured first, as it may
    /// involve esp.
    fn push_value(&mut self, bits: usize, value: Expression) -> Result<()> {
        let value = self.capture(value)?;
        let esp = register::esp();
        let decremented =
            Expression::sub(esp.clone().into(), expr_const((bits / 8) as u64, 32))?;
        self.assign(esp.clone(), decremented)?;
        self.store(esp.into(), value.into())
    }

    fn push_op(&mut self, bits: usize, src: &Operand) -> Result<()> {
        let value = self.operand_value(src, bits)?;
        self.push_value(bits, value)
    }

    fn pop_op(&mut self, bits: usize, dst: &Operand) -> Result<()> {
        let esp = register::esp();
        let value = self.load(esp.clone().into(), bits)?;
        let value = self.capture(value)?;
        self.operand_store(dst, bits, value.into())?;

        // the increment is architecturally suppressed when the destination is
        // esp itself
        let pops_into_esp = matches!(dst, Operand::Register(4));
        if !pops_into_esp {
            let incremented =
                Expression::add(esp.clone().into(), expr_const((bits / 8) as u64, 32))?;
            self.assign(esp, incremented)?;
        }
        Ok(())
    }

    /// The modeled flags packed at their EFLAGS bit positions. Reserved bit 1
    /// reads as 1; unmodeled positions read as 0.
    fn eflags_expression(&self, bits: usize) -> Result<Expression> {
        let bit = |flag: Variable, position: u64| -> Result<Expression> {
            Expression::shl(
                Expression::zext(bits, Expression::variable(flag))?,
                expr_const(position, bits),
            )
        };
        let df_bit = Expression::ite(
            Expression::cmpeq(register::dflag().into(), expr_const(0xffff_ffff, 32))?,
            expr_const(1 << 10, bits),
            expr_const(0, bits),
        )?;
        let mut eflags = Expression::zext(bits, Expression::variable(register::cf()))?;
        eflags = Expression::or(eflags, expr_const(2, bits))?;
        eflags = Expression::or(eflags, bit(register::pf(), 2)?)?;
        eflags = Expression::or(eflags, bit(register::af(), 4)?)?;
        eflags = Expression::or(eflags, bit(register::zf(), 6)?)?;
        eflags = Expression::or(eflags, bit(register::sf(), 7)?)?;
        eflags = Expression::or(eflags, df_bit)?;
        eflags = Expression::or(eflags, bit(register::of(), 11)?)?;
        Ok(eflags)
    }

    fn pushf(&mut self, bits: usize) -> Result<()> {
        let eflags = self.eflags_expression(bits)?;
        self.push_value(bits, eflags)
    }

    fn popf(&mut self, bits: usize) -> Result<()> {
        let esp = register::esp();
        let value = self.load(esp.clone().into(), bits)?;
        let value = self.capture(value)?;
        let incremented =
            Expression::add(esp.clone().into(), expr_const((bits / 8) as u64, 32))?;
        self.assign(esp, incremented)?;

        for (flag, position) in &[
            (register::cf(), 0),
            (register::pf(), 2),
            (register::af(), 4),
            (register::zf(), 6),
            (register::sf(), 7),
            (register::of(), 11),
        ] {
            let bit = Expression::extract(*position, *position, value.clone().into())?;
            self.assign(flag.clone(), bit)?;
        }
        let df = Expression::ite(
            Expression::extract(10, 10, value.into())?,
            expr_const(0xffff_ffff, 32),
            expr_const(1, 32),
        )?;
        self.assign(register::dflag(), df)
    }

    fn sahf(&mut self) -> Result<()> {
        let ah = get_register(4, 8)?.get()?;
        let ah = self.capture(ah)?;
        for (flag, position) in &[
            (register::cf(), 0),
            (register::pf(), 2),
            (register::af(), 4),
            (register::zf(), 6),
            (register::sf(), 7),
        ] {
            let bit = Expression::extract(*position, *position, ah.clone().into())?;
            self.assign(flag.clone(), bit)?;
        }
        Ok(())
    }

    fn lahf(&mut self) -> Result<()> {
        let bit = |flag: Variable, position: u64| -> Result<Expression> {
            Expression::shl(
                Expression::zext(8, Expression::variable(flag))?,
                expr_const(position, 8),
            )
        };
        let mut value = Expression::zext(8, Expression::variable(register::cf()))?;
        value = Expression::or(value, expr_const(2, 8))?;
        value = Expression::or(value, bit(register::pf(), 2)?)?;
        value = Expression::or(value, bit(register::af(), 4)?)?;
        value = Expression::or(value, bit(register::zf(), 6)?)?;
        value = Expression::or(value, bit(register::sf(), 7)?)?;
        let statement = get_register(4, 8)?.set(value)?;
        self.push(statement);
        Ok(())
    }

    fn xchg(&mut self, bits: usize, lhs: &Operand, rhs: usize) -> Result<()> {
        let lhs_value = self.operand_value(lhs, bits)?;
        let lhs_value = self.capture(lhs_value)?;
        let rhs_value = get_register(rhs, bits)?.get()?;
        let rhs_value = self.capture(rhs_value)?;
        self.operand_store(lhs, bits, rhs_value.into())?;
        let statement = get_register(rhs, bits)?.set(lhs_value.into())?;
        self.push(statement);
        Ok(())
    }

    fn xadd(&mut self, bits: usize, dst: &Operand, src: usize) -> Result<()> {
        let dst_value = self.operand_value(dst, bits)?;
        let dst_value = self.capture(dst_value)?;
        let src_value = get_register(src, bits)?.get()?;
        let src_value = self.capture(src_value)?;
        let sum = Expression::add(dst_value.clone().into(), src_value.clone().into())?;
        let result = self.capture(sum)?;
        self.set_flags_add(
            result.clone().into(),
            dst_value.clone().into(),
            src_value.into(),
        )?;
        let statement = get_register(src, bits)?.set(dst_value.into())?;
        self.push(statement);
        self.operand_store(dst, bits, result.into())
    }

    fn cmpxchg(&mut self, bits: usize, dst: &Operand, src: usize) -> Result<()> {
        let accumulator = get_register(0, bits)?.get()?;
        let accumulator = self.capture(accumulator)?;
        let dst_value = self.operand_value(dst, bits)?;
        let dst_value = self.capture(dst_value)?;

        let equal = Expression::cmpeq(accumulator.clone().into(), dst_value.clone().into())?;
        self.assign(register::zf(), equal)?;

        let src_value = get_register(src, bits)?.get()?;
        let new_dst = Expression::ite(
            register::zf().into(),
            src_value,
            dst_value.clone().into(),
        )?;
        self.operand_store(dst, bits, new_dst)?;

        let new_accumulator = Expression::ite(
            register::zf().into(),
            accumulator.into(),
            dst_value.into(),
        )?;
        let statement = get_register(0, bits)?.set(new_accumulator)?;
        self.push(statement);
        Ok(())
    }

    fn cmpxchg8b(&mut self, dst: &Operand) -> Result<()> {
        let ea = match dst {
            Operand::Memory(ea) => ea.clone(),
            _ => {
                bail!(ErrorKind::UnsupportedOperandForm(
                    "cmpxchg8b".to_string(),
                    "operand must be a memory form".to_string(),
                ));
            }
        };

        let original = self.load_s(ea.clone(), 64)?;
        let original = self.capture(original)?;

        let comparand =
            Expression::concat(register::edx().into(), register::eax().into())?;
        let equal = Expression::cmpeq(comparand, original.clone().into())?;
        self.assign(register::zf(), equal)?;

        let replacement =
            Expression::concat(register::ecx().into(), register::ebx().into())?;
        let stored = Expression::ite(
            register::zf().into(),
            replacement,
            original.clone().into(),
        )?;
        self.store_s(ea, stored)?;

        let eax = Expression::ite(
            register::zf().into(),
            register::eax().into(),
            Expression::extract(31, 0, original.clone().into())?,
        )?;
        self.assign(register::eax(), eax)?;
        let edx = Expression::ite(
            register::zf().into(),
            register::edx().into(),
            Expression::extract(63, 32, original.into())?,
        )?;
        self.assign(register::edx(), edx)
    }

    /// Two- and three-operand imul. The flag rules for these forms are not
    /// modeled; every arithmetic flag becomes unknown.
    fn imul(&mut self, bits: usize, dst: usize, lhs: &Operand, rhs: &Operand) -> Result<()> {
        let lhs = self.operand_value(lhs, bits)?;
        let lhs = self.capture(lhs)?;
        let rhs = self.operand_value(rhs, bits)?;
        let rhs = self.capture(rhs)?;
        let product = Expression::mul(lhs.into(), rhs.into())?;
        let result = self.capture(product)?;

        for flag in &[
            register::cf(),
            register::of(),
            register::af(),
            register::pf(),
            register::sf(),
            register::zf(),
        ] {
            self.set_flag_unknown(flag.clone(), "flags after imul")?;
        }
        let statement = get_register(dst, bits)?.set(result.into())?;
        self.push(statement);
        Ok(())
    }

    fn mul(&mut self, bits: usize, src: &Operand) -> Result<()> {
        let wide_bits = bits * 2;
        let lhs = get_register(0, bits)?.get()?;
        let rhs = self.operand_value(src, bits)?;
        let product = Expression::mul(
            Expression::zext(wide_bits, lhs)?,
            Expression::zext(wide_bits, rhs)?,
        )?;
        let product = self.capture(product)?;

        let high = Expression::extract(wide_bits - 1, bits, product.clone().into())?;
        let overflowed = Expression::cmpneq(high.clone(), expr_const(0, bits))?;
        self.assign(register::cf(), overflowed.clone())?;
        self.assign(register::of(), overflowed)?;
        for flag in &[register::af(), register::pf(), register::sf(), register::zf()] {
            self.set_flag_unknown(flag.clone(), "flags after mul")?;
        }

        match bits {
            8 => {
                // ax <- al * r/m8
                let statement = get_register(0, 16)?.set(product.into())?;
                self.push(statement);
                Ok(())
            }
            _ => {
                let low = Expression::extract(bits - 1, 0, product.into())?;
                let statement = get_register(0, bits)?.set(low)?;
                self.push(statement);
                let statement = get_register(2, bits)?.set(high)?;
                self.push(statement);
                Ok(())
            }
        }
    }

    fn div(&mut self, bits: usize, signed: bool, src: &Operand) -> Result<()> {
        let wide_bits = bits * 2;
        let dividend = match bits {
            8 => get_register(0, 16)?.get()?,
            _ => Expression::concat(
                get_register(2, bits)?.get()?,
                get_register(0, bits)?.get()?,
            )?,
        };
        let dividend = self.capture(dividend)?;
        let divisor = self.operand_value(src, bits)?;
        let divisor = if signed {
            Expression::sext(wide_bits, divisor)?
        } else {
            Expression::zext(wide_bits, divisor)?
        };
        let divisor = self.capture(divisor)?;

        let quotient = if signed {
            Expression::divs(dividend.clone().into(), divisor.clone().into())?
        } else {
            Expression::divu(dividend.clone().into(), divisor.clone().into())?
        };
        let quotient = self.capture(quotient)?;
        let remainder = if signed {
            Expression::mods(dividend.into(), divisor.clone().into())?
        } else {
            Expression::modu(dividend.into(), divisor.into())?
        };
        let remainder = self.capture(remainder)?;

        for flag in &[
            register::cf(),
            register::of(),
            register::af(),
            register::pf(),
            register::sf(),
            register::zf(),
        ] {
            self.set_flag_unknown(flag.clone(), "flags after div")?;
        }

        let quotient = Expression::extract(bits - 1, 0, quotient.into())?;
        let remainder = Expression::extract(bits - 1, 0, remainder.into())?;
        match bits {
            8 => {
                // al <- quotient, ah <- remainder
                let statement = get_register(0, 8)?.set(quotient)?;
                self.push(statement);
                let statement = get_register(4, 8)?.set(remainder)?;
                self.push(statement);
                Ok(())
            }
            _ => {
                let statement = get_register(0, bits)?.set(quotient)?;
                self.push(statement);
                let statement = get_register(2, bits)?.set(remainder)?;
                self.push(statement);
                Ok(())
            }
        }
    }

    fn jcc(&mut self, condition: &Condition, target: u64) -> Result<()> {
        let condition = self.condition_expression(condition)?;
        let statement = Statement::conditional_branch(
            condition,
            expr_const(target, 32),
            expr_const(self.next_address & 0xffff_ffff, 32),
        )?;
        self.push(statement);
        Ok(())
    }

    fn jmp(&mut self, target: &Operand) -> Result<()> {
        let target = self.operand_value(target, 32)?;
        self.push(Statement::branch(target));
        Ok(())
    }

    fn call(&mut self, target: &Operand) -> Result<()> {
        let target = self.operand_value(target, 32)?;
        let target = self.capture(target)?;

        let esp = register::esp();
        let decremented = Expression::sub(esp.clone().into(), expr_const(4, 32))?;
        self.assign(esp.clone(), decremented)?;
        self.store(
            esp.into(),
            expr_const(self.next_address & 0xffff_ffff, 32),
        )?;

        self.push(Statement::branch(target.into()).with_attribute(Attribute::Call));
        Ok(())
    }

    fn ret(&mut self, pop: u16) -> Result<()> {
        let esp = register::esp();
        let return_address = self.load(esp.clone().into(), 32)?;
        let return_address = self.capture(return_address)?;
        let incremented = Expression::add(
            esp.clone().into(),
            expr_const(4 + pop as u64, 32),
        )?;
        self.assign(esp, incremented)?;

        self.push(Statement::branch(return_address.into()).with_attribute(Attribute::Ret));
        Ok(())
    }

    fn setcc(&mut self, condition: &Condition, dst: &Operand) -> Result<()> {
        let condition = self.condition_expression(condition)?;
        let value = Expression::zext(8, condition)?;
        self.operand_store(dst, 8, value)
    }

    fn leave(&mut self) -> Result<()> {
        let esp = register::esp();
        let ebp = register::ebp();
        self.assign(esp.clone(), ebp.clone().into())?;
        let value = self.load(esp.clone().into(), 32)?;
        let value = self.capture(value)?;
        let incremented = Expression::add(esp.clone().into(), expr_const(4, 32))?;
        self.assign(esp, incremented)?;
        self.assign(ebp, value.into())
    }

    fn cbw(&mut self, bits: usize) -> Result<()> {
        let (source, destination) = if bits == 16 {
            (get_register(0, 8)?.get()?, get_register(0, 16)?)
        } else {
            (get_register(0, 16)?.get()?, get_register(0, 32)?)
        };
        let statement = destination.set(Expression::sext(bits, source)?)?;
        self.push(statement);
        Ok(())
    }

    fn cwd(&mut self, bits: usize) -> Result<()> {
        let wide_bits = bits * 2;
        let widened = Expression::sext(wide_bits, get_register(0, bits)?.get()?)?;
        let high = Expression::extract(wide_bits - 1, bits, widened)?;
        let statement = get_register(2, bits)?.set(high)?;
        self.push(statement);
        Ok(())
    }

    /// The per-step stride of a string operation: DFLAG times the element
    /// size.
    fn string_stride(&self, bits: usize) -> Result<Expression> {
        Expression::mul(
            register::dflag().into(),
            expr_const((bits / 8) as u64, 32),
        )
    }

    fn advance_string_pointer(&mut self, pointer: Variable, bits: usize) -> Result<()> {
        let stride = self.string_stride(bits)?;
        let advanced = Expression::add(pointer.clone().into(), stride)?;
        self.assign(pointer, advanced)
    }

    /// One un-repeated step of a string operation. The source side honors
    /// segment overrides; the destination side is always es:edi, and es has a
    /// zero base.
    fn string_step(&mut self, op: StringOp, bits: usize) -> Result<()> {
        match op {
            StringOp::Movs => {
                let value = self.load_s(register::esi().into(), bits)?;
                let value = self.capture(value)?;
                self.store(register::edi().into(), value.into())?;
                self.advance_string_pointer(register::esi(), bits)?;
                self.advance_string_pointer(register::edi(), bits)
            }
            StringOp::Cmps => {
                let lhs = self.load_s(register::esi().into(), bits)?;
                let lhs = self.capture(lhs)?;
                let rhs = self.load(register::edi().into(), bits)?;
                let rhs = self.capture(rhs)?;
                let result = self
                    .capture(Expression::sub(lhs.clone().into(), rhs.clone().into())?)?;
                self.set_flags_sub(result.into(), lhs.into(), rhs.into())?;
                self.advance_string_pointer(register::esi(), bits)?;
                self.advance_string_pointer(register::edi(), bits)
            }
            StringOp::Scas => {
                let lhs = get_register(0, bits)?.get()?;
                let lhs = self.capture(lhs)?;
                let rhs = self.load(register::edi().into(), bits)?;
                let rhs = self.capture(rhs)?;
                let result = self
                    .capture(Expression::sub(lhs.clone().into(), rhs.clone().into())?)?;
                self.set_flags_sub(result.into(), lhs.into(), rhs.into())?;
                self.advance_string_pointer(register::edi(), bits)
            }
            StringOp::Stos => {
                let value = get_register(0, bits)?.get()?;
                self.store(register::edi().into(), value)?;
                self.advance_string_pointer(register::edi(), bits)
            }
            StringOp::Lods => {
                let value = self.load_s(register::esi().into(), bits)?;
                let statement = get_register(0, bits)?.set(value)?;
                self.push(statement);
                self.advance_string_pointer(register::esi(), bits)
            }
        }
    }

    /// A string operation, wrapped in the rep template when a repeat prefix
    /// is present:
    ///
    /// 1. if ecx == 0, jump past the instruction
    /// 2. execute the single-step body
    /// 3. decrement ecx; if ecx == 0, jump past the instruction
    /// 4. jump back to 1 (rep), or only while zf holds (repz) or while zf
    ///    does not hold (repnz)
    fn string_op(&mut self, op: StringOp, bits: usize) -> Result<()> {
        if !self.prefixes.repz() && !self.prefixes.repnz() {
            return self.string_step(op, bits);
        }

        let head = format!("rep_head_0x{:x}", self.address);
        let body = format!("rep_body_0x{:x}", self.address);
        let tail = format!("rep_tail_0x{:x}", self.address);
        let next = expr_const(self.next_address & 0xffff_ffff, 32);

        let ecx_is_zero =
            Expression::cmpeq(register::ecx().into(), expr_const(0, 32))?;

        self.push(Statement::name_label(head.clone()));
        let statement = Statement::conditional_branch(
            ecx_is_zero.clone(),
            next.clone(),
            Expression::lab(body.clone()),
        )?;
        self.push(statement);
        self.push(Statement::name_label(body));

        self.string_step(op, bits)?;

        let decremented =
            Expression::sub(register::ecx().into(), expr_const(1, 32))?;
        self.assign(register::ecx(), decremented)?;
        let statement = Statement::conditional_branch(
            ecx_is_zero,
            next.clone(),
            Expression::lab(tail.clone()),
        )?;
        self.push(statement);
        self.push(Statement::name_label(tail));

        match op {
            StringOp::Cmps | StringOp::Scas => {
                let condition = if self.prefixes.repz() {
                    Expression::variable(register::zf())
                } else {
                    Expression::cmpeq(register::zf().into(), expr_const(0, 1))?
                };
                let statement = Statement::conditional_branch(
                    condition,
                    Expression::lab(head),
                    next,
                )?;
                self.push(statement);
            }
            _ => {
                self.push(Statement::branch(Expression::lab(head)));
            }
        }
        Ok(())
    }

    fn bt(&mut self, set: bool, bits: usize, base: &Operand, offset: &Operand) -> Result<()> {
        let offset = match offset {
            Operand::Register(encoding) => get_register(*encoding, bits)?.get()?,
            Operand::Immediate(constant) => expr_const(constant.value(), bits),
            Operand::Memory(_) => {
                bail!(ErrorKind::UnsupportedOperandForm(
                    "bt".to_string(),
                    "offset must be a register or immediate".to_string(),
                ));
            }
        };
        let offset = self.capture(offset)?;

        match base {
            Operand::Memory(ea) => {
                // split the bit offset into a byte offset and a bit within
                // that byte
                let byte_offset =
                    Expression::shr(offset.clone().into(), expr_const(3, bits))?;
                let byte_offset = if bits == 16 {
                    Expression::zext(32, byte_offset)?
                } else {
                    byte_offset
                };
                let address = Expression::add(ea.clone(), byte_offset)?;
                let address = self.capture(address)?;
                let bit = Expression::and(
                    Expression::trun(8, offset.into())?,
                    expr_const(7, 8),
                )?;
                let bit = self.capture(bit)?;

                let byte = self.load_s(address.clone().into(), 8)?;
                let byte = self.capture(byte)?;
                let cf = Expression::trun(
                    1,
                    Expression::shr(byte.clone().into(), bit.clone().into())?,
                )?;
                self.assign(register::cf(), cf)?;

                if set {
                    let mask = Expression::shl(expr_const(1, 8), bit.into())?;
                    let updated = Expression::or(byte.into(), mask)?;
                    self.store_s(address.into(), updated)?;
                }
            }
            Operand::Register(encoding) => {
                let value = get_register(*encoding, bits)?.get()?;
                let value = self.capture(value)?;
                let bit = Expression::and(
                    offset.into(),
                    expr_const((bits - 1) as u64, bits),
                )?;
                let bit = self.capture(bit)?;
                let cf = Expression::trun(
                    1,
                    Expression::shr(value.clone().into(), bit.clone().into())?,
                )?;
                self.assign(register::cf(), cf)?;

                if set {
                    let mask = Expression::shl(expr_const(1, bits), bit.into())?;
                    let updated = Expression::or(value.into(), mask)?;
                    let statement = get_register(*encoding, bits)?.set(updated)?;
                    self.push(statement);
                }
            }
            Operand::Immediate(_) => {
                bail!(ErrorKind::UnsupportedOperandForm(
                    "bt".to_string(),
                    "base must be a register or memory form".to_string(),
                ));
            }
        }

        for flag in &[register::of(), register::sf(), register::af(), register::pf()] {
            self.set_flag_unknown(flag.clone(), "flags after bt")?;
        }
        Ok(())
    }

    /// Bit scan: a nested ite selects the first set bit, from bit 0 upward
    /// (bsf) or from the high bit downward (bsr). A zero source leaves the
    /// destination unknown with zf set.
    fn bsf(&mut self, reverse: bool, bits: usize, dst: usize, src: &Operand) -> Result<()> {
        let value = self.operand_value(src, bits)?;
        let value = self.capture(value)?;

        let mut selector = Expression::unknown("bit scan of zero", bits);
        let positions: Vec<usize> = if reverse {
            (0..bits).collect()
        } else {
            (0..bits).rev().collect()
        };
        for position in positions {
            let bit = Expression::extract(position, position, value.clone().into())?;
            selector = Expression::ite(bit, expr_const(position as u64, bits), selector)?;
        }

        let zf = Expression::cmpeq(value.into(), expr_const(0, bits))?;
        self.assign(register::zf(), zf)?;
        for flag in &[
            register::cf(),
            register::of(),
            register::sf(),
            register::af(),
            register::pf(),
        ] {
            self.set_flag_unknown(flag.clone(), "flags after bit scan")?;
        }

        let statement = get_register(dst, bits)?.set(selector)?;
        self.push(statement);
        Ok(())
    }

    fn pcmpeq(&mut self, lane_bits: usize, bits: usize, dst: usize, src: &Operand) -> Result<()> {
        let lhs: Expression = self.simd_register(dst, bits).into();
        let lhs = self.capture(lhs)?;
        let rhs = self.simd_value(src, bits)?;
        let rhs = self.capture(rhs)?;

        let ones = (1u64 << lane_bits) - 1;
        let lane_value = |lane: usize| -> Result<Expression> {
            let hi = lane * lane_bits + lane_bits - 1;
            let lo = lane * lane_bits;
            let equal = Expression::cmpeq(
                Expression::extract(hi, lo, lhs.clone().into())?,
                Expression::extract(hi, lo, rhs.clone().into())?,
            )?;
            Expression::ite(
                equal,
                expr_const(ones, lane_bits),
                expr_const(0, lane_bits),
            )
        };

        let top = bits / lane_bits - 1;
        let mut lanes = lane_value(top)?;
        for lane in (0..top).rev() {
            lanes = Expression::concat(lanes, lane_value(lane)?)?;
        }

        let register = self.simd_register(dst, bits);
        self.assign(register, lanes)
    }

    fn pshuf(&mut self, bits: usize, dst: usize, src: &Operand, order: u8) -> Result<()> {
        let lane_bits = bits / 4;
        let value = self.simd_value(src, bits)?;
        let value = self.capture(value)?;

        let lane_value = |lane: usize| -> Result<Expression> {
            let selected = ((order >> (2 * lane)) & 3) as usize;
            let hi = selected * lane_bits + lane_bits - 1;
            let lo = selected * lane_bits;
            Expression::extract(hi, lo, value.clone().into())
        };

        let mut lanes = lane_value(3)?;
        for lane in (0..3).rev() {
            lanes = Expression::concat(lanes, lane_value(lane)?)?;
        }

        let register = self.simd_register(dst, bits);
        self.assign(register, lanes)
    }

    fn palignr(&mut self, bits: usize, dst: usize, src: &Operand, shift: u8) -> Result<()> {
        let high: Expression = self.simd_register(dst, bits).into();
        let low = self.simd_value(src, bits)?;
        let combined = self.capture(Expression::concat(high, low)?)?;
        let shifted = Expression::shr(
            combined.clone().into(),
            expr_const(shift as u64 * 8, bits * 2),
        )?;
        let result = Expression::trun(bits, shifted)?;
        let register = self.simd_register(dst, bits);
        self.assign(register, result)
    }

    fn pmovmskb(&mut self, bits: usize, dst: usize, src: usize) -> Result<()> {
        let value: Expression = self.simd_register(src, bits).into();
        let value = self.capture(value)?;

        let sign_bit = |lane: usize| -> Result<Expression> {
            Expression::extract(lane * 8 + 7, lane * 8 + 7, value.clone().into())
        };

        let top = bits / 8 - 1;
        let mut mask = sign_bit(top)?;
        for lane in (0..top).rev() {
            mask = Expression::concat(mask, sign_bit(lane)?)?;
        }

        let mask = Expression::zext(32, mask)?;
        let statement = get_register(dst, 32)?.set(mask)?;
        self.push(statement);
        Ok(())
    }
}
