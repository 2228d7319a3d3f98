//! Kestrel Intermediate Language.
//!
//! The IL is a closed algebra: a fixed grammar of pure, typed expressions
//! (`Expression`) and a fixed grammar of state-updating statements
//! (`Statement`). Every expression carries its width; the constructors check
//! width compatibility and refuse to build ill-sorted terms.

pub mod constant;
pub mod expression;
pub mod statement;
pub mod types;
pub mod variable;

pub use self::constant::*;
pub use self::expression::*;
pub use self::statement::*;
pub use self::types::*;
pub use self::variable::*;

/// A convenience function to create a new constant.
///
/// This is the preferred way to create a `Constant`.
pub fn const_(value: u64, bits: usize) -> Constant {
    Constant::new(value, bits)
}

/// A convenience function to create a new expression constant.
///
/// This is the preferred way to create an `Expression::Constant`.
pub fn expr_const(value: u64, bits: usize) -> Expression {
    Expression::constant(Constant::new(value, bits))
}

/// A convenience function to create a new bit-vector variable.
///
/// This is the preferred way to create a `Variable`.
pub fn var<S>(name: S, bits: usize) -> Variable
where
    S: Into<String>,
{
    Variable::new(name, Type::Reg(bits))
}

/// A convenience function to create a new expression variable.
///
/// This is the preferred way to create an `Expression::Variable`.
pub fn expr_var<S>(name: S, bits: usize) -> Expression
where
    S: Into<String>,
{
    Expression::variable(var(name, bits))
}
