//! A `Statement` applies one explicit effect to the machine state.

use crate::error::*;
use crate::il::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The target of a label statement.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Label {
    /// A native code address.
    Address(u64),
    /// A symbolic name, referenced by `Expression::Lab`.
    Name(String),
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Label::Address(address) => write!(f, "0x{:x}", address),
            Label::Name(name) => write!(f, "{}", name),
        }
    }
}

/// An attribute tags a statement with its origin.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Attribute {
    /// The original assembly this statement was lifted from.
    Asm(String),
    /// This branch is a procedure call.
    Call,
    /// This branch is a procedure return.
    Ret,
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Attribute::Asm(asm) => write!(f, "asm \"{}\"", asm),
            Attribute::Call => write!(f, "call"),
            Attribute::Ret => write!(f, "ret"),
        }
    }
}

/// An IL Operation updates some state, or marks a position in the statement
/// stream.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Operation {
    /// Assign the value given in the expression to the variable indicated.
    ///
    /// This is also how memories change: assigning a `Store` expression to
    /// the memory variable installs the updated memory.
    Assign { dst: Variable, src: Expression },
    /// Branch to the value given by target.
    Branch { target: Expression },
    /// Branch to `true_target` if `condition` holds, and to `false_target`
    /// otherwise.
    ConditionalBranch {
        condition: Expression,
        true_target: Expression,
        false_target: Expression,
    },
    /// A position branches can target.
    Label { label: Label },
    /// `condition` holds whenever execution reaches this statement.
    Assert { condition: Expression },
    /// An effect outside the IL's model, such as a system call.
    Intrinsic { name: String },
    /// No effect.
    Comment { text: String },
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Operation::Assign { dst, src } => write!(f, "{} = {}", dst, src),
            Operation::Branch { target } => write!(f, "branch {}", target),
            Operation::ConditionalBranch {
                condition,
                true_target,
                false_target,
            } => write!(
                f,
                "cbranch {} ? {} : {}",
                condition, true_target, false_target
            ),
            Operation::Label { label } => write!(f, "label {}", label),
            Operation::Assert { condition } => write!(f, "assert {}", condition),
            Operation::Intrinsic { name } => write!(f, "intrinsic {}", name),
            Operation::Comment { text } => write!(f, "// {}", text),
        }
    }
}

/// A statement in Kestrel IL: an operation plus origin attributes.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Statement {
    operation: Operation,
    attributes: Vec<Attribute>,
}

impl Statement {
    fn new(operation: Operation) -> Statement {
        Statement {
            operation,
            attributes: Vec::new(),
        }
    }

    /// Create a new assignment.
    ///
    /// # Error
    /// The sort of the destination and the source differ.
    pub fn assign(dst: Variable, src: Expression) -> Result<Statement> {
        if dst.sort() != src.sort() {
            bail!(ErrorKind::WidthMismatch(format!(
                "assign: {} = expression of sort {}",
                dst,
                src.sort()
            )));
        }
        Ok(Statement::new(Operation::Assign { dst, src }))
    }

    /// Create an unconditional branch.
    pub fn branch(target: Expression) -> Statement {
        Statement::new(Operation::Branch { target })
    }

    /// Create a conditional branch over a 1-bit condition.
    pub fn conditional_branch(
        condition: Expression,
        true_target: Expression,
        false_target: Expression,
    ) -> Result<Statement> {
        if condition.sort() != Type::Reg(1) {
            bail!(ErrorKind::WidthMismatch(format!(
                "cbranch: condition is {}, must be u1",
                condition.sort()
            )));
        }
        Ok(Statement::new(Operation::ConditionalBranch {
            condition,
            true_target,
            false_target,
        }))
    }

    /// Create a label at a native code address.
    pub fn address_label(address: u64) -> Statement {
        Statement::new(Operation::Label {
            label: Label::Address(address),
        })
    }

    /// Create a named label.
    pub fn name_label<S>(name: S) -> Statement
    where
        S: Into<String>,
    {
        Statement::new(Operation::Label {
            label: Label::Name(name.into()),
        })
    }

    /// Create an assertion over a 1-bit condition.
    pub fn assert(condition: Expression) -> Result<Statement> {
        if condition.sort() != Type::Reg(1) {
            bail!(ErrorKind::WidthMismatch(format!(
                "assert: condition is {}, must be u1",
                condition.sort()
            )));
        }
        Ok(Statement::new(Operation::Assert { condition }))
    }

    /// Create an intrinsic for an effect outside the IL's model.
    pub fn intrinsic<S>(name: S) -> Statement
    where
        S: Into<String>,
    {
        Statement::new(Operation::Intrinsic { name: name.into() })
    }

    /// Create a comment.
    pub fn comment<S>(text: S) -> Statement
    where
        S: Into<String>,
    {
        Statement::new(Operation::Comment { text: text.into() })
    }

    /// Attach an attribute to this statement.
    pub fn with_attribute(mut self, attribute: Attribute) -> Statement {
        self.attributes.push(attribute);
        self
    }

    /// Get the operation of this statement.
    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    /// Get the attributes of this statement.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Returns true if this statement carries the given attribute.
    pub fn has_attribute(&self, attribute: &Attribute) -> bool {
        self.attributes.contains(attribute)
    }

    pub fn is_assign(&self) -> bool {
        matches!(self.operation, Operation::Assign { .. })
    }

    pub fn is_branch(&self) -> bool {
        matches!(self.operation, Operation::Branch { .. })
    }

    pub fn is_conditional_branch(&self) -> bool {
        matches!(self.operation, Operation::ConditionalBranch { .. })
    }

    pub fn is_label(&self) -> bool {
        matches!(self.operation, Operation::Label { .. })
    }

    /// Get a reference to the variable written by this statement, or `None`
    /// if no variable is written.
    pub fn variable_written(&self) -> Option<&Variable> {
        match self.operation {
            Operation::Assign { ref dst, .. } => Some(dst),
            _ => None,
        }
    }

    /// Get each variable read by this statement.
    pub fn variables_read(&self) -> Vec<&Variable> {
        match self.operation {
            Operation::Assign { ref src, .. } => src.variables(),
            Operation::Branch { ref target } => target.variables(),
            Operation::ConditionalBranch {
                ref condition,
                ref true_target,
                ref false_target,
            } => {
                let mut variables = condition.variables();
                variables.append(&mut true_target.variables());
                variables.append(&mut false_target.variables());
                variables
            }
            Operation::Assert { ref condition } => condition.variables(),
            Operation::Label { .. } | Operation::Intrinsic { .. } | Operation::Comment { .. } => {
                Vec::new()
            }
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.operation)?;
        if !self.attributes.is_empty() {
            let attributes = self
                .attributes
                .iter()
                .map(|attribute| attribute.to_string())
                .collect::<Vec<String>>()
                .join(", ");
            write!(f, " // {}", attributes)?;
        }
        Ok(())
    }
}
