//! A `Variable` is a named, typed cell with identity.

use crate::il::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A variable in Kestrel IL.
///
/// Architectural variables carry only a name and a sort. Temporaries created
/// during lifting additionally carry an index, so two temporaries are distinct
/// even if they were to share a printed name.
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Variable {
    name: String,
    sort: Type,
    index: Option<u64>,
}

impl Variable {
    /// Create a new `Variable` with the given name and sort.
    pub fn new<S>(name: S, sort: Type) -> Variable
    where
        S: Into<String>,
    {
        Variable {
            name: name.into(),
            sort,
            index: None,
        }
    }

    /// Create a temporary `Variable`.
    ///
    /// The instruction address and the per-lift counter together form the
    /// temporary's identity, so temporaries of different instructions never
    /// collide while lifting stays deterministic.
    pub fn temp(address: u64, index: u64, bits: usize) -> Variable {
        Variable {
            name: format!("temp_0x{:x}_{}", address, index),
            sort: Type::Reg(bits),
            index: Some(index),
        }
    }

    /// Gets the name of the `Variable`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets the sort of the `Variable`.
    pub fn sort(&self) -> Type {
        self.sort
    }

    /// Gets the bitness of the `Variable`.
    pub fn bits(&self) -> usize {
        self.sort.bits()
    }

    /// Returns true if this `Variable` is a temporary.
    pub fn is_temp(&self) -> bool {
        self.index.is_some()
    }

    /// An identifier which uniquely names this `Variable`.
    pub fn identifier(&self) -> String {
        format!("{}:{}", self.name, self.sort)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl From<Variable> for Expression {
    fn from(variable: Variable) -> Expression {
        Expression::variable(variable)
    }
}
