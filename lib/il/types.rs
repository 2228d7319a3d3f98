//! A `Type` is the sort of an IL term: a bit-vector width, or a memory.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The sort of a Kestrel IL expression.
///
/// Every expression evaluates either to a bit-vector of a fixed width, or to
/// a whole memory indexed by addresses of a fixed width.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Type {
    /// A bit-vector of the given width.
    Reg(usize),
    /// A memory with addresses of the given width.
    Mem(usize),
}

impl Type {
    /// The width of this sort in bits.
    ///
    /// For a memory sort this is the width of its addresses.
    pub fn bits(&self) -> usize {
        match *self {
            Type::Reg(bits) => bits,
            Type::Mem(bits) => bits,
        }
    }

    /// Returns true if this is a bit-vector sort.
    pub fn is_reg(&self) -> bool {
        match *self {
            Type::Reg(_) => true,
            Type::Mem(_) => false,
        }
    }

    /// Returns true if this is a memory sort.
    pub fn is_mem(&self) -> bool {
        !self.is_reg()
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Type::Reg(bits) => write!(f, "u{}", bits),
            Type::Mem(bits) => write!(f, "mem{}", bits),
        }
    }
}
