//! The 32-bit x86 translator.
//!
//! `X86::lift` decodes and lifts one instruction: prefix scan, opcode
//! classification, semantic emission, and label prefixing. The byte oracle is
//! the only input; the output is an ordered statement sequence plus the next
//! instruction's address.

use crate::architecture::Endian;
use crate::error::*;
use crate::il::*;
use crate::translator::{ByteOracle, InstructionTranslationResult, Translator};

mod opcode;
mod operand;
mod prefix;
mod register;
mod semantics;

#[cfg(test)]
mod test;

pub use self::register::variables;

use self::prefix::Prefixes;
use self::semantics::Semantics;

pub struct X86;

impl X86 {
    pub fn new() -> X86 {
        X86
    }

    /// Lift the instruction at `address`.
    ///
    /// Only the low 32 bits of the address are architecturally meaningful.
    /// On an unsupported opcode the error carries the prefix and opcode bytes
    /// consumed; no guess is made about the rest of the instruction.
    pub fn lift<O>(&self, oracle: &O, address: u64) -> Result<InstructionTranslationResult>
    where
        O: ByteOracle + ?Sized,
    {
        let (prefixes, opcode_address) = Prefixes::scan(oracle, address)?;
        let (opcode, next_address) = opcode::classify(oracle, opcode_address, &prefixes)?;

        let mut semantics = Semantics::new(&prefixes, address, next_address);
        semantics.emit(&opcode)?;

        let mut statements = vec![
            Statement::address_label(address)
                .with_attribute(Attribute::Asm(opcode.mnemonic())),
            Statement::name_label(format!("pc_0x{:x}", address)),
        ];
        statements.extend(semantics.into_statements());

        Ok(InstructionTranslationResult::new(
            statements,
            address,
            next_address,
        ))
    }
}

impl Default for X86 {
    fn default() -> X86 {
        X86::new()
    }
}

impl Translator for X86 {
    fn lift(&self, oracle: &dyn ByteOracle, address: u64) -> Result<InstructionTranslationResult> {
        X86::lift(self, oracle, address)
    }

    fn endian(&self) -> Endian {
        Endian::Little
    }
}
