//! Translates native architectures to Kestrel IL.

use crate::architecture::Endian;
use crate::error::*;
use crate::il::*;

pub mod x86;

/// This trait is used by the translator to fetch instruction bytes from an
/// underlying memory model.
///
/// Anything that implements this trait can be used as a byte source for
/// lifting. The oracle must be pure: two reads of the same address must
/// return the same byte, and it must not fail within a valid decode region.
pub trait ByteOracle {
    fn get_u8(&self, address: u64) -> Option<u8>;

    /// Read one byte, returning the byte and the address after it.
    fn read_u8(&self, address: u64) -> Result<(u8, u64)> {
        match self.get_u8(address) {
            Some(byte) => Ok((byte, address.wrapping_add(1))),
            None => Err(ErrorKind::AccessUnmappedMemory(address).into()),
        }
    }

    /// Read a little-endian u16, returning the value and the address after
    /// it.
    fn read_u16(&self, address: u64) -> Result<(u16, u64)> {
        let (lo, address) = self.read_u8(address)?;
        let (hi, address) = self.read_u8(address)?;
        Ok((u16::from(lo) | (u16::from(hi) << 8), address))
    }

    /// Read a little-endian u32, returning the value and the address after
    /// it.
    fn read_u32(&self, address: u64) -> Result<(u32, u64)> {
        let (lo, address) = self.read_u16(address)?;
        let (hi, address) = self.read_u16(address)?;
        Ok((u32::from(lo) | (u32::from(hi) << 16), address))
    }
}

impl ByteOracle for [u8] {
    fn get_u8(&self, address: u64) -> Option<u8> {
        self.get(address as usize).copied()
    }
}

impl ByteOracle for Vec<u8> {
    fn get_u8(&self, address: u64) -> Option<u8> {
        self.as_slice().get_u8(address)
    }
}

/// The result of lifting one native instruction.
pub struct InstructionTranslationResult {
    /// The lifted statements, in execution order.
    statements: Vec<Statement>,
    /// The address the instruction was lifted from.
    address: u64,
    /// The address of the following instruction.
    next_address: u64,
}

impl InstructionTranslationResult {
    pub(crate) fn new(
        statements: Vec<Statement>,
        address: u64,
        next_address: u64,
    ) -> InstructionTranslationResult {
        InstructionTranslationResult {
            statements,
            address,
            next_address,
        }
    }

    /// Get the statements of this `InstructionTranslationResult`.
    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    /// Get the address wherefrom this instruction was lifted.
    pub fn address(&self) -> u64 {
        self.address
    }

    /// Get the address of the instruction following this one.
    pub fn next_address(&self) -> u64 {
        self.next_address
    }

    /// Get the length of this instruction in bytes.
    pub fn length(&self) -> usize {
        (self.next_address - self.address) as usize
    }

    /// Consume this result and return its statements.
    pub fn into_statements(self) -> Vec<Statement> {
        self.statements
    }
}

pub trait Translator {
    /// Lift a single instruction.
    fn lift(&self, oracle: &dyn ByteOracle, address: u64) -> Result<InstructionTranslationResult>;

    /// Get the endianness of this `Translator`.
    fn endian(&self) -> Endian;
}
