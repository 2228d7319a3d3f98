#![recursion_limit = "128"]

//! Kestrel: an x86 decoder and semantic lifter in Rust.
//!
//! Kestrel translates raw 32-bit x86 instruction bytes into a typed
//! intermediate language of side-effect-free expressions and explicit
//! state-updating statements. A quick synopsis of Kestrel's modules:
//!
//! * **il** - Kestrel's Intermediate Language.
//! * **translator** - The translator from x86 to Kestrel IL.
//!
//! Lifting a single instruction looks like this:
//!
//! ```
//! # use kestrel::error::*;
//! use kestrel::translator::x86::X86;
//!
//! # fn example() -> Result<()> {
//! // mov eax, 42
//! let bytes: &[u8] = &[0xb8, 0x2a, 0x00, 0x00, 0x00];
//! let result = X86::new().lift(bytes, 0)?;
//! for statement in result.statements() {
//!     println!("{}", statement);
//! }
//! assert_eq!(result.next_address(), 5);
//! # Ok(())
//! # }
//! ```
//!
//! The lifter consumes a [`translator::ByteOracle`] and a starting address,
//! and produces an ordered sequence of IL statements plus the address of the
//! following instruction. It never executes anything; downstream analyses
//! interpret the IL.

#[macro_use]
extern crate error_chain;

pub mod architecture;
pub mod il;
pub mod translator;

/// Kestrel Error types.
pub mod error {
    error_chain! {
        types {
            Error, ErrorKind, ResultExt, Result;
        }

        errors {
            AccessUnmappedMemory(address: u64) {
                description("Attempt to access unmapped memory")
                display("Attempt to access unmapped memory at address 0x{:x}", address)
            }
            InvalidEncoding(detail: String) {
                description("Structurally impossible instruction encoding")
                display("Invalid encoding: {}", detail)
            }
            UnsupportedOpcode(prefix_bytes: Vec<u8>, opcode_bytes: Vec<u8>) {
                description("The opcode is not handled by the lifter")
                display("Unsupported opcode: prefixes {:02x?}, opcode {:02x?}",
                        prefix_bytes, opcode_bytes)
            }
            UnsupportedOperandForm(opcode: String, detail: String) {
                description("The operand form is not valid for this opcode")
                display("Unsupported operand form for {}: {}", opcode, detail)
            }
            WidthMismatch(detail: String) {
                description("Width mismatch between expressions")
                display("Width mismatch: {}", detail)
            }
        }
    }
}

pub use crate::error::*;
