//! x86 legacy prefix scanning.

use crate::error::*;
use crate::il::*;
use crate::translator::x86::register;
use crate::translator::ByteOracle;

/// The longest legal run of legacy prefixes.
const MAX_PREFIX_BYTES: usize = 4;

/// A segment override prefix.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Segment {
    Cs,
    Ss,
    Ds,
    Es,
    Fs,
    Gs,
}

impl Segment {
    /// The base variable this segment adds to effective addresses, or `None`
    /// for the segments with a zero base.
    pub fn base(&self) -> Option<Variable> {
        match *self {
            Segment::Fs => Some(register::fs_base()),
            Segment::Gs => Some(register::gs_base()),
            Segment::Cs | Segment::Ss | Segment::Ds | Segment::Es => None,
        }
    }
}

/// The legacy prefixes of one instruction.
///
/// Conflicting segment overrides resolve to the last one seen. REPZ and REPNZ
/// are mutually exclusive; the last one seen wins. LOCK is accepted and
/// discarded, as the IL carries no atomicity marker.
#[derive(Clone, Debug)]
pub(crate) struct Prefixes {
    repz: bool,
    repnz: bool,
    segment: Option<Segment>,
    operand_size_override: bool,
    address_size_override: bool,
    /// The raw prefix bytes, in scan order, for error reporting.
    bytes: Vec<u8>,
}

impl Prefixes {
    /// Scan up to four legacy prefixes starting at `address`. Returns the
    /// prefixes and the address of the first non-prefix byte.
    pub fn scan<O: ByteOracle + ?Sized>(oracle: &O, address: u64) -> Result<(Prefixes, u64)> {
        let mut prefixes = Prefixes {
            repz: false,
            repnz: false,
            segment: None,
            operand_size_override: false,
            address_size_override: false,
            bytes: Vec::new(),
        };

        let mut address = address;
        while prefixes.bytes.len() < MAX_PREFIX_BYTES {
            let (byte, next) = oracle.read_u8(address)?;
            match byte {
                // lock is accepted and discarded
                0xf0 => {}
                0xf2 => {
                    prefixes.repnz = true;
                    prefixes.repz = false;
                }
                0xf3 => {
                    prefixes.repz = true;
                    prefixes.repnz = false;
                }
                0x2e => prefixes.segment = Some(Segment::Cs),
                0x36 => prefixes.segment = Some(Segment::Ss),
                0x3e => prefixes.segment = Some(Segment::Ds),
                0x26 => prefixes.segment = Some(Segment::Es),
                0x64 => prefixes.segment = Some(Segment::Fs),
                0x65 => prefixes.segment = Some(Segment::Gs),
                0x66 => prefixes.operand_size_override = true,
                0x67 => prefixes.address_size_override = true,
                _ => break,
            }
            prefixes.bytes.push(byte);
            address = next;
        }

        Ok((prefixes, address))
    }

    /// The current operand size in bits: 16 under the operand-size override,
    /// 32 otherwise.
    pub fn operand_bits(&self) -> usize {
        if self.operand_size_override {
            16
        } else {
            32
        }
    }

    /// The current MMX/SSE operand size in bits: 128 under the operand-size
    /// override, 64 otherwise.
    pub fn simd_bits(&self) -> usize {
        if self.operand_size_override {
            128
        } else {
            64
        }
    }

    /// The current address size in bits: 16 under the address-size override,
    /// 32 otherwise.
    pub fn address_bits(&self) -> usize {
        if self.address_size_override {
            16
        } else {
            32
        }
    }

    /// The segment base to add to effective addresses, if any.
    pub fn segment_base(&self) -> Option<Variable> {
        self.segment.and_then(|segment| segment.base())
    }

    pub fn repz(&self) -> bool {
        self.repz
    }

    pub fn repnz(&self) -> bool {
        self.repnz
    }

    /// The raw prefix bytes consumed.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}
