//! Simple types for Bitcoin Script, each treated as an opaque wrapped byte
//! vector.
//!
//! We do not handle assembly, disassembly, or Script execution. Scripts are
//! opaque byte vectors with no semantics, with one exception: the OP_RETURN
//! + push shape that carries the Open Assets marker payload.

use openassets_core::wrap_prefixed_byte_vector;

/// The opcode prefixing a data-carrier output script.
pub const OP_RETURN: u8 = 0x6a;

/// Push opcode for payloads of 76..=255 bytes.
pub const OP_PUSHDATA1: u8 = 0x4c;

/// Push opcode for payloads of up to 2^16 - 1 bytes.
pub const OP_PUSHDATA2: u8 = 0x4d;

/// Push opcode for payloads of up to 2^32 - 1 bytes.
pub const OP_PUSHDATA4: u8 = 0x4e;

wrap_prefixed_byte_vector!(
    /// A ScriptPubkey is a wrapped byte vector locking an output. It is
    /// treated as opaque: the builder and the coloring engine address
    /// outputs by script equality, never by script semantics.
    ///
    /// `ScriptPubkey::null()` and `ScriptPubkey::default()` return the empty
    /// byte vector.
    ScriptPubkey
);

wrap_prefixed_byte_vector!(
    /// A ScriptSig is a wrapped byte vector for use in transaction inputs.
    /// Unsigned transactions carry empty script sigs.
    ScriptSig
);

impl ScriptPubkey {
    /// True if the script starts with the OP_RETURN opcode.
    pub fn is_op_return(&self) -> bool {
        !self.is_empty() && self[0] == OP_RETURN
    }

    /// Extract the payload pushed by an OP_RETURN script. `None` if the
    /// script is not an OP_RETURN, if the push opcode is not a standard
    /// push (direct, PUSHDATA1/2/4), or if the push is truncated.
    ///
    /// The payload is the first push; trailing script bytes are ignored.
    pub fn extract_op_return_data(&self) -> Option<Vec<u8>> {
        if !self.is_op_return() {
            return None;
        }
        let body = &self.items()[1..];
        let (opcode, rest) = body.split_first()?;
        let (len, rest) = match *opcode {
            len @ 0x01..=0x4b => (len as usize, rest),
            OP_PUSHDATA1 => {
                let (len, rest) = rest.split_first()?;
                (*len as usize, rest)
            }
            OP_PUSHDATA2 => {
                if rest.len() < 2 {
                    return None;
                }
                let len = u16::from_le_bytes([rest[0], rest[1]]) as usize;
                (len, &rest[2..])
            }
            OP_PUSHDATA4 => {
                if rest.len() < 4 {
                    return None;
                }
                let len = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
                (len, &rest[4..])
            }
            _ => return None,
        };
        if rest.len() < len {
            return None;
        }
        Some(rest[..len].to_vec())
    }
}
