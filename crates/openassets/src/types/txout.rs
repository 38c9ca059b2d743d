//! Bitcoin TxOut and Vout types.

use std::io::{Read, Write};

use openassets_core::ser::{ByteFormat, SerError, SerResult};

use crate::types::script::{ScriptPubkey, OP_PUSHDATA1, OP_PUSHDATA2, OP_PUSHDATA4, OP_RETURN};

/// An Output. This describes a new UTXO to be created. The value is encoded
/// as an LE u64. The script pubkey encodes the spending constraints.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct TxOut {
    /// The value of the output in satoshis
    pub value: u64,
    /// The `ScriptPubkey` which locks the UTXO.
    pub script_pubkey: ScriptPubkey,
}

impl Default for TxOut {
    fn default() -> Self {
        Self::null()
    }
}

impl TxOut {
    /// Instantiate a new TxOut.
    pub fn new<T>(value: u64, script_pubkey: T) -> Self
    where
        T: Into<ScriptPubkey>,
    {
        TxOut {
            value,
            script_pubkey: script_pubkey.into(),
        }
    }

    /// Instantiate the null TxOut.
    pub fn null() -> Self {
        TxOut {
            value: 0,
            script_pubkey: ScriptPubkey::null(),
        }
    }

    /// Instantiate a zero-value OP_RETURN output carrying `data`. The push
    /// opcode is selected by payload length: a direct push up to 75 bytes,
    /// then OP_PUSHDATA1/2/4.
    pub fn op_return(data: &[u8]) -> Self {
        let mut payload = vec![OP_RETURN];
        match data.len() {
            0..=75 => payload.push(data.len() as u8),
            76..=0xff => {
                payload.push(OP_PUSHDATA1);
                payload.push(data.len() as u8);
            }
            0x100..=0xffff => {
                payload.push(OP_PUSHDATA2);
                payload.extend_from_slice(&(data.len() as u16).to_le_bytes());
            }
            _ => {
                payload.push(OP_PUSHDATA4);
                payload.extend_from_slice(&(data.len() as u32).to_le_bytes());
            }
        }
        payload.extend_from_slice(data);
        TxOut {
            value: 0,
            script_pubkey: ScriptPubkey::from(payload),
        }
    }

    /// Extract the OP_RETURN payload. None if not an OP_RETURN.
    pub fn extract_op_return_data(&self) -> Option<Vec<u8>> {
        self.script_pubkey.extract_op_return_data()
    }
}

impl ByteFormat for TxOut {
    type Error = SerError;

    fn serialized_length(&self) -> usize {
        let mut len = 8; // value
        len += self.script_pubkey.serialized_length();
        len
    }

    fn read_from<R>(reader: &mut R, _limit: usize) -> SerResult<Self>
    where
        R: Read,
        Self: std::marker::Sized,
    {
        let value = Self::read_u64_le(reader)?;
        Ok(TxOut {
            value,
            script_pubkey: ScriptPubkey::read_from(reader, 0)?,
        })
    }

    fn write_to<W>(&self, writer: &mut W) -> SerResult<usize>
    where
        W: Write,
    {
        let mut len = Self::write_u64_le(writer, self.value)?;
        len += self.script_pubkey.write_to(writer)?;
        Ok(len)
    }
}

/// Vout is a type alias for `Vec<TxOut>`. A transaction's Vout is the
/// Vector of OUTputs, with a length prefix.
pub type Vout = Vec<TxOut>;
