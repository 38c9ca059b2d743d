//! The Bitcoin transaction type.
//!
//! Only the legacy (pre-segwit) layout is represented. The builder emits
//! unsigned transactions, which carry no witnesses, and the coloring engine
//! reads only outputs and input outpoints, so witness data never matters
//! here. Providers fetching segwit transactions from the network should
//! hand over the stripped form.

use std::io::{Read, Write};

use openassets_core::{
    hashes::{Hash256Writer, MarkedDigestWriter},
    ser::{ByteFormat, SerError, SerResult},
};

use crate::{
    hashes::TXID,
    types::txin::{Outpoint, TxIn, Vin},
    types::txout::{TxOut, Vout},
};

/// A legacy Bitcoin transaction.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct Tx {
    /// The version number.
    pub version: u32,
    /// The vector of inputs.
    pub vin: Vin,
    /// The vector of outputs.
    pub vout: Vout,
    /// The nLockTime field.
    pub locktime: u32,
}

impl Tx {
    /// Instantiate a new transaction from its parts.
    pub fn new<I, O>(version: u32, vin: I, vout: O, locktime: u32) -> Self
    where
        I: Into<Vec<TxIn>>,
        O: Into<Vec<TxOut>>,
    {
        Tx {
            version,
            vin: vin.into(),
            vout: vout.into(),
            locktime,
        }
    }

    /// Calculate the txid: the double SHA-256 of the serialized
    /// transaction.
    pub fn txid(&self) -> TXID {
        let mut w = Hash256Writer::default();
        // writing into a hasher is infallible
        let _ = self.write_to(&mut w);
        w.finish_marked()
    }

    /// True if this is a coinbase transaction: a single input spending the
    /// null outpoint.
    pub fn is_coinbase(&self) -> bool {
        self.vin.len() == 1 && self.vin[0].outpoint == Outpoint::null()
    }
}

impl ByteFormat for Tx {
    type Error = SerError;

    fn serialized_length(&self) -> usize {
        let mut len = 4; // version
        len += openassets_core::ser::prefix_byte_len(self.vin.len() as u64) as usize;
        len += self.vin.serialized_length();
        len += openassets_core::ser::prefix_byte_len(self.vout.len() as u64) as usize;
        len += self.vout.serialized_length();
        len += 4; // locktime
        len
    }

    fn read_from<R>(reader: &mut R, _limit: usize) -> SerResult<Self>
    where
        R: Read,
        Self: std::marker::Sized,
    {
        let version = Self::read_u32_le(reader)?;
        let vin = Self::read_prefix_vec(reader)?;
        let vout = Self::read_prefix_vec(reader)?;
        let locktime = Self::read_u32_le(reader)?;
        Ok(Tx {
            version,
            vin,
            vout,
            locktime,
        })
    }

    fn write_to<W>(&self, writer: &mut W) -> SerResult<usize>
    where
        W: Write,
    {
        let mut len = Self::write_u32_le(writer, self.version)?;
        len += Self::write_prefix_vec(writer, &self.vin)?;
        len += Self::write_prefix_vec(writer, &self.vout)?;
        len += Self::write_u32_le(writer, self.locktime)?;
        Ok(len)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::script::ScriptSig;

    #[test]
    fn it_serializes_and_derializes_transactions() {
        let tx = Tx::new(
            1u32,
            vec![TxIn::new(Outpoint::null(), ScriptSig::null(), 0xffff_ffff)],
            vec![TxOut::new(5000u64, vec![0x51])],
            0,
        );
        let hex = concat!(
            "01000000",
            "01",
            "0000000000000000000000000000000000000000000000000000000000000000ffffffff",
            "00",
            "ffffffff",
            "01",
            "8813000000000000",
            "0151",
            "00000000",
        );
        assert_eq!(tx.serialize_hex(), hex);
        assert_eq!(tx.serialized_length(), hex.len() / 2);
        assert_eq!(Tx::deserialize_hex(hex).unwrap(), tx);
    }

    #[test]
    fn it_detects_coinbase_transactions() {
        let coinbase = Tx::new(
            1u32,
            vec![TxIn::new(Outpoint::null(), ScriptSig::null(), 0)],
            vec![TxOut::new(50_0000_0000u64, vec![0x51])],
            0,
        );
        assert!(coinbase.is_coinbase());

        let spend = Tx::new(
            1u32,
            vec![TxIn::new(Outpoint::new(coinbase.txid(), 0), ScriptSig::null(), 0)],
            vec![],
            0,
        );
        assert!(!spend.is_coinbase());
    }
}
