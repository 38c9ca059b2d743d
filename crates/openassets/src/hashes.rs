//! This module holds the marked digest and identifier types used throughout
//! the crate: `TXID` for transaction ids, and `AssetId` for Open Assets
//! asset identifiers.

use std::io::{Read, Write};
use std::str::FromStr;

use openassets_core::{
    hashes::{hash160, Hash160Digest},
    mark_hash256,
    ser::{ByteFormat, SerError, SerResult},
};

use crate::types::script::ScriptPubkey;

mark_hash256!(
    /// A marked Hash256Digest representing transaction IDs
    TXID
);

/// A 20-byte Open Assets asset identifier.
///
/// The asset id is the RIPEMD-160 of the SHA-256 of the output script of
/// the first input of the issuing transaction. Two outputs carry the same
/// asset iff their asset ids are equal.
#[derive(
    serde::Serialize, serde::Deserialize, Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord,
)]
pub struct AssetId(Hash160Digest);

impl AssetId {
    /// Derive the asset id bound to an issuance script.
    pub fn new(script: &ScriptPubkey) -> Self {
        Self(hash160(script.items()))
    }

    /// Wrap a raw 20-byte digest.
    pub fn from_bytes(bytes: Hash160Digest) -> Self {
        Self(bytes)
    }

    /// Return the raw 20-byte digest.
    pub fn as_bytes(&self) -> &Hash160Digest {
        &self.0
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for AssetId {
    type Err = SerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let v = hex::decode(s)?;
        let bytes: Hash160Digest = v
            .try_into()
            .map_err(|_| SerError::ComponentError("asset ids are 20 bytes".to_owned()))?;
        Ok(Self(bytes))
    }
}

impl ByteFormat for AssetId {
    type Error = SerError;

    fn serialized_length(&self) -> usize {
        20
    }

    fn read_from<R>(reader: &mut R, _limit: usize) -> SerResult<Self>
    where
        R: Read,
        Self: std::marker::Sized,
    {
        Ok(Self(Hash160Digest::read_from(reader, 0)?))
    }

    fn write_to<W>(&self, writer: &mut W) -> SerResult<usize>
    where
        W: Write,
    {
        self.0.write_to(writer)
    }
}
