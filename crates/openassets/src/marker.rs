//! The Open Assets marker payload codec.
//!
//! A transaction is marked by an OP_RETURN output whose pushed payload
//! starts with the 4-byte prefix `4f 41 01 00`: the ASCII tag `OA` followed
//! by the two wire bytes of protocol version 1. The payload then carries a
//! CompactSize-prefixed list of LEB128 asset quantities and a
//! CompactSize-prefixed metadata blob.

use std::io::{Error as IOError, Read, Write};
use thiserror::Error;

use openassets_core::ser::{ByteFormat, SerError};

use crate::{
    leb128::{encoded_len, read_leb128, write_leb128, Leb128Error},
    types::script::ScriptPubkey,
    types::txout::TxOut,
};

/// The two-byte ASCII tag opening every marker payload.
pub const MARKER_TAG: [u8; 2] = [0x4f, 0x41]; // "OA"

/// The marker payload version understood by this crate.
pub const MARKER_VERSION: u16 = 1;

/// Errors local to a candidate marker payload. These are never fatal at the
/// transaction level: a payload that fails to parse simply means the output
/// is not a marker.
#[derive(Debug, Error)]
pub enum MarkerError {
    /// The payload does not open with the `OA` tag.
    #[error("payload does not carry the Open Assets tag")]
    BadMagic,

    /// The payload carries a version other than 1.
    #[error("unsupported marker version: {0}")]
    UnsupportedVersion(u16),

    /// The metadata blob is shorter than its declared length.
    #[error("metadata is shorter than its declared length")]
    TruncatedMetadata,

    /// An asset quantity failed to decode.
    #[error(transparent)]
    Leb128(#[from] Leb128Error),

    /// Serialization-related errors.
    #[error(transparent)]
    Ser(#[from] SerError),

    /// IOError bubbled up from the underlying reader or writer.
    #[error(transparent)]
    IOError(#[from] IOError),
}

/// The parsed content of a marker output.
#[derive(serde::Serialize, serde::Deserialize, Clone, Debug, Eq, PartialEq)]
pub struct MarkerPayload {
    /// The marker payload version.
    pub version: u16,
    /// The asset quantity list, one slot per non-marker output in
    /// positional order.
    pub asset_quantities: Vec<u64>,
    /// Arbitrary issuer metadata.
    pub metadata: Vec<u8>,
}

impl MarkerPayload {
    /// Instantiate a version-1 payload from a quantity list and metadata.
    pub fn new(asset_quantities: Vec<u64>, metadata: Vec<u8>) -> Self {
        MarkerPayload {
            version: MARKER_VERSION,
            asset_quantities,
            metadata,
        }
    }

    /// Parse a script as a marker. `Some` iff the script is OP_RETURN
    /// followed by a standard push whose payload parses as a version-1
    /// marker. Structural failures are reported by [`Self::parse_script`];
    /// this wrapper collapses them to `None`.
    pub fn from_script(script: &ScriptPubkey) -> Option<Self> {
        script
            .extract_op_return_data()
            .and_then(|payload| Self::deserialize(&payload).ok())
    }

    /// Parse the pushed payload of a script, surfacing the failure reason.
    /// `Ok(None)` means the script is not an OP_RETURN push at all;
    /// `Err` means the push was present but the payload is not a
    /// well-formed marker.
    pub fn parse_script(script: &ScriptPubkey) -> Result<Option<Self>, MarkerError> {
        match script.extract_op_return_data() {
            None => Ok(None),
            Some(payload) => Self::deserialize(&payload).map(Some),
        }
    }

    /// Deserialize a payload from a byte slice. Trailing bytes after the
    /// metadata are tolerated, matching the original protocol decoder.
    pub fn deserialize(payload: &[u8]) -> Result<Self, MarkerError> {
        Self::read_from(&mut &payload[..], 0)
    }

    /// Build the zero-value OP_RETURN output carrying this payload.
    pub fn output(&self) -> TxOut {
        let mut payload = vec![];
        // in-memory writes are infallible; quantity range is checked by
        // the builder before it gets here
        let _ = self.write_to(&mut payload);
        TxOut::op_return(&payload)
    }
}

impl ByteFormat for MarkerPayload {
    type Error = MarkerError;

    fn serialized_length(&self) -> usize {
        let mut len = 4; // tag + version
        len += openassets_core::ser::prefix_byte_len(self.asset_quantities.len() as u64) as usize;
        len += self
            .asset_quantities
            .iter()
            .map(|q| encoded_len(*q))
            .sum::<usize>();
        len += openassets_core::ser::prefix_byte_len(self.metadata.len() as u64) as usize;
        len += self.metadata.len();
        len
    }

    fn read_from<R>(reader: &mut R, _limit: usize) -> Result<Self, Self::Error>
    where
        R: Read,
        Self: std::marker::Sized,
    {
        let mut tag = [0u8; 2];
        reader.read_exact(&mut tag)?;
        if tag != MARKER_TAG {
            return Err(MarkerError::BadMagic);
        }
        let version = Self::read_u16_le(reader)?;
        if version != MARKER_VERSION {
            return Err(MarkerError::UnsupportedVersion(version));
        }

        let quantity_count = Self::read_compact_int(reader)?;
        let mut asset_quantities = Vec::with_capacity(quantity_count.min(0xff) as usize);
        for _ in 0..quantity_count {
            asset_quantities.push(read_leb128(reader)?);
        }

        let metadata_length = Self::read_compact_int(reader)?;
        let mut metadata = vec![0u8; metadata_length as usize];
        reader
            .read_exact(&mut metadata)
            .map_err(|_| MarkerError::TruncatedMetadata)?;

        Ok(MarkerPayload {
            version,
            asset_quantities,
            metadata,
        })
    }

    fn write_to<W>(&self, writer: &mut W) -> Result<usize, Self::Error>
    where
        W: Write,
    {
        let mut len = writer.write(&MARKER_TAG)?;
        len += Self::write_u16_le(writer, self.version)?;
        len += Self::write_compact_int(writer, self.asset_quantities.len() as u64)?;
        for quantity in self.asset_quantities.iter() {
            len += write_leb128(writer, *quantity)?;
        }
        len += Self::write_compact_int(writer, self.metadata.len() as u64)?;
        len += writer.write(&self.metadata)?;
        Ok(len)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    // Marker payload from the published protocol examples: quantities
    // [10, 1, 19] and the metadata "u=https://cpr.sm/5YgSU1Pg-q".
    const EXAMPLE_PAYLOAD: &str =
        "4f410100030a01131b753d68747470733a2f2f6370722e736d2f35596753553150672d71";

    #[test]
    fn it_parses_the_protocol_example_payload() {
        let payload = MarkerPayload::deserialize(&hex::decode(EXAMPLE_PAYLOAD).unwrap()).unwrap();
        assert_eq!(payload.version, 1);
        assert_eq!(payload.asset_quantities, vec![10, 1, 19]);
        assert_eq!(payload.metadata, b"u=https://cpr.sm/5YgSU1Pg-q".to_vec());
        assert_eq!(payload.serialize_hex(), EXAMPLE_PAYLOAD);
        assert_eq!(payload.serialized_length(), EXAMPLE_PAYLOAD.len() / 2);
    }

    #[test]
    fn it_round_trips_an_empty_payload() {
        let payload = MarkerPayload::new(vec![], vec![]);
        assert_eq!(payload.serialize_hex(), "4f4101000000");
        assert_eq!(
            MarkerPayload::deserialize(&hex::decode("4f4101000000").unwrap()).unwrap(),
            payload
        );
    }

    #[test]
    fn it_round_trips_through_an_op_return_output() {
        let payload = MarkerPayload::new(vec![1500], b"metadata".to_vec());
        let output = payload.output();
        assert_eq!(output.value, 0);
        assert_eq!(MarkerPayload::from_script(&output.script_pubkey), Some(payload));
    }

    #[test]
    fn it_rejects_malformed_payloads() {
        let cases = [
            // wrong tag
            "4f420100000000",
            // version 2
            "4f410200000000",
            // quantity list cut short
            "4f41010003ac",
            // metadata shorter than declared
            "4f410100000568",
        ];
        for case in cases.iter() {
            assert!(MarkerPayload::deserialize(&hex::decode(case).unwrap()).is_err());
        }
    }

    #[test]
    fn it_is_not_a_marker_without_the_op_return_shape() {
        // the example payload, but in a bare (non-OP_RETURN) script
        let script = ScriptPubkey::new(hex::decode(EXAMPLE_PAYLOAD).unwrap());
        assert_eq!(MarkerPayload::from_script(&script), None);
        assert!(matches!(MarkerPayload::parse_script(&script), Ok(None)));

        // OP_RETURN carrying something that is not a marker
        let output = TxOut::op_return(b"hello");
        assert_eq!(MarkerPayload::from_script(&output.script_pubkey), None);
        assert!(MarkerPayload::parse_script(&output.script_pubkey).is_err());
    }
}
