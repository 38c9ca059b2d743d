//! Re-exports of the crate's commonly used types and traits.

pub use crate::builder::{
    BuildError, IssuanceParameters, TransactionBuilder, TransferParameters, DEFAULT_DUST_AMOUNT,
};
pub use crate::cache::{MemoryCache, NoCache, OutputCache};
pub use crate::coloring::{ColoringEngine, ColoringError, TransactionProvider};
pub use crate::hashes::{AssetId, TXID};
pub use crate::leb128::{Leb128Error, MAX_ASSET_QUANTITY};
pub use crate::marker::{MarkerError, MarkerPayload, MARKER_TAG, MARKER_VERSION};
pub use crate::types::*;

pub use openassets_core::hashes::{hash160, Hash160Digest, Hash256Digest};
pub use openassets_core::ser::ByteFormat;
