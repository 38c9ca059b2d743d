//! Reference implementation of the Open Assets colored coin protocol.
//!
//! Open Assets layers assets onto Bitcoin by tagging transaction outputs
//! with an asset id and an asset quantity, carried by an OP_RETURN "marker"
//! output. This crate answers two questions about any Bitcoin output:
//! whether it is colored (and with which asset, in what quantity), and how
//! to assemble unsigned transactions that issue, transfer, swap, or burn
//! assets while conserving both asset units and satoshis.
//!
//! The two main entry points:
//!
//! - [`coloring::ColoringEngine`] resolves the colored attributes of every
//!   output of a transaction by recursively interpreting its ancestors,
//!   fetched through a caller-supplied [`coloring::TransactionProvider`]
//!   and memoized through an [`cache::OutputCache`].
//! - [`builder::TransactionBuilder`] plans unsigned transactions over a set
//!   of already-colored spendable outputs, respecting per-asset
//!   conservation, satoshi conservation, and a dust floor.
//!
//! Signing, broadcasting, key management, and address encoding are out of
//! scope; scripts are opaque byte strings throughout.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(unused_extern_crates)]

pub mod builder;
pub mod cache;
pub mod coloring;
pub mod hashes;
pub mod leb128;
pub mod marker;
pub mod prelude;
pub mod types;

pub use prelude::*;
