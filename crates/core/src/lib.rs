//! # Open Assets Core
//!
//! `openassets-core` contains the serialization and hashing utilities used
//! by the `openassets` crate.
//!
//! ## Crate Layout
//!
//! ### Hashes
//!
//! The hashes module provides Bitcoin's two standard digests: `Hash256`
//! (double SHA-256, used for transaction ids) and `hash160`
//! (RIPEMD-160 of SHA-256, used for asset ids). Digests intended for a
//! specific purpose are newtyped via the `mark_hash256!` macro to prevent
//! type-confusion between txids and other 32-byte values.
//!
//! ### ByteFormat trait
//!
//! The `ByteFormat` trait is a simple binary (de)serialization API using
//! `std::io::{Read, Write}`. Implementers define the wire format of the
//! type; the provided methods cover Bitcoin-style CompactSize varints,
//! little-endian integers, length-prefixed vectors, and hex round-trips.
//!
//! `ByteFormat` has an associated `Error` type. Most basic types can simply
//! use the provided `SerError`. More complex deserialization (e.g. payload
//! validation) should define its own error type, instantiable from a
//! `SerError` or a `std::io::Error`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(unused_extern_crates)]

#[macro_use]
pub mod macros;

pub mod hashes;
pub mod ser;
