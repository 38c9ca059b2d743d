//! Bitcoin's standard digests, and tooling for disambiguating digests via
//! marker newtypes.
//!
//! We wrap 32-byte hashes in marked newtypes in order to prevent
//! type-confusion between txids and other digests with the same length.

use digest::Digest;
use ripemd::Ripemd160;
use sha2::Sha256;
use std::io::{Read, Result as IOResult, Write};

use crate::ser::{ByteFormat, SerError, SerResult};

/// Output of Bitcoin's double SHA-256.
pub type Hash256Digest = [u8; 32];

/// Output of Bitcoin's RIPEMD-160 of SHA-256.
pub type Hash160Digest = [u8; 20];

/// A digest newtype marked for a specific purpose.
pub trait MarkedDigest: Default + Copy {
    /// The underlying digest type.
    type Digest;

    /// Wrap a digest in the marked type.
    fn new(digest: Self::Digest) -> Self;

    /// Return the wrapped digest.
    fn internal(&self) -> Self::Digest;

    /// Return the digest as a byte vector.
    fn bytes(&self) -> Vec<u8>;
}

/// An accumulating hash writer that produces a digest when finished.
pub trait MarkedDigestWriter<T>: Default + Write {
    /// Consume the writer, producing the digest.
    fn finish(self) -> T;

    /// Consume the writer, producing a marked digest.
    fn finish_marked<M>(self) -> M
    where
        Self: Sized,
        M: MarkedDigest<Digest = T>,
    {
        M::new(self.finish())
    }
}

impl ByteFormat for Hash256Digest {
    type Error = SerError;

    fn serialized_length(&self) -> usize {
        32
    }

    fn read_from<R>(reader: &mut R, _limit: usize) -> SerResult<Self>
    where
        R: Read,
        Self: std::marker::Sized,
    {
        let mut buf = Hash256Digest::default();
        reader.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn write_to<W>(&self, writer: &mut W) -> SerResult<usize>
    where
        W: Write,
    {
        Ok(writer.write(self)?)
    }
}

impl ByteFormat for Hash160Digest {
    type Error = SerError;

    fn serialized_length(&self) -> usize {
        20
    }

    fn read_from<R>(reader: &mut R, _limit: usize) -> SerResult<Self>
    where
        R: Read,
        Self: std::marker::Sized,
    {
        let mut buf = Hash160Digest::default();
        reader.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn write_to<W>(&self, writer: &mut W) -> SerResult<usize>
    where
        W: Write,
    {
        Ok(writer.write(self)?)
    }
}

/// A struct that exposes a Bitcoin-style Hash256 `Write` interface by
/// wrapping an internal SHA2 instance.
///
/// Writing more than once updates the hasher; call `finish` to consume it
/// and produce the digest.
#[derive(Default)]
pub struct Hash256Writer {
    internal: Sha256,
}

impl Write for Hash256Writer {
    fn write(&mut self, buf: &[u8]) -> IOResult<usize> {
        self.internal.update(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> IOResult<()> {
        Ok(())
    }
}

impl MarkedDigestWriter<Hash256Digest> for Hash256Writer {
    fn finish(self) -> Hash256Digest {
        let first = self.internal.finalize();
        let second = Sha256::digest(first);
        second.into()
    }
}

/// Compute Bitcoin's Hash160 (RIPEMD-160 of SHA-256) of a preimage.
pub fn hash160(preimage: &[u8]) -> Hash160Digest {
    let sha = Sha256::digest(preimage);
    Ripemd160::digest(sha).into()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn it_computes_double_sha256() {
        let mut w = Hash256Writer::default();
        w.write_all(&[0]).unwrap();
        w.flush().unwrap();
        assert_eq!(
            w.finish(),
            Hash256Digest::deserialize_hex(
                "1406e05881e299367766d313e26c05564ec91bf721d31726bd6e46e60689539a"
            )
            .unwrap()
        );
    }

    #[test]
    fn it_computes_hash160() {
        // hash160 of the empty preimage
        assert_eq!(
            hash160(&[]),
            Hash160Digest::deserialize_hex("b472a266d0bd89c13706a4132ccfb16f7c3b9fcb").unwrap()
        );
    }
}
