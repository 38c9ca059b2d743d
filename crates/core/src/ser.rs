//! A simple trait for binary (de)Serialization using std `Read` and `Write` traits.

use hex::FromHexError;
use std::io::{Cursor, Error as IOError, Read, Write};
use thiserror::Error;

/// Errors related to serialization of types.
#[derive(Debug, Error)]
pub enum SerError {
    /// VarInts must be minimal.
    #[error("Attempted to deserialize a non-minimal VarInt")]
    NonMinimalVarInt,

    /// IOError bubbled up from a `Read` or `Write` passed to a `ByteFormat`
    /// implementation.
    #[error(transparent)]
    IOError(#[from] IOError),

    /// `deserialize_hex` encountered an error on its input.
    #[error(transparent)]
    FromHexError(#[from] FromHexError),

    /// An error by a component call in data structure (de)serialization.
    #[error("Error in component (de)serialization: {0}")]
    ComponentError(String),
}

/// Type alias for serialization errors
pub type SerResult<T> = Result<T, SerError>;

/// Calculates the minimum prefix length for a VarInt encoding `number`
pub fn prefix_byte_len(number: u64) -> u8 {
    match number {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x10000..=0xffff_ffff => 5,
        _ => 9,
    }
}

/// Matches the length of the VarInt to the 1-byte flag
pub fn first_byte_from_len(number: u8) -> Option<u8> {
    match number {
        3 => Some(0xfd),
        5 => Some(0xfe),
        9 => Some(0xff),
        _ => None,
    }
}

/// Matches the VarInt prefix flag to the serialized length
pub fn prefix_len_from_first_byte(number: u8) -> u8 {
    match number {
        0..=0xfc => 1,
        0xfd => 3,
        0xfe => 5,
        0xff => 9,
    }
}

/// Convenience function for writing a Bitcoin-style VarInt
pub fn write_compact_int<W>(writer: &mut W, number: u64) -> Result<usize, SerError>
where
    W: Write,
{
    let prefix_len = prefix_byte_len(number);
    let written: usize = match first_byte_from_len(prefix_len) {
        None => writer.write(&[number as u8])?,
        Some(prefix) => {
            let mut written = writer.write(&[prefix])?;
            let body = number.to_le_bytes();
            written += writer.write(&body[..prefix_len as usize - 1])?;
            written
        }
    };
    Ok(written)
}

/// Convenience function for reading a Bitcoin-style VarInt
pub fn read_compact_int<R>(reader: &mut R) -> Result<u64, SerError>
where
    R: Read,
{
    let mut prefix = [0u8; 1];
    reader.read_exact(&mut prefix)?;
    let prefix_len = prefix_len_from_first_byte(prefix[0]);

    // Get the byte(s) representing the number, and parse as u64
    let number = if prefix_len > 1 {
        let mut buf = [0u8; 8];
        reader.read_exact(&mut buf[..prefix_len as usize - 1])?;
        u64::from_le_bytes(buf)
    } else {
        prefix[0] as u64
    };

    let minimal_length = prefix_byte_len(number);
    if minimal_length < prefix_len {
        Err(SerError::NonMinimalVarInt)
    } else {
        Ok(number)
    }
}

/// A simple trait for deserializing from `std::io::Read` and serializing to
/// `std::io::Write`. We have provided implementations for `u8` and
/// `Vec<T: ByteFormat>`.
///
/// `ByteFormat` is used in txid calculation, marker payload encoding, and
/// transaction serialization and deserialization.
pub trait ByteFormat {
    /// An associated error type
    type Error: From<SerError> + From<IOError> + std::error::Error;

    /// Returns the byte-length of the serialized data structure.
    fn serialized_length(&self) -> usize;

    /// Convenience function for reading a LE u16
    fn read_u16_le<R>(reader: &mut R) -> Result<u16, Self::Error>
    where
        R: Read,
    {
        let mut buf = [0u8; 2];
        reader.read_exact(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    /// Convenience function for reading a LE u32
    fn read_u32_le<R>(reader: &mut R) -> Result<u32, Self::Error>
    where
        R: Read,
    {
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Convenience function for reading a LE u64
    fn read_u64_le<R>(reader: &mut R) -> Result<u64, Self::Error>
    where
        R: Read,
    {
        let mut buf = [0u8; 8];
        reader.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Convenience function for reading a Bitcoin-style VarInt
    fn read_compact_int<R>(reader: &mut R) -> Result<u64, <Self as ByteFormat>::Error>
    where
        R: Read,
    {
        read_compact_int(reader).map_err(Into::into)
    }

    /// Convenience function for reading a prefixed vector
    fn read_prefix_vec<R, E, I>(reader: &mut R) -> Result<Vec<I>, <Self as ByteFormat>::Error>
    where
        R: Read,
        E: Into<Self::Error> + From<SerError> + From<IOError> + std::error::Error,
        I: ByteFormat<Error = E>,
    {
        let items = Self::read_compact_int(reader)?;
        let mut ret = vec![];
        for _ in 0..items {
            ret.push(I::read_from(reader, 0).map_err(Into::into)?);
        }
        Ok(ret)
    }

    /// Convenience function for writing a LE u16
    fn write_u16_le<W>(writer: &mut W, number: u16) -> Result<usize, <Self as ByteFormat>::Error>
    where
        W: Write,
    {
        Ok(writer.write(&number.to_le_bytes())?)
    }

    /// Convenience function for writing a LE u32
    fn write_u32_le<W>(writer: &mut W, number: u32) -> Result<usize, <Self as ByteFormat>::Error>
    where
        W: Write,
    {
        Ok(writer.write(&number.to_le_bytes())?)
    }

    /// Convenience function for writing a LE u64
    fn write_u64_le<W>(writer: &mut W, number: u64) -> Result<usize, <Self as ByteFormat>::Error>
    where
        W: Write,
    {
        Ok(writer.write(&number.to_le_bytes())?)
    }

    /// Convenience function for writing a Bitcoin-style VarInt
    fn write_compact_int<W>(
        writer: &mut W,
        number: u64,
    ) -> Result<usize, <Self as ByteFormat>::Error>
    where
        W: Write,
    {
        write_compact_int(writer, number).map_err(Into::into)
    }

    /// Convenience function to write a length-prefixed vector.
    fn write_prefix_vec<W, E, I>(
        writer: &mut W,
        vector: &[I],
    ) -> Result<usize, <Self as ByteFormat>::Error>
    where
        W: Write,
        E: Into<Self::Error> + From<SerError> + From<IOError> + std::error::Error,
        I: ByteFormat<Error = E>,
    {
        let mut written = Self::write_compact_int(writer, vector.len() as u64)?;
        for i in vector.iter() {
            written += i.write_to(writer).map_err(Into::into)?;
        }
        Ok(written)
    }

    /// Deserializes an instance of `Self` from a `std::io::Read`.
    /// The `limit` argument is used only when deserializing collections, and
    /// specifies a maximum number of instances of the underlying type to
    /// read.
    fn read_from<R>(reader: &mut R, limit: usize) -> Result<Self, Self::Error>
    where
        R: Read,
        Self: std::marker::Sized;

    /// Decodes a hex string to a `Vec<u8>`, deserializes an instance of
    /// `Self` from that vector.
    fn deserialize_hex(s: &str) -> Result<Self, Self::Error>
    where
        Self: std::marker::Sized,
    {
        let v: Vec<u8> = hex::decode(s).map_err(SerError::from)?;
        let mut cursor = Cursor::new(v);
        Self::read_from(&mut cursor, 0)
    }

    /// Serializes `Self` to a `std::io::Write`. Following `Write` trait
    /// conventions, its `Ok` type is a `usize` denoting the number of bytes
    /// written.
    fn write_to<W>(&self, writer: &mut W) -> Result<usize, <Self as ByteFormat>::Error>
    where
        W: Write;

    /// Serializes `self` to a vector, returns the hex-encoded vector
    fn serialize_hex(&self) -> String {
        let mut v: Vec<u8> = vec![];
        // in-memory writes are infallible
        let _ = self.write_to(&mut v);
        hex::encode(v)
    }
}

impl<E, I> ByteFormat for Vec<I>
where
    E: From<SerError> + From<IOError> + std::error::Error,
    I: ByteFormat<Error = E>,
{
    type Error = E;

    fn serialized_length(&self) -> usize {
        self.iter().map(|v| v.serialized_length()).sum()
    }

    fn read_from<T>(reader: &mut T, limit: usize) -> Result<Self, Self::Error>
    where
        T: Read,
        Self: std::marker::Sized,
    {
        let mut v = vec![];
        for _ in 0..limit {
            v.push(I::read_from(reader, 0)?);
        }
        Ok(v)
    }

    fn write_to<W>(&self, writer: &mut W) -> Result<usize, Self::Error>
    where
        W: Write,
    {
        let mut written = 0;
        for item in self.iter() {
            written += item.write_to(writer)?;
        }
        Ok(written)
    }
}

impl ByteFormat for u8 {
    type Error = SerError;

    fn serialized_length(&self) -> usize {
        1
    }

    fn read_from<R>(reader: &mut R, _limit: usize) -> SerResult<Self>
    where
        R: Read,
        Self: std::marker::Sized,
    {
        let mut buf = [0u8; 1];
        reader.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    fn write_to<W>(&self, writer: &mut W) -> SerResult<usize>
    where
        W: Write,
    {
        Ok(writer.write(&[*self])?)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn it_matches_byte_len_and_prefix() {
        let cases = [
            (1u64, 1u8, None),
            (0xff, 3, Some(0xfd)),
            (0xffff_ffff, 5, Some(0xfe)),
            (0xffff_ffff_ffff_ffff, 9, Some(0xff)),
        ];
        for case in cases.iter() {
            assert_eq!(prefix_byte_len(case.0), case.1);
            assert_eq!(first_byte_from_len(case.1), case.2);
        }
    }

    #[test]
    fn it_round_trips_compact_ints() {
        let cases = [0u64, 1, 0xfc, 0xfd, 0xffff, 0x1_0000, 0xffff_ffff, u64::MAX];
        for case in cases.iter() {
            let mut buf = vec![];
            let written = write_compact_int(&mut buf, *case).unwrap();
            assert_eq!(written, prefix_byte_len(*case) as usize);
            assert_eq!(read_compact_int(&mut buf.as_slice()).unwrap(), *case);
        }
    }

    #[test]
    fn it_rejects_non_minimal_compact_ints() {
        // 0xfc encoded with a 3-byte prefix
        let non_minimal = [0xfdu8, 0xfc, 0x00];
        match read_compact_int(&mut non_minimal.as_slice()) {
            Err(SerError::NonMinimalVarInt) => {}
            other => panic!("expected NonMinimalVarInt, got {:?}", other),
        }
    }

    #[test]
    fn it_errors_on_truncated_compact_ints() {
        let truncated = [0xfeu8, 0x01, 0x02];
        assert!(read_compact_int(&mut truncated.as_slice()).is_err());
    }
}
