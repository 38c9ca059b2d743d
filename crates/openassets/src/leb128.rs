//! Unsigned LEB128, the variable-length integer encoding used for asset
//! quantities inside the marker payload.
//!
//! Values are encoded as 7-bit groups, least significant first; every byte
//! except the last has its high bit set. Asset quantities are bounded to
//! 63 bits, so a single value never spans more than 9 bytes.

use std::io::{Error as IOError, Read, Write};
use thiserror::Error;

/// The largest representable asset quantity, 2^63 - 1.
pub const MAX_ASSET_QUANTITY: u64 = (1 << 63) - 1;

/// The longest valid encoding of a single value, in bytes.
pub const MAX_ENCODED_LEN: usize = 9;

/// Errors encountered encoding or decoding LEB128 values.
#[derive(Debug, Error)]
pub enum Leb128Error {
    /// The value cannot be encoded within the asset-quantity domain.
    #[error("value {0} exceeds the maximum asset quantity")]
    OutOfRange(u64),

    /// The stream ended mid-integer, or a single value spanned more than 9
    /// bytes.
    #[error("invalid LEB128 encoding")]
    InvalidEncoding,

    /// IOError bubbled up from the underlying reader or writer.
    #[error(transparent)]
    IOError(#[from] IOError),
}

/// Write `value` to `writer` as unsigned LEB128. Fails with `OutOfRange`
/// for values above [`MAX_ASSET_QUANTITY`].
pub fn write_leb128<W>(writer: &mut W, value: u64) -> Result<usize, Leb128Error>
where
    W: Write,
{
    if value > MAX_ASSET_QUANTITY {
        return Err(Leb128Error::OutOfRange(value));
    }
    let mut remaining = value;
    let mut written = 0;
    loop {
        let mut byte = (remaining & 0x7f) as u8;
        remaining >>= 7;
        if remaining != 0 {
            byte |= 0x80;
        }
        written += writer.write(&[byte])?;
        if remaining == 0 {
            return Ok(written);
        }
    }
}

/// Read a single unsigned LEB128 value from `reader`. Fails with
/// `InvalidEncoding` if the stream ends mid-integer or the value spans more
/// than 9 bytes.
pub fn read_leb128<R>(reader: &mut R) -> Result<u64, Leb128Error>
where
    R: Read,
{
    let mut value = 0u64;
    for i in 0..MAX_ENCODED_LEN {
        let mut buf = [0u8; 1];
        if reader.read(&mut buf)? == 0 {
            return Err(Leb128Error::InvalidEncoding);
        }
        value |= ((buf[0] & 0x7f) as u64) << (7 * i);
        if buf[0] & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(Leb128Error::InvalidEncoding)
}

/// The encoded length of `value`, in bytes.
pub fn encoded_len(value: u64) -> usize {
    let mut len = 1;
    let mut remaining = value >> 7;
    while remaining != 0 {
        len += 1;
        remaining >>= 7;
    }
    len
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn it_round_trips_boundary_values() {
        let cases = [
            (0u64, vec![0x00u8]),
            (1, vec![0x01]),
            (127, vec![0x7f]),
            (128, vec![0x80, 0x01]),
            (300, vec![0xac, 0x02]),
            (1500, vec![0xdc, 0x0b]),
            (624_485, vec![0xe5, 0x8e, 0x26]),
            (
                MAX_ASSET_QUANTITY,
                vec![0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0x7f],
            ),
        ];
        for (value, encoding) in cases.iter() {
            let mut buf = vec![];
            let written = write_leb128(&mut buf, *value).unwrap();
            assert_eq!(&buf, encoding);
            assert_eq!(written, encoding.len());
            assert_eq!(encoded_len(*value), encoding.len());
            assert_eq!(read_leb128(&mut buf.as_slice()).unwrap(), *value);
        }
    }

    #[test]
    fn it_rejects_values_above_the_quantity_domain() {
        match write_leb128(&mut vec![], MAX_ASSET_QUANTITY + 1) {
            Err(Leb128Error::OutOfRange(v)) => assert_eq!(v, MAX_ASSET_QUANTITY + 1),
            other => panic!("expected OutOfRange, got {:?}", other),
        }
    }

    #[test]
    fn it_rejects_truncated_streams() {
        let truncated = [0x80u8, 0x80];
        match read_leb128(&mut truncated.as_slice()) {
            Err(Leb128Error::InvalidEncoding) => {}
            other => panic!("expected InvalidEncoding, got {:?}", other),
        }
    }

    #[test]
    fn it_rejects_overlong_encodings() {
        // ten continuation bytes can never be a single asset quantity
        let overlong = [0x80u8; 10];
        match read_leb128(&mut overlong.as_slice()) {
            Err(Leb128Error::InvalidEncoding) => {}
            other => panic!("expected InvalidEncoding, got {:?}", other),
        }
    }

    #[test]
    fn it_accepts_non_minimal_encodings() {
        // 1 encoded with a redundant continuation byte
        let padded = [0x81u8, 0x00];
        assert_eq!(read_leb128(&mut padded.as_slice()).unwrap(), 1);
    }
}
