//! LEB128 unsigned varints.
//!
//! Seven payload bits per byte, low groups first, high bit set on every
//! byte except the last. A `u64` takes at most ten bytes.

use std::io::{self, Read};

use crate::CoreError;

/// Maximum encoded length of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

/// Append the varint encoding of `value` to `buf`.
#[inline]
pub fn encode_varint(mut value: u64, buf: &mut Vec<u8>) {
    while value >= 0x80 {
        buf.push((value as u8) | 0x80);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Number of bytes [`encode_varint`] writes for `value`.
#[inline]
#[must_use]
pub const fn varint_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    if bits == 0 {
        1
    } else {
        (bits + 6) / 7
    }
}

/// Decode a varint at `*pos`, advancing `pos` past it.
///
/// # Errors
///
/// Returns [`CoreError::UnexpectedEof`] if the input ends mid-varint and
/// [`CoreError::Encoding`] if the value overflows a `u64`.
#[inline]
pub fn decode_varint(bytes: &[u8], pos: &mut usize) -> Result<u64, CoreError> {
    let mut result: u64 = 0;
    let mut shift = 0u32;
    loop {
        let byte = *bytes.get(*pos).ok_or(CoreError::UnexpectedEof("varint"))?;
        *pos += 1;
        let payload = u64::from(byte & 0x7f);
        if shift == 63 && payload > 1 {
            return Err(CoreError::Encoding("varint overflows u64".to_owned()));
        }
        result |= payload << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
        if shift > 63 {
            return Err(CoreError::Encoding("varint longer than 10 bytes".to_owned()));
        }
    }
}

/// Read a varint from a stream.
///
/// Returns `Ok(None)` if the stream is at end of input before the first
/// byte, which marks a clean end of a framed file.
///
/// # Errors
///
/// Returns an [`io::ErrorKind::UnexpectedEof`] error if the stream ends
/// mid-varint and [`io::ErrorKind::InvalidData`] on overflow.
pub fn read_varint<R: Read>(reader: &mut R) -> io::Result<Option<u64>> {
    let mut result: u64 = 0;
    let mut shift = 0u32;
    let mut byte = [0u8; 1];
    loop {
        if let Err(e) = reader.read_exact(&mut byte) {
            if e.kind() == io::ErrorKind::UnexpectedEof && shift == 0 {
                return Ok(None);
            }
            return Err(e);
        }
        let payload = u64::from(byte[0] & 0x7f);
        if shift == 63 && payload > 1 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "varint overflows u64"));
        }
        result |= payload << shift;
        if byte[0] & 0x80 == 0 {
            return Ok(Some(result));
        }
        shift += 7;
        if shift > 63 {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "varint longer than 10 bytes"));
        }
    }
}
