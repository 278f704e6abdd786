//! Block delta bit-packing of ascending UID sequences.
//!
//! Layout:
//!
//! ```text
//! [count: varint]
//! per block of up to BLOCK_LEN uids:
//!   [base: varint]      first uid minus the last uid of the previous block
//!   [width: u8]         bits per delta, 0..=64
//!   [deltas: packed]    the remaining (n - 1) gaps, LSB first,
//!                       ceil((n - 1) * width / 8) bytes
//! ```
//!
//! Input must be non-decreasing. The posting-list builder sorts and
//! de-duplicates before packing.

use super::varint::{decode_varint, encode_varint, varint_len};
use crate::types::Uid;
use crate::CoreError;

/// Number of UIDs per packed block.
pub const BLOCK_LEN: usize = 128;

#[inline]
const fn bit_width(value: u64) -> u32 {
    64 - value.leading_zeros()
}

fn block_width(block: &[u64]) -> u32 {
    let max_gap = block.windows(2).map(|w| w[1] - w[0]).max().unwrap_or(0);
    bit_width(max_gap)
}

#[inline]
const fn packed_bytes(gaps: usize, width: u32) -> usize {
    (gaps * width as usize).div_ceil(8)
}

/// Exact number of bytes [`pack`] appends for `uids`.
#[must_use]
pub fn packed_len(uids: &[u64]) -> usize {
    let mut len = varint_len(uids.len() as u64);
    let mut prev = 0u64;
    for block in uids.chunks(BLOCK_LEN) {
        let width = block_width(block);
        len += varint_len(block[0] - prev) + 1 + packed_bytes(block.len() - 1, width);
        prev = block[block.len() - 1];
    }
    len
}

/// Append the packed form of `uids` to `out`.
///
/// `uids` must be sorted ascending.
pub fn pack(uids: &[u64], out: &mut Vec<u8>) {
    debug_assert!(uids.windows(2).all(|w| w[0] <= w[1]), "uids must be sorted");

    encode_varint(uids.len() as u64, out);
    let mut prev = 0u64;
    for block in uids.chunks(BLOCK_LEN) {
        let width = block_width(block);
        encode_varint(block[0] - prev, out);
        out.push(width as u8);

        if width > 0 {
            let mut acc: u128 = 0;
            let mut bits = 0u32;
            for w in block.windows(2) {
                acc |= u128::from(w[1] - w[0]) << bits;
                bits += width;
                while bits >= 8 {
                    out.push(acc as u8);
                    acc >>= 8;
                    bits -= 8;
                }
            }
            if bits > 0 {
                out.push(acc as u8);
            }
        }
        prev = block[block.len() - 1];
    }
}

/// Decode a packed sequence produced by [`pack`].
///
/// # Errors
///
/// Returns an error if the input is truncated, has trailing bytes, declares
/// an invalid bit width, or overflows `u64`.
pub fn unpack(bytes: &[u8]) -> Result<Vec<Uid>, CoreError> {
    let mut pos = 0;
    let uids = unpack_from(bytes, &mut pos)?;
    if pos != bytes.len() {
        return Err(CoreError::Encoding(format!(
            "{} trailing bytes after packed uids",
            bytes.len() - pos
        )));
    }
    Ok(uids)
}

/// Decode a packed sequence at `*pos`, advancing past it.
pub(crate) fn unpack_from(bytes: &[u8], pos: &mut usize) -> Result<Vec<Uid>, CoreError> {
    let count = decode_varint(bytes, pos)?;
    let count = usize::try_from(count)
        .map_err(|_| CoreError::Encoding("uid count overflows usize".to_owned()))?;
    // Every block costs at least two bytes, which bounds a sane count.
    if count.div_ceil(BLOCK_LEN) * 2 > bytes.len().saturating_sub(*pos) {
        return Err(CoreError::UnexpectedEof("packed uid blocks"));
    }

    let mut uids = Vec::with_capacity(count);
    let mut prev = 0u64;
    let mut remaining = count;
    while remaining > 0 {
        let n = remaining.min(BLOCK_LEN);
        let base = decode_varint(bytes, pos)?;
        let width = u32::from(*bytes.get(*pos).ok_or(CoreError::UnexpectedEof("block width"))?);
        *pos += 1;
        if width > 64 {
            return Err(CoreError::Encoding(format!("invalid block width {width}")));
        }

        let mut current = prev
            .checked_add(base)
            .ok_or_else(|| CoreError::Encoding("uid overflows u64".to_owned()))?;
        uids.push(Uid::new(current));

        let len = packed_bytes(n - 1, width);
        let data = bytes
            .get(*pos..*pos + len)
            .ok_or(CoreError::UnexpectedEof("packed deltas"))?;
        *pos += len;

        let mask: u128 = (1u128 << width) - 1;
        let mut acc: u128 = 0;
        let mut bits = 0u32;
        let mut cursor = data.iter();
        for _ in 1..n {
            while bits < width {
                let byte = cursor.next().ok_or(CoreError::UnexpectedEof("packed deltas"))?;
                acc |= u128::from(*byte) << bits;
                bits += 8;
            }
            let gap = (acc & mask) as u64;
            acc >>= width;
            bits -= width;
            current = current
                .checked_add(gap)
                .ok_or_else(|| CoreError::Encoding("uid overflows u64".to_owned()))?;
            uids.push(Uid::new(current));
        }

        prev = current;
        remaining -= n;
    }
    Ok(uids)
}
