//! Binary codec traits shared by every on-disk and on-wire record.

use crate::CoreError;

/// A record with a fixed binary layout.
pub trait Encoder: Sized {
    /// Exact number of bytes [`encode_to`](Self::encode_to) will append.
    fn encoded_len(&self) -> usize;

    /// Encode into a new, exactly sized buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the value fails validation.
    fn encode(&self) -> Result<Vec<u8>, CoreError> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode_to(&mut buf)?;
        Ok(buf)
    }

    /// Append the encoding to `buf`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value fails validation. `buf` may then hold a
    /// partial encoding.
    fn encode_to(&self, buf: &mut Vec<u8>) -> Result<(), CoreError>;
}

/// The inverse of [`Encoder`].
pub trait Decoder: Sized {
    /// Decode a value from bytes. The whole input must be consumed.
    ///
    /// # Errors
    ///
    /// Returns an error on truncated input, trailing bytes or an unknown tag.
    fn decode(bytes: &[u8]) -> Result<Self, CoreError>;
}
