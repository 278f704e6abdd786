//! Error types for the core crate.

use thiserror::Error;

/// Errors that can occur while encoding or decoding core types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An encoding or decoding error occurred.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// The input ended before a complete value was read.
    #[error("unexpected end of input while reading {0}")]
    UnexpectedEof(&'static str),

    /// A posting carried a kind tag this version does not know.
    #[error("unknown posting kind: {0:#04x}")]
    UnknownPostingKind(u8),

    /// A posting carried a value type tag this version does not know.
    #[error("unknown value type: {0:#04x}")]
    UnknownValueType(u8),

    /// A storage key could not be parsed.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A structural invariant of the pipeline was violated.
    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl CoreError {
    /// Creates an invariant violation error.
    #[must_use]
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    /// Returns true if the error was caused by malformed input bytes.
    #[must_use]
    pub const fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            Self::Encoding(_)
                | Self::UnexpectedEof(_)
                | Self::UnknownPostingKind(_)
                | Self::UnknownValueType(_)
        )
    }
}
