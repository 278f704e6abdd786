//! Entity identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for an entity in the graph.
///
/// UIDs are ordered numerically, which is also the order of their big-endian
/// byte encoding inside storage keys.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Uid(u64);

impl Uid {
    /// Create a new `Uid` from a raw u64 value.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw u64 value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Big-endian byte encoding, as used in key suffixes.
    #[must_use]
    pub const fn to_be_bytes(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    /// Decode a big-endian key suffix.
    #[must_use]
    pub const fn from_be_bytes(bytes: [u8; 8]) -> Self {
        Self(u64::from_be_bytes(bytes))
    }
}

impl From<u64> for Uid {
    fn from(id: u64) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_roundtrip() {
        let uid = Uid::new(42);
        assert_eq!(uid.as_u64(), 42);
        assert_eq!(Uid::from_be_bytes(uid.to_be_bytes()), uid);
    }

    #[test]
    fn byte_order_matches_numeric_order() {
        let a = Uid::new(255);
        let b = Uid::new(256);
        assert!(a < b);
        assert!(a.to_be_bytes() < b.to_be_bytes());
    }

    #[test]
    fn display_is_hex() {
        assert_eq!(Uid::new(255).to_string(), "0xff");
    }
}
