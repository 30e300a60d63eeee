//! A backend-agnostic 32-byte address identity.
//!
//! The motivating deployment addresses Solana accounts and lookup tables,
//! both of which are base58-encoded 32-byte public keys. The core treats
//! this type opaquely: it only needs equality, hashing, and ordering to key
//! tables and dedupe query accounts.

use std::fmt;
use std::str::FromStr;

/// A 32-byte address identity.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PublicKey(pub [u8; 32]);

/// Errors produced while parsing a [`PublicKey`] from its base58 text form.
#[derive(Debug, thiserror::Error)]
pub enum PublicKeyParseError {
    #[error("invalid base58 encoding: {0}")]
    Base58(#[from] bs58::decode::Error),
    #[error("decoded public key must be 32 bytes, got {0}")]
    WrongLength(usize),
}

impl PublicKey {
    /// The all-zero key, used as a sentinel in tests and default configs.
    pub const DEFAULT: PublicKey = PublicKey([0u8; 32]);

    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for PublicKey {
    type Err = PublicKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decoded = bs58::decode(s).into_vec()?;
        let len = decoded.len();
        let bytes: [u8; 32] = decoded
            .try_into()
            .map_err(|_| PublicKeyParseError::WrongLength(len))?;
        Ok(PublicKey(bytes))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_base58() {
        let key = PublicKey([7u8; 32]);
        let text = key.to_string();
        let parsed: PublicKey = text.parse().unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn rejects_wrong_length() {
        let text = bs58::encode([0u8; 16]).into_string();
        let err = text.parse::<PublicKey>().unwrap_err();
        assert!(matches!(err, PublicKeyParseError::WrongLength(16)));
    }

    #[test]
    fn ordering_is_byte_lexicographic() {
        let a = PublicKey([1u8; 32]);
        let mut b = [1u8; 32];
        b[31] = 2;
        let b = PublicKey(b);
        assert!(a < b);
    }
}
