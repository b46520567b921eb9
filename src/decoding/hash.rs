//! Canonical transaction hashing.
//!
//! A transaction hash is the SHA-256 digest of the raw transaction bytes,
//! rendered as 64 uppercase hex characters. Hash input from callers is
//! accepted with or without a `0x` prefix and in either case.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA-256 digest.
pub const HASH_HEX_LEN: usize = 64;

/// Normalized transaction hash: 64 uppercase hex characters, no prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(String);

impl TxHash {
    /// Hash raw transaction bytes. Total over all inputs, including empty.
    pub fn compute(bytes: &[u8]) -> Self {
        Self(hex::encode_upper(Sha256::digest(bytes)))
    }

    /// Normalize caller-supplied hash text.
    ///
    /// Returns `None` unless the remainder after an optional `0x`/`0X`
    /// prefix is exactly 64 hex digits.
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        let bare = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if bare.len() != HASH_HEX_LEN || !bare.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self(bare.to_ascii_uppercase()))
    }

    /// Check that `bytes` hash to this value.
    pub fn matches(&self, bytes: &[u8]) -> bool {
        Self::compute(bytes) == *self
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Uppercase hex SHA-256 of `bytes`.
pub fn compute_hash(bytes: &[u8]) -> String {
    TxHash::compute(bytes).into_string()
}
