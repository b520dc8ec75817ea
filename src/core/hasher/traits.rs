//! Trait definitions for the hash primitives.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A string-to-string hash function used by the signing stages.
///
/// Implementations must be deterministic for a given input and salt.
/// Tests swap in instrumented implementations through this trait.
pub trait DataHasher: Send + Sync {
    /// Hash `data` and render the digest as a string
    fn hash(&self, data: &str) -> String;

    /// Short name used in logs
    fn name(&self) -> &str;
}

impl<H: DataHasher + ?Sized> DataHasher for Arc<H> {
    fn hash(&self, data: &str) -> String {
        (**self).hash(data)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Available hash algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithmKind {
    /// MD5, rendered as lowercase hex
    Md5,
    /// CRC-32 (IEEE), rendered as a decimal number
    Crc32,
}

impl HashAlgorithmKind {
    /// Get a human-readable description of the algorithm
    pub fn description(&self) -> &'static str {
        match self {
            HashAlgorithmKind::Md5 => "MD5 - 128-bit digest rendered as 32 hex characters",
            HashAlgorithmKind::Crc32 => "CRC-32/IEEE - 32-bit checksum rendered in decimal",
        }
    }
}

impl std::fmt::Display for HashAlgorithmKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HashAlgorithmKind::Md5 => write!(f, "md5"),
            HashAlgorithmKind::Crc32 => write!(f, "crc32"),
        }
    }
}
