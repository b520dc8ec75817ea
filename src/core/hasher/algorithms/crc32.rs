//! CRC-32 implementation.
//!
//! Uses the IEEE polynomial via `crc32fast`. The salt is appended to the
//! input and the checksum is rendered in decimal.

use super::super::traits::DataHasher;
use std::thread;
use std::time::Duration;

/// Salted CRC-32 hasher
#[derive(Debug, Clone, Default)]
pub struct Crc32Hasher {
    salt: String,
    latency: Duration,
}

impl Crc32Hasher {
    /// Create a new CRC-32 hasher
    pub fn new(salt: impl Into<String>, latency: Duration) -> Self {
        Self {
            salt: salt.into(),
            latency,
        }
    }
}

impl DataHasher for Crc32Hasher {
    fn hash(&self, data: &str) -> String {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(data.as_bytes());
        hasher.update(self.salt.as_bytes());
        let checksum = hasher.finalize();

        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        checksum.to_string()
    }

    fn name(&self) -> &str {
        "crc32"
    }
}
