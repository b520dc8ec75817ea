//! MD5 implementation.
//!
//! The salt is appended to the input before hashing and the digest is
//! rendered as 32 lowercase hex characters. An optional artificial latency
//! models an expensive primitive.

use super::super::traits::DataHasher;
use std::thread;
use std::time::Duration;

/// Salted MD5 hasher
#[derive(Debug, Clone, Default)]
pub struct Md5Hasher {
    salt: String,
    latency: Duration,
}

impl Md5Hasher {
    /// Create a new MD5 hasher
    pub fn new(salt: impl Into<String>, latency: Duration) -> Self {
        Self {
            salt: salt.into(),
            latency,
        }
    }
}

impl DataHasher for Md5Hasher {
    fn hash(&self, data: &str) -> String {
        let mut salted = String::with_capacity(data.len() + self.salt.len());
        salted.push_str(data);
        salted.push_str(&self.salt);

        let digest = format!("{:x}", ::md5::compute(salted.as_bytes()));
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        digest
    }

    fn name(&self) -> &str {
        "md5"
    }
}
