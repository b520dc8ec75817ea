//! # Hasher Module
//!
//! The two hash primitives the signing stages are built from.
//!
//! ## Primitives
//! - **Throttled** - expensive, wrapped in a [`GuardedHasher`] so only one
//!   call runs at a time across the whole pipeline (MD5 by default)
//! - **Unthrottled** - free to run in parallel (CRC-32 by default)
//!
//! Both append a process-wide salt to their input. The salt is plain
//! configuration passed at construction.
//!
//! ## Example
//! ```rust,ignore
//! use hash_signer::core::guard::ResourceGuard;
//! use hash_signer::core::hasher::HasherConfig;
//! use std::sync::Arc;
//!
//! let primitives = HasherConfig::new()
//!     .salt("")
//!     .build(Arc::new(ResourceGuard::new()));
//!
//! let digest = primitives.unthrottled("0");
//! ```

mod algorithms;
mod guarded;
mod traits;

pub use algorithms::{Crc32Hasher, Md5Hasher};
pub use guarded::GuardedHasher;
pub use traits::{DataHasher, HashAlgorithmKind};

use crate::core::guard::ResourceGuard;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Configuration builder for the hash primitives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HasherConfig {
    /// Appended to every input before hashing
    salt: String,
    /// Algorithm behind the throttled primitive
    throttled: HashAlgorithmKind,
    /// Algorithm behind the unthrottled primitive
    unthrottled: HashAlgorithmKind,
    /// Artificial latency of each throttled call
    throttled_latency: Duration,
    /// Artificial latency of each unthrottled call
    unthrottled_latency: Duration,
}

impl HasherConfig {
    /// Create a new configuration with defaults
    ///
    /// MD5 behind the guard with 10ms latency, CRC-32 with 1s latency,
    /// empty salt.
    pub fn new() -> Self {
        Self {
            salt: String::new(),
            throttled: HashAlgorithmKind::Md5,
            unthrottled: HashAlgorithmKind::Crc32,
            throttled_latency: Duration::from_millis(10),
            unthrottled_latency: Duration::from_secs(1),
        }
    }

    /// Set the salt
    pub fn salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = salt.into();
        self
    }

    /// Set the throttled algorithm
    pub fn throttled(mut self, kind: HashAlgorithmKind) -> Self {
        self.throttled = kind;
        self
    }

    /// Set the unthrottled algorithm
    pub fn unthrottled(mut self, kind: HashAlgorithmKind) -> Self {
        self.unthrottled = kind;
        self
    }

    /// Set the artificial latency of the throttled primitive
    pub fn throttled_latency(mut self, latency: Duration) -> Self {
        self.throttled_latency = latency;
        self
    }

    /// Set the artificial latency of the unthrottled primitive
    pub fn unthrottled_latency(mut self, latency: Duration) -> Self {
        self.unthrottled_latency = latency;
        self
    }

    /// Drop both artificial latencies
    pub fn without_latency(self) -> Self {
        self.throttled_latency(Duration::ZERO)
            .unthrottled_latency(Duration::ZERO)
    }

    /// Build the primitives, throttling through `guard`
    pub fn build(&self, guard: Arc<ResourceGuard>) -> HashPrimitives {
        let throttled = algorithm(self.throttled, &self.salt, self.throttled_latency);
        let unthrottled = algorithm(self.unthrottled, &self.salt, self.unthrottled_latency);
        HashPrimitives::new(throttled, unthrottled, guard)
    }
}

impl Default for HasherConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn algorithm(kind: HashAlgorithmKind, salt: &str, latency: Duration) -> Arc<dyn DataHasher> {
    match kind {
        HashAlgorithmKind::Md5 => Arc::new(Md5Hasher::new(salt, latency)),
        HashAlgorithmKind::Crc32 => Arc::new(Crc32Hasher::new(salt, latency)),
    }
}

/// The throttled/unthrottled pair shared by the signing stages
#[derive(Clone)]
pub struct HashPrimitives {
    throttled: Arc<GuardedHasher>,
    unthrottled: Arc<dyn DataHasher>,
}

impl HashPrimitives {
    /// Bundle two hashers, putting `throttled` behind `guard`
    pub fn new(
        throttled: Arc<dyn DataHasher>,
        unthrottled: Arc<dyn DataHasher>,
        guard: Arc<ResourceGuard>,
    ) -> Self {
        Self {
            throttled: Arc::new(GuardedHasher::new(throttled, guard)),
            unthrottled,
        }
    }

    /// Run the throttled primitive (serialized pipeline-wide)
    pub fn throttled(&self, data: &str) -> String {
        self.throttled.hash(data)
    }

    /// Run the unthrottled primitive
    pub fn unthrottled(&self, data: &str) -> String {
        self.unthrottled.hash(data)
    }

    /// The guard serializing the throttled primitive
    pub fn guard(&self) -> &Arc<ResourceGuard> {
        self.throttled.guard()
    }
}

impl std::fmt::Debug for HashPrimitives {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashPrimitives")
            .field("throttled", &self.throttled.name())
            .field("unthrottled", &self.unthrottled.name())
            .finish()
    }
}
