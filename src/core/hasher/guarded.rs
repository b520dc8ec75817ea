//! Throttled wrapper that serializes a hasher behind a [`ResourceGuard`].

use super::traits::DataHasher;
use crate::core::guard::ResourceGuard;
use std::sync::Arc;

/// Runs the inner hasher only while holding the shared guard
pub struct GuardedHasher {
    inner: Arc<dyn DataHasher>,
    guard: Arc<ResourceGuard>,
}

impl GuardedHasher {
    /// Wrap `inner` so that every call holds `guard` for its whole duration
    pub fn new(inner: Arc<dyn DataHasher>, guard: Arc<ResourceGuard>) -> Self {
        Self { inner, guard }
    }

    /// The guard shared by every call through this hasher
    pub fn guard(&self) -> &Arc<ResourceGuard> {
        &self.guard
    }
}

impl DataHasher for GuardedHasher {
    fn hash(&self, data: &str) -> String {
        let _permit = self.guard.lock();
        self.inner.hash(data)
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
