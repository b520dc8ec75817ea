//! # Resource Guard Module
//!
//! Overheat protection for the throttled hash primitive.
//!
//! A [`ResourceGuard`] is a single `busy` flag flipped with compare-and-set.
//! At most one caller holds it at any instant, no matter which item or stage
//! asked. Waiters back off exponentially between attempts instead of
//! spinning, and every waiter eventually gets through (there is no fairness
//! guarantee about the order).
//!
//! ## Example
//! ```rust,ignore
//! use hash_signer::core::guard::ResourceGuard;
//!
//! let guard = ResourceGuard::new();
//! {
//!     let _permit = guard.lock();
//!     // only one thread in here at a time
//! }
//! assert!(!guard.is_busy());
//! ```

use crate::error::GuardError;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Backoff tuning for the guard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardConfig {
    /// First sleep after a failed acquisition attempt
    pub initial_backoff: Duration,
    /// Upper bound for the doubling backoff
    pub max_backoff: Duration,
    /// How many extra attempts `release` makes before reporting misuse
    pub release_retries: u32,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(50),
            release_retries: 3,
        }
    }
}

/// Counters describing how the guard has been used
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardStats {
    /// Successful acquisitions
    pub acquisitions: u64,
    /// Successful releases
    pub releases: u64,
    /// Acquisition attempts that found the guard busy
    pub contended: u64,
}

/// Process-wide mutual exclusion around the throttled operation
#[derive(Debug, Default)]
pub struct ResourceGuard {
    busy: AtomicBool,
    config: GuardConfig,
    acquisitions: AtomicU64,
    releases: AtomicU64,
    contended: AtomicU64,
}

impl ResourceGuard {
    /// Create a guard with the default backoff
    pub fn new() -> Self {
        Self::with_config(GuardConfig::default())
    }

    /// Create a guard with custom backoff tuning
    pub fn with_config(config: GuardConfig) -> Self {
        Self {
            busy: AtomicBool::new(false),
            config,
            acquisitions: AtomicU64::new(0),
            releases: AtomicU64::new(0),
            contended: AtomicU64::new(0),
        }
    }

    /// The backoff tuning this guard was built with
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Make a single attempt to take the guard.
    pub fn try_acquire(&self) -> bool {
        let taken = self
            .busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok();
        if taken {
            self.acquisitions.fetch_add(1, Ordering::SeqCst);
        }
        taken
    }

    /// Block until the guard is taken.
    pub fn acquire(&self) {
        let mut backoff = Backoff::new(&self.config);
        while !self.try_acquire() {
            self.contended.fetch_add(1, Ordering::Relaxed);
            debug!(wait = ?backoff.current, "resource guard busy, backing off");
            backoff.wait();
        }
    }

    /// Block until the guard is taken or `timeout` elapses.
    pub fn acquire_timeout(&self, timeout: Duration) -> Result<(), GuardError> {
        let start = Instant::now();
        let mut backoff = Backoff::new(&self.config);
        loop {
            if self.try_acquire() {
                return Ok(());
            }
            self.contended.fetch_add(1, Ordering::Relaxed);

            let waited = start.elapsed();
            if waited >= timeout {
                warn!(?waited, "gave up waiting for resource guard");
                return Err(GuardError::Timeout { waited });
            }
            backoff.wait_at_most(timeout - waited);
        }
    }

    /// Give the guard back.
    ///
    /// Releasing a guard that is not held is a logic error. The transition is
    /// retried a few times in case of a racing holder, then reported.
    pub fn release(&self) -> Result<(), GuardError> {
        let mut backoff = Backoff::new(&self.config);
        for attempt in 0..=self.config.release_retries {
            if self
                .busy
                .compare_exchange(true, false, Ordering::Release, Ordering::Relaxed)
                .is_ok()
            {
                self.releases.fetch_add(1, Ordering::SeqCst);
                return Ok(());
            }
            if attempt < self.config.release_retries {
                warn!(attempt, "resource guard release found the guard idle, retrying");
                backoff.wait();
            }
        }
        error!("released a resource guard that was never acquired");
        Err(GuardError::NotHeld)
    }

    /// Take the guard and hold it until the returned permit is dropped.
    pub fn lock(&self) -> GuardPermit<'_> {
        self.acquire();
        GuardPermit { guard: self }
    }

    /// Like [`lock`](Self::lock) but bounded by `timeout`.
    pub fn lock_timeout(&self, timeout: Duration) -> Result<GuardPermit<'_>, GuardError> {
        self.acquire_timeout(timeout)?;
        Ok(GuardPermit { guard: self })
    }

    /// Whether someone currently holds the guard
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Snapshot of the usage counters
    pub fn stats(&self) -> GuardStats {
        GuardStats {
            acquisitions: self.acquisitions.load(Ordering::SeqCst),
            releases: self.releases.load(Ordering::SeqCst),
            contended: self.contended.load(Ordering::Relaxed),
        }
    }
}

/// Holds the guard; releases it on drop, including while unwinding.
#[must_use = "the guard is released as soon as the permit is dropped"]
#[derive(Debug)]
pub struct GuardPermit<'a> {
    guard: &'a ResourceGuard,
}

impl Drop for GuardPermit<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.guard.release() {
            error!(error = %e, "failed to release resource guard permit");
        }
    }
}

struct Backoff {
    current: Duration,
    max: Duration,
}

impl Backoff {
    fn new(config: &GuardConfig) -> Self {
        Self {
            current: config.initial_backoff,
            max: config.max_backoff.max(config.initial_backoff),
        }
    }

    fn wait(&mut self) {
        self.wait_at_most(self.max);
    }

    fn wait_at_most(&mut self, limit: Duration) {
        let sleep = self.current.min(limit);
        if sleep.is_zero() {
            thread::yield_now();
        } else {
            thread::sleep(sleep);
        }
        self.current = (self.current * 2).min(self.max);
    }
}
