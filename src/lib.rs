//! # Hash Signer
//!
//! Computes a chained hash digest for every value of an input stream and
//! combines them into one signature.
//!
//! ## Pipeline
//! `Source → SingleHash → MultiHash → CombineResults`
//!
//! - Stages run concurrently and hand items over as soon as they exist
//! - SingleHash and MultiHash fan each item out into parallel sub-tasks
//! - The throttled hash is guarded so only one call runs pipeline-wide
//!
//! ## Architecture
//! - `core` - The executor, stages, guard and hash primitives
//! - `events` - Progress reporting over channels
//! - `error` - Error types

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{Result, SignerError};

/// Initialize tracing for the library
///
/// This should be called by the application entry point.
pub fn init_tracing() {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::warn!("a global tracing subscriber was already installed");
    }
}
