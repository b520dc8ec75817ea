//! # Core Module
//!
//! The signing engine.
//!
//! ## Modules
//! - `guard` - Overheat protection for the throttled primitive
//! - `hasher` - The throttled and unthrottled hash primitives
//! - `pipeline` - Generic streaming executor for a chain of stages
//! - `stages` - Source, SingleHash, MultiHash and CombineResults
//! - `signer` - Wires the stages into the signing pipeline

pub mod guard;
pub mod hasher;
pub mod pipeline;
pub mod signer;
pub mod stages;

// Re-export commonly used types
pub use guard::{GuardConfig, GuardStats, ResourceGuard};
pub use hasher::{DataHasher, HashAlgorithmKind, HashPrimitives, HasherConfig};
pub use pipeline::{Item, Pipeline, Stage};
pub use signer::{SignOutcome, Signer, SignerConfig, REFERENCE_INPUT};
