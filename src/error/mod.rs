//! # Error Module
//!
//! Error types for the hash-signing pipeline.
//!
//! ## Design Principles
//! - **Never hang** on a failure - a failing stage closes its output and
//!   surfaces an error instead
//! - **Include context** - stage names, item shapes, how long we waited
//! - **Separate concerns** - guard, stage and pipeline failures each get
//!   their own enum and roll up into [`SignerError`]

use std::time::Duration;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum SignerError {
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Resource guard error: {0}")]
    Guard(#[from] GuardError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Pipeline finished without producing a combined result")]
    MissingResult,
}

/// Errors raised by the overheat-protection guard
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    #[error("Released a resource guard that was not held")]
    NotHeld,

    #[error("Timed out after {waited:?} waiting for the resource guard")]
    Timeout { waited: Duration },
}

/// Errors raised by a single stage while it runs
#[derive(Error, Debug)]
pub enum StageError {
    #[error("Stage '{stage}' expected a {expected} item but received {found}")]
    UnexpectedItem {
        stage: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Stage '{stage}' could not send: downstream stream is closed")]
    DownstreamClosed { stage: String },

    #[error("Stage '{stage}' panicked: {message}")]
    Panicked { stage: String, message: String },

    #[error("Stage '{stage}' failed: {reason}")]
    Failed { stage: String, reason: String },
}

impl StageError {
    /// Whether this failure is only a consequence of a stage further down
    /// the chain stopping first.
    pub fn is_downstream_closed(&self) -> bool {
        matches!(self, StageError::DownstreamClosed { .. })
    }
}

/// Errors raised by the pipeline executor
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Pipeline has no stages")]
    NoStages,

    #[error("Stage {index} ('{name}') failed: {source}")]
    Stage {
        index: usize,
        name: String,
        #[source]
        source: StageError,
    },
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, SignerError>;
