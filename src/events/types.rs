//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};

/// All events emitted while a pipeline runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// Pipeline-level events
    Pipeline(PipelineEvent),
    /// Per-stage events
    Stage(StageEvent),
}

/// Pipeline-level events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PipelineEvent {
    /// Pipeline has started with the given number of stages
    Started { stages: usize },
    /// Pipeline completed successfully
    Completed { summary: PipelineSummary },
    /// Pipeline encountered a fatal error
    Error { message: String },
}

/// Events from an individual stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageEvent {
    /// The stage thread started
    Started { index: usize, name: String },
    /// The stage returned normally and closed its output
    Finished {
        index: usize,
        name: String,
        items_emitted: usize,
    },
    /// The stage failed; its output has been closed
    Failed {
        index: usize,
        name: String,
        message: String,
    },
}

/// Summary of a completed pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Number of stages that ran
    pub stages: usize,
    /// Items that reached the end of the pipeline
    pub items_out: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}
