//! # Pipeline Module
//!
//! Generic streaming executor for a linear chain of stages.
//!
//! ## How It Works
//! 1. A stream (crossbeam channel) is created between every adjacent pair
//!    of stages; the first stage gets a stream that is already closed
//! 2. Every stage runs on its own scoped thread
//! 3. Items move downstream as soon as they are sent, never in batches
//! 4. A stage that returns drops its output, which closes the next stream
//! 5. The calling thread drains the last stream and waits for all stages
//!
//! ## Failure
//! Panics are caught per stage. A failed stage drops both of its streams,
//! so downstream sees end-of-input and upstream sees a closed stream; the
//! whole chain unwinds instead of hanging.

mod executor;
mod stream;

pub use executor::{
    execute_pipeline, stage_fn, FnStage, Pipeline, PipelineBuilder, PipelineOutput, Stage,
    StageReport,
};
pub(crate) use executor::panic_message;
pub use stream::{closed_stream, stream, Item, ItemReceiver, ItemSender};
