//! Source stage: turns a value producer into a stream of items.

use crate::core::pipeline::{ItemReceiver, ItemSender, Stage};
use crate::error::StageError;
use tracing::debug;

type ValueIter = Box<dyn Iterator<Item = i64> + Send>;

/// Emits scalar values one at a time.
///
/// The producer is called afresh on every run, so the same source can be
/// reused, and it may be unbounded.
pub struct SourceStage {
    produce: Box<dyn Fn() -> ValueIter + Send + Sync>,
}

impl SourceStage {
    /// Emit a fixed list of values
    pub fn from_values(values: Vec<i64>) -> Self {
        Self::from_fn(move || values.clone())
    }

    /// Emit whatever `produce` yields each time the stage runs
    pub fn from_fn<F, I>(produce: F) -> Self
    where
        F: Fn() -> I + Send + Sync + 'static,
        I: IntoIterator<Item = i64>,
        I::IntoIter: Send + 'static,
    {
        Self {
            produce: Box::new(move || Box::new(produce().into_iter()) as ValueIter),
        }
    }
}

impl Stage for SourceStage {
    fn name(&self) -> &str {
        "source"
    }

    fn run(&self, _input: ItemReceiver, output: ItemSender) -> Result<(), StageError> {
        for value in (self.produce)() {
            output.send(value)?;
        }
        debug!(emitted = output.sent(), "source exhausted");
        Ok(())
    }
}
