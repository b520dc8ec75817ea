//! CombineResults stage.
//!
//! The only barrier in the pipeline: it needs every digest before
//! it can sort them.

use crate::core::pipeline::{ItemReceiver, ItemSender, Stage};
use crate::error::StageError;
use rayon::prelude::*;
use tracing::debug;

/// Default separator between sorted digests
pub const DEFAULT_SEPARATOR: &str = "_";

/// Sorts every incoming digest and emits them joined as one item
pub struct CombineResults {
    separator: String,
}

impl CombineResults {
    /// Create the stage with the `_` separator
    pub fn new() -> Self {
        Self::with_separator(DEFAULT_SEPARATOR)
    }

    /// Create the stage with a custom separator
    pub fn with_separator(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
        }
    }

    /// Sort `results` byte-wise ascending and join them
    pub fn combine(&self, mut results: Vec<String>) -> String {
        results.par_sort_unstable();
        results.join(&self.separator)
    }
}

impl Default for CombineResults {
    fn default() -> Self {
        Self::new()
    }
}

impl Stage for CombineResults {
    fn name(&self) -> &str {
        "combine_results"
    }

    fn run(&self, input: ItemReceiver, output: ItemSender) -> Result<(), StageError> {
        let results = input
            .into_iter()
            .map(|item| item.into_text(self.name()))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(count = results.len(), "combining results");
        output.send(self.combine(results))
    }
}
