//! # Stages Module
//!
//! The four stages of the signing pipeline.
//!
//! ## Stages
//! 1. **Source** - emits the input values one at a time
//! 2. **SingleHash** - `unthrottled(v) ~ unthrottled(throttled(v))` per item
//! 3. **MultiHash** - fans each digest out into indexed branches and
//!    concatenates them in index order
//! 4. **CombineResults** - waits for the end of input, sorts, joins
//!
//! SingleHash and MultiHash handle every item on its own worker thread, so
//! a slow item never holds up the ones behind it. The number of items in
//! flight per stage is capped (`max_in_flight`); a stage at the cap stops
//! reading its input until a worker finishes.

mod combine;
mod multi_hash;
mod single_hash;
mod source;

pub use combine::{CombineResults, DEFAULT_SEPARATOR};
pub use multi_hash::{MultiHash, DEFAULT_FAN_OUT};
pub use single_hash::SingleHash;
pub use source::SourceStage;

use crate::core::pipeline::panic_message;
use crate::error::StageError;
use std::collections::VecDeque;
use std::thread::{Scope, ScopedJoinHandle};

/// Default cap on items a stage works on at once
pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;

/// Per-item worker threads of one stage.
///
/// At most `max_in_flight` workers exist at a time. Stages call
/// [`make_room`](Self::make_room) before reading the next input item, so a
/// full stage stops pulling from upstream and the rendezvous streams push
/// back all the way to the source.
pub(crate) struct ItemWorkers<'scope, 'env> {
    scope: &'scope Scope<'scope, 'env>,
    stage: &'env str,
    max_in_flight: usize,
    handles: VecDeque<ScopedJoinHandle<'scope, Result<(), StageError>>>,
}

impl<'scope, 'env> ItemWorkers<'scope, 'env> {
    pub(crate) fn new(
        scope: &'scope Scope<'scope, 'env>,
        stage: &'env str,
        max_in_flight: usize,
    ) -> Self {
        Self {
            scope,
            stage,
            max_in_flight: max_in_flight.max(1),
            handles: VecDeque::new(),
        }
    }

    pub(crate) fn spawn<F>(&mut self, work: F)
    where
        F: FnOnce() -> Result<(), StageError> + Send + 'scope,
    {
        self.handles.push_back(self.scope.spawn(work));
    }

    /// Reap finished workers, then block on the oldest ones until another
    /// worker fits under the cap.
    pub(crate) fn make_room(&mut self) -> Result<(), StageError> {
        self.reap()?;
        while self.handles.len() >= self.max_in_flight {
            match self.handles.pop_front() {
                Some(oldest) => join(self.stage, oldest)?,
                None => break,
            }
        }
        Ok(())
    }

    /// Join workers that have already finished and report the first failure.
    pub(crate) fn reap(&mut self) -> Result<(), StageError> {
        let mut index = 0;
        while index < self.handles.len() {
            if self.handles[index].is_finished() {
                if let Some(handle) = self.handles.remove(index) {
                    join(self.stage, handle)?;
                }
            } else {
                index += 1;
            }
        }
        Ok(())
    }

    /// Wait for every outstanding worker; the first failure wins.
    pub(crate) fn finish(self) -> Result<(), StageError> {
        let stage = self.stage;
        self.handles
            .into_iter()
            .map(|handle| join(stage, handle))
            .fold(Ok(()), |first, result| first.and(result))
    }
}

fn join(
    stage: &str,
    handle: ScopedJoinHandle<'_, Result<(), StageError>>,
) -> Result<(), StageError> {
    handle.join().unwrap_or_else(|payload| {
        Err(StageError::Panicked {
            stage: stage.to_string(),
            message: panic_message(payload.as_ref()),
        })
    })
}
