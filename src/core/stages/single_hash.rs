//! SingleHash stage.
//!
//! For each value `v` emits `unthrottled(v) + "~" + unthrottled(throttled(v))`.
//! The two halves run in parallel; only the throttled call is serialized
//! by the resource guard.

use super::{ItemWorkers, DEFAULT_MAX_IN_FLIGHT};
use crate::core::hasher::HashPrimitives;
use crate::core::pipeline::{ItemReceiver, ItemSender, Stage};
use crate::error::StageError;
use std::panic;
use std::thread;
use tracing::trace;

/// Chains the throttled and unthrottled primitives for every item
pub struct SingleHash {
    hashes: HashPrimitives,
    max_in_flight: usize,
}

impl SingleHash {
    /// Create the stage over a pair of primitives
    pub fn new(hashes: HashPrimitives) -> Self {
        Self {
            hashes,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }

    /// Cap how many items are signed at once
    pub fn max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    /// Sign one canonical value
    pub fn sign(&self, value: &str) -> String {
        thread::scope(|scope| {
            let plain = scope.spawn(|| self.hashes.unthrottled(value));
            let chained = self.hashes.unthrottled(&self.hashes.throttled(value));
            let plain = plain
                .join()
                .unwrap_or_else(|payload| panic::resume_unwind(payload));
            format!("{plain}~{chained}")
        })
    }
}

impl Stage for SingleHash {
    fn name(&self) -> &str {
        "single_hash"
    }

    fn run(&self, input: ItemReceiver, output: ItemSender) -> Result<(), StageError> {
        thread::scope(|scope| {
            let mut workers = ItemWorkers::new(scope, self.name(), self.max_in_flight);
            loop {
                if let Err(e) = workers.make_room() {
                    // stop reading; outstanding workers still get joined
                    let _ = workers.finish();
                    return Err(e);
                }
                let Some(item) = input.recv() else {
                    break;
                };

                let output = output.clone();
                workers.spawn(move || {
                    let value = item.into_canonical();
                    let signed = self.sign(&value);
                    trace!(%value, %signed, "single hash");
                    output.send(signed)
                });
            }
            workers.finish()
        })
    }
}
