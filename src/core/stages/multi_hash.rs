//! MultiHash stage.
//!
//! Each digest is fanned out into `fan_out` branches; branch `i` hashes
//! `i.to_string() + digest`. Branches run concurrently but are concatenated
//! by index, never by completion order.

use super::{ItemWorkers, DEFAULT_MAX_IN_FLIGHT};
use crate::core::hasher::HashPrimitives;
use crate::core::pipeline::{ItemReceiver, ItemSender, Stage};
use crate::error::StageError;
use std::panic;
use std::thread;
use tracing::trace;

/// Default number of branches per item
pub const DEFAULT_FAN_OUT: usize = 6;

/// Indexed fan-out/fan-in over the unthrottled primitive
pub struct MultiHash {
    hashes: HashPrimitives,
    fan_out: usize,
    max_in_flight: usize,
}

impl MultiHash {
    /// Create the stage with the default fan-out of 6
    pub fn new(hashes: HashPrimitives) -> Self {
        Self::with_fan_out(hashes, DEFAULT_FAN_OUT)
    }

    /// Create the stage with a custom number of branches
    pub fn with_fan_out(hashes: HashPrimitives, fan_out: usize) -> Self {
        Self {
            hashes,
            fan_out,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }

    /// Cap how many items are fanned out at once
    pub fn max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight;
        self
    }

    /// Hash every branch of `data` and concatenate in index order
    pub fn combine_branches(&self, data: &str) -> String {
        thread::scope(|scope| {
            let branches: Vec<_> = (0..self.fan_out)
                .map(|index| {
                    scope.spawn(move || self.hashes.unthrottled(&format!("{index}{data}")))
                })
                .collect();

            branches
                .into_iter()
                .map(|branch| {
                    branch
                        .join()
                        .unwrap_or_else(|payload| panic::resume_unwind(payload))
                })
                .collect()
        })
    }
}

impl Stage for MultiHash {
    fn name(&self) -> &str {
        "multi_hash"
    }

    fn run(&self, input: ItemReceiver, output: ItemSender) -> Result<(), StageError> {
        thread::scope(|scope| {
            let mut workers = ItemWorkers::new(scope, self.name(), self.max_in_flight);
            loop {
                if let Err(e) = workers.make_room() {
                    let _ = workers.finish();
                    return Err(e);
                }
                let Some(item) = input.recv() else {
                    break;
                };
                let data = match item.into_text(self.name()) {
                    Ok(data) => data,
                    Err(e) => {
                        let _ = workers.finish();
                        return Err(e);
                    }
                };

                let output = output.clone();
                workers.spawn(move || {
                    let combined = self.combine_branches(&data);
                    trace!(%data, %combined, "multi hash");
                    output.send(combined)
                });
            }
            workers.finish()
        })
    }
}
