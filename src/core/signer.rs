//! Signer: wires the four stages and the hash primitives into one pipeline.

use crate::core::guard::{GuardConfig, GuardStats, ResourceGuard};
use crate::core::hasher::{HashPrimitives, HasherConfig};
use crate::core::pipeline::{Item, Pipeline, StageReport};
use crate::core::stages::{
    CombineResults, MultiHash, SingleHash, SourceStage, DEFAULT_FAN_OUT, DEFAULT_MAX_IN_FLIGHT,
    DEFAULT_SEPARATOR,
};
use crate::error::{Result, SignerError};
use crate::events::{null_sender, EventSender};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Input used when no values are given: the first Fibonacci numbers
pub const REFERENCE_INPUT: [i64; 7] = [0, 1, 1, 2, 3, 5, 8];

/// Everything that shapes a signing run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerConfig {
    /// Hash primitive selection, salt and latencies
    pub hasher: HasherConfig,
    /// Branches per item in MultiHash
    pub fan_out: usize,
    /// Separator used by CombineResults
    pub separator: String,
    /// Buffer size of the streams between stages (0 = rendezvous)
    pub stream_capacity: usize,
    /// Items SingleHash and MultiHash each work on at once
    pub max_in_flight: usize,
    /// Backoff tuning of the resource guard
    pub guard: GuardConfig,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            hasher: HasherConfig::default(),
            fan_out: DEFAULT_FAN_OUT,
            separator: DEFAULT_SEPARATOR.to_string(),
            stream_capacity: 0,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            guard: GuardConfig::default(),
        }
    }
}

/// Builder for [`Signer`]
#[derive(Default)]
pub struct SignerBuilder {
    config: SignerConfig,
    primitives: Option<HashPrimitives>,
}

impl SignerBuilder {
    /// Start from the reference configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: SignerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the hasher configuration
    pub fn hasher(mut self, hasher: HasherConfig) -> Self {
        self.config.hasher = hasher;
        self
    }

    /// Set the salt appended before hashing
    pub fn salt(mut self, salt: impl Into<String>) -> Self {
        self.config.hasher = self.config.hasher.salt(salt);
        self
    }

    /// Set the MultiHash fan-out
    pub fn fan_out(mut self, fan_out: usize) -> Self {
        self.config.fan_out = fan_out;
        self
    }

    /// Set the CombineResults separator
    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.config.separator = separator.into();
        self
    }

    /// Set the stream capacity between stages
    pub fn stream_capacity(mut self, capacity: usize) -> Self {
        self.config.stream_capacity = capacity;
        self
    }

    /// Set how many items each hashing stage works on at once
    pub fn max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.config.max_in_flight = max_in_flight;
        self
    }

    /// Set the guard backoff
    pub fn guard(mut self, guard: GuardConfig) -> Self {
        self.config.guard = guard;
        self
    }

    /// Use these primitives instead of building them from the hasher config.
    ///
    /// The guard inside `primitives` becomes the signer's guard and its
    /// backoff replaces `config.guard`. `config.hasher` is not used.
    pub fn primitives(mut self, primitives: HashPrimitives) -> Self {
        self.primitives = Some(primitives);
        self
    }

    /// Validate the configuration and build the signer
    pub fn build(mut self) -> Result<Signer> {
        if self.config.fan_out == 0 {
            return Err(SignerError::Config(
                "fan-out must be at least 1".to_string(),
            ));
        }
        if self.config.max_in_flight == 0 {
            return Err(SignerError::Config(
                "max in-flight items must be at least 1".to_string(),
            ));
        }

        let primitives = match self.primitives {
            Some(primitives) => {
                self.config.guard = *primitives.guard().config();
                primitives
            }
            None => {
                let guard = Arc::new(ResourceGuard::with_config(self.config.guard));
                self.config.hasher.build(guard)
            }
        };

        Ok(Signer {
            config: self.config,
            primitives,
        })
    }
}

/// Result of a signing run
#[derive(Debug, Clone)]
pub struct SignOutcome {
    /// The sorted, joined digests
    pub combined: String,
    /// Per-stage reports
    pub stages: Vec<StageReport>,
    /// Guard usage over the signer's lifetime
    pub guard: GuardStats,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

/// Source → SingleHash → MultiHash → CombineResults
#[derive(Debug)]
pub struct Signer {
    config: SignerConfig,
    primitives: HashPrimitives,
}

impl Signer {
    /// Create a new signer builder
    pub fn builder() -> SignerBuilder {
        SignerBuilder::new()
    }

    /// The configuration this signer was built with.
    ///
    /// When primitives were injected through [`SignerBuilder::primitives`],
    /// `hasher` still holds the defaults and does not describe them.
    pub fn config(&self) -> &SignerConfig {
        &self.config
    }

    /// The guard serializing the throttled primitive
    pub fn guard(&self) -> &Arc<ResourceGuard> {
        self.primitives.guard()
    }

    /// Build the signing pipeline fed by `source`
    pub fn pipeline(&self, source: SourceStage) -> Pipeline {
        Pipeline::builder()
            .stage(source)
            .stage(
                SingleHash::new(self.primitives.clone())
                    .max_in_flight(self.config.max_in_flight),
            )
            .stage(
                MultiHash::with_fan_out(self.primitives.clone(), self.config.fan_out)
                    .max_in_flight(self.config.max_in_flight),
            )
            .stage(CombineResults::with_separator(self.config.separator.clone()))
            .stream_capacity(self.config.stream_capacity)
            .build()
    }

    /// Sign `values` and return the combined digest
    pub fn sign(&self, values: Vec<i64>) -> Result<String> {
        Ok(self
            .sign_source(SourceStage::from_values(values), &null_sender())?
            .combined)
    }

    /// Sign whatever `source` produces, reporting progress to `events`
    pub fn sign_source(&self, source: SourceStage, events: &EventSender) -> Result<SignOutcome> {
        let output = self.pipeline(source).run_with_events(events)?;

        let combined = match output.items.into_iter().next() {
            Some(Item::Text(combined)) => combined,
            _ => return Err(SignerError::MissingResult),
        };

        let guard = self.guard().stats();
        info!(
            duration_ms = output.duration_ms,
            throttled_calls = guard.acquisitions,
            "signing finished"
        );

        Ok(SignOutcome {
            combined,
            stages: output.stages,
            guard,
            duration_ms: output.duration_ms,
        })
    }
}
