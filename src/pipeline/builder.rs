//! Pipeline construction from a topic's configuration

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{Operator, OperatorError, OperatorSpec, TopicConfig};
use crate::diagnostics::Diagnostics;

use super::fan;
use super::shared::SharedStream;
use super::stage;
use super::transform::TransformRegistry;
use super::Stream;

/// Default broadcast channel capacity per topic
pub const DEFAULT_BROADCAST_CAPACITY: usize = 1024;

/// Compiles topic configurations into running pipelines
#[derive(Clone)]
pub struct PipelineBuilder {
    transforms: Arc<TransformRegistry>,
    diagnostics: Arc<dyn Diagnostics>,
    seed: Option<u64>,
    broadcast_capacity: usize,
}

impl PipelineBuilder {
    /// Create a builder resolving `map` transforms from `transforms`
    pub fn new(transforms: Arc<TransformRegistry>, diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            transforms,
            diagnostics,
            seed: None,
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
        }
    }

    /// Seed random operators for reproducible runs
    ///
    /// Each stage derives its own generator from the seed, the topic and the
    /// operator position.
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Set the broadcast channel capacity
    pub fn broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity.max(1);
        self
    }

    /// Build the shared output stream for `topic`
    ///
    /// - no config: passthrough, with a diagnostic
    /// - `startAfter`/`stopAfter` set: operators only see messages whose
    ///   index is inside the range; the rest bypass them and are merged back
    ///   (see [`fan`] for the ordering caveat)
    /// - otherwise: operators apply to every message
    ///
    /// Must be called from inside a Tokio runtime.
    pub fn build(&self, topic: &str, raw: Stream, config: Option<&TopicConfig>) -> SharedStream {
        let output = match config {
            None => {
                self.diagnostics.log(&format!(
                    "Registered stream for topic \"{}\" that is not present in the config",
                    topic
                ));
                raw
            }
            Some(config) if config.is_range_gated() => {
                let gate = config.clone();
                let (in_range, out_of_range) =
                    fan::partition(raw, move |_item, index| gate.in_range(index));

                tracing::debug!(
                    topic = %topic,
                    start_after = ?config.start_after,
                    stop_after = ?config.stop_after,
                    "Range gate enabled"
                );

                let operated = self.compose(topic, in_range, &config.operators);
                fan::merge(out_of_range, operated)
            }
            Some(config) => self.compose(topic, raw, &config.operators),
        };

        SharedStream::spawn(output, self.broadcast_capacity)
    }

    /// Fold `operators` over `input`, left to right
    ///
    /// Invalid entries are skipped with a diagnostic; the rest of the chain is
    /// still applied.
    pub fn compose(&self, topic: &str, input: Stream, operators: &[OperatorSpec]) -> Stream {
        let mut stream = input;

        for (position, spec) in operators.iter().enumerate() {
            let operator = match spec.parse() {
                Ok(operator) => operator,
                Err(e) => {
                    self.skip(topic, position, &e);
                    continue;
                }
            };

            let kind = operator.kind();
            stream = match operator {
                Operator::Map { transform } => match self.transforms.get(&transform) {
                    Some(f) => stage::map(stream, f),
                    None => {
                        self.skip(topic, position, &OperatorError::UnknownTransform(transform));
                        continue;
                    }
                },
                Operator::RandomDelay { min_ms, max_ms } => {
                    stage::random_delay(stream, min_ms, max_ms, self.rng(topic, position))
                }
                Operator::Buffer { window, max_size } => stage::buffer(stream, window, max_size),
                Operator::RandomDrop { chance } => {
                    stage::random_drop(stream, chance, self.rng(topic, position))
                }
            };

            tracing::debug!(topic = %topic, position, operator = kind, "Operator applied");
        }

        stream
    }

    fn skip(&self, topic: &str, position: usize, error: &OperatorError) {
        self.diagnostics.log(&format!(
            "Skipping operator {} for topic \"{}\": {}",
            position, topic, error
        ));
    }

    fn rng(&self, topic: &str, position: usize) -> StdRng {
        match self.seed {
            Some(seed) => {
                let mut hasher = DefaultHasher::new();
                seed.hash(&mut hasher);
                topic.hash(&mut hasher);
                position.hash(&mut hasher);
                StdRng::seed_from_u64(hasher.finish())
            }
            None => StdRng::from_entropy(),
        }
    }
}

impl std::fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("transforms", &self.transforms)
            .field("seed", &self.seed)
            .field("broadcast_capacity", &self.broadcast_capacity)
            .finish()
    }
}
