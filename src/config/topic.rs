//! Per-topic configuration and the topic-indexed config map

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use super::operator::OperatorSpec;

/// Fault-injection settings for one topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicConfig {
    /// Exact topic name
    pub topic: String,

    /// Operators, applied left to right
    #[serde(default)]
    pub operators: Vec<OperatorSpec>,

    /// First message index (inclusive, 0-based) the operators apply to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_after: Option<i64>,

    /// Last message index (inclusive) the operators apply to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_after: Option<i64>,
}

impl TopicConfig {
    /// Create a config for `topic` with no operators
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            operators: Vec::new(),
            start_after: None,
            stop_after: None,
        }
    }

    /// Append an operator entry
    pub fn operator(mut self, spec: OperatorSpec) -> Self {
        self.operators.push(spec);
        self
    }

    /// Set the first gated message index
    pub fn start_after(mut self, index: i64) -> Self {
        self.start_after = Some(index);
        self
    }

    /// Set the last gated message index
    pub fn stop_after(mut self, index: i64) -> Self {
        self.stop_after = Some(index);
        self
    }

    /// Whether operators only apply to a range of message indexes
    pub fn is_range_gated(&self) -> bool {
        self.start_after.is_some() || self.stop_after.is_some()
    }

    /// Whether message `index` falls inside the gated range
    ///
    /// Unset bounds are open, so an ungated topic contains every index.
    pub fn in_range(&self, index: u64) -> bool {
        let index = i64::try_from(index).unwrap_or(i64::MAX);
        self.start_after.map_or(true, |start| start <= index)
            && self.stop_after.map_or(true, |stop| index <= stop)
    }
}

/// Read-only mapping from topic name to its fault configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChaosConfig {
    topics: HashMap<String, TopicConfig>,
}

impl ChaosConfig {
    /// Config with no topics (every topic passes through unmodified)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from already-parsed topic records
    ///
    /// A topic that appears more than once keeps its last entry.
    pub fn from_topics(topics: impl IntoIterator<Item = TopicConfig>) -> Self {
        let mut map = HashMap::new();
        for topic in topics {
            if map.contains_key(&topic.topic) {
                tracing::debug!(topic = %topic.topic, "Duplicate topic config, later entry wins");
            }
            map.insert(topic.topic.clone(), topic);
        }
        Self { topics: map }
    }

    /// Parse a JSON topic list
    pub fn from_json_str(source: &str) -> Result<Self, ConfigError> {
        let topics: Vec<TopicConfig> = serde_json::from_str(source).map_err(ConfigError::Parse)?;
        Ok(Self::from_topics(topics))
    }

    /// Parse a JSON topic list from a reader
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ConfigError> {
        let topics: Vec<TopicConfig> =
            serde_json::from_reader(reader).map_err(|e| {
                if e.is_io() {
                    ConfigError::Io {
                        path: None,
                        source: e.into(),
                    }
                } else {
                    ConfigError::Parse(e)
                }
            })?;
        Ok(Self::from_topics(topics))
    }

    /// Load a JSON topic list from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ConfigError::Io {
            path: Some(path.to_path_buf()),
            source,
        })?;

        let config = Self::from_reader(BufReader::new(file)).map_err(|e| match e {
            ConfigError::Io { source, .. } => ConfigError::Io {
                path: Some(path.to_path_buf()),
                source,
            },
            other => other,
        })?;

        tracing::info!(
            path = %path.display(),
            topics = config.len(),
            "Loaded chaos config"
        );

        Ok(config)
    }

    /// Config for `topic`, if any
    pub fn get(&self, topic: &str) -> Option<&TopicConfig> {
        self.topics.get(topic)
    }

    /// Configured topic names
    pub fn topics(&self) -> impl Iterator<Item = &str> {
        self.topics.keys().map(String::as_str)
    }

    /// Number of configured topics
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    /// Whether no topic is configured
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}
