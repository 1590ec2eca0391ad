//! Registry configuration

use crate::pipeline::DEFAULT_BROADCAST_CAPACITY;

/// Default topic for control commands
pub const DEFAULT_CONTROL_TOPIC: &str = "cfqomeaf/config";

/// Default topic diagnostics are published to
pub const DEFAULT_LOG_TOPIC: &str = "cfqomeaf/log";

/// Runtime settings for the topic registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Capacity of each topic's broadcast channel
    pub broadcast_capacity: usize,

    /// Seed for random operators (None = fresh entropy per stage)
    pub seed: Option<u64>,

    /// Topic the control channel listens on
    pub control_topic: String,

    /// Topic bus diagnostics are published to
    pub log_topic: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: DEFAULT_BROADCAST_CAPACITY,
            seed: None,
            control_topic: DEFAULT_CONTROL_TOPIC.to_string(),
            log_topic: DEFAULT_LOG_TOPIC.to_string(),
        }
    }
}

impl RegistryConfig {
    /// Set the broadcast channel capacity
    pub fn broadcast_capacity(mut self, capacity: usize) -> Self {
        self.broadcast_capacity = capacity.max(1);
        self
    }

    /// Seed random operators
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the control topic
    pub fn control_topic(mut self, topic: impl Into<String>) -> Self {
        self.control_topic = topic.into();
        self
    }

    /// Set the diagnostics log topic
    pub fn log_topic(mut self, topic: impl Into<String>) -> Self {
        self.log_topic = topic.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();

        assert_eq!(config.broadcast_capacity, 1024);
        assert_eq!(config.seed, None);
        assert_eq!(config.control_topic, "cfqomeaf/config");
        assert_eq!(config.log_topic, "cfqomeaf/log");
    }

    #[test]
    fn test_builder_chaining() {
        let config = RegistryConfig::default()
            .broadcast_capacity(0)
            .seed(9)
            .control_topic("chaos/ctl")
            .log_topic("chaos/log");

        // Capacity is clamped to at least one slot
        assert_eq!(config.broadcast_capacity, 1);
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.control_topic, "chaos/ctl");
        assert_eq!(config.log_topic, "chaos/log");
    }
}
