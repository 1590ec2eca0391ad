//! Control topic
//!
//! Operators of a chaos run can query the engine over the bus itself by
//! publishing a command to the control topic (`cfqomeaf/config` by default).
//! Answers go to the diagnostic sink, which with [`BusDiagnostics`] means the
//! log topic.
//!
//! | Command       | Answer                                          |
//! |---------------|-------------------------------------------------|
//! | `get_clients` | active topics with their registered handlers    |
//! | `get_topics`  | topics present in the fault configuration       |
//! | `get_stats`   | per-topic message counts and pipeline age       |
//!
//! [`BusDiagnostics`]: crate::diagnostics::BusDiagnostics

use std::sync::{Arc, Weak};

use crate::bus::{Ack, BusListener, ListenerId, PublishBus};
use crate::diagnostics::Diagnostics;
use crate::pipeline::Packet;
use crate::registry::TopicRegistry;

/// A command received on the control topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    GetClients,
    GetTopics,
    GetStats,
    Unknown(String),
}

impl ControlCommand {
    /// Parse a control payload (surrounding whitespace ignored)
    pub fn parse(payload: &[u8]) -> Self {
        let text = String::from_utf8_lossy(payload);
        match text.trim() {
            "get_clients" => ControlCommand::GetClients,
            "get_topics" => ControlCommand::GetTopics,
            "get_stats" => ControlCommand::GetStats,
            other => ControlCommand::Unknown(other.to_string()),
        }
    }
}

/// Listener on the control topic
///
/// Holds only a weak reference to the registry. Removed from the bus on
/// [`stop`](ControlChannel::stop) or drop.
pub struct ControlChannel {
    bus: Arc<dyn PublishBus>,
    topic: String,
    listener: Option<ListenerId>,
}

impl ControlChannel {
    /// Start listening on `topic`
    pub fn start(
        bus: Arc<dyn PublishBus>,
        topic: impl Into<String>,
        registry: &Arc<TopicRegistry>,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        let topic = topic.into();
        let registry: Weak<TopicRegistry> = Arc::downgrade(registry);

        let listener: BusListener = Arc::new(move |packet: Packet, ack: Ack| {
            let command = ControlCommand::parse(&packet.payload);
            ack.ack();

            match registry.upgrade() {
                Some(registry) => execute(&registry, diagnostics.as_ref(), &command),
                None => tracing::debug!(?command, "Control command after registry shutdown"),
            }
        });
        let listener = bus.on(&topic, listener);

        tracing::info!(topic = %topic, "Subscribed to control topic");

        Self {
            bus,
            topic,
            listener: Some(listener),
        }
    }

    /// The control topic
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Stop listening; idempotent
    pub fn stop(&mut self) {
        if let Some(listener) = self.listener.take() {
            self.bus.remove_listener(&self.topic, listener);
        }
    }
}

impl Drop for ControlChannel {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Run `command` against `registry`, answering through `diagnostics`
pub fn execute(registry: &TopicRegistry, diagnostics: &dyn Diagnostics, command: &ControlCommand) {
    match command {
        ControlCommand::GetClients => {
            let stats = registry.all_stats();
            if stats.is_empty() {
                diagnostics.log("No active topic subscriptions");
                return;
            }
            let lines: Vec<String> = stats
                .iter()
                .map(|s| {
                    let handlers: Vec<String> = s.handlers.iter().map(ToString::to_string).collect();
                    format!("{}: {}", s.topic, handlers.join(", "))
                })
                .collect();
            diagnostics.log(&lines.join("\n"));
        }
        ControlCommand::GetTopics => {
            let mut topics: Vec<&str> = registry.config().topics().collect();
            topics.sort_unstable();
            diagnostics.log(&format!("Configured topics: {}", topics.join(", ")));
        }
        ControlCommand::GetStats => {
            let stats = registry.all_stats();
            if stats.is_empty() {
                diagnostics.log("No active topic subscriptions");
                return;
            }
            let lines: Vec<String> = stats
                .iter()
                .map(|s| {
                    format!(
                        "{}: subscribers={} messages={} age={}ms",
                        s.topic,
                        s.subscriber_count,
                        s.messages_received,
                        s.age.as_millis()
                    )
                })
                .collect();
            diagnostics.log(&lines.join("\n"));
        }
        ControlCommand::Unknown(other) => {
            diagnostics.log(&format!("Unknown control command: {}", other));
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::bus::MemoryBus;
    use crate::config::{ChaosConfig, OperatorSpec, TopicConfig};
    use crate::diagnostics::MemoryDiagnostics;
    use crate::pipeline::{PipelineBuilder, TransformRegistry};
    use crate::registry::{Handler, HandlerId};

    use super::*;

    fn setup() -> (Arc<MemoryBus>, Arc<TopicRegistry>, Arc<MemoryDiagnostics>) {
        let bus = Arc::new(MemoryBus::new());
        let diagnostics = Arc::new(MemoryDiagnostics::new());
        let config = ChaosConfig::from_topics(vec![
            TopicConfig::new("b")
                .operator(OperatorSpec::new(json!({ "type": "randomDrop", "chance": 0 }))),
            TopicConfig::new("a"),
        ]);
        let builder =
            PipelineBuilder::new(Arc::new(TransformRegistry::default()), diagnostics.clone());
        let registry = Arc::new(TopicRegistry::new(
            bus.clone(),
            Arc::new(config),
            builder,
            diagnostics.clone(),
        ));
        (bus, registry, diagnostics)
    }

    fn noop() -> Handler {
        Arc::new(|_packet: Packet| {})
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(ControlCommand::parse(b"get_clients"), ControlCommand::GetClients);
        assert_eq!(ControlCommand::parse(b" get_topics\n"), ControlCommand::GetTopics);
        assert_eq!(ControlCommand::parse(b"get_stats"), ControlCommand::GetStats);
        assert_eq!(
            ControlCommand::parse(b"reboot"),
            ControlCommand::Unknown("reboot".into())
        );
    }

    #[tokio::test]
    async fn test_get_clients_over_bus() {
        let (bus, registry, diagnostics) = setup();
        let _control = ControlChannel::start(
            bus.clone(),
            "cfqomeaf/config",
            &registry,
            diagnostics.clone(),
        );

        registry.register_subscriber("a", HandlerId(1), noop()).unwrap();
        registry.register_subscriber("a", HandlerId(2), noop()).unwrap();

        bus.publish(Packet::new("cfqomeaf/config", "get_clients")).await;

        assert!(diagnostics.contains("a: handler-1, handler-2"));
    }

    #[tokio::test]
    async fn test_get_topics_and_unknown() {
        let (_bus, registry, diagnostics) = setup();

        execute(&registry, diagnostics.as_ref(), &ControlCommand::GetTopics);
        execute(&registry, diagnostics.as_ref(), &ControlCommand::GetClients);
        execute(
            &registry,
            diagnostics.as_ref(),
            &ControlCommand::Unknown("x".into()),
        );

        assert!(diagnostics.contains("Configured topics: a, b"));
        assert!(diagnostics.contains("No active topic subscriptions"));
        assert!(diagnostics.contains("Unknown control command: x"));
    }

    #[tokio::test]
    async fn test_get_stats_counts_messages() {
        let (bus, registry, diagnostics) = setup();
        registry.register_subscriber("b", HandlerId(1), noop()).unwrap();

        bus.publish(Packet::new("b", "1")).await;
        bus.publish(Packet::new("b", "2")).await;
        execute(&registry, diagnostics.as_ref(), &ControlCommand::GetStats);

        assert!(diagnostics.contains("b: subscribers=1 messages=2"));
    }

    #[tokio::test]
    async fn test_stop_removes_listener() {
        let (bus, registry, diagnostics) = setup();
        let mut control = ControlChannel::start(bus.clone(), "ctl", &registry, diagnostics);
        assert_eq!(bus.listener_count("ctl"), 1);
        assert_eq!(control.topic(), "ctl");

        control.stop();
        control.stop();
        assert_eq!(bus.listener_count("ctl"), 0);
    }
}
