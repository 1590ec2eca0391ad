//! Chaos engine
//!
//! [`ChaosEngine`] is the one object a broker integration holds: it owns the
//! configuration, the topic registry, the interceptor and the control
//! channel, and tears all of them down in [`ChaosEngine::shutdown`].

use std::sync::Arc;

use crate::bus::PublishBus;
use crate::config::ChaosConfig;
use crate::control::ControlChannel;
use crate::diagnostics::{Diagnostics, TracingDiagnostics};
use crate::intercept::ChaosInterceptor;
use crate::pipeline::{PipelineBuilder, TransformRegistry};
use crate::registry::{RegistryConfig, TopicRegistry};

/// Owns every piece of a running chaos setup
pub struct ChaosEngine {
    registry: Arc<TopicRegistry>,
    interceptor: ChaosInterceptor,
    control: Option<ControlChannel>,
    settings: RegistryConfig,
}

impl ChaosEngine {
    /// Create an engine with default settings
    ///
    /// Must be called from inside a Tokio runtime.
    pub fn new(config: ChaosConfig, bus: Arc<dyn PublishBus>) -> Self {
        Self::builder(config, bus).build()
    }

    /// Start configuring an engine
    pub fn builder(config: ChaosConfig, bus: Arc<dyn PublishBus>) -> ChaosEngineBuilder {
        ChaosEngineBuilder {
            config,
            bus,
            transforms: TransformRegistry::with_builtins(),
            diagnostics: Arc::new(TracingDiagnostics),
            settings: RegistryConfig::default(),
            control_channel: true,
        }
    }

    /// Subscribe/unsubscribe hooks for the broker
    pub fn interceptor(&self) -> &ChaosInterceptor {
        &self.interceptor
    }

    /// The topic registry
    pub fn registry(&self) -> &Arc<TopicRegistry> {
        &self.registry
    }

    /// The fault configuration
    pub fn config(&self) -> &ChaosConfig {
        self.registry.config()
    }

    /// Runtime settings
    pub fn settings(&self) -> &RegistryConfig {
        &self.settings
    }

    /// The control channel, if enabled
    pub fn control(&self) -> Option<&ControlChannel> {
        self.control.as_ref()
    }

    /// Cancel all subscriptions and remove every listener this engine added
    /// to the bus
    pub fn shutdown(&mut self) {
        if let Some(mut control) = self.control.take() {
            control.stop();
        }
        self.interceptor.shutdown();
        self.registry.shutdown();

        tracing::info!("Chaos engine shut down");
    }
}

/// Builder for [`ChaosEngine`]
pub struct ChaosEngineBuilder {
    config: ChaosConfig,
    bus: Arc<dyn PublishBus>,
    transforms: TransformRegistry,
    diagnostics: Arc<dyn Diagnostics>,
    settings: RegistryConfig,
    control_channel: bool,
}

impl ChaosEngineBuilder {
    /// Use a custom transform set for `map` operators
    pub fn transforms(mut self, transforms: TransformRegistry) -> Self {
        self.transforms = transforms;
        self
    }

    /// Send diagnostics somewhere other than `tracing`
    pub fn diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    /// Set runtime settings
    pub fn settings(mut self, settings: RegistryConfig) -> Self {
        self.settings = settings;
        self
    }

    /// Disable the control topic listener
    pub fn without_control_channel(mut self) -> Self {
        self.control_channel = false;
        self
    }

    /// Build the engine
    ///
    /// Must be called from inside a Tokio runtime.
    pub fn build(self) -> ChaosEngine {
        let builder = PipelineBuilder::new(Arc::new(self.transforms), self.diagnostics.clone())
            .seed(self.settings.seed)
            .broadcast_capacity(self.settings.broadcast_capacity);

        let registry = Arc::new(TopicRegistry::new(
            self.bus.clone(),
            Arc::new(self.config),
            builder,
            self.diagnostics.clone(),
        ));

        let interceptor =
            ChaosInterceptor::new(registry.clone(), self.bus.clone(), self.diagnostics.clone());

        let control = self.control_channel.then(|| {
            ControlChannel::start(
                self.bus.clone(),
                self.settings.control_topic.clone(),
                &registry,
                self.diagnostics.clone(),
            )
        });

        tracing::info!(
            topics = registry.config().len(),
            seeded = self.settings.seed.is_some(),
            control = control.is_some(),
            "Chaos engine ready"
        );

        ChaosEngine {
            registry,
            interceptor,
            control,
            settings: self.settings,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::bus::MemoryBus;
    use crate::diagnostics::MemoryDiagnostics;
    use crate::pipeline::Packet;
    use crate::registry::HandlerId;

    use super::*;

    #[tokio::test]
    async fn test_engine_wires_control_channel() {
        let bus = Arc::new(MemoryBus::new());
        let diagnostics = Arc::new(MemoryDiagnostics::new());
        let mut engine = ChaosEngine::builder(ChaosConfig::empty(), bus.clone())
            .diagnostics(diagnostics.clone())
            .settings(RegistryConfig::default().control_topic("ctl"))
            .build();

        assert_eq!(engine.control().map(ControlChannel::topic), Some("ctl"));
        bus.publish(Packet::new("ctl", "get_clients")).await;
        assert!(diagnostics.contains("No active topic subscriptions"));

        engine.shutdown();
        assert_eq!(bus.total_listeners(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_cleans_every_path() {
        let bus = Arc::new(MemoryBus::new());
        let mut engine = ChaosEngine::builder(ChaosConfig::empty(), bus.clone())
            .diagnostics(Arc::new(MemoryDiagnostics::new()))
            .build();

        let handler = Arc::new(|_packet: Packet| {});
        engine
            .interceptor()
            .on_subscribe("a", HandlerId(1), handler.clone(), || {});
        engine
            .interceptor()
            .on_subscribe("a/#", HandlerId(2), handler, || {});
        // exact topic, wildcard, control topic
        assert_eq!(bus.total_listeners(), 3);

        engine.shutdown();
        assert_eq!(bus.total_listeners(), 0);
        assert_eq!(engine.registry().topic_count(), 0);
    }

    #[tokio::test]
    async fn test_without_control_channel() {
        let bus = Arc::new(MemoryBus::new());
        let engine = ChaosEngine::builder(ChaosConfig::empty(), bus.clone())
            .without_control_channel()
            .build();

        assert!(engine.control().is_none());
        assert_eq!(bus.total_listeners(), 0);
        assert!(engine.config().is_empty());
    }
}
