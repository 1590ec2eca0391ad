//! Chaos-engineering fault injection for MQTT brokers
//!
//! `mqtt-chaos` sits between a broker's internal publish/subscribe bus and its
//! per-client subscriptions. Every exact (non-wildcard) topic a client
//! subscribes to is routed through one shared fault-injection pipeline built
//! from the topic's configuration:
//!
//! - `map`: rewrite each message with a named transform
//! - `randomDelay`: re-emit each message after a random delay
//! - `buffer`: batch messages by count and/or time window
//! - `randomDrop`: drop messages with a fixed probability
//!
//! # Architecture
//!
//! ```text
//!  publisher ──► PublishBus ──► listener ──► raw stream
//!                                               │
//!                                    [range gate / operators]
//!                                               │
//!                                     broadcast (SharedStream)
//!                                   ┌───────────┼───────────┐
//!                                   ▼           ▼           ▼
//!                               handler A   handler B   handler C
//! ```
//!
//! The pipeline runs once per upstream message no matter how many handlers
//! are attached, so every client sees the same injected faults.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use mqtt_chaos::{ChaosConfig, ChaosEngine, HandlerId, MemoryBus, Packet};
//!
//! # async fn example() -> mqtt_chaos::Result<()> {
//! let config = ChaosConfig::from_json_str(
//!     r#"[{ "topic": "sensors/temp", "operators": [{ "type": "randomDrop", "chance": 0.5 }] }]"#,
//! )?;
//! let bus = Arc::new(MemoryBus::new());
//! let mut engine = ChaosEngine::new(config, bus.clone());
//!
//! engine.interceptor().on_subscribe(
//!     "sensors/temp",
//!     HandlerId(1),
//!     Arc::new(|packet: Packet| println!("got {:?}", packet.payload)),
//!     || {},
//! );
//!
//! bus.publish(Packet::new("sensors/temp", "21.5")).await;
//! engine.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod bus;
pub mod config;
pub mod control;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod intercept;
pub mod pipeline;
pub mod registry;

pub use bus::{Ack, BusListener, ListenerId, MemoryBus, PublishBus};
pub use config::{ChaosConfig, ConfigError, Operator, OperatorError, OperatorSpec, TopicConfig};
pub use control::{ControlChannel, ControlCommand};
pub use diagnostics::{BusDiagnostics, Diagnostics, MemoryDiagnostics, TracingDiagnostics};
pub use engine::{ChaosEngine, ChaosEngineBuilder};
pub use error::{Error, Result};
pub use intercept::ChaosInterceptor;
pub use pipeline::{Emission, Packet, PipelineBuilder, TransformRegistry};
pub use registry::{
    Handler, HandlerId, RegistryConfig, RegistryError, SharedStream, TopicRegistry, TopicStats,
};
