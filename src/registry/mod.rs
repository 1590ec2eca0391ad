//! Per-topic stream registry
//!
//! The registry owns one pipeline per exact topic. The first subscriber
//! builds it, later subscribers share it, and the last unsubscribe tears it
//! down.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<TopicRegistry>
//!                     ┌─────────────────────────────┐
//!                     │ topics: HashMap<topic,      │
//!                     │   TopicRegistration {       │
//!                     │     raw, listener,          │
//!                     │     stream, subscribers     │
//!                     │   }>                        │
//!                     │ subscriptions: HashMap<     │
//!                     │   (topic, handler), Sub>    │
//!                     └──────────────┬──────────────┘
//!                                    │
//!   PublishBus ──► listener ──► raw ──► pipeline ──► SharedStream
//!                                                  ┌──────┴──────┐
//!                                                  ▼             ▼
//!                                              handler A     handler B
//! ```
//!
//! All state sits behind one lock, so "look up, else build" and "release
//! last subscriber" never interleave for the same topic.

pub mod config;
pub mod entry;
pub mod error;
pub mod store;
pub mod subscription;

pub use crate::pipeline::SharedStream;
pub use config::RegistryConfig;
pub use entry::TopicStats;
pub use error::RegistryError;
pub use store::TopicRegistry;
pub use subscription::{Handler, HandlerId, Subscription};
