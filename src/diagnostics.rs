//! Diagnostic sink
//!
//! Non-fatal problems (skipped operators, unconfigured topics, wildcard
//! bypasses, unknown unsubscribes) are reported through [`Diagnostics`]
//! rather than returned to the broker.

use std::sync::{Arc, Mutex};

use crate::bus::MemoryBus;
use crate::pipeline::Packet;

/// Receives human-readable diagnostic messages
pub trait Diagnostics: Send + Sync {
    fn log(&self, message: &str);
}

/// Emits diagnostics as `tracing` warnings
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn log(&self, message: &str) {
        tracing::warn!(target: "mqtt_chaos::diagnostics", "{}", message);
    }
}

/// Publishes diagnostics to a log topic on a [`MemoryBus`]
///
/// Each message is also traced. Publishing happens on a spawned task, so
/// this must be used from inside a Tokio runtime.
pub struct BusDiagnostics {
    bus: Arc<MemoryBus>,
    topic: String,
}

impl BusDiagnostics {
    /// Publish to `topic` on `bus`
    pub fn new(bus: Arc<MemoryBus>, topic: impl Into<String>) -> Self {
        Self {
            bus,
            topic: topic.into(),
        }
    }

    /// The log topic
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl Diagnostics for BusDiagnostics {
    fn log(&self, message: &str) {
        TracingDiagnostics.log(message);

        let bus = self.bus.clone();
        let packet = Packet::new(self.topic.clone(), message.to_string());
        tokio::spawn(async move {
            bus.publish(packet).await;
        });
    }
}

/// Keeps every diagnostic in memory
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
    entries: Mutex<Vec<String>>,
}

impl MemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded messages, oldest first
    pub fn entries(&self) -> Vec<String> {
        match self.entries.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Whether any recorded message contains `needle`
    pub fn contains(&self, needle: &str) -> bool {
        self.entries().iter().any(|entry| entry.contains(needle))
    }
}

impl Diagnostics for MemoryDiagnostics {
    fn log(&self, message: &str) {
        tracing::debug!(target: "mqtt_chaos::diagnostics", "{}", message);
        match self.entries.lock() {
            Ok(mut guard) => guard.push(message.to_string()),
            Err(poisoned) => poisoned.into_inner().push(message.to_string()),
        }
    }
}
