//! Named message transforms for the `map` operator
//!
//! Transforms are compiled functions selected by name from the config; no
//! code is evaluated at runtime.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;

use super::packet::Packet;

/// A 1:1 message rewrite
pub type Transform = Arc<dyn Fn(Packet) -> Packet + Send + Sync>;

/// Closed set of transforms available to `map` operators
#[derive(Clone)]
pub struct TransformRegistry {
    transforms: HashMap<String, Transform>,
}

impl TransformRegistry {
    /// Registry with no transforms
    pub fn empty() -> Self {
        Self {
            transforms: HashMap::new(),
        }
    }

    /// Registry with the built-in transforms
    ///
    /// - `identity`: leave the message as is
    /// - `uppercase` / `lowercase`: ASCII case conversion of the payload
    /// - `reverse`: reverse the payload bytes
    /// - `clear`: replace the payload with an empty one
    /// - `bitflip`: invert every payload bit
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("identity", |packet| packet);
        registry.register("uppercase", |packet| {
            let payload = packet.payload.to_ascii_uppercase();
            packet.with_payload(payload)
        });
        registry.register("lowercase", |packet| {
            let payload = packet.payload.to_ascii_lowercase();
            packet.with_payload(payload)
        });
        registry.register("reverse", |packet| {
            let payload: Vec<u8> = packet.payload.iter().rev().copied().collect();
            packet.with_payload(payload)
        });
        registry.register("clear", |packet| packet.with_payload(Bytes::new()));
        registry.register("bitflip", |packet| {
            let payload: Vec<u8> = packet.payload.iter().map(|b| !b).collect();
            packet.with_payload(payload)
        });
        registry
    }

    /// Add or replace a transform
    pub fn register<F>(&mut self, name: impl Into<String>, transform: F) -> &mut Self
    where
        F: Fn(Packet) -> Packet + Send + Sync + 'static,
    {
        self.transforms.insert(name.into(), Arc::new(transform));
        self
    }

    /// Look up a transform by name
    pub fn get(&self, name: &str) -> Option<Transform> {
        self.transforms.get(name).cloned()
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.transforms.contains_key(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.transforms.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl std::fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("transforms", &self.names())
            .finish()
    }
}
