//! Subscription interception
//!
//! The broker calls [`ChaosInterceptor::on_subscribe`] and
//! [`ChaosInterceptor::on_unsubscribe`] in place of its own bus
//! subscribe/unsubscribe. Exact topics are routed through the
//! [`TopicRegistry`]; wildcard filters keep the broker's default delivery
//! straight from the bus, with no fault injection.
//!
//! A wildcard subscriber and an exact-topic subscriber on overlapping topics
//! receive independent copies of each message: the wildcard path sees the
//! raw traffic, the exact path sees the faulted pipeline output.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::bus::{topic, Ack, BusListener, ListenerId, PublishBus};
use crate::diagnostics::Diagnostics;
use crate::pipeline::Packet;
use crate::registry::{Handler, HandlerId, TopicRegistry};

/// Broker-facing subscribe/unsubscribe hooks
pub struct ChaosInterceptor {
    registry: Arc<TopicRegistry>,
    bus: Arc<dyn PublishBus>,
    diagnostics: Arc<dyn Diagnostics>,
    /// Wildcard subscriptions delivered straight from the bus
    bypassed: Mutex<HashMap<(String, HandlerId), ListenerId>>,
}

impl ChaosInterceptor {
    pub fn new(
        registry: Arc<TopicRegistry>,
        bus: Arc<dyn PublishBus>,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        Self {
            registry,
            bus,
            diagnostics,
            bypassed: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe `handler` to `topic`, then call `done`
    ///
    /// Registration is complete by the time `done` runs.
    pub fn on_subscribe<F: FnOnce()>(&self, topic: &str, id: HandlerId, handler: Handler, done: F) {
        if topic::has_wildcard(topic) {
            self.diagnostics.log(&format!(
                "Attempted to intercept subscription to topic with wildcards ({}), which is not supported; using default delivery",
                topic
            ));
            self.subscribe_direct(topic, id, handler);
            done();
            return;
        }

        if let Err(e) = self.registry.register_subscriber(topic, id, handler.clone()) {
            self.diagnostics
                .log(&format!("{}; using default delivery", e));
            self.subscribe_direct(topic, id, handler);
        }

        done();
    }

    /// Unsubscribe `id` from `topic`, then call `done`
    pub fn on_unsubscribe<F: FnOnce()>(&self, topic: &str, id: HandlerId, done: F) {
        if topic::has_wildcard(topic) {
            self.unsubscribe_direct(topic, id);
            done();
            return;
        }

        self.registry.unregister_subscriber(topic, id);
        done();
    }

    /// Number of wildcard subscriptions on the default path
    pub fn bypassed_count(&self) -> usize {
        self.bypassed().len()
    }

    /// Remove every wildcard listener from the bus
    pub fn shutdown(&self) {
        let mut bypassed = self.bypassed();
        for ((topic, _), listener) in bypassed.drain() {
            self.bus.remove_listener(&topic, listener);
        }
    }

    fn subscribe_direct(&self, topic: &str, id: HandlerId, handler: Handler) {
        let listener: BusListener = Arc::new(move |packet: Packet, ack: Ack| {
            handler(packet);
            ack.ack();
        });
        let listener = self.bus.on(topic, listener);

        if let Some(previous) = self.bypassed().insert((topic.to_string(), id), listener) {
            self.bus.remove_listener(topic, previous);
        }

        tracing::debug!(topic = %topic, handler = %id, "Wildcard subscription bypasses chaos pipeline");
    }

    fn unsubscribe_direct(&self, topic: &str, id: HandlerId) {
        let removed = self.bypassed().remove(&(topic.to_string(), id));
        match removed {
            Some(listener) => {
                self.bus.remove_listener(topic, listener);
            }
            None => self.diagnostics.log(&format!(
                "Unsubscribe for unknown wildcard subscription: topic \"{}\", {}",
                topic, id
            )),
        }
    }

    fn bypassed(&self) -> MutexGuard<'_, HashMap<(String, HandlerId), ListenerId>> {
        match self.bypassed.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Drop for ChaosInterceptor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
