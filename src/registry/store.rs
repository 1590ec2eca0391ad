//! Topic registry implementation
//!
//! The central registry that builds, shares and tears down topic pipelines.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::bus::{topic, Ack, BusListener, PublishBus};
use crate::config::ChaosConfig;
use crate::diagnostics::Diagnostics;
use crate::pipeline::{Packet, PipelineBuilder, SharedStream};

use super::entry::{RawStream, TopicRegistration, TopicStats};
use super::error::RegistryError;
use super::subscription::{Handler, HandlerId, Subscription};

#[derive(Default)]
struct RegistryState {
    /// Active topics
    topics: HashMap<String, TopicRegistration>,
    /// Live subscriptions, one per (topic, handler)
    subscriptions: HashMap<(String, HandlerId), Subscription>,
}

/// Registry of active topic pipelines
///
/// Thread-safe via a single `Mutex`: building a pipeline for a topic and
/// releasing the last subscriber of a topic are mutually exclusive, so a
/// topic never has two pipelines and is never closed while being reopened.
///
/// All methods are synchronous but spawn Tokio tasks, so they must be called
/// from inside a Tokio runtime.
pub struct TopicRegistry {
    state: Mutex<RegistryState>,
    bus: Arc<dyn PublishBus>,
    config: Arc<ChaosConfig>,
    builder: PipelineBuilder,
    diagnostics: Arc<dyn Diagnostics>,
}

impl TopicRegistry {
    /// Create a registry reading from `bus`
    pub fn new(
        bus: Arc<dyn PublishBus>,
        config: Arc<ChaosConfig>,
        builder: PipelineBuilder,
        diagnostics: Arc<dyn Diagnostics>,
    ) -> Self {
        Self {
            state: Mutex::new(RegistryState::default()),
            bus,
            config,
            builder,
            diagnostics,
        }
    }

    /// Get the shared stream for `topic`, building its pipeline if needed
    ///
    /// While the topic stays registered every call returns the same stream.
    /// A registration created here without a subscriber lives until
    /// [`shutdown`](TopicRegistry::shutdown).
    pub fn get_or_create(&self, topic: &str) -> Result<SharedStream, RegistryError> {
        reject_wildcard(topic)?;
        let mut state = self.lock();
        Ok(self.get_or_create_locked(&mut state, topic))
    }

    fn get_or_create_locked(&self, state: &mut RegistryState, topic: &str) -> SharedStream {
        if let Some(registration) = state.topics.get(topic) {
            return registration.stream.clone();
        }

        let (raw, input) = RawStream::channel();
        let stream = self.builder.build(topic, input, self.config.get(topic));

        let feed = raw.clone();
        let name = topic.to_string();
        let listener: BusListener = Arc::new(move |packet: Packet, ack: Ack| {
            if !feed.push(packet) {
                tracing::trace!(topic = %name, "Raw stream closed, packet ignored");
            }
            // Handoff is complete once the packet is queued
            ack.ack();
        });
        let listener = self.bus.on(topic, listener);

        state.topics.insert(
            topic.to_string(),
            TopicRegistration::new(stream.clone(), listener, raw),
        );

        tracing::info!(
            topic = %topic,
            configured = self.config.get(topic).is_some(),
            "Topic pipeline created"
        );

        stream
    }

    /// Attach `handler` to `topic` under the identity `id`
    ///
    /// Re-registering the same `(topic, id)` replaces the previous handler.
    pub fn register_subscriber(
        &self,
        topic: &str,
        id: HandlerId,
        handler: Handler,
    ) -> Result<(), RegistryError> {
        reject_wildcard(topic)?;
        let mut state = self.lock();

        let stream = self.get_or_create_locked(&mut state, topic);
        let subscription = Subscription::attach(topic, &stream, handler);

        if let Some(previous) = state
            .subscriptions
            .insert((topic.to_string(), id), subscription)
        {
            previous.cancel();
            self.diagnostics.log(&format!(
                "Handler {} re-subscribed to topic \"{}\", previous subscription replaced",
                id, topic
            ));
        }

        let subscribers = match state.topics.get_mut(topic) {
            Some(registration) => {
                registration.subscribers.insert(id);
                registration.subscribers.len()
            }
            None => 0,
        };

        tracing::info!(
            topic = %topic,
            handler = %id,
            subscribers = subscribers,
            "Subscriber added"
        );

        Ok(())
    }

    /// Detach `id` from `topic`, tearing the pipeline down if it was the last
    ///
    /// Unknown topics or handlers are ignored with a diagnostic.
    pub fn unregister_subscriber(&self, topic: &str, id: HandlerId) {
        let mut state = self.lock();

        if !state.topics.contains_key(topic) {
            self.diagnostics
                .log(&format!("Unsubscribe for unregistered topic \"{}\"", topic));
            return;
        }

        match state.subscriptions.remove(&(topic.to_string(), id)) {
            Some(subscription) => subscription.cancel(),
            None => {
                self.diagnostics.log(&format!(
                    "Unsubscribe for unknown subscription: topic \"{}\", {}",
                    topic, id
                ));
                return;
            }
        }

        let Some(registration) = state.topics.get_mut(topic) else {
            return;
        };
        registration.subscribers.remove(&id);
        let remaining = registration.subscribers.len();

        tracing::debug!(
            topic = %topic,
            handler = %id,
            subscribers = remaining,
            "Subscriber removed"
        );

        if remaining == 0 {
            if let Some(registration) = state.topics.remove(topic) {
                self.release(topic, registration);
            }
        }
    }

    /// Tear down every topic: cancel subscriptions, remove bus listeners and
    /// close raw streams
    pub fn shutdown(&self) {
        let mut state = self.lock();

        for (_, subscription) in state.subscriptions.drain() {
            subscription.cancel();
        }

        let topics: Vec<(String, TopicRegistration)> = state.topics.drain().collect();
        if topics.is_empty() {
            return;
        }

        let count = topics.len();
        for (topic, registration) in topics {
            self.release(&topic, registration);
        }

        tracing::info!(topics = count, "Topic registry shut down");
    }

    /// Subscriptions must already be cancelled
    fn release(&self, topic: &str, registration: TopicRegistration) {
        if !self.bus.remove_listener(topic, registration.listener) {
            tracing::warn!(
                topic = %topic,
                listener = %registration.listener,
                "Upstream listener was already gone"
            );
        }
        registration.raw.close();
        debug_assert!(registration.raw.is_closed());

        tracing::info!(
            topic = %topic,
            messages = registration.raw.received(),
            "No one else is listening, topic pipeline released"
        );
    }

    /// Whether `topic` has an active pipeline
    pub fn contains(&self, topic: &str) -> bool {
        self.lock().topics.contains_key(topic)
    }

    /// Number of active topics
    pub fn topic_count(&self) -> usize {
        self.lock().topics.len()
    }

    /// Number of handlers registered on `topic`
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.lock()
            .topics
            .get(topic)
            .map_or(0, |registration| registration.subscribers.len())
    }

    /// Active topic names, sorted
    pub fn active_topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.lock().topics.keys().cloned().collect();
        topics.sort_unstable();
        topics
    }

    /// Statistics for `topic`, if active
    pub fn topic_stats(&self, topic: &str) -> Option<TopicStats> {
        self.lock()
            .topics
            .get(topic)
            .map(|registration| registration.stats(topic))
    }

    /// Statistics for every active topic, sorted by topic
    pub fn all_stats(&self) -> Vec<TopicStats> {
        let mut stats: Vec<TopicStats> = self
            .lock()
            .topics
            .iter()
            .map(|(topic, registration)| registration.stats(topic))
            .collect();
        stats.sort_unstable_by(|a, b| a.topic.cmp(&b.topic));
        stats
    }

    /// The fault configuration this registry builds from
    pub fn config(&self) -> &ChaosConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Topic registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl Drop for TopicRegistry {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn reject_wildcard(topic: &str) -> Result<(), RegistryError> {
    if topic::has_wildcard(topic) {
        return Err(RegistryError::WildcardTopic(topic.to_string()));
    }
    Ok(())
}
