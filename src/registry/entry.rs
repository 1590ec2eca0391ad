//! Per-topic registry state
//!
//! This module defines what the registry keeps for each active topic.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::bus::ListenerId;
use crate::pipeline::{Emission, Packet, SharedStream, Stream};

use super::subscription::HandlerId;

/// Input end of a topic pipeline, fed by the bus listener
///
/// Once closed it stays closed: later pushes are ignored.
#[derive(Clone)]
pub(crate) struct RawStream {
    inner: Arc<RawInner>,
}

struct RawInner {
    tx: Mutex<Option<mpsc::UnboundedSender<Emission>>>,
    received: AtomicU64,
}

impl RawStream {
    /// Create a raw stream and the pipeline input it feeds
    pub(crate) fn channel() -> (Self, Stream) {
        let (tx, rx) = mpsc::unbounded_channel();
        let raw = Self {
            inner: Arc::new(RawInner {
                tx: Mutex::new(Some(tx)),
                received: AtomicU64::new(0),
            }),
        };
        (raw, rx)
    }

    /// Hand a packet to the pipeline; false if the stream is closed
    pub(crate) fn push(&self, packet: Packet) -> bool {
        let guard = self.sender();
        let Some(tx) = guard.as_ref() else {
            return false;
        };

        if tx.send(Emission::Message(packet)).is_err() {
            return false;
        }
        self.inner.received.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Close permanently
    pub(crate) fn close(&self) {
        self.sender().take();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.sender().is_none()
    }

    /// Packets accepted so far
    pub(crate) fn received(&self) -> u64 {
        self.inner.received.load(Ordering::Relaxed)
    }

    fn sender(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<Emission>>> {
        match self.inner.tx.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Registry record for one active topic
pub(crate) struct TopicRegistration {
    /// Pipeline output shared by all subscribers
    pub(crate) stream: SharedStream,

    /// Listener registered with the upstream bus
    pub(crate) listener: ListenerId,

    /// Pipeline input, closed on teardown
    pub(crate) raw: RawStream,

    /// Handlers currently attached (reference count only)
    pub(crate) subscribers: BTreeSet<HandlerId>,

    /// When the pipeline was built
    pub(crate) created_at: Instant,
}

impl TopicRegistration {
    pub(crate) fn new(stream: SharedStream, listener: ListenerId, raw: RawStream) -> Self {
        Self {
            stream,
            listener,
            raw,
            subscribers: BTreeSet::new(),
            created_at: Instant::now(),
        }
    }

    pub(crate) fn stats(&self, topic: &str) -> TopicStats {
        TopicStats {
            topic: topic.to_string(),
            subscriber_count: self.subscribers.len(),
            handlers: self.subscribers.iter().copied().collect(),
            messages_received: self.raw.received(),
            age: self.created_at.elapsed(),
        }
    }
}

/// Statistics for an active topic
#[derive(Debug, Clone)]
pub struct TopicStats {
    /// Topic name
    pub topic: String,
    /// Number of registered handlers
    pub subscriber_count: usize,
    /// Registered handlers, sorted
    pub handlers: Vec<HandlerId>,
    /// Upstream messages fed into the pipeline
    pub messages_received: u64,
    /// Time since the pipeline was built
    pub age: Duration,
}
