//! In-process publish/subscribe bus
//!
//! A small MQTT-style router: listeners register a topic filter and receive
//! every published packet whose topic matches it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::pipeline::Packet;

use super::topic;
use super::{Ack, BusListener, ListenerId, PublishBus};

/// In-memory [`PublishBus`] implementation
pub struct MemoryBus {
    /// Topic filter -> listeners in registration order
    listeners: RwLock<HashMap<String, Vec<(ListenerId, BusListener)>>>,
    next_id: AtomicU64,
}

impl MemoryBus {
    /// Create an empty bus
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Publish a packet to every matching listener
    ///
    /// Resolves once every listener has acknowledged. Returns the number of
    /// listeners the packet was delivered to.
    pub async fn publish(&self, packet: Packet) -> usize {
        let targets: Vec<BusListener> = {
            let listeners = self.read();
            listeners
                .iter()
                .filter(|(filter, _)| topic::matches(filter, &packet.topic))
                .flat_map(|(_, entries)| entries.iter().map(|(_, l)| l.clone()))
                .collect()
        };

        let mut pending = Vec::with_capacity(targets.len());
        for listener in &targets {
            let (ack, rx) = Ack::channel();
            listener(packet.clone(), ack);
            pending.push(rx);
        }

        for rx in pending {
            if rx.await.is_err() {
                tracing::warn!(topic = %packet.topic, "Listener dropped ack without acknowledging");
            }
        }

        tracing::trace!(
            topic = %packet.topic,
            listeners = targets.len(),
            "Packet published"
        );

        targets.len()
    }

    /// Number of listeners registered on exactly this filter
    pub fn listener_count(&self, filter: &str) -> usize {
        self.read().get(filter).map_or(0, Vec::len)
    }

    /// Number of listeners across all filters
    pub fn total_listeners(&self) -> usize {
        self.read().values().map(Vec::len).sum()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Vec<(ListenerId, BusListener)>>> {
        match self.listeners.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Bus listener lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Vec<(ListenerId, BusListener)>>> {
        match self.listeners.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Bus listener lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl PublishBus for MemoryBus {
    fn on(&self, topic: &str, listener: BusListener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.write()
            .entry(topic.to_string())
            .or_default()
            .push((id, listener));

        tracing::debug!(topic = %topic, listener = %id, "Bus listener added");
        id
    }

    fn remove_listener(&self, topic: &str, id: ListenerId) -> bool {
        let mut listeners = self.write();
        let Some(entries) = listeners.get_mut(topic) else {
            return false;
        };

        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        let removed = entries.len() != before;

        if entries.is_empty() {
            listeners.remove(topic);
        }

        if removed {
            tracing::debug!(topic = %topic, listener = %id, "Bus listener removed");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn collector() -> (BusListener, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let listener: BusListener = Arc::new(move |packet: Packet, ack: Ack| {
            sink.lock().unwrap().push(packet.topic.clone());
            ack.ack();
        });
        (listener, seen)
    }

    #[tokio::test]
    async fn test_exact_and_wildcard_delivery() {
        let bus = MemoryBus::new();
        let (exact, exact_seen) = collector();
        let (wild, wild_seen) = collector();

        bus.on("a/b", exact);
        bus.on("a/#", wild);

        assert_eq!(bus.publish(Packet::new("a/b", "1")).await, 2);
        assert_eq!(bus.publish(Packet::new("a/c", "2")).await, 1);
        assert_eq!(bus.publish(Packet::new("z", "3")).await, 0);

        assert_eq!(*exact_seen.lock().unwrap(), vec!["a/b"]);
        assert_eq!(*wild_seen.lock().unwrap(), vec!["a/b", "a/c"]);
    }

    #[tokio::test]
    async fn test_remove_listener() {
        let bus = MemoryBus::new();
        let (listener, seen) = collector();

        let id = bus.on("t", listener);
        assert_eq!(bus.listener_count("t"), 1);

        assert!(bus.remove_listener("t", id));
        assert!(!bus.remove_listener("t", id));
        assert_eq!(bus.listener_count("t"), 0);
        assert_eq!(bus.total_listeners(), 0);

        bus.publish(Packet::new("t", "x")).await;
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_dropped_ack_does_not_hang() {
        let bus = MemoryBus::new();
        bus.on("t", Arc::new(|_packet: Packet, _ack: Ack| {}));

        assert_eq!(bus.publish(Packet::new("t", "x")).await, 1);
    }
}
