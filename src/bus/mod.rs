//! Upstream publish/subscribe bus
//!
//! The bus is the broker's internal message router. The chaos engine only
//! needs two calls from it: [`PublishBus::on`] to start receiving every
//! message published on a topic, and [`PublishBus::remove_listener`] to stop.
//!
//! Listeners are handed an [`Ack`] with each message and must call
//! [`Ack::ack`] once they have taken ownership of it.

pub mod memory;
pub mod topic;

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::pipeline::Packet;

pub use memory::MemoryBus;

/// Identifies a registered listener so it can be removed later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Callback invoked for every message on a subscribed topic
pub type BusListener = Arc<dyn Fn(Packet, Ack) + Send + Sync>;

/// Acknowledgement handle passed to a [`BusListener`]
///
/// Dropping it without calling [`ack`](Ack::ack) is treated as an
/// acknowledgement by [`MemoryBus`], but is logged.
#[derive(Debug)]
pub struct Ack {
    tx: Option<oneshot::Sender<()>>,
}

impl Ack {
    /// Create an ack and the receiver that resolves when it fires
    pub fn channel() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// An ack nobody waits on
    pub fn noop() -> Self {
        Self { tx: None }
    }

    /// Signal that the message has been handed off
    pub fn ack(mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Host broker bus contract consumed by the registry
pub trait PublishBus: Send + Sync {
    /// Register `listener` for every message matching `topic`
    fn on(&self, topic: &str, listener: BusListener) -> ListenerId;

    /// Remove a listener; returns false if it was not registered
    fn remove_listener(&self, topic: &str, id: ListenerId) -> bool;
}
