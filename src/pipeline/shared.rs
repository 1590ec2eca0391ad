//! Broadcast output of a pipeline

use std::sync::Arc;

use tokio::sync::broadcast;

use super::packet::Emission;
use super::Stream;

/// The multicast end of a topic pipeline
///
/// A single forwarding task drains the pipeline into a broadcast channel, so
/// operators run once per upstream message however many receivers attach.
/// Clones share the same channel; use [`SharedStream::ptr_eq`] to compare
/// identity.
#[derive(Clone)]
pub struct SharedStream {
    tx: Arc<broadcast::Sender<Emission>>,
}

impl SharedStream {
    /// Start forwarding `input` into a new broadcast channel
    pub(crate) fn spawn(mut input: Stream, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        let tx = Arc::new(tx);
        let forward = tx.clone();

        tokio::spawn(async move {
            while let Some(item) = input.recv().await {
                // No receivers is fine: the item is simply not observed
                let _ = forward.send(item);
            }
        });

        Self { tx }
    }

    /// Attach a new receiver; it sees items emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<Emission> {
        self.tx.subscribe()
    }

    /// Number of attached receivers
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Whether both handles share the same broadcast channel
    pub fn ptr_eq(&self, other: &SharedStream) -> bool {
        Arc::ptr_eq(&self.tx, &other.tx)
    }
}

impl std::fmt::Debug for SharedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStream")
            .field("receivers", &self.receiver_count())
            .finish()
    }
}
