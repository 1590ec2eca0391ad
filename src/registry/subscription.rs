//! Subscriber handles and their delivery tasks

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::pipeline::{Emission, Packet, SharedStream};

/// Identity of a subscriber's handler, used for reference counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(pub u64);

impl std::fmt::Display for HandlerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "handler-{}", self.0)
    }
}

impl From<u64> for HandlerId {
    fn from(id: u64) -> Self {
        HandlerId(id)
    }
}

/// Delivery callback for one subscriber
pub type Handler = Arc<dyn Fn(Packet) + Send + Sync>;

/// Live attachment of a handler to a topic's shared stream
///
/// Cancelling (or dropping) it stops delivery at the next message boundary.
/// A handler call already past the cancellation check may still complete.
pub struct Subscription {
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Attach `handler` to `stream`
    ///
    /// Batches are unpacked and delivered one message at a time, in order.
    /// Empty batches are skipped.
    pub(crate) fn attach(topic: &str, stream: &SharedStream, handler: Handler) -> Self {
        let mut rx = stream.subscribe();
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let topic = topic.to_string();

        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(Emission::Message(packet)) => {
                        if flag.load(Ordering::Acquire) {
                            return;
                        }
                        handler(packet);
                    }
                    Ok(Emission::Batch(batch)) => {
                        for packet in batch {
                            if flag.load(Ordering::Acquire) {
                                return;
                            }
                            handler(packet);
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            topic = %topic,
                            skipped = skipped,
                            "Subscriber lagging, emissions skipped"
                        );
                    }
                    Err(RecvError::Closed) => return,
                }
            }
        });

        Self { cancelled, task }
    }

    /// Stop delivery
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.task.abort();
    }

    /// Whether [`cancel`](Subscription::cancel) has been called
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
