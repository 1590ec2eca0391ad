//! Operator stages
//!
//! Each stage is a spawned task reading one stream and writing another. A
//! stage ends when its input closes; work it already scheduled (delayed
//! messages, a partially filled buffer) still comes out afterwards.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::Rng;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::packet::{Emission, Packet};
use super::transform::Transform;
use super::Stream;

/// Apply `transform` to every message (each element of a batch)
pub(crate) fn map(mut input: Stream, transform: Transform) -> Stream {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Some(item) = input.recv().await {
            let item = match item {
                Emission::Message(packet) => Emission::Message(transform(packet)),
                Emission::Batch(batch) => {
                    Emission::Batch(batch.into_iter().map(|p| transform(p)).collect())
                }
            };
            if tx.send(item).is_err() {
                break;
            }
        }
    });

    rx
}

/// Re-emit each item after its own random delay
///
/// Delays are drawn independently, so a later item can overtake an earlier
/// one. Nothing waits on a pending delay.
pub(crate) fn random_delay(mut input: Stream, min_ms: u64, max_ms: u64, mut rng: StdRng) -> Stream {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Some(item) = input.recv().await {
            let delay = Duration::from_millis(rng.gen_range(min_ms..=max_ms));

            if delay.is_zero() {
                if tx.send(item).is_err() {
                    break;
                }
                continue;
            }

            let tx = tx.clone();
            tokio::spawn(async move {
                time::sleep(delay).await;
                let _ = tx.send(item);
            });
        }
    });

    rx
}

/// Drop each item with probability `chance`
pub(crate) fn random_drop(mut input: Stream, chance: f64, mut rng: StdRng) -> Stream {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Some(item) = input.recv().await {
            if rng.gen_bool(chance) {
                continue;
            }
            if tx.send(item).is_err() {
                break;
            }
        }
    });

    rx
}

/// Group messages into ordered batches
///
/// - `max_size` only: a batch every `max_size` messages
/// - `window` only: a batch every `window`, possibly empty
/// - both: whichever comes first; a size flush restarts the window
///
/// Incoming batches are flattened into the accumulator.
pub(crate) fn buffer(input: Stream, window: Option<Duration>, max_size: Option<usize>) -> Stream {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        match window {
            Some(window) => run_windowed(input, tx, window, max_size).await,
            None => run_counted(input, tx, max_size.unwrap_or(1).max(1)).await,
        }
    });

    rx
}

async fn run_counted(mut input: Stream, tx: mpsc::UnboundedSender<Emission>, max_size: usize) {
    let mut pending: Vec<Packet> = Vec::with_capacity(max_size);

    while let Some(item) = input.recv().await {
        pending.extend(item.into_packets());
        if !drain_full(&mut pending, max_size, &tx) {
            return;
        }
    }

    flush_remaining(pending, &tx);
}

async fn run_windowed(
    mut input: Stream,
    tx: mpsc::UnboundedSender<Emission>,
    window: Duration,
    max_size: Option<usize>,
) {
    let mut pending: Vec<Packet> = Vec::new();
    let mut ticker = time::interval_at(Instant::now() + window, window);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            item = input.recv() => {
                let Some(item) = item else { break };
                pending.extend(item.into_packets());

                if let Some(max_size) = max_size {
                    if pending.len() >= max_size {
                        if !drain_full(&mut pending, max_size, &tx) {
                            return;
                        }
                        ticker.reset();
                    }
                }
            }
            _ = ticker.tick() => {
                let batch = std::mem::take(&mut pending);
                if tx.send(Emission::Batch(batch)).is_err() {
                    return;
                }
            }
        }
    }

    flush_remaining(pending, &tx);
}

/// Emit every complete `max_size` chunk; false once the output is gone
fn drain_full(
    pending: &mut Vec<Packet>,
    max_size: usize,
    tx: &mpsc::UnboundedSender<Emission>,
) -> bool {
    while pending.len() >= max_size {
        let rest = pending.split_off(max_size);
        let batch = std::mem::replace(pending, rest);
        if tx.send(Emission::Batch(batch)).is_err() {
            return false;
        }
    }
    true
}

fn flush_remaining(pending: Vec<Packet>, tx: &mpsc::UnboundedSender<Emission>) {
    if !pending.is_empty() {
        let _ = tx.send(Emission::Batch(pending));
    }
}
