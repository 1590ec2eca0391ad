//! Stream partition and fan-in
//!
//! Range gating splits a topic's stream by message index, runs the operators
//! on one side only, then merges both sides back together.
//!
//! # Ordering
//!
//! The two sides progress independently. [`merge`] forwards items as soon as
//! either side yields them, so each side keeps its own relative order but
//! there is no ordering between sides: an in-range message held back by a
//! delay or buffer comes out after later out-of-range messages.

use tokio::sync::mpsc;

/// Split `input` in two by a predicate over `(item, index)`
///
/// `index` counts items from 0 in arrival order. Items for which the
/// predicate holds go to the first stream, the rest to the second. Both
/// outputs close when the input closes.
pub fn partition<T, F>(
    mut input: mpsc::UnboundedReceiver<T>,
    mut predicate: F,
) -> (mpsc::UnboundedReceiver<T>, mpsc::UnboundedReceiver<T>)
where
    T: Send + 'static,
    F: FnMut(&T, u64) -> bool + Send + 'static,
{
    let (matched_tx, matched_rx) = mpsc::unbounded_channel();
    let (rest_tx, rest_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut index: u64 = 0;
        while let Some(item) = input.recv().await {
            let target = if predicate(&item, index) {
                &matched_tx
            } else {
                &rest_tx
            };
            index += 1;

            // One side may have gone away; keep feeding the other
            let _ = target.send(item);
            if matched_tx.is_closed() && rest_tx.is_closed() {
                break;
            }
        }
    });

    (matched_rx, rest_rx)
}

/// Interleave two streams into one, in whatever order items arrive
///
/// The output closes once both inputs have closed.
pub fn merge<T>(
    mut left: mpsc::UnboundedReceiver<T>,
    mut right: mpsc::UnboundedReceiver<T>,
) -> mpsc::UnboundedReceiver<T>
where
    T: Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut left_open = true;
        let mut right_open = true;

        while left_open || right_open {
            let item = tokio::select! {
                item = left.recv(), if left_open => {
                    if item.is_none() {
                        left_open = false;
                    }
                    item
                }
                item = right.recv(), if right_open => {
                    if item.is_none() {
                        right_open = false;
                    }
                    item
                }
            };

            if let Some(item) = item {
                if tx.send(item).is_err() {
                    break;
                }
            }
        }
    });

    rx
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    async fn collect<T>(mut rx: mpsc::UnboundedReceiver<T>) -> Vec<T> {
        let mut out = Vec::new();
        while let Some(item) = rx.recv().await {
            out.push(item);
        }
        out
    }

    #[tokio::test]
    async fn test_partition_by_index() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (inside, outside) = partition(rx, |_item: &&str, index| (2..=4).contains(&index));

        for item in ["a", "b", "c", "d", "e", "f"] {
            tx.send(item).unwrap();
        }
        drop(tx);

        assert_eq!(collect(inside).await, vec!["c", "d", "e"]);
        assert_eq!(collect(outside).await, vec!["a", "b", "f"]);
    }

    #[tokio::test]
    async fn test_merge_keeps_per_side_order() {
        let (left_tx, left_rx) = mpsc::unbounded_channel();
        let (right_tx, right_rx) = mpsc::unbounded_channel();
        let merged = merge(left_rx, right_rx);

        for i in 0..5 {
            left_tx.send(("l", i)).unwrap();
            right_tx.send(("r", i)).unwrap();
        }
        drop(left_tx);
        drop(right_tx);

        let out = collect(merged).await;
        assert_eq!(out.len(), 10);

        let left: Vec<i32> = out.iter().filter(|(s, _)| *s == "l").map(|(_, i)| *i).collect();
        let right: Vec<i32> = out.iter().filter(|(s, _)| *s == "r").map(|(_, i)| *i).collect();
        assert_eq!(left, vec![0, 1, 2, 3, 4]);
        assert_eq!(right, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_merge_does_not_order_across_sides() {
        let (left_tx, left_rx) = mpsc::unbounded_channel();
        let (right_tx, right_rx) = mpsc::unbounded_channel();
        let mut merged = merge(left_rx, right_rx);

        // The left item was "first" upstream but is held back
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = left_tx.send(0);
        });
        right_tx.send(1).unwrap();

        assert_eq!(merged.recv().await, Some(1));
        assert_eq!(merged.recv().await, Some(0));
    }

    #[tokio::test]
    async fn test_merge_closes_after_both_inputs() {
        let (left_tx, left_rx) = mpsc::unbounded_channel::<u8>();
        let (right_tx, right_rx) = mpsc::unbounded_channel::<u8>();
        let mut merged = merge(left_rx, right_rx);

        drop(left_tx);
        right_tx.send(9).unwrap();
        assert_eq!(merged.recv().await, Some(9));

        drop(right_tx);
        assert_eq!(merged.recv().await, None);
    }
}
