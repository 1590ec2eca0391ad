//! Fault-injection pipelines
//!
//! A pipeline is a chain of stage tasks connected by unbounded channels:
//!
//! ```text
//!  raw ──► [map] ──► [randomDelay] ──► [buffer] ──► [randomDrop] ──► broadcast
//! ```
//!
//! With a range gate the raw stream is first partitioned by message index;
//! only the in-range side runs through the operators before both sides are
//! merged into the broadcast.
//!
//! The broadcast end is a [`SharedStream`]. Every subscriber of a topic
//! attaches to the same one, so random draws, timers and buffers run once
//! per message rather than once per subscriber.

pub mod builder;
pub mod fan;
pub mod packet;
pub mod shared;
mod stage;
pub mod transform;

use tokio::sync::mpsc;

pub use builder::{PipelineBuilder, DEFAULT_BROADCAST_CAPACITY};
pub use packet::{Emission, Packet};
pub use shared::SharedStream;
pub use transform::{Transform, TransformRegistry};

/// Receiving end of one pipeline segment
pub type Stream = mpsc::UnboundedReceiver<Emission>;
