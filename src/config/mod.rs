//! Fault-injection configuration
//!
//! The configuration is a JSON array of per-topic records:
//!
//! ```json
//! [
//!   {
//!     "topic": "sensors/temp",
//!     "startAfter": 10,
//!     "stopAfter": 20,
//!     "operators": [
//!       { "type": "randomDelay", "min": 50, "max": 500 },
//!       { "type": "randomDrop", "chance": 0.25 }
//!     ]
//!   }
//! ]
//! ```
//!
//! Parsing only checks that the document is well formed. Operator entries are
//! kept as raw JSON and validated when a topic's pipeline is built, so a bad
//! operator is skipped with a diagnostic instead of failing startup.

pub mod error;
pub mod operator;
pub mod topic;

pub use error::{ConfigError, OperatorError};
pub use operator::{Operator, OperatorSpec};
pub use topic::{ChaosConfig, TopicConfig};
