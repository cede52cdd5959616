//! Rate-limit aware request queue
//!
//! Requests wait in two priority lanes. A single dispatcher task per queue
//! admits them into a bounded number of send slots and pauses admission
//! while the remote service's cooldown is active.

mod config;
mod core;
mod dispatcher;
mod error;
mod lanes;
mod rate_limit;
mod stats;

pub use config::{MAX_COOLDOWN, QueueConfig, RetryAfter};
pub use self::core::HttpQueue;
pub use error::{ConfigError, QueueError};
pub use lanes::{PriorityQueue, QueueEntry, ResponseFuture};
pub use rate_limit::RateLimitState;
pub use stats::QueueStats;
