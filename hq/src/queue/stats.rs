//! Queue statistics

use serde::Serialize;

/// Counters for a queue since it was created
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub total_pushed: u64,
    /// Requests admitted and handed to their unit
    pub total_sent: u64,
    pub total_completed: u64,
    pub total_rate_limited: u64,
    pub total_connection_failures: u64,
    pub peak_queue_depth: usize,
    pub peak_in_flight: usize,
}
