//! Scheduling loop admitting queued requests

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::config::QueueConfig;
use super::lanes::{PriorityQueue, QueueEntry};
use super::rate_limit::RateLimitState;
use super::stats::QueueStats;
use crate::http::HttpResponse;

/// State guarded by the queue mutex
#[derive(Debug)]
pub(super) struct Inner {
    pub(super) lanes: PriorityQueue,
    pub(super) rate_limit: RateLimitState,
    pub(super) in_flight: usize,
    pub(super) stats: QueueStats,
}

/// State shared by the queue handle, the dispatcher and in-flight sends
#[derive(Debug)]
pub(super) struct Shared {
    inner: Mutex<Inner>,
    /// One permit per send slot
    slots: Arc<Semaphore>,
    /// Wakes the dispatcher when work is pushed or the queue closes
    wake: Notify,
    closed: AtomicBool,
    pub(super) config: QueueConfig,
}

impl Shared {
    pub(super) fn new(config: QueueConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                lanes: PriorityQueue::new(),
                rate_limit: RateLimitState::new(config.retry_after.clone()),
                in_flight: 0,
                stats: QueueStats::default(),
            }),
            slots: Arc::new(Semaphore::new(config.max_simultaneous_send_operations)),
            wake: Notify::new(),
            closed: AtomicBool::new(false),
            config,
        }
    }

    /// Lock the queue state, recovering it if a holder panicked
    pub(super) fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tell the dispatcher there may be work
    pub(super) fn wake(&self) {
        self.wake.notify_one();
    }

    /// Stop waiting for new work once the lanes drain
    pub(super) fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    /// Account for a finished send and start a cooldown if it was rate limited
    fn complete(&self, seq: u64, response: &HttpResponse) {
        let mut inner = self.lock();
        inner.in_flight = inner.in_flight.saturating_sub(1);
        inner.stats.total_completed += 1;

        if !response.connection_successful {
            debug!(%seq, message = %response.status_message, "Shared::complete: connection failed");
            inner.stats.total_connection_failures += 1;
            return;
        }

        if self.config.is_rate_limit_status(response.status_code) {
            inner.stats.total_rate_limited += 1;
            let now = Instant::now();
            let cooldown = inner.rate_limit.record_limit_signal(response, now);
            let remaining = inner.rate_limit.remaining(now);
            warn!(%seq, status = response.status_code, ?cooldown, ?remaining, "Rate limited by remote service");
        } else {
            debug!(%seq, status = response.status_code, "Shared::complete: done");
        }
    }
}

/// What the dispatcher is waiting on when it cannot admit
enum Wait {
    Work,
    Cooldown(Instant),
}

/// Drives admission for one queue
///
/// Holds a send slot, waits out any cooldown, takes the next entry and
/// spawns its send. Runs until the owning queue is dropped and every
/// remaining entry has been admitted.
pub(super) struct Dispatcher {
    shared: Arc<Shared>,
}

impl Dispatcher {
    pub(super) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub(super) async fn run(self) {
        debug!("Dispatcher::run: started");
        loop {
            let permit = match Arc::clone(&self.shared.slots).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    debug!("Dispatcher::run: slots closed");
                    break;
                }
            };

            let Some(entry) = self.next_admissible().await else {
                break;
            };
            self.launch(entry, permit);
        }
        debug!("Dispatcher::run: queue closed and drained, exiting");
    }

    /// Wait until an entry may be sent now, or the queue is closed and empty
    async fn next_admissible(&self) -> Option<QueueEntry> {
        loop {
            let wait = {
                let mut inner = self.shared.lock();
                let now = Instant::now();
                if inner.lanes.is_empty() {
                    if self.shared.closed.load(Ordering::Acquire) {
                        return None;
                    }
                    Wait::Work
                } else if let Some(until) = inner.rate_limit.blocked_until(now) {
                    Wait::Cooldown(until)
                } else if let Some(entry) = inner.lanes.dequeue() {
                    return Some(entry);
                } else {
                    Wait::Work
                }
            };

            match wait {
                Wait::Work => {
                    debug!("Dispatcher::next_admissible: lanes empty, waiting for work");
                    self.shared.wake.notified().await;
                }
                Wait::Cooldown(until) => {
                    let remaining = until.saturating_duration_since(Instant::now());
                    info!(?remaining, "Holding new sends until cooldown ends");
                    tokio::time::sleep_until(until).await;
                    debug!("Dispatcher::next_admissible: cooldown elapsed, rechecking");
                }
            }
        }
    }

    /// Spawn the send for an admitted entry; the permit is held until it completes
    fn launch(&self, entry: QueueEntry, permit: OwnedSemaphorePermit) {
        let QueueEntry {
            unit,
            priority,
            seq,
            sink,
        } = entry;

        {
            let mut inner = self.shared.lock();
            inner.in_flight += 1;
            inner.stats.total_sent += 1;
            inner.stats.peak_in_flight = inner.stats.peak_in_flight.max(inner.in_flight);
        }

        debug!(%seq, ?priority, url = unit.url(), "Dispatcher::launch: sending");
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let response = AssertUnwindSafe(unit.send()).catch_unwind().await.unwrap_or_else(|_| {
                warn!(%seq, url = unit.url(), "Request unit panicked while sending");
                HttpResponse::connection_failed("request unit panicked while sending")
            });

            // Record any cooldown before the slot frees, so the next admission sees it
            shared.complete(seq, &response);
            drop(permit);

            if sink.send(response).is_err() {
                debug!(%seq, "Dispatcher::launch: caller dropped the response future");
            }
        });
    }
}
