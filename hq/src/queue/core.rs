//! HttpQueue, the public face of the scheduler

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use super::config::QueueConfig;
use super::dispatcher::{Dispatcher, Shared};
use super::error::QueueError;
use super::lanes::ResponseFuture;
use super::stats::QueueStats;
use crate::domain::Priority;
use crate::http::{HttpResponse, RequestUnit};

/// A self-regulating queue for REST APIs that impose rate limits
///
/// Requests are sent in push order unless given a priority, at most
/// `max_simultaneous_send_operations` at a time. When the remote service
/// answers with a rate-limit status the queue stops admitting new sends
/// until the cooldown ends; sends already in flight are left alone.
///
/// Each queue owns its own dispatcher task and cooldown, so two queues
/// never throttle each other. Dropping the queue stops it from accepting
/// work, but requests already pushed are still sent and resolved.
#[derive(Debug)]
pub struct HttpQueue {
    shared: Arc<Shared>,
}

impl HttpQueue {
    /// Create an empty queue and start its dispatcher on the current Tokio runtime
    pub fn new(config: QueueConfig) -> Result<Self, QueueError> {
        debug!(?config, "HttpQueue::new: called");
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| QueueError::NoRuntime)?;

        info!(
            max_in_flight = config.max_simultaneous_send_operations,
            retry_after = ?config.retry_after,
            "HttpQueue started"
        );
        let shared = Arc::new(Shared::new(config));
        runtime.spawn(Dispatcher::new(Arc::clone(&shared)).run());
        Ok(Self { shared })
    }

    /// Queue a request to be sent whenever possible
    ///
    /// Never blocks and never fails; the outcome of the request is carried
    /// by the response the returned future resolves to.
    pub fn push<R>(&self, request: R, priority: Priority) -> ResponseFuture
    where
        R: RequestUnit + 'static,
    {
        self.push_boxed(Box::new(request), priority)
    }

    /// Queue an already boxed request
    pub fn push_boxed(&self, request: Box<dyn RequestUnit>, priority: Priority) -> ResponseFuture {
        let future = {
            let mut inner = self.shared.lock();
            let future = inner.lanes.enqueue(request, priority);
            inner.stats.total_pushed += 1;
            inner.stats.peak_queue_depth = inner.stats.peak_queue_depth.max(inner.lanes.len());
            future
        };
        self.shared.wake();
        future
    }

    /// Queue a request and wait for its response
    pub async fn await_push<R>(&self, request: R, priority: Priority) -> HttpResponse
    where
        R: RequestUnit + 'static,
    {
        self.push(request, priority).await
    }

    /// Queue a request and block the current thread until its response arrives
    ///
    /// For synchronous callers only. Calling this from inside an async task
    /// on a current-thread runtime stalls the dispatcher.
    pub fn push_blocking<R>(&self, request: R, priority: Priority) -> HttpResponse
    where
        R: RequestUnit + 'static,
    {
        futures::executor::block_on(self.push(request, priority))
    }

    /// Number of requests not yet sent; in-flight requests are not counted
    pub fn queue_size(&self) -> usize {
        self.shared.lock().lanes.len()
    }

    /// Number of requests currently being sent
    pub fn in_flight(&self) -> usize {
        self.shared.lock().in_flight
    }

    /// Whether new sends are currently held back by a cooldown
    pub fn is_rate_limited(&self) -> bool {
        self.shared.lock().rate_limit.is_blocked(Instant::now())
    }

    /// Time left before new sends are admitted again
    pub fn cooldown_remaining(&self) -> Option<Duration> {
        self.shared.lock().rate_limit.remaining(Instant::now())
    }

    pub fn stats(&self) -> QueueStats {
        self.shared.lock().stats.clone()
    }

    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }
}

impl Drop for HttpQueue {
    fn drop(&mut self) {
        debug!("HttpQueue::drop: closing");
        self.shared.close();
    }
}
