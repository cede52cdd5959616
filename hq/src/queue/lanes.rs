//! Priority lanes holding requests that wait for admission

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::debug;

use crate::domain::Priority;
use crate::http::{HttpResponse, RequestUnit};

/// A request waiting in the queue
pub struct QueueEntry {
    pub unit: Box<dyn RequestUnit>,
    pub priority: Priority,
    /// Enqueue order, unique per queue
    pub seq: u64,
    pub sink: oneshot::Sender<HttpResponse>,
}

impl std::fmt::Debug for QueueEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueEntry")
            .field("url", &self.unit.url())
            .field("priority", &self.priority)
            .field("seq", &self.seq)
            .finish()
    }
}

/// Resolves to the response of a pushed request
///
/// Every pushed request resolves exactly once. If the request is lost
/// before producing a response it resolves to a connection failure.
#[derive(Debug)]
#[must_use = "the response is only delivered through this future"]
pub struct ResponseFuture {
    rx: oneshot::Receiver<HttpResponse>,
}

impl Future for ResponseFuture {
    type Output = HttpResponse;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|result| {
            result.unwrap_or_else(|_| HttpResponse::connection_failed("request dropped before it was sent"))
        })
    }
}

/// Two-lane FIFO queue
///
/// Prioritary entries always leave before normal ones. `First` entries are
/// pushed to the front of the prioritary lane.
#[derive(Debug, Default)]
pub struct PriorityQueue {
    prioritary: VecDeque<QueueEntry>,
    normal: VecDeque<QueueEntry>,
    next_seq: u64,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a request and return the future its response is delivered to
    pub fn enqueue(&mut self, unit: Box<dyn RequestUnit>, priority: Priority) -> ResponseFuture {
        let seq = self.next_seq;
        self.next_seq += 1;
        debug!(%seq, ?priority, url = unit.url(), "PriorityQueue::enqueue: called");

        let (sink, rx) = oneshot::channel();
        let entry = QueueEntry {
            unit,
            priority,
            seq,
            sink,
        };

        match priority {
            Priority::First => self.prioritary.push_front(entry),
            Priority::Prioritary => self.prioritary.push_back(entry),
            Priority::Normal => self.normal.push_back(entry),
        }

        ResponseFuture { rx }
    }

    /// Take the next entry in admission order
    pub fn dequeue(&mut self) -> Option<QueueEntry> {
        let entry = self.prioritary.pop_front().or_else(|| self.normal.pop_front());
        if let Some(entry) = &entry {
            debug!(seq = entry.seq, priority = ?entry.priority, "PriorityQueue::dequeue: taking entry");
        }
        entry
    }

    /// Number of entries still waiting
    pub fn len(&self) -> usize {
        self.prioritary.len() + self.normal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prioritary.is_empty() && self.normal.is_empty()
    }
}
