//! Integration tests for HttpQueue
//!
//! These tests drive the public queue API end to end, with scripted request
//! units and with real HTTP requests against a local server.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use httpqueue::{HttpQueue, HttpRequest, HttpResponse, Priority, QueueConfig, RequestUnit, RetryAfter};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::Instant;

// =============================================================================
// Scripted request units
// =============================================================================

#[derive(Default)]
struct Timeline {
    starts: Mutex<Vec<(String, Instant)>>,
    ends: Mutex<Vec<(String, Instant)>>,
    running: AtomicUsize,
    samples: Mutex<Vec<usize>>,
}

impl Timeline {
    fn started(&self, name: &str) -> Instant {
        self.find(&self.starts, name)
    }

    fn ended(&self, name: &str) -> Instant {
        self.find(&self.ends, name)
    }

    fn order(&self) -> Vec<String> {
        self.starts.lock().unwrap().iter().map(|(n, _)| n.clone()).collect()
    }

    fn find(&self, list: &Mutex<Vec<(String, Instant)>>, name: &str) -> Instant {
        list.lock()
            .unwrap()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| *t)
            .expect("request was never sent")
    }
}

struct Scripted {
    name: String,
    url: String,
    status: u16,
    latency: Duration,
    timeline: Arc<Timeline>,
}

impl Scripted {
    fn new(name: &str, status: u16, latency: Duration, timeline: &Arc<Timeline>) -> Self {
        Self {
            name: name.to_string(),
            url: format!("https://api.example.com/{}", name),
            status,
            latency,
            timeline: Arc::clone(timeline),
        }
    }
}

#[async_trait]
impl RequestUnit for Scripted {
    fn url(&self) -> &str {
        &self.url
    }

    async fn send(&self) -> HttpResponse {
        let running = self.timeline.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.timeline.samples.lock().unwrap().push(running);
        self.timeline.starts.lock().unwrap().push((self.name.clone(), Instant::now()));

        tokio::time::sleep(self.latency).await;

        self.timeline.ends.lock().unwrap().push((self.name.clone(), Instant::now()));
        self.timeline.running.fetch_sub(1, Ordering::SeqCst);
        HttpResponse::new(self.status, if self.status == 429 { "Too Many Requests" } else { "OK" })
            .with_body(self.name.clone())
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_cooldown_scenario_with_single_slot() {
    let timeline = Arc::new(Timeline::default());
    let queue = HttpQueue::new(
        QueueConfig::new(RetryAfter::cooldown_secs(5.0).unwrap()).with_max_simultaneous_send_operations(1),
    )
    .expect("valid config");

    let r1 = queue.push(Scripted::new("r1", 429, Duration::from_millis(200), &timeline), Priority::Normal);
    let r2 = queue.push(Scripted::new("r2", 200, Duration::from_millis(200), &timeline), Priority::Normal);
    let r3 = queue.push(Scripted::new("r3", 200, Duration::from_millis(200), &timeline), Priority::Normal);
    assert_eq!(queue.queue_size(), 3);

    let first = r1.await;
    assert_eq!(first.status_code, 429);
    assert_eq!(first.body, "r1");

    let rest = join_all([r2, r3]).await;
    assert_eq!(rest[0].body, "r2");
    assert_eq!(rest[1].body, "r3");

    assert_eq!(timeline.order(), vec!["r1", "r2", "r3"]);
    assert!(timeline.started("r2") - timeline.ended("r1") >= Duration::from_secs(5));
    assert!(timeline.started("r3") >= timeline.ended("r2"));
}

#[tokio::test(start_paused = true)]
async fn test_first_overtakes_normal() {
    let timeline = Arc::new(Timeline::default());
    let queue = HttpQueue::new(QueueConfig::default().with_max_simultaneous_send_operations(1)).unwrap();

    let r1 = queue.push(Scripted::new("r1", 200, Duration::from_millis(10), &timeline), Priority::Normal);
    let r2 = queue.push(Scripted::new("r2", 200, Duration::from_millis(10), &timeline), Priority::First);
    join_all([r1, r2]).await;

    assert_eq!(timeline.order(), vec!["r2", "r1"]);
}

#[tokio::test(start_paused = true)]
async fn test_two_slots_stay_full_until_queue_runs_low() {
    let timeline = Arc::new(Timeline::default());
    let queue = HttpQueue::new(QueueConfig::default().with_max_simultaneous_send_operations(2)).unwrap();

    let pending: Vec<_> = (1..=5)
        .map(|i| {
            queue.push(
                Scripted::new(&format!("r{}", i), 200, Duration::from_secs(1), &timeline),
                Priority::Normal,
            )
        })
        .collect();

    for expected_queued in [3, 1] {
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(queue.in_flight(), 2);
        assert_eq!(queue.queue_size(), expected_queued);
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(queue.in_flight(), 1);
    assert_eq!(queue.queue_size(), 0);

    join_all(pending).await;
    assert_eq!(timeline.samples.lock().unwrap().iter().max(), Some(&2));
    assert_eq!(timeline.order(), vec!["r1", "r2", "r3", "r4", "r5"]);
}

#[tokio::test(start_paused = true)]
async fn test_burst_never_exceeds_cap() {
    let timeline = Arc::new(Timeline::default());
    let queue = HttpQueue::new(QueueConfig::default().with_max_simultaneous_send_operations(3)).unwrap();

    let pending: Vec<_> = (0..40)
        .map(|i| {
            let latency = Duration::from_millis(10 + (i * 37 % 90) as u64);
            let priority = match i % 3 {
                0 => Priority::Normal,
                1 => Priority::Prioritary,
                _ => Priority::First,
            };
            queue.push(Scripted::new(&format!("r{}", i), 200, latency, &timeline), priority)
        })
        .collect();

    let responses = join_all(pending).await;
    assert_eq!(responses.len(), 40);
    assert!(responses.iter().all(|r| r.request_successful));
    assert!(timeline.samples.lock().unwrap().iter().all(|n| *n <= 3));
    assert_eq!(queue.stats().total_completed, 40);
}

#[tokio::test(start_paused = true)]
async fn test_same_priority_admission_is_fifo() {
    let timeline = Arc::new(Timeline::default());
    let queue = HttpQueue::new(QueueConfig::default().with_max_simultaneous_send_operations(2)).unwrap();

    // Varying latencies finish out of order, admission stays in push order
    let names: Vec<String> = (0..8).map(|i| format!("p{}", i)).collect();
    let pending: Vec<_> = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let latency = Duration::from_millis(if i % 2 == 0 { 300 } else { 50 });
            queue.push(Scripted::new(name, 200, latency, &timeline), Priority::Prioritary)
        })
        .collect();
    join_all(pending).await;

    assert_eq!(timeline.order(), names);
}

// =============================================================================
// Real HTTP against a local server
// =============================================================================

/// Serve canned responses: the first `limited` connections get a 429
async fn rate_limited_server(limited: usize, retry_after: &'static str) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let n = counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let _ = socket.read(&mut buf).await;
                let reply = if n < limited {
                    format!(
                        "HTTP/1.1 429 Too Many Requests\r\nRetry-After: {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                        retry_after
                    )
                } else {
                    "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok".to_string()
                };
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (format!("http://{}/", addr), hits)
}

#[tokio::test]
async fn test_http_requests_honour_retry_after_header() {
    let (base, hits) = rate_limited_server(1, "0.3").await;
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let config = QueueConfig::new(RetryAfter::header("Retry-After")).with_max_simultaneous_send_operations(1);
    let queue = HttpQueue::new(config).unwrap();

    let request = HttpRequest::with_client(client, &base, "GET").unwrap().with_query([("page", "1")]);
    assert!(request.url().ends_with("/?page=1"));

    let started = Instant::now();
    let first = queue.push(request.clone(), Priority::Normal);
    let second = queue.push(request, Priority::Normal);

    let first = first.await;
    assert_eq!(first.status_code, 429);
    assert_eq!(first.status_message, "Too Many Requests");
    assert!(queue.is_rate_limited());

    let second = second.await;
    assert!(second.request_successful);
    assert_eq!(second.body, "ok");
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert_eq!(queue.stats().total_rate_limited, 1);
}

#[tokio::test]
async fn test_unreachable_server_does_not_stall_queue() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let queue = HttpQueue::new(QueueConfig::new(RetryAfter::cooldown_secs(60.0).unwrap())).unwrap();
    let request = HttpRequest::with_client(client, &format!("http://{}/", addr), "GET").unwrap();

    let response = tokio::time::timeout(Duration::from_secs(10), queue.await_push(request, Priority::Normal))
        .await
        .expect("queue should resolve the request");

    assert!(!response.connection_successful);
    assert!(!queue.is_rate_limited());
}
