//! HttpQueue - self-regulating request queue for rate-limited REST APIs
//!
//! Callers push requests, optionally with a priority, and get back a future
//! of the server's response. The queue sends a bounded number of requests at
//! once and, when the remote service answers with a rate-limit status, holds
//! new sends back until the advertised cooldown has passed.
//!
//! # Modules
//!
//! - [`queue`] - Priority lanes, cooldown tracking and the dispatcher
//! - [`http`] - The `RequestUnit` trait, responses and a reqwest-backed request
//! - [`domain`] - Request priorities
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface for the `hq` binary

pub mod cli;
pub mod config;
pub mod domain;
pub mod http;
pub mod queue;

// Re-export commonly used types
pub use config::Config;
pub use domain::Priority;
pub use http::{HttpRequest, HttpResponse, RequestError, RequestUnit};
pub use queue::{ConfigError, HttpQueue, MAX_COOLDOWN, QueueConfig, QueueError, QueueStats, ResponseFuture, RetryAfter};
