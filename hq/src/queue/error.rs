//! Queue construction errors

use std::time::Duration;
use thiserror::Error;

/// Invalid queue configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("max-simultaneous-send-operations must be at least 1")]
    ZeroConcurrency,

    #[error("retry-after header name must not be empty")]
    EmptyHeaderName,

    #[error("retry-after cooldown must be a non-negative number of seconds, got {0}")]
    InvalidCooldown(f64),

    #[error("retry-after cooldown must not exceed {max:?}, got {got:?}")]
    CooldownTooLong { got: Duration, max: Duration },

    #[error("retry-after needs either 'header' or 'cooldown'")]
    MissingRetryAfter,

    #[error("retry-after takes 'header' or 'cooldown', not both")]
    AmbiguousRetryAfter,

    #[error("rate-limit-status-codes must name at least one status code")]
    NoRateLimitStatus,
}

/// Errors raised when creating an `HttpQueue`
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Invalid queue configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("HttpQueue must be created inside a Tokio runtime")]
    NoRuntime,
}
