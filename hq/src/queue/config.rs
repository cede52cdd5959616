//! Queue configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::error::ConfigError;
use crate::http::TOO_MANY_REQUESTS;

/// Longest cooldown a single rate-limit signal can impose
pub const MAX_COOLDOWN: Duration = Duration::from_secs(24 * 60 * 60);

/// Where the cooldown after a rate-limit signal comes from
///
/// Serialized as `{ header: <name> }` or `{ cooldown: <seconds> }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRetryAfter", into = "RawRetryAfter")]
pub enum RetryAfter {
    /// Read the cooldown, in seconds, from this response header
    Header(String),
    /// Apply the same cooldown on every rate-limit signal
    Cooldown(Duration),
}

impl RetryAfter {
    pub fn header(name: impl Into<String>) -> Self {
        Self::Header(name.into())
    }

    /// Fixed cooldown in seconds; fails on negative, non-finite or oversized values
    pub fn cooldown_secs(secs: f64) -> Result<Self, ConfigError> {
        let duration = Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::InvalidCooldown(secs))?;
        check_cooldown(duration)?;
        Ok(Self::Cooldown(duration))
    }
}

fn check_cooldown(duration: Duration) -> Result<(), ConfigError> {
    if duration > MAX_COOLDOWN {
        return Err(ConfigError::CooldownTooLong {
            got: duration,
            max: MAX_COOLDOWN,
        });
    }
    Ok(())
}

impl Default for RetryAfter {
    fn default() -> Self {
        Self::Header("Retry-After".to_string())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawRetryAfter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    header: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    cooldown: Option<f64>,
}

impl TryFrom<RawRetryAfter> for RetryAfter {
    type Error = ConfigError;

    fn try_from(raw: RawRetryAfter) -> Result<Self, Self::Error> {
        match (raw.header, raw.cooldown) {
            (Some(name), None) => Ok(Self::Header(name)),
            (None, Some(secs)) => Self::cooldown_secs(secs),
            (Some(_), Some(_)) => Err(ConfigError::AmbiguousRetryAfter),
            (None, None) => Err(ConfigError::MissingRetryAfter),
        }
    }
}

impl From<RetryAfter> for RawRetryAfter {
    fn from(retry_after: RetryAfter) -> Self {
        match retry_after {
            RetryAfter::Header(name) => Self {
                header: Some(name),
                cooldown: None,
            },
            RetryAfter::Cooldown(duration) => Self {
                header: None,
                cooldown: Some(duration.as_secs_f64()),
            },
        }
    }
}

/// Queue configuration, fixed once the queue is built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// How long to hold new sends after a rate-limit signal
    #[serde(rename = "retry-after", default)]
    pub retry_after: RetryAfter,

    /// Upper bound on sends in flight at once
    #[serde(
        rename = "max-simultaneous-send-operations",
        default = "default_max_simultaneous_send_operations"
    )]
    pub max_simultaneous_send_operations: usize,

    /// Status codes treated as a rate-limit signal
    #[serde(rename = "rate-limit-status-codes", default = "default_rate_limit_status_codes")]
    pub rate_limit_status_codes: Vec<u16>,
}

fn default_max_simultaneous_send_operations() -> usize {
    10
}

fn default_rate_limit_status_codes() -> Vec<u16> {
    vec![TOO_MANY_REQUESTS]
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::new(RetryAfter::default())
    }
}

impl QueueConfig {
    pub fn new(retry_after: RetryAfter) -> Self {
        Self {
            retry_after,
            max_simultaneous_send_operations: default_max_simultaneous_send_operations(),
            rate_limit_status_codes: default_rate_limit_status_codes(),
        }
    }

    pub fn with_max_simultaneous_send_operations(mut self, max: usize) -> Self {
        self.max_simultaneous_send_operations = max;
        self
    }

    pub fn with_rate_limit_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.rate_limit_status_codes = codes.into_iter().collect();
        self
    }

    /// Check the configuration before a queue is built from it
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_simultaneous_send_operations == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        match &self.retry_after {
            RetryAfter::Header(name) if name.trim().is_empty() => return Err(ConfigError::EmptyHeaderName),
            RetryAfter::Cooldown(duration) => check_cooldown(*duration)?,
            RetryAfter::Header(_) => {}
        }
        if self.rate_limit_status_codes.is_empty() {
            return Err(ConfigError::NoRateLimitStatus);
        }
        Ok(())
    }

    /// Whether a status code should start a cooldown
    pub fn is_rate_limit_status(&self, status_code: u16) -> bool {
        self.rate_limit_status_codes.contains(&status_code)
    }
}
