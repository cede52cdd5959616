//! Cooldown tracking after rate-limit signals

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use super::config::{MAX_COOLDOWN, RetryAfter};
use crate::http::HttpResponse;

/// Whether new sends are held back, and until when
#[derive(Debug)]
pub struct RateLimitState {
    source: RetryAfter,
    cooldown_until: Option<Instant>,
}

impl RateLimitState {
    pub fn new(source: RetryAfter) -> Self {
        Self {
            source,
            cooldown_until: None,
        }
    }

    /// True while a cooldown is active at `now`
    pub fn is_blocked(&self, now: Instant) -> bool {
        self.blocked_until(now).is_some()
    }

    /// End of the active cooldown, if one is active at `now`
    pub fn blocked_until(&self, now: Instant) -> Option<Instant> {
        self.cooldown_until.filter(|until| now < *until)
    }

    /// Time left in the active cooldown
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.blocked_until(now).map(|until| until - now)
    }

    /// Start or extend the cooldown for a rate-limited response
    ///
    /// Never shortens a cooldown already in place. Returns the cooldown
    /// derived from this response, capped at `MAX_COOLDOWN`.
    pub fn record_limit_signal(&mut self, response: &HttpResponse, now: Instant) -> Duration {
        let mut duration = self.cooldown_for(response);
        if duration > MAX_COOLDOWN {
            warn!(?duration, max = ?MAX_COOLDOWN, "Rate limit cooldown too long, capping it");
            duration = MAX_COOLDOWN;
        }
        let Some(candidate) = now.checked_add(duration) else {
            warn!(?duration, "Rate limit cooldown does not fit the clock, applying no cooldown");
            return Duration::ZERO;
        };
        let until = match self.cooldown_until {
            Some(existing) if existing > candidate => {
                debug!(?duration, "RateLimitState::record_limit_signal: existing cooldown is longer, keeping it");
                existing
            }
            _ => candidate,
        };
        self.cooldown_until = Some(until);
        duration
    }

    fn cooldown_for(&self, response: &HttpResponse) -> Duration {
        match &self.source {
            RetryAfter::Cooldown(duration) => *duration,
            RetryAfter::Header(name) => match response.header(name) {
                Some(value) => parse_seconds(value).unwrap_or_else(|| {
                    warn!(header = %name, %value, "Rate limit header is not a number of seconds, applying no cooldown");
                    Duration::ZERO
                }),
                None => {
                    warn!(header = %name, "Rate limit header missing from response, applying no cooldown");
                    Duration::ZERO
                }
            },
        }
    }
}

/// Parse a header value holding seconds, integer or decimal
///
/// Values too large for a `Duration` saturate.
fn parse_seconds(value: &str) -> Option<Duration> {
    let secs = value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)?;
    Some(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
}
