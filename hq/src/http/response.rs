//! Response returned by a request unit

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// HTTP status code the remote service uses to signal a rate limit
pub const TOO_MANY_REQUESTS: u16 = 429;

/// The remote server's answer to a request
///
/// When `connection_successful` is false the request never reached the
/// server and the remaining fields carry no information from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpResponse {
    /// Whether the remote server could be reached at all
    pub connection_successful: bool,

    /// True iff the status code is in 200..=299
    pub request_successful: bool,

    pub status_code: u16,

    /// Human-readable form of the status code
    pub status_message: String,

    pub headers: HashMap<String, String>,

    pub body: String,
}

impl HttpResponse {
    /// Create a response for a request that reached the server
    pub fn new(status_code: u16, status_message: impl Into<String>) -> Self {
        Self {
            connection_successful: true,
            request_successful: (200..=299).contains(&status_code),
            status_code,
            status_message: status_message.into(),
            headers: HashMap::new(),
            body: String::new(),
        }
    }

    /// Create a response for a request that never reached the server
    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self {
            connection_successful: false,
            request_successful: false,
            status_code: 0,
            status_message: message.into(),
            headers: HashMap::new(),
            body: String::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Look up a header, ignoring ASCII case in the name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Whether the server answered with 429
    pub fn is_too_many_requests(&self) -> bool {
        self.connection_successful && self.status_code == TOO_MANY_REQUESTS
    }
}
