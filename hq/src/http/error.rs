//! Request construction errors

use thiserror::Error;

/// Errors raised while building an `HttpRequest`
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    #[error("Invalid HTTP method '{0}'")]
    InvalidMethod(String),

    #[error("Invalid header '{name}': {message}")]
    InvalidHeader { name: String, message: String },

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}
