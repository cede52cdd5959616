//! Request units and the responses they produce
//!
//! The queue only needs the `RequestUnit` trait and `HttpResponse`;
//! `HttpRequest` is a ready-made unit backed by reqwest.

mod error;
mod request;
mod response;

pub use error::RequestError;
#[cfg(test)]
pub use request::mock;
pub use request::{HttpRequest, RequestUnit};
pub use response::{HttpResponse, TOO_MANY_REQUESTS};
