//! RequestUnit trait and its reqwest-backed implementation

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Url};
use tracing::debug;

use super::{HttpResponse, RequestError};

/// A self-sending unit of work the queue schedules
///
/// The queue never looks inside a unit: it only decides when `send` may
/// run. `send` is called exactly once per push and must turn every outcome,
/// transport failures included, into an `HttpResponse`.
#[async_trait]
pub trait RequestUnit: Send + Sync {
    /// Fully composed target URL, query string included
    fn url(&self) -> &str;

    /// Perform the request and wait for the server's response
    async fn send(&self) -> HttpResponse;
}

/// An HTTP request sent through reqwest
#[derive(Debug, Clone)]
pub struct HttpRequest {
    client: Client,
    method: Method,
    url: Url,
    body: Option<String>,
    headers: HeaderMap,
    timeout: Option<Duration>,
}

impl HttpRequest {
    /// Create a request with its own HTTP client
    pub fn new(url: &str, method: &str) -> Result<Self, RequestError> {
        let client = Client::builder().build()?;
        Self::with_client(client, url, method)
    }

    /// Create a request that shares an existing HTTP client
    pub fn with_client(client: Client, url: &str, method: &str) -> Result<Self, RequestError> {
        debug!(%url, %method, "HttpRequest::with_client: called");
        let method = Method::from_bytes(method.to_uppercase().as_bytes())
            .map_err(|_| RequestError::InvalidMethod(method.to_string()))?;
        let url = Url::parse(url).map_err(|e| RequestError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            client,
            method,
            url,
            body: None,
            headers: HeaderMap::new(),
            timeout: None,
        })
    }

    /// Append query parameters to the URL
    pub fn with_query<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: ToString,
    {
        let pairs: Vec<_> = pairs.into_iter().map(|(k, v)| (k.as_ref().to_string(), v.to_string())).collect();
        if !pairs.is_empty() {
            self.url.query_pairs_mut().extend_pairs(pairs);
        }
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Add a header, rejecting names or values that are not valid HTTP
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, RequestError> {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| RequestError::InvalidHeader {
            name: name.to_string(),
            message: e.to_string(),
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| RequestError::InvalidHeader {
            name: name.to_string(),
            message: e.to_string(),
        })?;
        self.headers.append(header_name, header_value);
        Ok(self)
    }

    /// Give up on the request after this long, reported as a connection failure
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

#[async_trait]
impl RequestUnit for HttpRequest {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn send(&self) -> HttpResponse {
        debug!(method = %self.method, url = %self.url, "HttpRequest::send: called");
        let mut builder = self
            .client
            .request(self.method.clone(), self.url.clone())
            .headers(self.headers.clone());
        if let Some(body) = &self.body {
            builder = builder.body(body.clone());
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let response = match builder.send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "HttpRequest::send: connection failed");
                return HttpResponse::connection_failed(e.to_string());
            }
        };

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                debug!(error = %e, "HttpRequest::send: failed reading body");
                return HttpResponse::connection_failed(e.to_string());
            }
        };

        debug!(status = status.as_u16(), "HttpRequest::send: response received");
        HttpResponse {
            connection_successful: true,
            request_successful: status.is_success(),
            status_code: status.as_u16(),
            status_message: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on a local port and return its base URL
    async fn serve_once(raw_response: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let _ = socket.read(&mut buf).await;
            socket.write_all(raw_response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });
        format!("http://{}", addr)
    }

    fn local_client() -> Client {
        Client::builder().no_proxy().build().unwrap()
    }

    #[test]
    fn test_query_is_appended_to_url() {
        let request = HttpRequest::new("https://example.org/search", "get")
            .unwrap()
            .with_query([("isCool", "true"), ("from", "roblox")]);

        assert_eq!(request.url(), "https://example.org/search?isCool=true&from=roblox");
        assert_eq!(request.method(), &Method::GET);
    }

    #[test]
    fn test_empty_query_leaves_url_untouched() {
        let request = HttpRequest::new("https://example.org/", "GET")
            .unwrap()
            .with_query(Vec::<(&str, &str)>::new());
        assert_eq!(request.url(), "https://example.org/");
    }

    #[test]
    fn test_invalid_url_rejected() {
        let err = HttpRequest::new("not a url", "GET").unwrap_err();
        assert!(matches!(err, RequestError::InvalidUrl { .. }));
    }

    #[test]
    fn test_invalid_method_rejected() {
        let err = HttpRequest::new("https://example.org", "GE T").unwrap_err();
        assert!(matches!(err, RequestError::InvalidMethod(_)));
    }

    #[test]
    fn test_invalid_header_rejected() {
        let err = HttpRequest::new("https://example.org", "POST")
            .unwrap()
            .with_header("bad header", "x")
            .unwrap_err();
        assert!(matches!(err, RequestError::InvalidHeader { .. }));
    }

    #[test]
    fn test_body_and_headers_kept() {
        let request = HttpRequest::new("https://example.org", "POST")
            .unwrap()
            .with_body("{\"a\":1}")
            .with_header("Content-Type", "application/json")
            .unwrap();
        assert_eq!(request.body(), Some("{\"a\":1}"));
        assert_eq!(request.headers().get("content-type").unwrap(), "application/json");
    }

    #[tokio::test]
    async fn test_send_maps_server_response() {
        let base = serve_once(
            "HTTP/1.1 429 Too Many Requests\r\nRetry-After: 2\r\nContent-Length: 4\r\nConnection: close\r\n\r\nslow",
        )
        .await;

        let response = HttpRequest::with_client(local_client(), &base, "GET").unwrap().send().await;

        assert!(response.connection_successful);
        assert!(!response.request_successful);
        assert_eq!(response.status_code, 429);
        assert_eq!(response.status_message, "Too Many Requests");
        assert_eq!(response.header("retry-after"), Some("2"));
        assert_eq!(response.body, "slow");
    }

    #[tokio::test]
    async fn test_send_reports_connection_failure() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let response = HttpRequest::with_client(local_client(), &format!("http://{}", addr), "GET")
            .unwrap()
            .send()
            .await;

        assert!(!response.connection_successful);
        assert!(!response.request_successful);
    }
}
