//! Transport boundary for the GitLab REST calls.
//!
//! Every network read the reader performs goes through [`HttpTransport`], so
//! the resolution and archive logic can be exercised without sockets. The
//! reader only ever issues `GET` requests.

use async_trait::async_trait;
use thiserror::Error;

/// HTTP headers represented as key/value pairs.
///
/// Header names are treated case-insensitively by helper functions.
pub type HttpHeaders = Vec<(String, String)>;

/// A `GET` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: HttpHeaders,
}

impl HttpRequest {
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        header_get(&self.headers, name)
    }
}

/// A fully buffered response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        header_get(&self.headers, name)
    }

    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as lossy UTF-8, for error reporting.
    #[must_use]
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("http transport error: {0}")]
    Transport(String),

    /// Raised by test transports for URLs nobody registered.
    #[error("no response registered for GET {url}")]
    NoMockResponse { url: String },
}

/// Transport boundary for all HTTP I/O.
///
/// Implementations return every status as a response; only failures to
/// obtain a response at all are errors.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// Get the first header value matching `name` (case-insensitive).
#[must_use]
pub fn header_get<'a>(headers: &'a HttpHeaders, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[cfg(feature = "reqwest")]
pub mod reqwest_transport {
    use std::time::Duration;

    use super::{HttpError, HttpHeaders, HttpRequest, HttpResponse, HttpTransport, async_trait};

    const USER_AGENT: &str = concat!("glean/", env!("CARGO_PKG_VERSION"));

    fn transport_error(err: reqwest::Error) -> HttpError {
        HttpError::Transport(err.to_string())
    }

    /// The default transport, backed by a shared `reqwest::Client`.
    #[derive(Clone)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        /// Wrap a preconfigured client.
        pub fn new(client: reqwest::Client) -> Self {
            Self { client }
        }

        /// Build a client whose requests give up after `timeout`.
        pub fn with_timeout(timeout: Duration) -> Result<Self, HttpError> {
            reqwest::Client::builder()
                .timeout(timeout)
                .user_agent(USER_AGENT)
                .build()
                .map(Self::new)
                .map_err(transport_error)
        }
    }

    #[async_trait]
    impl HttpTransport for ReqwestTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
            let builder = request
                .headers
                .iter()
                .fold(self.client.get(&request.url), |builder, (name, value)| {
                    builder.header(name.as_str(), value.as_str())
                });

            let response = builder.send().await.map_err(transport_error)?;
            let status = response.status().as_u16();
            // Non-UTF-8 header values are dropped; none of the headers read
            // downstream can legitimately carry them.
            let headers: HttpHeaders = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    let value = value.to_str().ok()?;
                    Some((name.as_str().to_string(), value.to_string()))
                })
                .collect();
            let body = response.bytes().await.map_err(transport_error)?.to_vec();

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        }
    }
}

#[cfg(test)]
pub(crate) use mock::MockTransport;
