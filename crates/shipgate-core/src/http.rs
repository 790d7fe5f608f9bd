//! HTTP access for the remote sources.
//!
//! Sources talk to a [`Transport`] rather than to `reqwest` directly. The
//! production [`ReqwestTransport`] is a blocking client; tests substitute a
//! canned transport keyed by URL.

use camino::Utf8Path;
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, LINK};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::error::SourceError;

/// The request never produced a response (DNS, TLS, connection reset...).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

/// A received HTTP response, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
    /// Target of a `Link: <..>; rel="next"` header, if present.
    pub next_link: Option<String>,
}

impl HttpResponse {
    /// Whether the status is 2xx.
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Issues GET requests.
pub trait Transport {
    /// GET `url`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] only when no response was received.
    fn get(&self, url: &str) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        (**self).get(url)
    }
}

/// GET `url` and require a 2xx response.
///
/// Transport failures and non-2xx statuses both become
/// [`SourceError::HttpError`].
pub fn get_ok(transport: &impl Transport, url: &str) -> Result<HttpResponse, SourceError> {
    match transport.get(url) {
        Ok(response) if response.is_success() => Ok(response),
        Ok(response) => {
            debug!(%url, status = response.status, "non-success status");
            Err(SourceError::HttpError {
                url: url.to_string(),
                status: Some(response.status),
            })
        }
        Err(e) => {
            debug!(%url, error = %e, "transport failure");
            Err(SourceError::HttpError {
                url: url.to_string(),
                status: None,
            })
        }
    }
}

/// Blocking `reqwest` transport with an optional bearer token.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a transport. Requests carry `token` as a bearer credential when set.
    ///
    /// # Errors
    ///
    /// Fails if the TLS backend cannot be initialized or the token is not a
    /// valid header value.
    pub fn new(token: Option<&str>) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github.v3+json"),
        );
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| TransportError(format!("invalid token: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .user_agent(concat!("shipgate/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| TransportError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    #[instrument(level = "debug", skip(self))]
    fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| TransportError(e.to_string()))?;

        let status = response.status().as_u16();
        let next_link = response
            .headers()
            .get(LINK)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_next_link);
        let body = response.text().map_err(|e| TransportError(e.to_string()))?;

        debug!(status, bytes = body.len(), "response received");
        Ok(HttpResponse {
            status,
            body,
            next_link,
        })
    }
}

/// Extract the `rel="next"` target from an RFC 8288 `Link` header.
pub fn parse_next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        let is_next = params
            .split(';')
            .any(|p| matches!(p.trim(), "rel=\"next\"" | "rel=next"));
        if !is_next {
            return None;
        }
        let target = target.trim().strip_prefix('<')?.strip_suffix('>')?;
        Some(target.to_string())
    })
}

/// Read an API token from the first line of `path`.
///
/// A missing, unreadable, or blank file means anonymous access.
#[instrument]
pub fn read_token(path: &Utf8Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    let token = content.lines().next()?.trim();
    if token.is_empty() {
        debug!("token file is empty");
        return None;
    }
    debug!("token loaded");
    Some(token.to_string())
}

#[cfg(any(test, feature = "test-support"))]
pub mod testing {
    //! Canned transport for tests in this crate and in dependents.

    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::{HttpResponse, Transport, TransportError};

    /// Serves fixed responses by URL; unknown URLs get a 404.
    #[derive(Debug, Default)]
    pub struct FakeTransport {
        routes: HashMap<String, Result<HttpResponse, TransportError>>,
        requested: RefCell<Vec<String>>,
    }

    impl FakeTransport {
        /// Transport with no routes.
        pub fn new() -> Self {
            Self::default()
        }

        /// Answer `url` with 200 and `body`.
        pub fn json(self, url: &str, body: &str) -> Self {
            self.respond(url, 200, body, None)
        }

        /// Answer `url` with 200 and a `Link` header pointing at `next`.
        pub fn json_with_next(self, url: &str, body: &str, next: &str) -> Self {
            self.respond(url, 200, body, Some(next))
        }

        /// Answer `url` with `status` and an empty body.
        pub fn status(self, url: &str, status: u16) -> Self {
            self.respond(url, status, "", None)
        }

        /// Fail `url` without a response.
        pub fn unreachable(mut self, url: &str) -> Self {
            self.routes.insert(
                url.to_string(),
                Err(TransportError("connection refused".into())),
            );
            self
        }

        fn respond(mut self, url: &str, status: u16, body: &str, next: Option<&str>) -> Self {
            self.routes.insert(
                url.to_string(),
                Ok(HttpResponse {
                    status,
                    body: body.to_string(),
                    next_link: next.map(str::to_string),
                }),
            );
            self
        }

        /// Every URL requested so far.
        pub fn requested(&self) -> Vec<String> {
            self.requested.borrow().clone()
        }
    }

    impl Transport for FakeTransport {
        fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
            self.requested.borrow_mut().push(url.to_string());
            self.routes.get(url).cloned().unwrap_or_else(|| {
                Ok(HttpResponse {
                    status: 404,
                    body: String::new(),
                    next_link: None,
                })
            })
        }
    }
}
