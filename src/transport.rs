//! The HTTP transport that services send their requests through.
//!
//! A [`HttpClientProvider`] hands out clients bound to a base URL, and each
//! [`HttpClient`] sends requests relative to that URL. The default
//! implementation is backed by [ureq](https://docs.rs/ureq), but anything
//! that can round-trip an HTTP request may be plugged in.

use std::{fmt, io::Read as _, time};

use tracing::debug;
use url::Url;

/// An error encountered while sending a request or reading its response.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The relative URL could not be resolved against the base URL.
    #[error("Invalid request URL")]
    Url(#[from] url::ParseError),
    /// The request could not be assembled.
    #[error("Failed to build request")]
    Request(#[from] http::Error),
    /// The request failed in flight (connection, TLS, timeout, ...).
    #[error("HTTP error")]
    Http(#[from] ureq::Error),
    /// The response body could not be read.
    #[error("Failed to read response body")]
    Io(#[from] std::io::Error),
}

/// Resolves a transport client bound to a base URL.
pub trait HttpClientProvider {
    /// The client type handed out.
    type Client: HttpClient;

    /// Get a client that resolves relative URLs against `base_url`.
    fn get_for_url(&self, base_url: &Url) -> Self::Client;
}

/// A client that sends requests relative to some base URL, authorizing each
/// one with the given key.
///
/// Responses are returned whatever their status; interpreting the status is
/// left to the caller.
pub trait HttpClient {
    /// Send a single request.
    fn send(
        &self,
        method: http::Method,
        relative_url: &str,
        auth_key: &str,
        body: Option<String>,
    ) -> Result<http::Response<Vec<u8>>, TransportError>;

    /// Send a GET request.
    fn get(
        &self,
        relative_url: &str,
        auth_key: &str,
    ) -> Result<http::Response<Vec<u8>>, TransportError> {
        self.send(http::Method::GET, relative_url, auth_key, None)
    }

    /// Send a POST request with a JSON body.
    fn post(
        &self,
        relative_url: &str,
        auth_key: &str,
        body: String,
    ) -> Result<http::Response<Vec<u8>>, TransportError> {
        self.send(http::Method::POST, relative_url, auth_key, Some(body))
    }

    /// Send a PUT request with a JSON body.
    fn put(
        &self,
        relative_url: &str,
        auth_key: &str,
        body: String,
    ) -> Result<http::Response<Vec<u8>>, TransportError> {
        self.send(http::Method::PUT, relative_url, auth_key, Some(body))
    }

    /// Send a DELETE request.
    fn delete(
        &self,
        relative_url: &str,
        auth_key: &str,
    ) -> Result<http::Response<Vec<u8>>, TransportError> {
        self.send(http::Method::DELETE, relative_url, auth_key, None)
    }
}

/// The default provider, backed by a shared [`ureq::Agent`]. Clients handed
/// out by the same provider share a connection pool.
#[derive(Clone)]
pub struct UreqClientProvider {
    agent: ureq::Agent,
    user_agent: String,
}

impl fmt::Debug for UreqClientProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqClientProvider")
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

impl Default for UreqClientProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl UreqClientProvider {
    /// A provider with no timeout.
    pub fn new() -> Self {
        Self::with_timeout(None)
    }

    /// A provider whose requests are abandoned once `timeout` elapses. The
    /// timeout covers the whole request, from connecting to reading the
    /// body.
    pub fn with_timeout(timeout: Option<time::Duration>) -> Self {
        let config = ureq::config::Config::builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build();

        Self {
            agent: ureq::Agent::new_with_config(config),
            user_agent: format!("keen-rust/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Modifies the user-agent sent on every request.
    pub fn with_user_agent(self, user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
            ..self
        }
    }
}

impl HttpClientProvider for UreqClientProvider {
    type Client = UreqClient;

    fn get_for_url(&self, base_url: &Url) -> UreqClient {
        UreqClient {
            agent: self.agent.clone(),
            base_url: base_url.clone(),
            user_agent: self.user_agent.clone(),
        }
    }
}

/// A ureq-backed client bound to a base URL.
#[derive(Clone)]
pub struct UreqClient {
    agent: ureq::Agent,
    base_url: Url,
    user_agent: String,
}

impl fmt::Debug for UreqClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqClient")
            .field("base_url", &self.base_url.as_str())
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

impl UreqClient {
    /// The URL that relative request URLs are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

impl HttpClient for UreqClient {
    fn send(
        &self,
        method: http::Method,
        relative_url: &str,
        auth_key: &str,
        body: Option<String>,
    ) -> Result<http::Response<Vec<u8>>, TransportError> {
        let url = self.base_url.join(relative_url)?;
        let req = http::Request::builder()
            .method(method.clone())
            .uri(url.as_str())
            .header(http::header::AUTHORIZATION, auth_key)
            .header(http::header::USER_AGENT, &self.user_agent)
            .header(http::header::ACCEPT, "application/json");

        let req = if let Some(body) = body {
            req.header(http::header::CONTENT_TYPE, "application/json")
                .body(body)?
        } else {
            req.body(String::new())?
        };

        let resp = self.agent.run(req)?;
        debug!(%method, url = relative_url, status = %resp.status(), "request complete");

        let (parts, body) = resp.into_parts();
        let mut buf = Vec::new();
        body.into_reader().read_to_end(&mut buf)?;

        Ok(http::Response::from_parts(parts, buf))
    }
}
