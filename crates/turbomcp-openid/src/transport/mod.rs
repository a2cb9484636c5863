//! # HTTP Transport
//!
//! The relying party talks to identity pages and providers through the
//! [`HttpTransport`] trait. [`ReqwestTransport`] is the production backend;
//! tests and embedders can supply their own implementation.
//!
//! ## Contract
//!
//! - `GET` and `HEAD` send `Accept: application/xrds+xml, */*`.
//! - `POST` sends the parameters as an `application/x-www-form-urlencoded` body.
//! - A `HEAD` answered with `405 Method Not Allowed` is retried as `GET` and
//!   only the headers of that response are returned.
//! - With `update_identity` set, a request whose effective URL (after
//!   redirects, ignoring the fragment) differs from the requested one reports
//!   it in [`TransportResponse::redirected_to`].

mod http_client;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::trace;

use crate::error::Result;
use crate::url::{QueryParams, UrlParts};

pub use http_client::ReqwestTransport;

/// `Accept` header sent with discovery requests
pub const DISCOVERY_ACCEPT: &str = "application/xrds+xml, */*";

/// `Content-Type` of `POST` bodies
pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Methods the relying party issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// `GET`
    Get,
    /// `HEAD`
    Head,
    /// `POST`
    Post,
}

impl HttpMethod {
    /// Method name as sent on the wire
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response headers keyed by lowercase name
///
/// When a header repeats, the last value wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHeaders(HashMap<String, String>);

impl ResponseHeaders {
    /// Empty header set
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a header, lowercasing the name and trimming the value
    pub fn insert(&mut self, name: &str, value: &str) {
        self.0
            .insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
    }

    /// Case-insensitive lookup
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Number of headers
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no headers were captured
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(name, value)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for ResponseHeaders {
    fn from_iter<I: IntoIterator<Item = (&'a str, &'a str)>>(iter: I) -> Self {
        let mut headers = ResponseHeaders::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

/// What a transport call produced
#[derive(Debug, Clone, Default)]
pub struct TransportResponse {
    /// Final HTTP status
    pub status: u16,
    /// Body bytes; always empty for `HEAD`
    pub body: Bytes,
    /// Captured headers
    pub headers: ResponseHeaders,
    /// New location when `update_identity` was requested and redirects moved us
    pub redirected_to: Option<String>,
}

impl TransportResponse {
    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// The `Content-Type` header, if any
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type")
    }
}

/// Outbound HTTP for discovery and verification
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Perform one request
    ///
    /// For `GET`/`HEAD`, non-empty `params` are merged into the URL query; for
    /// `POST` they form the body.
    ///
    /// # Errors
    ///
    /// Returns [`crate::OpenIdError::Transport`] for network and TLS failures and
    /// for non-2xx responses without a body.
    async fn request(
        &self,
        url: &str,
        method: HttpMethod,
        params: &QueryParams,
        update_identity: bool,
    ) -> Result<TransportResponse>;

    /// Whether the host of `url` resolves to at least one address
    async fn host_exists(&self, url: &str) -> bool {
        let Ok(parts) = UrlParts::parse(url) else {
            return false;
        };
        let Some(host) = parts.host else {
            return false;
        };
        let port = parts.port.unwrap_or(match parts.scheme.as_deref() {
            Some("https") => 443,
            _ => 80,
        });
        let host = host.trim_start_matches('[').trim_end_matches(']').to_string();
        match tokio::net::lookup_host((host.as_str(), port)).await {
            Ok(mut addrs) => addrs.next().is_some(),
            Err(e) => {
                trace!("lookup of {} failed: {}", host, e);
                false
            }
        }
    }
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    async fn request(
        &self,
        url: &str,
        method: HttpMethod,
        params: &QueryParams,
        update_identity: bool,
    ) -> Result<TransportResponse> {
        (**self).request(url, method, params, update_identity).await
    }

    async fn host_exists(&self, url: &str) -> bool {
        (**self).host_exists(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_are_case_insensitive() {
        let headers: ResponseHeaders = [("X-XRDS-Location", " https://a/xrds ")]
            .into_iter()
            .collect();
        assert_eq!(headers.get("x-xrds-location"), Some("https://a/xrds"));
        assert_eq!(headers.get("X-Xrds-Location"), Some("https://a/xrds"));
    }

    #[test]
    fn test_method_display() {
        assert_eq!(HttpMethod::Head.to_string(), "HEAD");
    }

    #[tokio::test]
    async fn test_host_exists_for_loopback() {
        struct NoopTransport;

        #[async_trait]
        impl HttpTransport for NoopTransport {
            async fn request(
                &self,
                _url: &str,
                _method: HttpMethod,
                _params: &QueryParams,
                _update_identity: bool,
            ) -> Result<TransportResponse> {
                Ok(TransportResponse::default())
            }
        }

        assert!(NoopTransport.host_exists("http://127.0.0.1:8080/id").await);
        assert!(!NoopTransport.host_exists("/relative/only").await);
    }
}
