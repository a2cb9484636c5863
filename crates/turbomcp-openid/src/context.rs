//! Hosting request context
//!
//! The relying party never reads ambient request state. The host passes the
//! scheme, host, port and request URI of the current request, and the default
//! realm and return URL are derived from them.

use serde::{Deserialize, Serialize};

/// The parts of the inbound request the relying party needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// `http` or `https`
    pub scheme: String,
    /// Host name the request was addressed to
    pub host: String,
    /// Port, if known
    #[serde(default)]
    pub port: Option<u16>,
    /// Path and query of the request
    #[serde(default = "default_request_uri")]
    pub request_uri: String,
}

fn default_request_uri() -> String {
    "/".to_string()
}

impl RequestContext {
    /// Context for `scheme://host/`
    pub fn new(scheme: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            port: None,
            request_uri: default_request_uri(),
        }
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the request URI
    pub fn with_request_uri(mut self, uri: impl Into<String>) -> Self {
        self.request_uri = uri.into();
        self
    }

    /// `scheme://host[:port]`, omitting the scheme's default port
    pub fn realm(&self) -> String {
        let default_port = match self.scheme.as_str() {
            "https" => Some(443),
            "http" => Some(80),
            _ => None,
        };
        match self.port {
            Some(port) if Some(port) != default_port => {
                format!("{}://{}:{}", self.scheme, self.host, port)
            }
            _ => format!("{}://{}", self.scheme, self.host),
        }
    }

    /// Realm plus the request URI without any `openid.*` query parameters
    pub fn return_url(&self) -> String {
        let uri = if self.request_uri.starts_with('/') {
            self.request_uri.clone()
        } else {
            format!("/{}", self.request_uri)
        };

        let stripped = match uri.split_once('?') {
            Some((path, query)) => {
                let kept: Vec<&str> = query
                    .split('&')
                    .filter(|pair| !pair.is_empty() && !pair.starts_with("openid."))
                    .collect();
                if kept.is_empty() {
                    path.to_string()
                } else {
                    format!("{path}?{}", kept.join("&"))
                }
            }
            None => uri,
        };
        format!("{}{}", self.realm(), stripped)
    }
}
