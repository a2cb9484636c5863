//! Error types for the OpenID relying party.
//!
//! A failed authentication is not an error: [`crate::ValidationOutcome::Invalid`]
//! is the normal negative result. The types here describe an engine that could
//! not complete its work (network failure, missing provider, broken response).

use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, OpenIdError>;

/// Transport-level failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The request could not be sent or the response could not be read
    #[error("request to {url} failed: {message}")]
    Request {
        /// Target URL
        url: String,
        /// Underlying client error
        message: String,
    },

    /// The request exceeded the configured timeout or connect timeout
    #[error("request to {url} timed out")]
    Timeout {
        /// Target URL
        url: String,
    },

    /// TLS handshake or certificate verification failed
    #[error("TLS failure for {url}: {message}")]
    Tls {
        /// Target URL
        url: String,
        /// Underlying client error
        message: String,
    },

    /// Non-2xx response with no usable body
    #[error("HTTP {status} from {url}")]
    Status {
        /// Target URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// The HTTP client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

/// OpenID relying party errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OpenIdError {
    /// Network or TLS failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// DNS lookup for the discovery target failed
    #[error("could not resolve host for {url}")]
    HostUnreachable {
        /// URL whose host did not resolve
        url: String,
    },

    /// Discovery finished scanning a page without finding a provider
    #[error("no OpenID server found at {url}")]
    NoProviderFound {
        /// Last URL scanned
        url: String,
    },

    /// Discovery exceeded its iteration bound
    #[error("endless redirection after {iterations} discovery iterations")]
    EndlessRedirection {
        /// Iterations performed
        iterations: usize,
    },

    /// An `id_res` response is missing mandatory fields
    #[error("malformed OpenID response: {0}")]
    MalformedResponse(String),

    /// No identity was supplied before discovery
    #[error("no identity supplied")]
    MissingIdentity,

    /// A URL could not be parsed
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl {
        /// Offending input
        url: String,
        /// Parser message
        reason: String,
    },

    /// Configuration rejected by validation
    #[error("configuration error: {0}")]
    Config(String),
}

impl OpenIdError {
    pub(crate) fn invalid_url(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}
