//! Relying Party Configuration Types
//!
//! Configuration for the OpenID relying party and its HTTP transport. All
//! types deserialize with serde so they can be embedded in a host
//! application's configuration file.

use std::time::Duration;

use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::context::RequestContext;
use crate::error::{OpenIdError, Result};

/// Default bound on discovery iterations
pub const DEFAULT_MAX_DISCOVERY_ITERATIONS: usize = 10;

/// HTTP transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Whole-request timeout (default: 30 seconds)
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
    /// Connection establishment timeout (default: 30 seconds)
    #[serde(default = "default_timeout")]
    pub connect_timeout: Duration,
    /// User-Agent header value
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Optional upstream proxy
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    /// TLS peer verification settings
    #[serde(default)]
    pub tls: TlsConfig,
    /// HTTP redirects followed per request (default: 10)
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("TurboMCP-OpenID/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_redirects() -> usize {
    10
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            connect_timeout: default_timeout(),
            user_agent: default_user_agent(),
            proxy: None,
            tls: TlsConfig::default(),
            max_redirects: default_max_redirects(),
        }
    }
}

/// Upstream proxy settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Proxy host name
    pub host: String,
    /// Proxy port
    #[serde(default)]
    pub port: Option<u16>,
    /// Proxy user for basic authentication
    #[serde(default)]
    pub username: Option<String>,
    /// Proxy password (zeroized on drop)
    #[serde(
        default,
        serialize_with = "serialize_optional_secret",
        deserialize_with = "deserialize_optional_secret"
    )]
    pub password: Option<SecretString>,
}

impl ProxyConfig {
    /// Proxy URL without credentials, e.g. `http://proxy.local:3128`
    pub fn url(&self) -> String {
        let host = if self.host.contains("://") {
            self.host.clone()
        } else {
            format!("http://{}", self.host)
        };
        match self.port {
            Some(port) => format!("{host}:{port}"),
            None => host,
        }
    }

    /// Basic-auth credentials, if a user is configured
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let user = self.username.as_deref()?;
        let pass = self
            .password
            .as_ref()
            .map(|p| p.expose_secret().as_str())
            .unwrap_or_default();
        Some((user, pass))
    }
}

// Custom serialization for Option<SecretString>
fn serialize_optional_secret<S>(
    secret: &Option<SecretString>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match secret {
        Some(secret) => serializer.serialize_some(secret.expose_secret()),
        None => serializer.serialize_none(),
    }
}

// Custom deserialization for Option<SecretString>
fn deserialize_optional_secret<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<SecretString>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.map(SecretString::new))
}

/// TLS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Verify the peer certificate chain and host name (default: true)
    #[serde(default = "default_verify_peer")]
    pub verify_peer: bool,
    /// Directory of PEM certificates added as trust roots
    #[serde(default)]
    pub ca_path: Option<String>,
    /// PEM bundle added as trust roots
    #[serde(default)]
    pub ca_file: Option<String>,
}

fn default_verify_peer() -> bool {
    true
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            verify_peer: true,
            ca_path: None,
            ca_file: None,
        }
    }
}

/// Regex rewrite applied once to the discovery URL before the loop starts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct XrdsOverride {
    /// Pattern matched against the identity URL
    pub pattern: String,
    /// Replacement, `$1`-style group references allowed
    pub replacement: String,
}

impl XrdsOverride {
    /// Compile the pattern
    ///
    /// # Errors
    ///
    /// Returns [`OpenIdError::Config`] if the pattern is not a valid regex.
    pub fn compile(&self) -> Result<CompiledOverride> {
        let pattern = Regex::new(&self.pattern).map_err(|e| {
            OpenIdError::Config(format!("invalid XRDS override pattern: {e}"))
        })?;
        Ok(CompiledOverride {
            pattern,
            replacement: self.replacement.clone(),
        })
    }
}

/// A compiled [`XrdsOverride`]
#[derive(Debug, Clone)]
pub struct CompiledOverride {
    pattern: Regex,
    replacement: String,
}

impl CompiledOverride {
    /// Rewrite `url`
    pub fn apply(&self, url: &str) -> String {
        self.pattern
            .replace_all(url, self.replacement.as_str())
            .into_owned()
    }
}

/// Relying party configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelyingPartyConfig {
    /// URL the provider sends the user back to
    pub return_url: String,
    /// Realm (OpenID 1.1 trust root) the user is asked to trust
    pub realm: String,
    /// Optional rewrite of the discovery entry point
    #[serde(default)]
    pub xrds_override: Option<XrdsOverride>,
    /// OAuth hybrid scopes; empty disables the OAuth extension
    #[serde(default)]
    pub oauth_scopes: Vec<String>,
    /// Ask the provider to select the identifier
    #[serde(default)]
    pub identifier_select: bool,
    /// Bound on discovery iterations (default: 10)
    #[serde(default = "default_max_iterations")]
    pub max_discovery_iterations: usize,
    /// HTTP transport settings
    #[serde(default)]
    pub transport: TransportConfig,
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_DISCOVERY_ITERATIONS
}

impl RelyingPartyConfig {
    /// Configuration with explicit return URL and realm
    pub fn new(return_url: impl Into<String>, realm: impl Into<String>) -> Self {
        Self {
            return_url: return_url.into(),
            realm: realm.into(),
            xrds_override: None,
            oauth_scopes: Vec::new(),
            identifier_select: false,
            max_discovery_iterations: DEFAULT_MAX_DISCOVERY_ITERATIONS,
            transport: TransportConfig::default(),
        }
    }

    /// Derive return URL and realm from the hosting request
    pub fn from_context(context: &RequestContext) -> Self {
        Self::new(context.return_url(), context.realm())
    }

    /// Set the discovery URL rewrite
    pub fn with_xrds_override(
        mut self,
        pattern: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        self.xrds_override = Some(XrdsOverride {
            pattern: pattern.into(),
            replacement: replacement.into(),
        });
        self
    }

    /// Request OAuth hybrid scopes
    pub fn with_oauth_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.oauth_scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Toggle provider-driven identifier selection
    pub fn with_identifier_select(mut self, enabled: bool) -> Self {
        self.identifier_select = enabled;
        self
    }

    /// Replace the transport settings
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }

    /// Check the configuration for obvious mistakes
    ///
    /// # Errors
    ///
    /// Returns [`OpenIdError::Config`] if a URL is not absolute, the override
    /// pattern does not compile, or the iteration bound is zero.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("return_url", &self.return_url), ("realm", &self.realm)] {
            ::url::Url::parse(value)
                .map_err(|e| OpenIdError::Config(format!("{name} is not an absolute URL: {e}")))?;
        }
        if let Some(xrds_override) = &self.xrds_override {
            xrds_override.compile()?;
        }
        if self.max_discovery_iterations == 0 {
            return Err(OpenIdError::Config(
                "max_discovery_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_defaults() {
        let config = TransportConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert!(config.tls.verify_peer);
        assert!(config.user_agent.starts_with("TurboMCP-OpenID/"));
    }

    #[test]
    fn test_deserialize_minimal_config() {
        let config: RelyingPartyConfig = serde_json::from_value(serde_json::json!({
            "return_url": "https://rp.example.com/login",
            "realm": "https://rp.example.com",
            "transport": {
                "proxy": { "host": "proxy.local", "port": 3128, "username": "u", "password": "p" }
            }
        }))
        .unwrap();

        assert_eq!(config.max_discovery_iterations, 10);
        assert!(config.transport.tls.verify_peer);
        let proxy = config.transport.proxy.unwrap();
        assert_eq!(proxy.url(), "http://proxy.local:3128");
        assert_eq!(proxy.credentials(), Some(("u", "p")));
    }

    #[test]
    fn test_validate() {
        let config = RelyingPartyConfig::new("https://rp.example.com/cb", "https://rp.example.com");
        assert!(config.validate().is_ok());

        let bad = RelyingPartyConfig::new("/cb", "https://rp.example.com");
        assert!(matches!(bad.validate(), Err(OpenIdError::Config(_))));

        let bad = config.clone().with_xrds_override("(", "x");
        assert!(matches!(bad.validate(), Err(OpenIdError::Config(_))));
    }

    #[test]
    fn test_override_apply() {
        let compiled = XrdsOverride {
            pattern: r"^https?://([^/]+\.example\.com)/.*$".to_string(),
            replacement: "https://www.example.com/accounts/o8/site-xrds?hd=$1".to_string(),
        }
        .compile()
        .unwrap();
        assert_eq!(
            compiled.apply("https://corp.example.com/openid"),
            "https://www.example.com/accounts/o8/site-xrds?hd=corp.example.com"
        );
    }
}
