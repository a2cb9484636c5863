//! Identity normalization
//!
//! An OpenID identifier is normalized once, when it is set. After that the
//! [`Identity`] tracks two values: the OP-local identifier sent to the provider
//! and the claimed identifier the user will be known by. Discovery may rewrite
//! both (redirects) or only the OP-local one (delegation).

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{OpenIdError, Result};

/// Resolver used for XRI i-names and i-numbers
pub const XRI_PROXY: &str = "https://xri.net/";

fn xri_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^xri:/*").expect("static regex"))
}

fn known_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(?:[=@+$!(]|https?:)").expect("static regex"))
}

fn bare_authority() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^https?://[^/]+$").expect("static regex"))
}

fn http_scheme() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^https?:").expect("static regex"))
}

/// Normalize a user-supplied identifier
///
/// Strips a leading `xri:` prefix, inserts `http://` for bare host names, and
/// adds a trailing slash to a URL that is only a scheme and authority.
///
/// # Errors
///
/// Returns [`OpenIdError::MissingIdentity`] for an empty or blank input.
pub fn normalize(input: &str) -> Result<String> {
    let value = input.trim();
    if value.is_empty() {
        return Err(OpenIdError::MissingIdentity);
    }

    let mut value = if let Some(m) = xri_prefix().find(value) {
        value[m.end()..].to_string()
    } else if !known_prefix().is_match(value) {
        format!("http://{value}")
    } else {
        value.to_string()
    };

    if bare_authority().is_match(&value) {
        value.push('/');
    }
    Ok(value)
}

/// Whether the identifier is an XRI rather than an HTTP(S) URL
pub fn is_xri(identifier: &str) -> bool {
    !http_scheme().is_match(identifier)
}

/// URL that discovery should start from for `identifier`
pub fn discovery_url(identifier: &str) -> String {
    if is_xri(identifier) {
        format!("{XRI_PROXY}{identifier}")
    } else {
        identifier.to_string()
    }
}

/// A normalized identity and its claimed identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    local: String,
    claimed: String,
}

impl Identity {
    /// Normalize `input` and use it as both local and claimed identifier
    ///
    /// # Errors
    ///
    /// Returns [`OpenIdError::MissingIdentity`] for a blank input.
    pub fn new(input: &str) -> Result<Self> {
        let value = normalize(input)?;
        Ok(Self {
            local: value.clone(),
            claimed: value,
        })
    }

    /// Build from values that are already final (e.g. read from a response)
    pub fn from_parts(local: impl Into<String>, claimed: impl Into<String>) -> Self {
        Self {
            local: local.into(),
            claimed: claimed.into(),
        }
    }

    /// OP-local identifier sent as `openid.identity`
    pub fn local(&self) -> &str {
        &self.local
    }

    /// Claimed identifier, the stable external id of the user
    pub fn claimed(&self) -> &str {
        &self.claimed
    }

    /// Whether delegation made the local identifier differ from the claim
    pub fn is_delegated(&self) -> bool {
        self.local != self.claimed
    }

    /// Record that discovery followed a redirect to `url`
    ///
    /// Both identifiers move to the new location.
    pub fn redirected_to(&mut self, url: impl Into<String>) {
        let url = url.into();
        self.local = url.clone();
        self.claimed = url;
    }

    /// Record the provider-local identifier found during discovery
    pub fn delegate_to(&mut self, local: impl Into<String>) {
        self.local = local.into();
    }
}
