//! # Response Validator
//!
//! Verifies a positive assertion by asking the provider directly
//! (`check_authentication`, OpenID 2.0 §11.4.2). The provider is found by
//! rediscovering the claimed identifier; an endpoint named in the response is
//! never trusted.
//!
//! The flow is:
//!
//! 1. `user_setup_url` present: immediate mode failed, return `Invalid`
//! 2. `mode` other than `id_res`: return `Invalid`
//! 3. `return_to` must equal the expected return URL exactly
//! 4. rediscover the provider, POST every signed field back with
//!    `mode=check_authentication`
//! 5. `is_valid:true` in the reply means `Valid`
//!
//! Failed authentication is a [`ValidationOutcome::Invalid`] value. Only
//! engine malfunctions (network, discovery, malformed input) are errors.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{CompiledOverride, DEFAULT_MAX_DISCOVERY_ITERATIONS};
use crate::discovery::{DiscoveryEngine, OPENID2_NS};
use crate::error::{OpenIdError, Result};
use crate::response::ResponseBag;
use crate::transport::{HttpMethod, HttpTransport};
use crate::url::{QueryParams, append_query_param};

fn is_valid_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)is_valid\s*:\s*true").expect("static regex"))
}

/// The identity a provider vouched for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    /// Stable external identifier of the user
    pub claimed_id: String,
    /// OP-local identifier from the response
    pub identity: String,
    /// Rediscovered provider endpoint that confirmed the assertion
    pub provider: String,
}

/// Why a response did not authenticate the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidReason {
    /// Immediate mode needs user interaction at `url`
    SetupNeeded {
        /// Provider's setup URL
        url: String,
    },
    /// The user cancelled at the provider
    Cancelled,
    /// Mode was not `id_res`
    NotIdRes {
        /// Mode received, if any
        mode: Option<String>,
    },
    /// `return_to` differs from the expected return URL
    ReturnUrlMismatch {
        /// URL the relying party expected
        expected: String,
        /// URL in the response
        received: Option<String>,
    },
    /// The provider did not confirm the signature
    ProviderRejected,
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SetupNeeded { url } => write!(f, "setup needed at {url}"),
            Self::Cancelled => f.write_str("cancelled by user"),
            Self::NotIdRes { mode } => {
                write!(f, "unexpected mode {}", mode.as_deref().unwrap_or("<none>"))
            }
            Self::ReturnUrlMismatch { expected, .. } => {
                write!(f, "return_to does not match {expected}")
            }
            Self::ProviderRejected => f.write_str("provider rejected the assertion"),
        }
    }
}

/// Result of validating a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The provider confirmed the assertion
    Valid(VerifiedIdentity),
    /// Authentication did not succeed
    Invalid(InvalidReason),
}

impl ValidationOutcome {
    /// Whether the user is authenticated
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    /// The verified identity, if any
    pub fn identity(&self) -> Option<&VerifiedIdentity> {
        match self {
            Self::Valid(identity) => Some(identity),
            Self::Invalid(_) => None,
        }
    }
}

/// Validates responses against one expected return URL
pub struct ResponseValidator<'a, T: HttpTransport + ?Sized> {
    transport: &'a T,
    return_url: &'a str,
    max_iterations: usize,
    xrds_override: Option<CompiledOverride>,
}

impl<T: HttpTransport + ?Sized> std::fmt::Debug for ResponseValidator<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseValidator")
            .field("return_url", &self.return_url)
            .field("max_iterations", &self.max_iterations)
            .finish()
    }
}

fn required<'b>(bag: &'b ResponseBag, key: &str) -> Result<&'b str> {
    bag.get(key)
        .ok_or_else(|| OpenIdError::MalformedResponse(format!("missing {key}")))
}

impl<'a, T: HttpTransport + ?Sized> ResponseValidator<'a, T> {
    /// Validator expecting responses at `return_url`
    pub fn new(transport: &'a T, return_url: &'a str) -> Self {
        Self {
            transport,
            return_url,
            max_iterations: DEFAULT_MAX_DISCOVERY_ITERATIONS,
            xrds_override: None,
        }
    }

    /// Bound rediscovery iterations
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Apply a discovery URL rewrite during rediscovery
    pub fn with_override(mut self, xrds_override: Option<CompiledOverride>) -> Self {
        self.xrds_override = xrds_override;
        self
    }

    /// Validate `bag`
    ///
    /// # Errors
    ///
    /// - [`OpenIdError::MalformedResponse`] for an `id_res` response without
    ///   `assoc_handle`, `signed`, `sig` or any identifier
    /// - discovery and transport errors from rediscovery and verification
    pub async fn validate(&self, bag: &ResponseBag) -> Result<ValidationOutcome> {
        if let Some(url) = bag.get("openid_user_setup_url") {
            debug!("Provider requires setup at {}", url);
            return Ok(ValidationOutcome::Invalid(InvalidReason::SetupNeeded {
                url: url.to_string(),
            }));
        }

        match bag.mode() {
            Some("id_res") => {}
            Some("cancel") => {
                debug!("Authentication cancelled at provider");
                return Ok(ValidationOutcome::Invalid(InvalidReason::Cancelled));
            }
            mode => {
                debug!("Response mode {:?} is not id_res", mode);
                return Ok(ValidationOutcome::Invalid(InvalidReason::NotIdRes {
                    mode: mode.map(str::to_string),
                }));
            }
        }

        let identity = bag.get("openid_identity");
        let claimed_id = bag
            .get("openid_claimed_id")
            .or(identity)
            .ok_or_else(|| {
                OpenIdError::MalformedResponse("missing openid_claimed_id and openid_identity".into())
            })?;

        let mut params = QueryParams::new();
        params.set("openid.assoc_handle", required(bag, "openid_assoc_handle")?);
        params.set("openid.signed", required(bag, "openid_signed")?);
        params.set("openid.sig", required(bag, "openid_sig")?);

        let mut expected = self.return_url.to_string();
        if bag.contains("openid_ns") {
            params.set("openid.ns", OPENID2_NS);
        } else if bag
            .get("openid_claimed_id")
            .is_some_and(|claimed| Some(claimed) != identity)
        {
            expected = append_query_param(&expected, "openid.claimed_id", claimed_id);
        }

        let received = bag.get("openid_return_to");
        if received != Some(expected.as_str()) {
            debug!("return_to {:?} does not match {}", received, expected);
            return Ok(ValidationOutcome::Invalid(InvalidReason::ReturnUrlMismatch {
                expected,
                received: received.map(str::to_string),
            }));
        }

        let discovery = DiscoveryEngine::new(self.transport)
            .with_max_iterations(self.max_iterations)
            .with_override(self.xrds_override.clone())
            .discover(claimed_id)
            .await?;
        let provider = discovery.endpoint.url().to_string();

        for field in bag.signed_fields().iter() {
            if let Some(value) = bag.get(&format!("openid_{}", field.replace('.', "_"))) {
                params.set(format!("openid.{field}"), value);
            }
        }
        params.set("openid.mode", "check_authentication");

        let response = self
            .transport
            .request(&provider, HttpMethod::Post, &params, false)
            .await?;

        if is_valid_re().is_match(&response.text()) {
            debug!("Provider {} confirmed {}", provider, claimed_id);
            Ok(ValidationOutcome::Valid(VerifiedIdentity {
                claimed_id: claimed_id.to_string(),
                identity: identity.unwrap_or(claimed_id).to_string(),
                provider,
            }))
        } else {
            debug!("Provider {} rejected assertion for {}", provider, claimed_id);
            Ok(ValidationOutcome::Invalid(InvalidReason::ProviderRejected))
        }
    }
}
