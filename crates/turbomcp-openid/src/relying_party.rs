//! # Relying Party
//!
//! One [`RelyingParty`] serves one login attempt: set the identity, redirect
//! the user to [`auth_url`](RelyingParty::auth_url), then feed the returning
//! request into [`validate`](RelyingParty::validate). All state (identity,
//! discovered endpoint, setup URL, response) lives in the value itself, and
//! the network operations take `&mut self`, so a single instance cannot be
//! shared between concurrent requests. Build a new one per request.

use tracing::debug;

use crate::attributes::{self, Attributes};
use crate::auth_url::AuthRequest;
use crate::config::{CompiledOverride, RelyingPartyConfig};
use crate::context::RequestContext;
use crate::discovery::{DiscoveryEngine, ProviderEndpoint};
use crate::error::{OpenIdError, Result};
use crate::extensions::{AliasTable, ExtensionRequest};
use crate::identity::Identity;
use crate::response::ResponseBag;
use crate::transport::{HttpTransport, ReqwestTransport};
use crate::validator::{InvalidReason, ResponseValidator, ValidationOutcome};

/// OpenID 1.1/2.0 relying party for one request
pub struct RelyingParty<T: HttpTransport = ReqwestTransport> {
    config: RelyingPartyConfig,
    xrds_override: Option<CompiledOverride>,
    transport: T,
    identity: Option<Identity>,
    endpoint: Option<ProviderEndpoint>,
    setup_url: Option<String>,
    extensions: ExtensionRequest,
    aliases: AliasTable,
    response: ResponseBag,
}

impl<T: HttpTransport> std::fmt::Debug for RelyingParty<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelyingParty")
            .field("config", &self.config)
            .field("identity", &self.identity)
            .field("endpoint", &self.endpoint)
            .field("setup_url", &self.setup_url)
            .finish()
    }
}

impl RelyingParty<ReqwestTransport> {
    /// Relying party over a `reqwest` client built from `config.transport`
    ///
    /// # Errors
    ///
    /// Returns [`OpenIdError::Config`] for an invalid configuration and
    /// [`OpenIdError::Transport`] if the HTTP client cannot be built.
    pub fn from_config(config: RelyingPartyConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(&config.transport)?;
        Self::new(config, transport)
    }

    /// Relying party whose realm and return URL come from the hosting request
    ///
    /// # Errors
    ///
    /// See [`RelyingParty::from_config`].
    pub fn from_context(context: &RequestContext) -> Result<Self> {
        Self::from_config(RelyingPartyConfig::from_context(context))
    }
}

impl<T: HttpTransport> RelyingParty<T> {
    /// Relying party over `transport`
    ///
    /// # Errors
    ///
    /// Returns [`OpenIdError::Config`] if `config` does not validate.
    pub fn new(config: RelyingPartyConfig, transport: T) -> Result<Self> {
        config.validate()?;
        let xrds_override = config
            .xrds_override
            .as_ref()
            .map(|o| o.compile())
            .transpose()?;
        Ok(Self {
            config,
            xrds_override,
            transport,
            identity: None,
            endpoint: None,
            setup_url: None,
            extensions: ExtensionRequest::default(),
            aliases: AliasTable::default(),
            response: ResponseBag::default(),
        })
    }

    /// Attach the inbound response parameters
    pub fn with_response(mut self, response: ResponseBag) -> Self {
        self.response = response;
        self
    }

    /// Request attributes from the provider
    pub fn with_extensions(mut self, extensions: ExtensionRequest) -> Self {
        self.extensions = extensions;
        self
    }

    /// Relying party configuration
    pub fn config(&self) -> &RelyingPartyConfig {
        &self.config
    }

    /// The transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Normalize and set the identity to authenticate
    ///
    /// Forgets any previously discovered endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`OpenIdError::MissingIdentity`] for a blank identifier.
    pub fn set_identity(&mut self, identifier: &str) -> Result<()> {
        self.identity = Some(Identity::new(identifier)?);
        self.endpoint = None;
        Ok(())
    }

    /// OP-local identifier
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_ref().map(Identity::local)
    }

    /// Claimed identifier
    pub fn claimed_id(&self) -> Option<&str> {
        self.identity.as_ref().map(Identity::claimed)
    }

    /// Endpoint found by the last discovery
    pub fn endpoint(&self) -> Option<&ProviderEndpoint> {
        self.endpoint.as_ref()
    }

    /// Setup URL recorded from an immediate-mode response
    pub fn setup_url(&self) -> Option<&str> {
        self.setup_url.as_deref()
    }

    /// AX aliases declared by the last auth URL
    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// The attached response
    pub fn response(&self) -> &ResponseBag {
        &self.response
    }

    /// `openid_mode` of the attached response
    pub fn mode(&self) -> Option<&str> {
        self.response.mode()
    }

    /// Discover the provider for the current identity
    ///
    /// Redirects followed during discovery move both identifiers; a
    /// discovered local identifier replaces only the OP-local one.
    ///
    /// # Errors
    ///
    /// [`OpenIdError::MissingIdentity`] without an identity, otherwise any
    /// discovery error.
    pub async fn discover(&mut self) -> Result<&ProviderEndpoint> {
        let identity = self.identity.as_mut().ok_or(OpenIdError::MissingIdentity)?;
        let discovery = DiscoveryEngine::new(&self.transport)
            .with_max_iterations(self.config.max_discovery_iterations)
            .with_override(self.xrds_override.clone())
            .discover(identity.claimed())
            .await?;

        if let Some(location) = discovery.redirected_identity {
            debug!("Identity moved to {}", location);
            identity.redirected_to(location);
        }
        if let Some(local_id) = discovery.endpoint.local_id() {
            identity.delegate_to(local_id);
        }
        Ok(&*self.endpoint.insert(discovery.endpoint))
    }

    /// URL to redirect the user to
    ///
    /// A setup URL recorded by an earlier immediate-mode response is returned
    /// as-is unless `immediate` is requested again. Discovers the provider
    /// first if needed.
    ///
    /// # Errors
    ///
    /// Discovery errors and [`OpenIdError::InvalidUrl`] for an unusable
    /// endpoint URL.
    pub async fn auth_url(&mut self, immediate: bool) -> Result<String> {
        if !immediate {
            if let Some(setup_url) = &self.setup_url {
                return Ok(setup_url.clone());
            }
        }
        if self.endpoint.is_none() {
            self.discover().await?;
        }
        let (Some(endpoint), Some(identity)) = (&self.endpoint, &self.identity) else {
            return Err(OpenIdError::MissingIdentity);
        };

        let built = AuthRequest {
            endpoint,
            identity,
            return_url: &self.config.return_url,
            realm: &self.config.realm,
            immediate,
            identifier_select: self.config.identifier_select,
            extensions: &self.extensions,
            oauth_scopes: &self.config.oauth_scopes,
        }
        .build()?;
        self.aliases = built.aliases;
        Ok(built.url)
    }

    /// Validate the attached response
    ///
    /// A setup-needed response records its setup URL for
    /// [`auth_url`](Self::auth_url). A valid one sets the identity to the
    /// verified identifiers.
    ///
    /// # Errors
    ///
    /// See [`ResponseValidator::validate`].
    pub async fn validate(&mut self) -> Result<ValidationOutcome> {
        let outcome = ResponseValidator::new(&self.transport, &self.config.return_url)
            .with_max_iterations(self.config.max_discovery_iterations)
            .with_override(self.xrds_override.clone())
            .validate(&self.response)
            .await?;

        match &outcome {
            ValidationOutcome::Invalid(InvalidReason::SetupNeeded { url }) => {
                self.setup_url = Some(url.clone());
            }
            ValidationOutcome::Valid(verified) => {
                self.identity = Some(Identity::from_parts(
                    verified.identity.clone(),
                    verified.claimed_id.clone(),
                ));
            }
            ValidationOutcome::Invalid(_) => {}
        }
        Ok(outcome)
    }

    /// AX and SREG attributes of the attached response
    pub fn attributes(&self) -> Attributes {
        attributes::attributes(&self.response)
    }

    /// OAuth request token of the attached response
    pub fn oauth_request_token(&self) -> Option<&str> {
        attributes::oauth_request_token(&self.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::OPENID2_NS;
    use crate::transport::{HttpMethod, TransportResponse};
    use crate::url::QueryParams;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const XRDS: &str = r#"<xrds:XRDS xmlns:xrds="xri://$xrds"><XRD><Service>
        <Type>http://specs.openid.net/auth/2.0/signon</Type>
        <Type>http://openid.net/srv/ax/1.0</Type>
        <URI>https://op.example.com/auth</URI>
        <LocalID>https://op.example.com/u/hank</LocalID>
    </Service></XRD></xrds:XRDS>"#;

    /// Identity page served over XRDS, redirected once
    #[derive(Default)]
    struct XrdsSite {
        requests: AtomicUsize,
    }

    #[async_trait]
    impl HttpTransport for XrdsSite {
        async fn request(
            &self,
            _url: &str,
            method: HttpMethod,
            _params: &QueryParams,
            update_identity: bool,
        ) -> Result<TransportResponse> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            let mut response = TransportResponse {
                status: 200,
                ..TransportResponse::default()
            };
            response.headers.insert("Content-Type", "application/xrds+xml");
            match method {
                HttpMethod::Head if update_identity => {
                    response.redirected_to = Some("https://hank.example/".into());
                }
                HttpMethod::Get => response.body = Bytes::from_static(XRDS.as_bytes()),
                _ => response.body = Bytes::from_static(b"is_valid:true\n"),
            }
            Ok(response)
        }

        async fn host_exists(&self, _url: &str) -> bool {
            true
        }
    }

    fn config() -> RelyingPartyConfig {
        RelyingPartyConfig::new("https://rp.example.com/return", "https://rp.example.com")
    }

    #[tokio::test]
    async fn test_discovery_updates_identity() {
        let mut rp = RelyingParty::new(config(), XrdsSite::default()).unwrap();
        rp.set_identity("hank.example.org").unwrap();
        assert_eq!(rp.claimed_id(), Some("http://hank.example.org/"));

        let endpoint = rp.discover().await.unwrap();
        assert_eq!(endpoint.url(), "https://op.example.com/auth");
        assert_eq!(rp.claimed_id(), Some("https://hank.example/"));
        assert_eq!(rp.identity(), Some("https://op.example.com/u/hank"));
    }

    #[tokio::test]
    async fn test_auth_url_discovers_once() {
        let mut rp = RelyingParty::new(config(), XrdsSite::default())
            .unwrap()
            .with_extensions(ExtensionRequest::new().require("contact/email"));
        rp.set_identity("https://hank.example/").unwrap();

        let first = rp.auth_url(false).await.unwrap();
        let after_first = rp.transport().requests.load(Ordering::SeqCst);
        let second = rp.auth_url(false).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(rp.transport().requests.load(Ordering::SeqCst), after_first);
        assert!(first.starts_with("https://op.example.com/auth?openid.ns="));
        assert!(rp.aliases().get("contact_email").is_some());
    }

    #[tokio::test]
    async fn test_missing_identity() {
        let mut rp = RelyingParty::new(config(), XrdsSite::default()).unwrap();
        assert_eq!(rp.auth_url(false).await, Err(OpenIdError::MissingIdentity));
        assert_eq!(rp.set_identity("   "), Err(OpenIdError::MissingIdentity));
    }

    #[tokio::test]
    async fn test_setup_url_short_circuits_auth_url() {
        let response = ResponseBag::from_pairs([
            ("openid_mode", "id_res"),
            ("openid_user_setup_url", "https://op.example.com/setup?x=1"),
        ]);
        let mut rp = RelyingParty::new(config(), XrdsSite::default())
            .unwrap()
            .with_response(response);
        rp.set_identity("https://hank.example/").unwrap();

        assert!(!rp.validate().await.unwrap().is_valid());
        assert_eq!(rp.setup_url(), Some("https://op.example.com/setup?x=1"));
        assert_eq!(
            rp.auth_url(false).await.unwrap(),
            "https://op.example.com/setup?x=1"
        );
        assert_eq!(rp.transport().requests.load(Ordering::SeqCst), 0);

        let immediate = rp.auth_url(true).await.unwrap();
        assert!(immediate.contains("checkid_immediate"));
    }

    #[tokio::test]
    async fn test_validate_sets_verified_identity() {
        let response = ResponseBag::from_pairs([
            ("openid_ns", OPENID2_NS),
            ("openid_mode", "id_res"),
            ("openid_claimed_id", "https://hank.example/"),
            ("openid_identity", "https://op.example.com/u/hank"),
            ("openid_return_to", "https://rp.example.com/return"),
            ("openid_assoc_handle", "h"),
            ("openid_signed", "mode,claimed_id,identity,return_to"),
            ("openid_sig", "s"),
        ]);
        let mut rp = RelyingParty::new(config(), XrdsSite::default())
            .unwrap()
            .with_response(response);
        assert_eq!(rp.mode(), Some("id_res"));

        let outcome = rp.validate().await.unwrap();
        assert!(outcome.is_valid());
        assert_eq!(rp.claimed_id(), Some("https://hank.example/"));
        assert_eq!(rp.identity(), Some("https://op.example.com/u/hank"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let bad = RelyingPartyConfig::new("/return", "https://rp.example.com");
        assert!(matches!(
            RelyingParty::new(bad, XrdsSite::default()),
            Err(OpenIdError::Config(_))
        ));
    }
}
