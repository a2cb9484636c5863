//! # Auth URL Builder
//!
//! Builds the `checkid_setup`/`checkid_immediate` redirect for a discovered
//! provider. The query is merged into the endpoint URL, so an endpoint that
//! already carries a query string keeps it.
//!
//! - **OpenID 1.1** sends `return_to`, `mode`, `identity` and `trust_root`
//!   plus SREG. When the local identifier differs from the claim, the claim
//!   rides along inside `return_to` as `openid.claimed_id`.
//! - **OpenID 2.0** sends `ns`, `mode`, `return_to` and `realm`, the
//!   extensions the provider advertised (AX and SREG when it advertised
//!   neither), OAuth when scopes are configured, then `identity` and
//!   `claimed_id`.

use tracing::debug;

use crate::discovery::{OPENID2_NS, ProtocolVersion, ProviderEndpoint};
use crate::error::Result;
use crate::extensions::{AliasTable, ExtensionRequest, oauth_params};
use crate::identity::Identity;
use crate::url::{QueryParams, append_query_param, with_query};

/// Identifier sent when the provider selects the identity
pub const IDENTIFIER_SELECT: &str = "http://specs.openid.net/auth/2.0/identifier_select";

/// Inputs of one authentication request
#[derive(Debug, Clone, Copy)]
pub struct AuthRequest<'a> {
    /// Discovered provider
    pub endpoint: &'a ProviderEndpoint,
    /// Local and claimed identifier after discovery
    pub identity: &'a Identity,
    /// Where the provider sends the user back
    pub return_url: &'a str,
    /// Realm / trust root
    pub realm: &'a str,
    /// `checkid_immediate` instead of `checkid_setup`
    pub immediate: bool,
    /// Let the provider choose the identifier
    pub identifier_select: bool,
    /// Requested attributes
    pub extensions: &'a ExtensionRequest,
    /// OAuth hybrid scopes
    pub oauth_scopes: &'a [String],
}

/// A built redirect and the AX aliases it declared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUrl {
    /// Redirect target
    pub url: String,
    /// Aliases of the AX request, empty if none was sent
    pub aliases: AliasTable,
}

impl AuthRequest<'_> {
    fn mode(&self) -> &'static str {
        if self.immediate {
            "checkid_immediate"
        } else {
            "checkid_setup"
        }
    }

    /// Build the redirect URL for the endpoint's protocol version
    ///
    /// # Errors
    ///
    /// Returns [`OpenIdError::InvalidUrl`](crate::OpenIdError::InvalidUrl) if
    /// the endpoint URL is not absolute.
    pub fn build(&self) -> Result<AuthUrl> {
        let (params, aliases) = match self.endpoint.version() {
            ProtocolVersion::V1 => (self.v1_params(), AliasTable::new()),
            ProtocolVersion::V2 => self.v2_params(),
        };
        let url = with_query(self.endpoint.url(), &params.encode())?;
        debug!(
            "Built OpenID {} {} request for {}",
            self.endpoint.version().as_u8(),
            self.mode(),
            self.endpoint.url()
        );
        Ok(AuthUrl { url, aliases })
    }

    fn v1_params(&self) -> QueryParams {
        let return_to = if self.identity.is_delegated() {
            append_query_param(self.return_url, "openid.claimed_id", self.identity.claimed())
        } else {
            self.return_url.to_string()
        };

        let mut params = QueryParams::new();
        params.set("openid.return_to", return_to);
        params.set("openid.mode", self.mode());
        params.set("openid.identity", self.identity.local());
        params.set("openid.trust_root", self.realm);
        params.extend_missing(self.extensions.sreg_params());
        params
    }

    fn v2_params(&self) -> (QueryParams, AliasTable) {
        let mut params = QueryParams::new();
        params.set("openid.ns", OPENID2_NS);
        params.set("openid.mode", self.mode());
        params.set("openid.return_to", self.return_url);
        params.set("openid.realm", self.realm);

        let advertised = self.endpoint.extensions();
        let mut aliases = AliasTable::new();
        if advertised.ax || !advertised.any() {
            let (ax, table) = self.extensions.ax_params();
            params.extend_missing(ax);
            aliases = table;
        }
        if advertised.sreg || !advertised.any() {
            params.extend_missing(self.extensions.sreg_params());
        }

        params.extend_missing(oauth_params(self.realm, self.oauth_scopes));

        if self.identifier_select || self.endpoint.is_op_identifier() {
            params.set("openid.identity", IDENTIFIER_SELECT);
            params.set("openid.claimed_id", IDENTIFIER_SELECT);
        } else {
            params.set("openid.identity", self.identity.local());
            params.set("openid.claimed_id", self.identity.claimed());
        }
        (params, aliases)
    }
}
