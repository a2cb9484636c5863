//! # TurboMCP OpenID - Relying Party for OpenID 1.1 and 2.0
//!
//! Lets a TurboMCP server accept sign-in through legacy OpenID providers
//! (Steam, Launchpad, self-hosted delegation pages, XRI i-names). The crate
//! finds the user's provider, builds the redirect, and verifies the signed
//! response directly with the provider.
//!
//! ## Key Features
//!
//! - **Yadis Discovery** - `X-XRDS-Location` headers and meta tags, XRDS
//!   service scanning, HTML link fallback, bounded redirect loop
//! - **OpenID 1.1 and 2.0** - version-specific `checkid_setup`/`checkid_immediate`
//!   requests, delegation, identifier select
//! - **Direct Verification** - `check_authentication` against the
//!   rediscovered provider, exact `return_to` matching
//! - **Attributes** - Attribute Exchange 1.0 and Simple Registration 1.1 with
//!   one AX-vocabulary result map
//! - **OAuth Hybrid** - request scopes and read the request token
//! - **Pluggable Transport** - [`HttpTransport`] trait, `reqwest` + rustls by
//!   default
//!
//! ## Architecture
//!
//! - [`transport`] - HTTP requests with HEAD→GET fallback and redirect tracking
//! - [`url`] - URL merging and ordered query strings
//! - [`identity`] - identifier normalization and claimed-id tracking
//! - [`discovery`] - Yadis/XRDS and HTML provider discovery
//! - [`extensions`] - AX, SREG and OAuth request parameters
//! - [`auth_url`] - provider redirect construction
//! - [`validator`] - response verification
//! - [`attributes`] - AX/SREG attribute decoding
//! - [`relying_party`] - the per-request façade tying these together
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use turbomcp_openid::{
//!     ExtensionRequest, RelyingParty, RelyingPartyConfig, ResponseBag, ValidationOutcome,
//! };
//!
//! # async fn example() -> turbomcp_openid::Result<()> {
//! let config = RelyingPartyConfig::new(
//!     "https://rp.example.com/login/return",
//!     "https://rp.example.com",
//! );
//!
//! // Outbound: redirect the user to their provider
//! let mut rp = RelyingParty::from_config(config.clone())?
//!     .with_extensions(ExtensionRequest::new().require("contact/email"));
//! rp.set_identity("https://steamcommunity.com/openid")?;
//! let redirect = rp.auth_url(false).await?;
//! println!("redirect to {redirect}");
//!
//! // Inbound: the provider sent the user back
//! let query = "openid.mode=id_res&openid.claimed_id=...";
//! let mut rp = RelyingParty::from_config(config)?.with_response(ResponseBag::from_query(query));
//! match rp.validate().await? {
//!     ValidationOutcome::Valid(who) => println!("signed in as {}", who.claimed_id),
//!     ValidationOutcome::Invalid(reason) => println!("not signed in: {reason}"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Standards
//!
//! - **OpenID Authentication 2.0** and **1.1**
//! - **Yadis 1.0** discovery
//! - **OpenID Attribute Exchange 1.0**
//! - **OpenID Simple Registration 1.1**
//! - **OpenID OAuth Extension 1.0**

pub mod attributes;
pub mod auth_url;
pub mod config;
pub mod context;
pub mod discovery;
pub mod error;
pub mod extensions;
pub mod identity;
pub mod relying_party;
pub mod response;
pub mod transport;
pub mod url;
pub mod validator;

// Re-export configuration types
#[doc(inline)]
pub use config::*;

#[doc(inline)]
pub use context::RequestContext;

#[doc(inline)]
pub use error::{OpenIdError, Result, TransportError};

#[doc(inline)]
pub use transport::{HttpMethod, HttpTransport, ReqwestTransport, TransportResponse};

#[doc(inline)]
pub use discovery::{Discovery, DiscoveryEngine, ProtocolVersion, ProviderEndpoint};

#[doc(inline)]
pub use extensions::{AliasTable, AttributeRequest, ExtensionRequest};

#[doc(inline)]
pub use response::{ResponseBag, SignedFieldList};

#[doc(inline)]
pub use attributes::{AttributeValue, Attributes};

#[doc(inline)]
pub use validator::{InvalidReason, ResponseValidator, ValidationOutcome, VerifiedIdentity};

#[doc(inline)]
pub use relying_party::RelyingParty;
