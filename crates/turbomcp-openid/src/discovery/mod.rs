//! # OpenID Provider Discovery
//!
//! Yadis (XRDS) discovery with HTML link fallback, as described by OpenID
//! Authentication 2.0 §7.3 and OpenID 1.1 §3.
//!
//! ## Discovery Order
//!
//! 1. **Yadis**: `HEAD`, then `GET`, following `X-XRDS-Location` headers and
//!    `<meta http-equiv="X-XRDS-Location">` tags to an XRDS document whose
//!    first OpenID `<Service>` gives the endpoint, version, local identifier
//!    and advertised AX/SREG support.
//! 2. **HTML**: `<link rel="openid2.provider">` / `openid2.local_id`, then the
//!    OpenID 1.1 `openid.server` / `openid.delegate` links.
//!
//! ## Safety Bounds
//!
//! - Iteration bound (default 10) on discovery redirects
//! - Host resolution checked before every iteration
//! - The transport's own timeout bounds each request
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use turbomcp_openid::discovery::DiscoveryEngine;
//! use turbomcp_openid::{ReqwestTransport, TransportConfig};
//!
//! # async fn example() -> Result<(), turbomcp_openid::OpenIdError> {
//! let transport = ReqwestTransport::new(&TransportConfig::default())?;
//! let discovery = DiscoveryEngine::new(&transport)
//!     .discover("https://steamcommunity.com/openid")
//!     .await?;
//! println!("provider: {}", discovery.endpoint.url());
//! # Ok(())
//! # }
//! ```

mod engine;
mod html;
mod types;
mod xrds;

pub use engine::DiscoveryEngine;
pub use html::html_tag;
pub use types::{Discovery, ExtensionSupport, OPENID2_NS, ProtocolVersion, ProviderEndpoint};
pub use xrds::{
    AX_SERVICE_TYPE, SREG_10_SERVICE_TYPE, SREG_11_SERVICE_TYPE, is_xrds_content_type,
    parse_services,
};
