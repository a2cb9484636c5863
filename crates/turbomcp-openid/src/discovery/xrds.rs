//! Yadis XRDS document scanning
//!
//! Services are examined in document order. The first one advertising
//! OpenID 2.0 (`server` or `signon`) or OpenID 1.1 wins.

use std::sync::OnceLock;

use regex::Regex;

use super::types::{ExtensionSupport, ProtocolVersion, ProviderEndpoint};
use crate::error::{OpenIdError, Result};

/// Attribute Exchange service type
pub const AX_SERVICE_TYPE: &str = "http://openid.net/srv/ax/1.0";
/// Simple Registration 1.0 service type
pub const SREG_10_SERVICE_TYPE: &str = "http://openid.net/sreg/1.0";
/// Simple Registration 1.1 service type
pub const SREG_11_SERVICE_TYPE: &str = "http://openid.net/extensions/sreg/1.1";

/// Content types accepted as an XRDS document
const XRDS_CONTENT_TYPES: &[&str] = &["application/xrds+xml", "text/xml"];

fn service_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<Service[^>]*>(.*?)</Service>").expect("static regex"))
}

fn v2_type_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<Type>\s*http://specs\.openid\.net/auth/2\.0/(server|signon)\s*</Type>")
            .expect("static regex")
    })
}

fn v1_type_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<Type>\s*http://openid\.net/signon/1\.1\s*</Type>").expect("static regex")
    })
}

fn uri_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<URI[^>]*>(.*?)</URI>").expect("static regex"))
}

fn local_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<(?:LocalID|CanonicalID)>(.*?)</(?:LocalID|CanonicalID)>")
            .expect("static regex")
    })
}

fn delegate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<[^>/]*Delegate>(.*?)</[^>]*Delegate>").expect("static regex")
    })
}

/// Whether `content_type` denotes an XRDS document
///
/// `lenient` additionally accepts `text/html`, which some providers use for
/// override documents.
pub fn is_xrds_content_type(content_type: &str, lenient: bool) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    XRDS_CONTENT_TYPES
        .iter()
        .any(|allowed| content_type.contains(allowed))
        || (lenient && content_type.contains("text/html"))
}

fn has_type(service: &str, type_uri: &str) -> bool {
    let pattern = format!(r"<Type>\s*{}\s*</Type>", regex::escape(type_uri));
    Regex::new(&pattern).is_ok_and(|re| re.is_match(service))
}

fn service_uri(service: &str, document_url: &str) -> Result<String> {
    uri_re()
        .captures(service)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|uri| !uri.is_empty())
        .ok_or_else(|| OpenIdError::NoProviderFound {
            url: document_url.to_string(),
        })
}

fn capture(re: &Regex, service: &str) -> Option<String> {
    re.captures(service)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Find the OpenID service in an XRDS document
///
/// Returns `Ok(None)` when the document advertises no OpenID service.
///
/// # Errors
///
/// Returns [`OpenIdError::NoProviderFound`] when an OpenID service is present
/// but has no `<URI>`.
pub fn parse_services(document: &str, document_url: &str) -> Result<Option<ProviderEndpoint>> {
    for caps in service_re().captures_iter(document) {
        let service = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let sreg = has_type(service, SREG_10_SERVICE_TYPE) || has_type(service, SREG_11_SERVICE_TYPE);

        if let Some(type_caps) = v2_type_re().captures(service) {
            let op_identifier = type_caps.get(1).is_some_and(|m| m.as_str() == "server");
            let uri = service_uri(service, document_url)?;
            let endpoint = ProviderEndpoint::new(uri, ProtocolVersion::V2)
                .with_local_id(capture(local_id_re(), service))
                .with_extensions(ExtensionSupport {
                    ax: has_type(service, AX_SERVICE_TYPE),
                    sreg,
                })
                .with_op_identifier(op_identifier);
            return Ok(Some(endpoint));
        }

        if v1_type_re().is_match(service) {
            let uri = service_uri(service, document_url)?;
            let endpoint = ProviderEndpoint::new(uri, ProtocolVersion::V1)
                .with_local_id(capture(delegate_re(), service))
                .with_extensions(ExtensionSupport { ax: false, sreg });
            return Ok(Some(endpoint));
        }
    }
    Ok(None)
}
