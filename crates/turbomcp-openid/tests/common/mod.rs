//! Common test utilities for integration tests
//!
//! A wiremock-backed OpenID provider: identity pages (HTML or XRDS), an
//! OP endpoint answering `check_authentication`, and helpers to build the
//! positive assertion the provider would redirect back with.

#![allow(dead_code)]

use turbomcp_openid::discovery::OPENID2_NS;
use turbomcp_openid::{
    RelyingParty, RelyingPartyConfig, ReqwestTransport, ResponseBag, TransportConfig,
};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_string_contains, method, path},
};

pub const XRDS_CONTENT_TYPE: &str = "application/xrds+xml";
pub const RETURN_URL: &str = "https://rp.example.com/login/return";
pub const REALM: &str = "https://rp.example.com";

/// OpenID provider mock server
pub struct MockOpenIdProvider {
    pub server: MockServer,
    pub op_endpoint: String,
}

impl MockOpenIdProvider {
    /// Start a provider whose OP endpoint lives at `/op`
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let op_endpoint = format!("{}/op", server.uri());
        Self {
            server,
            op_endpoint,
        }
    }

    /// Absolute URL for `route` on this server
    pub fn url(&self, route: &str) -> String {
        format!("{}{}", self.server.uri(), route)
    }

    /// HTML identity page at `route` advertising this provider via `<link>` tags
    pub async fn mock_html_identity(&self, route: &str, local_id: Option<&str>) {
        let mut head = format!(r#"<link rel="openid2.provider" href="{}">"#, self.op_endpoint);
        if let Some(local_id) = local_id {
            head.push_str(&format!(r#"<link rel="openid2.local_id" href="{local_id}">"#));
        }
        let page = format!("<html><head>{head}</head><body>profile</body></html>");

        Mock::given(method("HEAD"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).insert_header("Content-Type", "text/html"))
            .mount(&self.server)
            .await;
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_raw(page, "text/html"))
            .mount(&self.server)
            .await;
    }

    /// XRDS document at `route`, announced by its content type on `HEAD`
    pub async fn mock_xrds(&self, route: &str, document: String) {
        Mock::given(method("HEAD"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200).insert_header("Content-Type", XRDS_CONTENT_TYPE),
            )
            .mount(&self.server)
            .await;
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_raw(document, XRDS_CONTENT_TYPE))
            .mount(&self.server)
            .await;
    }

    /// OpenID 2.0 XRDS document pointing at this provider
    pub fn v2_xrds(&self, service_types: &[&str], local_id: Option<&str>) -> String {
        let types: String = service_types
            .iter()
            .map(|t| format!("<Type>{t}</Type>"))
            .collect();
        let local = local_id
            .map(|id| format!("<LocalID>{id}</LocalID>"))
            .unwrap_or_default();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<xrds:XRDS xmlns:xrds="xri://$xrds" xmlns="xri://$xrd*($v*2.0)">
  <XRD>
    <Service priority="0">
      <Type>http://specs.openid.net/auth/2.0/signon</Type>
      {types}
      <URI>{}</URI>
      {local}
    </Service>
  </XRD>
</xrds:XRDS>"#,
            self.op_endpoint
        )
    }

    /// OP endpoint answering `check_authentication` with `body`
    ///
    /// `expected` is verified when the server drops.
    pub async fn mock_check_authentication(&self, body: &str, expected: u64) {
        Mock::given(method("POST"))
            .and(path("/op"))
            .and(body_string_contains("openid.mode=check_authentication"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
            .expect(expected)
            .mount(&self.server)
            .await;
    }

    /// Positive OpenID 2.0 assertion for `claimed_id`
    pub fn positive_assertion(&self, claimed_id: &str, return_to: &str) -> ResponseBag {
        ResponseBag::from_pairs([
            ("openid_ns", OPENID2_NS),
            ("openid_mode", "id_res"),
            ("openid_op_endpoint", self.op_endpoint.as_str()),
            ("openid_claimed_id", claimed_id),
            ("openid_identity", claimed_id),
            ("openid_return_to", return_to),
            ("openid_response_nonce", "2026-10-14T12:00:00Zabc"),
            ("openid_assoc_handle", "{HMAC-SHA256}{5f3d}"),
            ("openid_signed", "assoc_handle,signed,sig,ns,mode,identity"),
            ("openid_sig", "dGVzdC1zaWduYXR1cmU="),
        ])
    }
}

/// Relying party config used across the suites
pub fn rp_config() -> RelyingPartyConfig {
    RelyingPartyConfig::new(RETURN_URL, REALM)
}

/// Relying party over a real reqwest transport
pub fn relying_party(response: ResponseBag) -> RelyingParty<ReqwestTransport> {
    let transport = ReqwestTransport::new(&TransportConfig::default()).expect("client");
    RelyingParty::new(rp_config(), transport)
        .expect("valid config")
        .with_response(response)
}
