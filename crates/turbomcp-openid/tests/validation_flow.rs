//! End-to-end relying party flows against a mock provider
//!
//! Tests cover:
//! - Building the redirect after discovery
//! - Verifying a positive assertion via `check_authentication`
//! - Rejecting forged `return_to` values without contacting the provider
//! - Provider-rejected, cancelled and setup-needed responses
//! - Attribute extraction from a verified response

mod common;

use common::{MockOpenIdProvider, REALM, RETURN_URL, relying_party};
use pretty_assertions::assert_eq;
use turbomcp_openid::discovery::AX_SERVICE_TYPE;
use turbomcp_openid::extensions::AX_NS;
use turbomcp_openid::{
    AttributeValue, ExtensionRequest, InvalidReason, OpenIdError, ResponseBag, ValidationOutcome,
};

#[tokio::test]
async fn test_auth_url_after_xrds_discovery() {
    let provider = MockOpenIdProvider::start().await;
    let claimed = provider.url("/id/alice");
    provider
        .mock_xrds(
            "/id/alice",
            provider.v2_xrds(&[AX_SERVICE_TYPE], Some("https://op.example.com/u/alice")),
        )
        .await;

    let mut rp = relying_party(ResponseBag::new()).with_extensions(
        ExtensionRequest::new()
            .require("contact/email")
            .request("namePerson/friendly"),
    );
    rp.set_identity(&claimed).unwrap();
    let url = rp.auth_url(false).await.unwrap();

    assert!(url.starts_with(&format!("{}?", provider.op_endpoint)));
    let sent = ResponseBag::from_query(url.split_once('?').unwrap().1);
    assert_eq!(sent.mode(), Some("checkid_setup"));
    assert_eq!(sent.get("openid_return_to"), Some(RETURN_URL));
    assert_eq!(sent.get("openid_realm"), Some(REALM));
    assert_eq!(sent.get("openid_claimed_id"), Some(claimed.as_str()));
    assert_eq!(sent.get("openid_identity"), Some("https://op.example.com/u/alice"));
    assert_eq!(sent.get("openid_ns_ax"), Some(AX_NS));
    assert_eq!(sent.get("openid_ax_required"), Some("contact_email"));
    assert!(!sent.contains("openid_ns_sreg"));
}

#[tokio::test]
async fn test_valid_assertion() {
    let provider = MockOpenIdProvider::start().await;
    let claimed = provider.url("/id/bob");
    provider.mock_html_identity("/id/bob", None).await;
    provider
        .mock_check_authentication("ns:http://specs.openid.net/auth/2.0\nis_valid:true\n", 1)
        .await;

    let mut rp = relying_party(provider.positive_assertion(&claimed, RETURN_URL));
    let outcome = rp.validate().await.unwrap();

    let verified = match outcome {
        ValidationOutcome::Valid(verified) => verified,
        other => panic!("expected a valid outcome, got {other:?}"),
    };
    assert_eq!(verified.claimed_id, claimed);
    assert_eq!(verified.provider, provider.op_endpoint);
    assert_eq!(rp.claimed_id(), Some(claimed.as_str()));
}

#[tokio::test]
async fn test_forged_return_to_is_invalid_without_post() {
    let provider = MockOpenIdProvider::start().await;
    let claimed = provider.url("/id/carol");
    provider.mock_html_identity("/id/carol", None).await;
    provider.mock_check_authentication("is_valid:true\n", 0).await;

    let forged = provider.positive_assertion(&claimed, "https://attacker.example/return");
    let outcome = relying_party(forged).validate().await.unwrap();
    assert_eq!(
        outcome,
        ValidationOutcome::Invalid(InvalidReason::ReturnUrlMismatch {
            expected: RETURN_URL.to_string(),
            received: Some("https://attacker.example/return".to_string()),
        })
    );
}

#[tokio::test]
async fn test_return_to_prefix_is_not_enough() {
    let provider = MockOpenIdProvider::start().await;
    let claimed = provider.url("/id/carol");
    provider.mock_check_authentication("is_valid:true\n", 0).await;

    let extended = format!("{RETURN_URL}?next=/admin");
    let outcome = relying_party(provider.positive_assertion(&claimed, &extended))
        .validate()
        .await
        .unwrap();
    assert!(!outcome.is_valid());
}

#[tokio::test]
async fn test_provider_rejection() {
    let provider = MockOpenIdProvider::start().await;
    let claimed = provider.url("/id/dave");
    provider.mock_html_identity("/id/dave", None).await;
    provider
        .mock_check_authentication("ns:http://specs.openid.net/auth/2.0\nis_valid:false\n", 1)
        .await;

    let outcome = relying_party(provider.positive_assertion(&claimed, RETURN_URL))
        .validate()
        .await
        .unwrap();
    assert_eq!(outcome, ValidationOutcome::Invalid(InvalidReason::ProviderRejected));
}

#[tokio::test]
async fn test_cancel_and_setup_needed() {
    let provider = MockOpenIdProvider::start().await;
    provider.mock_check_authentication("is_valid:true\n", 0).await;

    let cancel = ResponseBag::from_query("openid.ns=http%3A%2F%2Fspecs.openid.net%2Fauth%2F2.0&openid.mode=cancel");
    let mut rp = relying_party(cancel);
    assert_eq!(rp.mode(), Some("cancel"));
    assert_eq!(
        rp.validate().await.unwrap(),
        ValidationOutcome::Invalid(InvalidReason::Cancelled)
    );

    let setup_url = provider.url("/op/setup");
    let setup = ResponseBag::from_pairs([
        ("openid_mode", "id_res"),
        ("openid_user_setup_url", setup_url.as_str()),
    ]);
    let mut rp = relying_party(setup);
    assert!(!rp.validate().await.unwrap().is_valid());
    assert_eq!(rp.auth_url(false).await.unwrap(), setup_url);
}

#[tokio::test]
async fn test_missing_signature_is_malformed() {
    let provider = MockOpenIdProvider::start().await;
    provider.mock_check_authentication("is_valid:true\n", 0).await;
    let claimed = provider.url("/id/erin");

    let unsigned = ResponseBag::from_pairs(
        provider
            .positive_assertion(&claimed, RETURN_URL)
            .iter()
            .filter(|(key, _)| *key != "openid_signed"),
    );
    let err = relying_party(unsigned).validate().await.unwrap_err();
    assert!(matches!(err, OpenIdError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_attributes_from_verified_response() {
    let provider = MockOpenIdProvider::start().await;
    let claimed = provider.url("/id/frank");
    provider.mock_html_identity("/id/frank", None).await;
    provider.mock_check_authentication("is_valid:true\n", 1).await;

    let mut response = provider.positive_assertion(&claimed, RETURN_URL);
    response.insert(
        "openid_signed",
        "assoc_handle,signed,sig,ns,mode,identity,ns.ext1,ext1.type.mail,ext1.value.mail,sreg.nickname",
    );
    response.insert("openid_ns_ext1", AX_NS);
    response.insert("openid_ext1_mode", "fetch_response");
    response.insert("openid_ext1_type_mail", "http://axschema.org/contact/email");
    response.insert("openid_ext1_value_mail", "frank@example.com");
    response.insert("openid_sreg_nickname", "frankie");

    let mut rp = relying_party(response);
    assert!(rp.validate().await.unwrap().is_valid());

    let attributes = rp.attributes();
    assert_eq!(
        attributes.get("contact/email"),
        Some(&AttributeValue::Single("frank@example.com".into()))
    );
    assert_eq!(
        attributes.get("namePerson/friendly"),
        Some(&AttributeValue::Single("frankie".into()))
    );
}
