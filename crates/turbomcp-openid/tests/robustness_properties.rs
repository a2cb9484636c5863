//! Property tests for parsing untrusted input
//!
//! Identity strings, HTML pages and response query strings all come from
//! outside. None of the parsers may panic, and normalization must be stable.

use proptest::prelude::*;
use turbomcp_openid::discovery::{html_tag, parse_services};
use turbomcp_openid::identity::normalize;
use turbomcp_openid::{AttributeRequest, ExtensionRequest, ResponseBag, attributes};

proptest! {
    #[test]
    fn normalize_is_idempotent(
        prefix in prop::sample::select(vec!["", "http://", "https://", "HTTPS://", "="]),
        host in "[a-z0-9][a-z0-9.-]{0,20}",
        path in prop::option::of("/[a-z0-9_]{0,10}"),
        padding in " {0,3}",
    ) {
        let input = format!("{padding}{prefix}{host}{}{padding}", path.unwrap_or_default());
        let once = normalize(&input).unwrap();
        prop_assert_eq!(normalize(&once).unwrap(), once.clone());
        prop_assert!(!once.is_empty());
    }

    #[test]
    fn html_tag_never_panics(content in "\\PC{0,400}", needle in "\\PC{0,20}") {
        let _ = html_tag(&content, "link", "rel", &needle, "href");
        let _ = html_tag(&content, "meta", "http-equiv", "X-XRDS-Location", "content");
    }

    #[test]
    fn xrds_scan_never_panics(document in "(<Service>|</Service>|<Type>|</Type>|<URI>|</URI>|http://specs.openid.net/auth/2.0/signon|[a-z :/.]){0,60}") {
        let _ = parse_services(&document, "https://example.com/xrds");
    }

    #[test]
    fn response_bag_keys_are_mangled(query in "[a-z._ =&%0-9]{0,200}") {
        let bag = ResponseBag::from_query(&query);
        for (key, _) in bag.iter() {
            prop_assert!(!key.contains('.'));
            prop_assert!(!key.contains(' '));
        }
        let _ = attributes::attributes(&bag);
    }

    #[test]
    fn ax_count_only_for_shared_aliases(names in prop::collection::vec("[a-z]{1,4}(/[a-z]{1,4})?", 1..8)) {
        let request = names
            .iter()
            .fold(ExtensionRequest::new(), |req, name| req.request(AttributeRequest::new(name.as_str())));
        let (params, aliases) = request.ax_params();

        for (alias, _) in aliases.iter() {
            let occurrences = names.iter().filter(|n| n.replace('/', "_") == alias).count();
            let count_key = format!("openid.ax.count.{alias}");
            if occurrences > 1 {
                let expected = occurrences.to_string();
                prop_assert_eq!(params.get(&count_key), Some(expected.as_str()));
            } else {
                prop_assert!(!params.contains(&count_key));
            }
        }
    }
}
