//! # Attribute Decoder
//!
//! Extracts AX and SREG attribute values from a response bag. Decoding is
//! pure: only signed fields are considered, and the AX alias table is rebuilt
//! from the response itself rather than from whatever built the request.
//!
//! Results are keyed by AX schema name (`contact/email`) regardless of which
//! extension carried them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::extensions::{AX_NS, AX_SCHEMA_PREFIX, AliasTable, OAUTH_NS, sreg_to_ax};
use crate::response::ResponseBag;

/// One decoded attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// A single value
    Single(String),
    /// An AX attribute returned with `count > 1`
    Multiple(Vec<String>),
}

impl AttributeValue {
    /// The value when there is exactly one
    pub fn as_single(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value),
            Self::Multiple(_) => None,
        }
    }

    /// Every value
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::Single(value) => vec![value.as_str()],
            Self::Multiple(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

/// Decoded attributes keyed by AX schema name
pub type Attributes = BTreeMap<String, AttributeValue>;

/// Alias the response declares for `namespace`
///
/// Checks `openid_ns_<hint>` first, then every `openid_ns_*` field in arrival
/// order. `None` when the namespace is not declared.
pub fn namespace_alias(bag: &ResponseBag, namespace: &str, hint: Option<&str>) -> Option<String> {
    if let Some(hint) = hint {
        if bag.get(&format!("openid_ns_{hint}")) == Some(namespace) {
            return Some(hint.to_string());
        }
    }
    bag.namespaces()
        .find(|(_, uri)| *uri == namespace)
        .map(|(alias, _)| alias.to_string())
}

/// Attributes carried by Attribute Exchange
pub fn ax_attributes(bag: &ResponseBag) -> Attributes {
    let mut attributes = Attributes::new();
    let Some(ns_alias) = namespace_alias(bag, AX_NS, Some("ax")) else {
        return attributes;
    };

    let aliases = AliasTable::from_response(bag, &ns_alias);
    for (alias, type_uri) in aliases.iter() {
        let name = type_uri.strip_prefix(AX_SCHEMA_PREFIX).unwrap_or(type_uri);
        if name.is_empty() {
            continue;
        }

        let value_key = format!("openid_{ns_alias}_value_{alias}");
        let count = bag
            .get(&format!("openid_{ns_alias}_count_{alias}"))
            .and_then(|count| count.trim().parse::<usize>().ok())
            .unwrap_or(0);

        let value = if count > 0 {
            // Each indexed value is its own field, so the bag bounds the loop
            let values: Vec<String> = (1..=count.min(bag.len()))
                .filter_map(|i| bag.get(&format!("{value_key}_{i}")))
                .map(str::to_string)
                .collect();
            match values.len() {
                0 => None,
                1 if count == 1 => values.into_iter().next().map(AttributeValue::Single),
                _ => Some(AttributeValue::Multiple(values)),
            }
        } else {
            bag.get(&value_key).map(AttributeValue::from)
        };

        if let Some(value) = value {
            attributes.insert(name.to_string(), value);
        }
    }
    attributes
}

/// Attributes carried by Simple Registration
///
/// Signed `sreg.<field>` names without an AX equivalent are skipped.
pub fn sreg_attributes(bag: &ResponseBag) -> Attributes {
    let mut attributes = Attributes::new();
    for field in bag.signed_fields().iter() {
        let Some(sreg_name) = field.strip_prefix("sreg.") else {
            continue;
        };
        let Some(ax_name) = sreg_to_ax(sreg_name) else {
            continue;
        };
        if let Some(value) = bag.get(&format!("openid_sreg_{sreg_name}")) {
            attributes.insert(ax_name.to_string(), AttributeValue::from(value));
        }
    }
    attributes
}

/// Every attribute in the response
///
/// OpenID 2.0 responses merge AX and SREG, AX winning on collision. Other
/// responses only carry SREG.
pub fn attributes(bag: &ResponseBag) -> Attributes {
    if !bag.is_v2() {
        return sreg_attributes(bag);
    }
    let mut attributes = ax_attributes(bag);
    for (name, value) in sreg_attributes(bag) {
        attributes.entry(name).or_insert(value);
    }
    attributes
}

/// OAuth request token from the hybrid extension
pub fn oauth_request_token(bag: &ResponseBag) -> Option<&str> {
    let alias = namespace_alias(bag, OAUTH_NS, None)?;
    bag.get(&format!("openid_{alias}_request_token"))
}
