//! # Extension Parameters
//!
//! Request parameters for Simple Registration (SREG 1.1), Attribute Exchange
//! (AX 1.0) and the OpenID+OAuth hybrid extension.
//!
//! Attributes are always named in AX schema vocabulary (`contact/email`,
//! `namePerson/friendly`, ...). SREG requests are derived through the fixed
//! [`AX_TO_SREG`] table; names without an SREG equivalent are dropped from
//! the SREG request only.

use serde::{Deserialize, Serialize};

use crate::response::ResponseBag;
use crate::url::QueryParams;

/// Attribute Exchange 1.0 namespace
pub const AX_NS: &str = "http://openid.net/srv/ax/1.0";
/// Simple Registration 1.1 namespace
pub const SREG_NS: &str = "http://openid.net/extensions/sreg/1.1";
/// OpenID+OAuth hybrid namespace
pub const OAUTH_NS: &str = "http://specs.openid.net/extensions/oauth/1.0";
/// Prefix of every AX schema type URI
pub const AX_SCHEMA_PREFIX: &str = "http://axschema.org/";

/// AX schema name to SREG field name
pub const AX_TO_SREG: &[(&str, &str)] = &[
    ("namePerson/friendly", "nickname"),
    ("contact/email", "email"),
    ("namePerson", "fullname"),
    ("birthDate", "dob"),
    ("person/gender", "gender"),
    ("contact/postalCode/home", "postcode"),
    ("contact/country/home", "country"),
    ("pref/language", "language"),
    ("pref/timezone", "timezone"),
];

/// SREG field name for an AX schema name
pub fn ax_to_sreg(ax_name: &str) -> Option<&'static str> {
    AX_TO_SREG
        .iter()
        .find(|(ax, _)| *ax == ax_name)
        .map(|(_, sreg)| *sreg)
}

/// AX schema name for an SREG field name
pub fn sreg_to_ax(sreg_name: &str) -> Option<&'static str> {
    AX_TO_SREG
        .iter()
        .find(|(_, sreg)| *sreg == sreg_name)
        .map(|(ax, _)| *ax)
}

/// One requested attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeRequest {
    /// AX schema name, e.g. `contact/email`
    pub name: String,
    /// Explicit AX alias; derived from the name when absent
    #[serde(default)]
    pub alias: Option<String>,
}

impl AttributeRequest {
    /// Request `name` under its derived alias
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
        }
    }

    /// Use an explicit alias
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Alias used in `openid.ax.*` keys (`contact/email` -> `contact_email`)
    pub fn alias(&self) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            None => self.name.replace('/', "_"),
        }
    }

    /// Full AX type URI
    pub fn type_uri(&self) -> String {
        format!("{AX_SCHEMA_PREFIX}{}", self.name)
    }
}

impl From<&str> for AttributeRequest {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for AttributeRequest {
    fn from(name: String) -> Self {
        Self::new(name)
    }
}

/// Alias to AX type URI mapping, in first-insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    entries: Vec<(String, String)>,
}

impl AliasTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `alias` to `type_uri`, keeping the alias's original position
    pub fn insert(&mut self, alias: impl Into<String>, type_uri: impl Into<String>) {
        let alias = alias.into();
        let type_uri = type_uri.into();
        match self.entries.iter_mut().find(|(a, _)| *a == alias) {
            Some(entry) => entry.1 = type_uri,
            None => self.entries.push((alias, type_uri)),
        }
    }

    /// Type URI for `alias`
    pub fn get(&self, alias: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(a, _)| a == alias)
            .map(|(_, uri)| uri.as_str())
    }

    /// Iterate `(alias, type_uri)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(a, u)| (a.as_str(), u.as_str()))
    }

    /// Number of aliases
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rebuild the table from a response alone
    ///
    /// Every signed `<ns_alias>.type.<alias>` field contributes the value of
    /// `openid_<ns_alias>_type_<alias>`.
    pub fn from_response(bag: &ResponseBag, ns_alias: &str) -> Self {
        let marker = format!("{ns_alias}.type.");
        let mut table = Self::new();
        for field in bag.signed_fields().iter() {
            let Some(alias) = field.strip_prefix(&marker) else {
                continue;
            };
            if let Some(uri) = bag.get(&format!("openid_{ns_alias}_type_{alias}")) {
                table.insert(alias, uri);
            }
        }
        table
    }
}

/// Attributes requested from the provider
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionRequest {
    #[serde(default)]
    required: Vec<AttributeRequest>,
    #[serde(default)]
    optional: Vec<AttributeRequest>,
}

impl ExtensionRequest {
    /// Nothing requested
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required attribute
    pub fn require(mut self, attribute: impl Into<AttributeRequest>) -> Self {
        self.required.push(attribute.into());
        self
    }

    /// Add an optional attribute
    pub fn request(mut self, attribute: impl Into<AttributeRequest>) -> Self {
        self.optional.push(attribute.into());
        self
    }

    /// Required attributes in request order
    pub fn required(&self) -> &[AttributeRequest] {
        &self.required
    }

    /// Optional attributes in request order
    pub fn optional(&self) -> &[AttributeRequest] {
        &self.optional
    }

    /// Whether nothing was requested
    pub fn is_empty(&self) -> bool {
        self.required.is_empty() && self.optional.is_empty()
    }

    /// SREG 1.1 request parameters
    ///
    /// The namespace is always emitted.
    pub fn sreg_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        params.set("openid.ns.sreg", SREG_NS);

        for (key, attributes) in [
            ("openid.sreg.required", &self.required),
            ("openid.sreg.optional", &self.optional),
        ] {
            if attributes.is_empty() {
                continue;
            }
            let fields: Vec<&str> = attributes
                .iter()
                .filter_map(|attribute| ax_to_sreg(&attribute.name))
                .collect();
            params.set(key, fields.join(","));
        }
        params
    }

    /// AX 1.0 `fetch_request` parameters and the alias table they define
    ///
    /// Empty when nothing was requested. `openid.ax.count.<alias>` appears only
    /// for aliases requested more than once.
    pub fn ax_params(&self) -> (QueryParams, AliasTable) {
        let mut params = QueryParams::new();
        let mut aliases = AliasTable::new();
        if self.is_empty() {
            return (params, aliases);
        }

        params.set("openid.ns.ax", AX_NS);
        params.set("openid.ax.mode", "fetch_request");

        let mut counts: Vec<(String, usize)> = Vec::new();
        let mut required = Vec::new();
        let mut optional = Vec::new();

        for (attributes, bucket) in [
            (&self.required, &mut required),
            (&self.optional, &mut optional),
        ] {
            for attribute in attributes {
                let alias = attribute.alias();
                aliases.insert(alias.clone(), attribute.type_uri());
                match counts.iter_mut().find(|(a, _)| *a == alias) {
                    Some(entry) => entry.1 += 1,
                    None => counts.push((alias.clone(), 1)),
                }
                bucket.push(alias);
            }
        }

        for (alias, uri) in aliases.iter() {
            params.set(format!("openid.ax.type.{alias}"), uri);
        }
        for (alias, count) in counts.iter().filter(|(_, count)| *count > 1) {
            params.set(format!("openid.ax.count.{alias}"), count.to_string());
        }
        if !required.is_empty() {
            params.set("openid.ax.required", required.join(","));
        }
        if !optional.is_empty() {
            params.set("openid.ax.if_available", optional.join(","));
        }

        (params, aliases)
    }
}

/// OpenID+OAuth hybrid request parameters
///
/// Empty when `scopes` is empty. The consumer key is the realm without its
/// scheme.
pub fn oauth_params(realm: &str, scopes: &[String]) -> QueryParams {
    let mut params = QueryParams::new();
    if scopes.is_empty() {
        return params;
    }
    params.set("openid.ns.oauth", OAUTH_NS);
    params.set(
        "openid.oauth.consumer",
        realm.replace("http://", "").replace("https://", ""),
    );
    params.set("openid.oauth.scope", scopes.join(" "));
    params
}
