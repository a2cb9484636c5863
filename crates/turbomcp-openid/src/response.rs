//! Inbound provider response parameters
//!
//! The provider redirects back with `openid.*` query parameters. Hosting
//! layers conventionally hand these over with `.` mangled to `_`
//! (`openid.ns.ax` arrives as `openid_ns_ax`), and every lookup here uses
//! the mangled form. A [`ResponseBag`] is untrusted until
//! [`ResponseValidator`](crate::validator::ResponseValidator) accepts it.

use ::url::form_urlencoded;

use crate::discovery::OPENID2_NS;

const NS_PREFIX: &str = "openid_ns_";

/// Mangle a raw parameter name the way form-decoding hosts do
fn mangle(key: &str) -> String {
    key.chars()
        .map(|c| if c == '.' || c == ' ' { '_' } else { c })
        .collect()
}

/// Inbound `openid_*` parameters in arrival order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseBag {
    fields: Vec<(String, String)>,
}

impl ResponseBag {
    /// Empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Bag from already-mangled `(name, value)` pairs
    ///
    /// A repeated name keeps its first position and its last value.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut bag = Self::new();
        for (key, value) in pairs {
            bag.insert(key, value);
        }
        bag
    }

    /// Bag from a raw query or form body (`openid.mode=id_res&...`)
    ///
    /// A leading `?` is ignored. Names are mangled (`.` and space become `_`).
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        Self::from_pairs(
            form_urlencoded::parse(query.as_bytes())
                .map(|(key, value)| (mangle(&key), value.into_owned())),
        )
    }

    /// Insert or replace a field
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(field) => field.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    /// Value of a mangled field name
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether the field is present
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterate fields in arrival order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the bag is empty
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// `openid_mode`
    pub fn mode(&self) -> Option<&str> {
        self.get("openid_mode")
    }

    /// Whether `openid_ns` is the OpenID 2.0 namespace
    pub fn is_v2(&self) -> bool {
        self.get("openid_ns") == Some(OPENID2_NS)
    }

    /// The provider's signed field list (`openid_signed`)
    pub fn signed_fields(&self) -> SignedFieldList {
        self.get("openid_signed")
            .map(SignedFieldList::parse)
            .unwrap_or_default()
    }

    /// Declared extension namespaces as `(alias, uri)`, in arrival order
    pub fn namespaces(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter_map(|(key, value)| {
            key.strip_prefix(NS_PREFIX)
                .filter(|alias| !alias.is_empty())
                .map(|alias| (alias, value))
        })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ResponseBag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

/// Field names covered by the provider's signature, in signed order
///
/// Names are unmangled (`ax.type.email`, `sreg.nickname`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignedFieldList {
    fields: Vec<String>,
}

impl SignedFieldList {
    /// Parse a comma-separated `openid.signed` value
    pub fn parse(value: &str) -> Self {
        Self {
            fields: value
                .split(',')
                .filter(|field| !field.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Iterate signed field names
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    /// Whether `field` is signed
    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    /// Number of signed fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether nothing is signed
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
