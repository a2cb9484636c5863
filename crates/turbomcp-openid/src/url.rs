//! URL codec
//!
//! Splits URLs into their parts, merges a set of override parts into a base
//! URL, and builds ordered `application/x-www-form-urlencoded` query strings.
//!
//! Merging follows one rule that auth-URL construction relies on: parts
//! present in the override replace the base, except the query, which is
//! concatenated (`base&override`) so an endpoint's existing query survives.
//! Locations found during discovery are references instead and go through
//! [`resolve_reference`].

use ::url::form_urlencoded;

use crate::error::{OpenIdError, Result};

/// The components of a URL, any of which may be absent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlParts {
    /// Scheme without the `://`
    pub scheme: Option<String>,
    /// Userinfo user
    pub username: Option<String>,
    /// Userinfo password
    pub password: Option<String>,
    /// Host name or address
    pub host: Option<String>,
    /// Explicit, non-default port
    pub port: Option<u16>,
    /// Path including the leading `/`
    pub path: Option<String>,
    /// Query without the leading `?`
    pub query: Option<String>,
    /// Fragment without the leading `#`
    pub fragment: Option<String>,
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl UrlParts {
    /// Parse an absolute URL or a relative reference (`/path?query#frag`)
    ///
    /// # Errors
    ///
    /// Returns [`OpenIdError::InvalidUrl`] if the input is neither.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        match ::url::Url::parse(input) {
            Ok(parsed) => Ok(Self {
                scheme: Some(parsed.scheme().to_string()),
                username: non_empty(parsed.username()),
                password: parsed.password().and_then(non_empty),
                host: parsed.host_str().map(str::to_string),
                port: parsed.port(),
                path: non_empty(parsed.path()),
                query: parsed.query().and_then(non_empty),
                fragment: parsed.fragment().and_then(non_empty),
            }),
            Err(::url::ParseError::RelativeUrlWithoutBase) => Ok(Self::parse_relative(input)),
            Err(e) => Err(OpenIdError::invalid_url(input, e)),
        }
    }

    fn parse_relative(input: &str) -> Self {
        let (rest, fragment) = match input.split_once('#') {
            Some((rest, fragment)) => (rest, non_empty(fragment)),
            None => (input, None),
        };
        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, non_empty(query)),
            None => (rest, None),
        };
        Self {
            path: non_empty(path),
            query,
            fragment,
            ..Self::default()
        }
    }

    /// Parts consisting only of a query string
    pub fn with_query(query: impl Into<String>) -> Self {
        Self {
            query: non_empty(&query.into()),
            ..Self::default()
        }
    }

    /// Overlay `overrides` onto `self`
    ///
    /// Every part present in `overrides` wins; when both sides carry a query
    /// the result is `self.query & overrides.query`.
    pub fn merge(self, overrides: UrlParts) -> UrlParts {
        let query = match (self.query, overrides.query) {
            (Some(base), Some(extra)) => Some(format!("{base}&{extra}")),
            (base, extra) => extra.or(base),
        };
        UrlParts {
            scheme: overrides.scheme.or(self.scheme),
            username: overrides.username.or(self.username),
            password: overrides.password.or(self.password),
            host: overrides.host.or(self.host),
            port: overrides.port.or(self.port),
            path: overrides.path.or(self.path),
            query,
            fragment: overrides.fragment.or(self.fragment),
        }
    }

    /// Serialize back into an absolute URL string
    ///
    /// # Errors
    ///
    /// Returns [`OpenIdError::InvalidUrl`] if the scheme or host is missing.
    pub fn to_url_string(&self) -> Result<String> {
        let (Some(scheme), Some(host)) = (&self.scheme, &self.host) else {
            return Err(OpenIdError::invalid_url(
                format!("{self:?}"),
                "scheme and host are required",
            ));
        };

        let mut out = format!("{scheme}://");
        if let Some(user) = &self.username {
            out.push_str(user);
            if let Some(pass) = &self.password {
                out.push(':');
                out.push_str(pass);
            }
            out.push('@');
        }
        out.push_str(host);
        if let Some(port) = self.port {
            out.push_str(&format!(":{port}"));
        }
        if let Some(path) = &self.path {
            out.push_str(path);
        }
        if let Some(query) = &self.query {
            out.push('?');
            out.push_str(query);
        }
        if let Some(fragment) = &self.fragment {
            out.push('#');
            out.push_str(fragment);
        }
        Ok(out)
    }
}

/// Resolve a location reference against the URL it was found on
///
/// Relative paths, `//authority` references and absolute URLs all resolve
/// the way a browser would.
///
/// # Errors
///
/// Returns [`OpenIdError::InvalidUrl`] if `base` is not absolute or the
/// reference cannot be joined onto it.
pub fn resolve_reference(base: &str, reference: &str) -> Result<String> {
    let base_url = ::url::Url::parse(base).map_err(|e| OpenIdError::invalid_url(base, e))?;
    base_url
        .join(reference)
        .map(String::from)
        .map_err(|e| OpenIdError::invalid_url(reference, e))
}

/// Merge an encoded query string into `base`, keeping any existing query
///
/// # Errors
///
/// Returns [`OpenIdError::InvalidUrl`] if `base` is not an absolute URL.
pub fn with_query(base: &str, query: &str) -> Result<String> {
    UrlParts::parse(base)?
        .merge(UrlParts::with_query(query))
        .to_url_string()
}

/// Append one form-encoded parameter to a URL string without reparsing it
///
/// Uses `&` when the URL already contains a `?` after its first character.
pub fn append_query_param(url: &str, key: &str, value: &str) -> String {
    let separator = match url.find('?') {
        Some(pos) if pos > 0 => '&',
        _ => '?',
    };
    let encoded: String = form_urlencoded::byte_serialize(value.as_bytes()).collect();
    format!("{url}{separator}{key}={encoded}")
}

/// Compare two URLs ignoring any fragment
pub fn same_resource(a: &str, b: &str) -> bool {
    let strip = |s: &str| s.split('#').next().unwrap_or_default().to_string();
    strip(a) == strip(b)
}

/// Ordered query parameters
///
/// Keeps insertion order so the emitted query string is deterministic.
/// [`QueryParams::set`] overwrites in place, [`QueryParams::extend_missing`]
/// only adds keys not yet present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, replacing its value if present
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(pair) => pair.1 = value,
            None => self.pairs.push((key, value)),
        }
    }

    /// Add every pair of `other` whose key is not already present
    pub fn extend_missing(&mut self, other: QueryParams) {
        for (key, value) in other.pairs {
            if self.get(&key).is_none() {
                self.pairs.push((key, value));
            }
        }
    }

    /// Value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether `key` is present
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterate pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of pairs
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether there are no pairs
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Form-encode as `k=v&k=v`
    pub fn encode(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in &self.pairs {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = QueryParams::new();
        for (key, value) in iter {
            params.set(key, value);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_absolute() {
        let parts = UrlParts::parse("https://user:pw@op.example.com:8443/auth?a=1#top").unwrap();
        assert_eq!(parts.scheme.as_deref(), Some("https"));
        assert_eq!(parts.username.as_deref(), Some("user"));
        assert_eq!(parts.password.as_deref(), Some("pw"));
        assert_eq!(parts.host.as_deref(), Some("op.example.com"));
        assert_eq!(parts.port, Some(8443));
        assert_eq!(parts.path.as_deref(), Some("/auth"));
        assert_eq!(parts.query.as_deref(), Some("a=1"));
        assert_eq!(parts.fragment.as_deref(), Some("top"));
    }

    #[test]
    fn test_parse_relative() {
        let parts = UrlParts::parse("/xrds?user=bob").unwrap();
        assert_eq!(parts.scheme, None);
        assert_eq!(parts.path.as_deref(), Some("/xrds"));
        assert_eq!(parts.query.as_deref(), Some("user=bob"));
    }

    #[test]
    fn test_resolve_reference_relative_path() {
        let url = resolve_reference("https://example.com/id/bob", "xrds").unwrap();
        assert_eq!(url, "https://example.com/id/xrds");

        let url = resolve_reference("https://example.com/id/bob/", "../xrds?v=2").unwrap();
        assert_eq!(url, "https://example.com/id/xrds?v=2");
    }

    #[test]
    fn test_resolve_reference_authority_and_absolute() {
        let url = resolve_reference("https://example.com/id/bob", "//cdn.example/x").unwrap();
        assert_eq!(url, "https://cdn.example/x");

        let url = resolve_reference("https://example.com/id/bob", "/xrds/bob").unwrap();
        assert_eq!(url, "https://example.com/xrds/bob");

        let url = resolve_reference("https://example.com/id", "http://yadis.example.org/x").unwrap();
        assert_eq!(url, "http://yadis.example.org/x");
    }

    #[test]
    fn test_resolve_reference_requires_absolute_base() {
        assert!(matches!(
            resolve_reference("/id/bob", "xrds"),
            Err(OpenIdError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_queries_are_concatenated() {
        let url = with_query("https://op.example.com/server?tenant=7", "openid.mode=x").unwrap();
        assert_eq!(url, "https://op.example.com/server?tenant=7&openid.mode=x");
    }

    #[test]
    fn test_default_port_is_omitted() {
        let url = with_query("https://example.com:443/a", "b=1").unwrap();
        assert_eq!(url, "https://example.com/a?b=1");
    }

    #[test]
    fn test_to_url_string_requires_host() {
        assert!(UrlParts::with_query("a=1").to_url_string().is_err());
    }

    #[test]
    fn test_append_query_param() {
        assert_eq!(
            append_query_param("https://rp.example.com/cb", "openid.claimed_id", "https://a/b?c"),
            "https://rp.example.com/cb?openid.claimed_id=https%3A%2F%2Fa%2Fb%3Fc"
        );
        assert_eq!(
            append_query_param("https://rp.example.com/cb?x=1", "k", "v w"),
            "https://rp.example.com/cb?x=1&k=v+w"
        );
    }

    #[test]
    fn test_same_resource_ignores_fragment() {
        assert!(same_resource("https://a/b#one", "https://a/b"));
        assert!(!same_resource("https://a/b", "https://a/c"));
    }

    #[test]
    fn test_query_params_semantics() {
        let mut params = QueryParams::new();
        params.set("openid.mode", "checkid_setup");
        params.set("openid.ns", "a");
        params.set("openid.mode", "checkid_immediate");
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("openid.mode"), Some("checkid_immediate"));

        let other: QueryParams = [("openid.ns", "b"), ("openid.realm", "r")]
            .into_iter()
            .collect();
        params.extend_missing(other);
        assert_eq!(params.get("openid.ns"), Some("a"));
        assert_eq!(params.get("openid.realm"), Some("r"));
        assert_eq!(
            params.encode(),
            "openid.mode=checkid_immediate&openid.ns=a&openid.realm=r"
        );
    }
}
