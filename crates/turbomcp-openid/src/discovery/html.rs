//! `<link>`/`<meta>` tag scanning for HTML-based discovery

use regex::Regex;

/// Value of `value_name` on the first `tag` whose `attr_name` contains `attr_value`
///
/// Matching is case-insensitive and tolerates either attribute order. Returns
/// `None` when no such tag exists; absence is a normal negative result.
pub fn html_tag(
    content: &str,
    tag: &str,
    attr_name: &str,
    attr_value: &str,
    value_name: &str,
) -> Option<String> {
    let tag = regex::escape(tag);
    let attr_name = regex::escape(attr_name);
    let attr_value = regex::escape(attr_value);
    let value_name = regex::escape(value_name);

    let attr_first = Regex::new(&format!(
        r#"(?i)<{tag}[^>]*{attr_name}=['"]([^'"]*{attr_value}[^'"]*)['"][^>]*{value_name}=['"](.+?)['"][^>]*/?>"#
    ))
    .ok()?;
    if let Some(caps) = attr_first.captures(content) {
        return caps.get(2).map(|m| m.as_str().to_string());
    }

    let value_first = Regex::new(&format!(
        r#"(?i)<{tag}[^>]*{value_name}=['"](.+?)['"][^>]*{attr_name}=['"]([^'"]*{attr_value}[^'"]*)['"][^>]*/?>"#
    ))
    .ok()?;
    value_first
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
