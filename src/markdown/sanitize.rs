//! HTML sanitization
//!
//! Applies an allow-list [`TagPolicy`] to rendered HTML using ammonia.
//! Disallowed tags are dropped (their text survives, except for tags in
//! the content-stripped set such as `script` and `style`, which vanish
//! entirely); disallowed attributes are dropped from tags that are kept.
//! Sanitizing already-sanitized output is a no-op.

use ammonia::Builder;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};

use super::html::escape_html;
use crate::error::{ConfigError, ConfigResult};

/// Allow-list of tags, attributes and URL schemes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagPolicy {
    /// Tags that survive sanitization
    pub tags: BTreeSet<String>,
    /// Attributes allowed on every allowed tag
    pub generic_attributes: BTreeSet<String>,
    /// Extra attributes allowed per tag
    pub tag_attributes: BTreeMap<String, BTreeSet<String>>,
    /// URL schemes accepted in `href`/`src`; relative URLs always pass
    pub url_schemes: BTreeSet<String>,
    /// Tags removed together with everything inside them
    pub strip_content_tags: BTreeSet<String>,
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for TagPolicy {
    fn default() -> Self {
        let tags = set(&[
            "a", "abbr", "b", "blockquote", "br", "code", "dd", "del", "div", "dl", "dt", "em",
            "h1", "h2", "h3", "h4", "h5", "h6", "hr", "i", "img", "input", "ins", "kbd", "li",
            "ol", "p", "pre", "q", "s", "samp", "section", "span", "strong", "sub", "sup",
            "table", "tbody", "td", "tfoot", "th", "thead", "tr", "u", "ul", "var",
        ]);

        let mut tag_attributes = BTreeMap::new();
        tag_attributes.insert("a".to_string(), set(&["href", "title", "name"]));
        tag_attributes.insert(
            "img".to_string(),
            set(&["src", "alt", "title", "width", "height"]),
        );
        tag_attributes.insert("ol".to_string(), set(&["start"]));
        tag_attributes.insert("td".to_string(), set(&["colspan", "rowspan", "style"]));
        tag_attributes.insert("th".to_string(), set(&["colspan", "rowspan", "style"]));
        tag_attributes.insert("input".to_string(), set(&["type", "checked", "disabled"]));

        Self {
            tags,
            generic_attributes: set(&["class", "id"]),
            tag_attributes,
            url_schemes: set(&["http", "https", "mailto", "file"]),
            strip_content_tags: set(&["script", "style"]),
        }
    }
}

impl TagPolicy {
    /// Allow an additional tag
    pub fn allow_tag(mut self, tag: &str) -> Self {
        self.tags.insert(tag.to_string());
        self
    }

    /// Forbid a tag
    pub fn deny_tag(mut self, tag: &str) -> Self {
        self.tags.remove(tag);
        self.tag_attributes.remove(tag);
        self
    }

    /// Allow an attribute on a tag
    pub fn allow_attribute(mut self, tag: &str, attribute: &str) -> Self {
        self.tag_attributes
            .entry(tag.to_string())
            .or_default()
            .insert(attribute.to_string());
        self
    }

    /// Check the policy for contradictions ammonia refuses to work with
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(tag) = self.tags.intersection(&self.strip_content_tags).next() {
            return Err(ConfigError::InvalidValue {
                key: format!("policy.tags.{}", tag),
                reason: "tag cannot be both allowed and content-stripped".to_string(),
            });
        }
        let rel_allowed = self.generic_attributes.contains("rel")
            || self
                .tag_attributes
                .get("a")
                .map(|attrs| attrs.contains("rel"))
                .unwrap_or(false);
        if rel_allowed {
            return Err(ConfigError::InvalidValue {
                key: "policy.attributes.rel".to_string(),
                reason: "link rel is managed by the sanitizer".to_string(),
            });
        }
        Ok(())
    }

    fn builder(&self) -> Builder<'_> {
        let tags: HashSet<&str> = self.tags.iter().map(String::as_str).collect();
        let generic: HashSet<&str> = self.generic_attributes.iter().map(String::as_str).collect();
        let tag_attributes: HashMap<&str, HashSet<&str>> = self
            .tag_attributes
            .iter()
            .map(|(tag, attrs)| (tag.as_str(), attrs.iter().map(String::as_str).collect()))
            .collect();
        let schemes: HashSet<&str> = self.url_schemes.iter().map(String::as_str).collect();
        let strip: HashSet<&str> = self.strip_content_tags.iter().map(String::as_str).collect();

        let mut builder = Builder::empty();
        builder
            .tags(tags)
            .generic_attributes(generic)
            .tag_attributes(tag_attributes)
            .url_schemes(schemes)
            .clean_content_tags(strip)
            .link_rel(Some("noopener noreferrer"))
            .strip_comments(true)
            .attribute_filter(filter_attribute);
        builder
    }
}

/// Inline styles only survive as table cell alignment
fn filter_attribute<'u>(_element: &str, attribute: &str, value: &'u str) -> Option<Cow<'u, str>> {
    if attribute != "style" {
        return Some(Cow::Borrowed(value));
    }
    let value = value.trim().trim_end_matches(';').trim();
    match value {
        "text-align: left" | "text-align: center" | "text-align: right" => {
            Some(Cow::Borrowed(value))
        }
        _ => None,
    }
}

/// Sanitize an HTML fragment against a policy.
///
/// If the policy is contradictory or the sanitizer fails, the whole
/// fragment is escaped so nothing unsafe can slip through.
pub fn sanitize(html: &str, policy: &TagPolicy) -> String {
    if let Err(e) = policy.validate() {
        log::warn!("Invalid sanitization policy, escaping fragment: {}", e);
        return escape_html(html);
    }
    match catch_unwind(AssertUnwindSafe(|| policy.builder().clean(html).to_string())) {
        Ok(cleaned) => cleaned,
        Err(_) => {
            log::error!("Sanitizer failed, escaping fragment");
            escape_html(html)
        }
    }
}

/// Count elements in an HTML fragment (opening tags only)
pub(crate) fn count_tags(html: &str) -> usize {
    html.as_bytes()
        .windows(2)
        .filter(|w| w[0] == b'<' && w[1].is_ascii_alphabetic())
        .count()
}
