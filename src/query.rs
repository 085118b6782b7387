// Per-page query engine.
// Selects a page's webmentions, hides anonymous ones, prepares display
// content, and orders them oldest first.

use std::collections::{HashMap, HashSet};

use ammonia::Builder;
use tracing::warn;
use url::Url;

use crate::config::{AllowedHtml, Settings};
use crate::group::{GroupedIndex, normalize_target};
use crate::webmention::Webmention;

/// Tags whose content ammonia drops unless the policy allows the tag itself.
const CLEAN_CONTENT_TAGS: [&str; 2] = ["script", "style"];

/// HTML sanitizer configured from an allow-list policy. Build once, clean many.
#[derive(Debug)]
pub struct Sanitizer<'a> {
    builder: Builder<'a>,
}

impl<'a> Sanitizer<'a> {
    pub fn new(policy: &'a AllowedHtml) -> Self {
        Self {
            builder: build_sanitizer(policy),
        }
    }

    pub fn clean(&self, html: &str) -> String {
        self.builder.clean(html).to_string()
    }
}

fn build_sanitizer(policy: &AllowedHtml) -> Builder<'_> {
    let tags: HashSet<&str> = policy.allowed_tags.iter().map(String::as_str).collect();
    let tag_attributes: HashMap<&str, HashSet<&str>> = policy
        .allowed_attributes
        .iter()
        .map(|(tag, attrs)| {
            (
                tag.as_str(),
                attrs.iter().map(String::as_str).collect::<HashSet<_>>(),
            )
        })
        .collect();
    let allowed_content_tags: Vec<&str> = CLEAN_CONTENT_TAGS
        .iter()
        .copied()
        .filter(|tag| tags.contains(tag))
        .collect();

    let mut builder = Builder::default();
    builder
        .tags(tags)
        .tag_attributes(tag_attributes)
        .generic_attributes(HashSet::new())
        .link_rel(None);
    builder.rm_clean_content_tags(&allowed_content_tags);
    builder
}

/// Display content used in place of bodies longer than the configured limit.
pub fn overflow_content(source: &str) -> String {
    format!("mentioned this in <a href=\"{source}\">{source}</a>")
}

/// Resolve a page URL against the site domain and normalize it into a bucket key.
pub fn resolve_page_url(page_url: &str, domain: &Url) -> String {
    match domain.join(page_url) {
        Ok(resolved) => normalize_target(resolved.as_str(), &[]),
        Err(err) => {
            warn!(
                url = %page_url,
                base = %domain,
                error = %err,
                "could not resolve page URL against domain"
            );
            normalize_target(page_url, &[])
        }
    }
}

/// Webmentions for `page_url`, ready for display and sorted oldest first.
/// `allowed_types` filters on `wm-property` when it is a non-empty list.
pub fn query(
    index: &GroupedIndex,
    page_url: &str,
    allowed_types: Option<&[String]>,
    settings: &Settings,
) -> Vec<Webmention> {
    if index.is_empty() {
        return Vec::new();
    }

    let url = resolve_page_url(page_url, &settings.domain);
    let Some(mentions) = index.get(&url) else {
        return Vec::new();
    };

    let allowed_types = allowed_types.filter(|types| !types.is_empty());
    let sanitizer = Sanitizer::new(&settings.allowed_html);

    let mut results: Vec<Webmention> = mentions
        .iter()
        .filter(|mention| match allowed_types {
            Some(types) => mention
                .wm_property
                .as_ref()
                .is_some_and(|property| types.contains(property)),
            None => true,
        })
        .filter(|mention| mention.has_named_author())
        .cloned()
        .map(|mention| prepare_content(mention, &sanitizer, settings.maximum_html_length))
        .collect();

    results.sort_by_key(Webmention::sort_key);
    results
}

/// Fill `content.value` with sanitized HTML, or the overflow link when the
/// HTML body is longer than `maximum_html_length` characters.
fn prepare_content(
    mut mention: Webmention,
    sanitizer: &Sanitizer<'_>,
    maximum_html_length: usize,
) -> Webmention {
    let source = mention.wm_source.clone().unwrap_or_default();
    let Some(content) = mention.content.as_mut() else {
        return mention;
    };

    let value = match content.html.as_deref() {
        Some(html) if html.chars().count() > maximum_html_length => overflow_content(&source),
        Some(html) if !html.is_empty() => sanitizer.clean(html),
        _ => sanitizer.clean(content.text.as_deref().unwrap_or_default()),
    };
    content.value = Some(value);

    mention
}
