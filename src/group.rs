// Grouping and deduplication.
// Buckets the feed by normalized target URL and drops repeated wm-ids.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use crate::config::UrlRewrite;
use crate::webmention::{Feed, Webmention};

/// Webmentions keyed by normalized target URL. Derived, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct GroupedIndex {
    buckets: BTreeMap<String, Vec<Webmention>>,
}

impl GroupedIndex {
    /// Mentions of exactly this normalized URL.
    pub fn get(&self, url: &str) -> Option<&[Webmention]> {
        self.buckets.get(url).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Partition `feed` by normalized `wm-target`, keeping feed order within each
/// bucket, then keep only the first record seen for each wm-id.
pub fn group(feed: &Feed, rewrites: &[UrlRewrite]) -> GroupedIndex {
    let mut buckets: BTreeMap<String, Vec<Webmention>> = BTreeMap::new();

    for mention in &feed.children {
        let Some(target) = mention.wm_target.as_deref() else {
            debug!(wm_id = ?mention.wm_id, "skipping webmention without wm-target");
            continue;
        };

        buckets
            .entry(normalize_target(target, rewrites))
            .or_default()
            .push(mention.clone());
    }

    for mentions in buckets.values_mut() {
        dedupe_by_id(mentions);
    }

    GroupedIndex { buckets }
}

/// First occurrence wins. Records without a wm-id are all kept.
fn dedupe_by_id(mentions: &mut Vec<Webmention>) {
    let mut seen = HashSet::new();
    mentions.retain(|mention| match &mention.wm_id {
        Some(id) => seen.insert(id.clone()),
        None => true,
    });
}

/// Normalize a target URL into its bucket key: add a trailing slash when the
/// URL has no query or fragment, apply the rewrite rules in order, then keep
/// only scheme, host and path.
pub fn normalize_target(target: &str, rewrites: &[UrlRewrite]) -> String {
    let mut url = target.trim().to_string();
    if !url.contains(['?', '#']) && !url.ends_with('/') {
        url.push('/');
    }

    let url = rewrites
        .iter()
        .fold(url, |current, rule| rule.apply(&current));

    match Url::parse(&url) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.set_query(None);
            parsed.into()
        }
        Err(err) => {
            warn!(%url, error = %err, "webmention target is not an absolute URL");
            strip_query_and_fragment(&url).to_string()
        }
    }
}

fn strip_query_and_fragment(url: &str) -> &str {
    let without_fragment = url.split('#').next().unwrap_or(url);
    without_fragment
        .split('?')
        .next()
        .unwrap_or(without_fragment)
}
