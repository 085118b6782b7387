// Webmention API response types.
// jf2 records are loosely typed, so every field is optional and unknown
// fields are carried through untouched.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const FEED_TYPE: &str = "feed";
const FEED_NAME: &str = "Webmentions";

/// Identity of a webmention. webmention.io sends integers, but strings are
/// tolerated so one odd record cannot poison the whole feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WmId {
    Number(u64),
    Text(String),
}

impl From<u64> for WmId {
    fn from(id: u64) -> Self {
        WmId::Number(id)
    }
}

/// Author card of a webmention.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Author {
    /// Display name, if present and non-empty.
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref().filter(|name| !name.is_empty())
    }
}

/// Body of a reply or mention. `value` is filled in with the display-ready
/// HTML by the query engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single webmention record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Webmention {
    #[serde(rename = "wm-id", default, skip_serializing_if = "Option::is_none")]
    pub wm_id: Option<WmId>,
    #[serde(rename = "wm-target", default, skip_serializing_if = "Option::is_none")]
    pub wm_target: Option<String>,
    #[serde(rename = "wm-property", default, skip_serializing_if = "Option::is_none")]
    pub wm_property: Option<String>,
    #[serde(rename = "wm-source", default, skip_serializing_if = "Option::is_none")]
    pub wm_source: Option<String>,
    #[serde(rename = "wm-received", default, skip_serializing_if = "Option::is_none")]
    pub wm_received: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Webmention {
    /// When the mention happened, in milliseconds since the epoch.
    /// Prefers `published`, falling back to `wm-received`.
    pub fn effective_timestamp(&self) -> Option<i64> {
        let raw = self
            .published
            .as_deref()
            .filter(|p| !p.is_empty())
            .or(self.wm_received.as_deref())?;
        parse_timestamp(raw)
    }

    /// Sort key; records without a usable timestamp sort as the oldest.
    pub fn sort_key(&self) -> i64 {
        self.effective_timestamp().unwrap_or(i64::MIN)
    }

    /// Whether the record has an author with a non-empty display name.
    pub fn has_named_author(&self) -> bool {
        self.author
            .as_ref()
            .and_then(Author::display_name)
            .is_some()
    }
}

/// The persisted collection of webmentions, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feed {
    #[serde(rename = "type", default = "feed_type")]
    pub kind: String,
    #[serde(default = "feed_name")]
    pub name: String,
    #[serde(default)]
    pub children: Vec<Webmention>,
}

impl Default for Feed {
    fn default() -> Self {
        Self {
            kind: feed_type(),
            name: feed_name(),
            children: Vec::new(),
        }
    }
}

impl Feed {
    pub fn new(children: Vec<Webmention>) -> Self {
        Self {
            children,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Stable sort by effective timestamp, newest first.
    pub fn sort_newest_first(&mut self) {
        self.children
            .sort_by_key(|mention| std::cmp::Reverse(mention.sort_key()));
    }
}

fn feed_type() -> String {
    FEED_TYPE.to_string()
}

fn feed_name() -> String {
    FEED_NAME.to_string()
}

/// Parse the timestamp formats seen in jf2 feeds into epoch milliseconds.
pub fn parse_timestamp(value: &str) -> Option<i64> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt.timestamp_millis());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc().timestamp_millis());
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mention(published: Option<&str>, received: Option<&str>) -> Webmention {
        Webmention {
            published: published.map(str::to_string),
            wm_received: received.map(str::to_string),
            ..Webmention::default()
        }
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Some(1_577_880_000_000);
        assert_eq!(parse_timestamp("2020-01-01T12:00:00Z"), expected);
        assert_eq!(parse_timestamp("2020-01-01T12:00:00+00:00"), expected);
        assert_eq!(parse_timestamp("2020-01-01T13:00:00+0100"), expected);
        assert_eq!(parse_timestamp("2020-01-01T12:00:00"), expected);
        assert_eq!(parse_timestamp("2020-01-01"), Some(1_577_836_800_000));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_effective_timestamp_prefers_published() {
        let m = mention(Some("2020-01-02T00:00:00Z"), Some("2020-01-05T00:00:00Z"));
        assert_eq!(m.effective_timestamp(), parse_timestamp("2020-01-02T00:00:00Z"));

        let m = mention(None, Some("2020-01-05T00:00:00Z"));
        assert_eq!(m.effective_timestamp(), parse_timestamp("2020-01-05T00:00:00Z"));

        let m = mention(Some(""), Some("2020-01-05T00:00:00Z"));
        assert_eq!(m.effective_timestamp(), parse_timestamp("2020-01-05T00:00:00Z"));

        assert_eq!(mention(None, None).effective_timestamp(), None);
    }

    #[test]
    fn test_deserialize_jf2_record() {
        let json = r#"{
            "type": "entry",
            "author": { "type": "card", "name": "Ada", "photo": "https://a/p.jpg", "url": "" },
            "url": "https://source.example/reply",
            "published": null,
            "wm-received": "2020-01-01T12:00:00Z",
            "wm-id": 900,
            "wm-source": "https://source.example/reply",
            "wm-target": "https://example.com/post/",
            "content": { "html": "<p>Hi</p>", "text": "Hi" },
            "in-reply-to": "https://example.com/post/",
            "wm-property": "in-reply-to",
            "wm-private": false
        }"#;
        let m: Webmention = serde_json::from_str(json).unwrap();

        assert_eq!(m.wm_id, Some(WmId::Number(900)));
        assert_eq!(m.wm_property.as_deref(), Some("in-reply-to"));
        assert!(m.published.is_none());
        assert!(m.has_named_author());
        assert_eq!(m.content.as_ref().unwrap().html.as_deref(), Some("<p>Hi</p>"));
        assert_eq!(m.extra.get("type"), Some(&Value::from("entry")));
        assert_eq!(m.extra.get("wm-private"), Some(&Value::from(false)));

        let back = serde_json::to_value(&m).unwrap();
        assert_eq!(back["in-reply-to"], "https://example.com/post/");
        assert_eq!(back["author"]["type"], "card");
    }

    #[test]
    fn test_has_named_author() {
        let mut m = Webmention::default();
        assert!(!m.has_named_author());

        m.author = Some(Author {
            name: Some(String::new()),
            ..Author::default()
        });
        assert!(!m.has_named_author());

        m.author = Some(Author {
            name: Some("Grace".to_string()),
            ..Author::default()
        });
        assert!(m.has_named_author());
    }

    #[test]
    fn test_feed_defaults_and_sort() {
        let feed: Feed = serde_json::from_str(r#"{ "children": [] }"#).unwrap();
        assert_eq!(feed.kind, "feed");
        assert_eq!(feed.name, "Webmentions");

        let mut feed = Feed::new(vec![
            mention(Some("2020-01-01T00:00:00Z"), None),
            mention(None, None),
            mention(Some("2021-01-01T00:00:00Z"), None),
        ]);
        feed.sort_newest_first();

        let order: Vec<_> = feed.children.iter().map(Webmention::sort_key).collect();
        assert_eq!(order[0], parse_timestamp("2021-01-01T00:00:00Z").unwrap());
        assert_eq!(order[2], i64::MIN);
    }
}
