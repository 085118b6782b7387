// Plugin configuration.
// Parses user options, applies defaults, and validates them into Settings.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache;
use crate::error::{Result, WebmentionError};

/// Default refresh window: 23 hours.
pub const DEFAULT_DURATION: Duration = Duration::from_secs(23 * 60 * 60);

/// Backstop window after which a cached feed is discarded entirely: 9001 years.
pub const DEFAULT_MAX_CACHE_AGE: Duration = Duration::from_secs(9001 * 365 * 24 * 60 * 60);

pub const DEFAULT_KEY: &str = "webmentions";

pub const DEFAULT_MAXIMUM_HTML_LENGTH: usize = 2000;

pub const DEFAULT_ENDPOINT: &str = "https://webmention.io/api/mentions.jf2";

/// Environment variable holding the webmention.io API token.
pub const TOKEN_ENV_VAR: &str = "WEBMENTION_IO_TOKEN";

/// Sanitizer policy: which tags survive and which attributes each tag may keep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AllowedHtml {
    pub allowed_tags: Vec<String>,
    pub allowed_attributes: BTreeMap<String, Vec<String>>,
}

impl Default for AllowedHtml {
    fn default() -> Self {
        Self {
            allowed_tags: ["b", "i", "em", "strong", "a"]
                .iter()
                .map(|t| t.to_string())
                .collect(),
            allowed_attributes: BTreeMap::from([("a".to_string(), vec!["href".to_string()])]),
        }
    }
}

/// User-facing options, as written in a site's configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Options {
    pub domain: Option<String>,
    #[serde(deserialize_with = "deserialize_duration")]
    pub duration: Duration,
    pub key: String,
    #[serde(rename = "allowedHTML")]
    pub allowed_html: AllowedHtml,
    #[serde(deserialize_with = "deserialize_replacements")]
    pub url_replacements: Vec<(String, String)>,
    pub maximum_html_length: usize,
    pub cache_dir: Option<PathBuf>,
    #[serde(deserialize_with = "deserialize_duration")]
    pub max_cache_age: Duration,
    pub endpoint: String,
    /// Secret token. Never read from option files.
    #[serde(skip)]
    pub token: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            domain: None,
            duration: DEFAULT_DURATION,
            key: DEFAULT_KEY.to_string(),
            allowed_html: AllowedHtml::default(),
            url_replacements: Vec::new(),
            maximum_html_length: DEFAULT_MAXIMUM_HTML_LENGTH,
            cache_dir: None,
            max_cache_age: DEFAULT_MAX_CACHE_AGE,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            token: None,
        }
    }
}

impl Options {
    /// Options for a domain with every other field defaulted.
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: Some(domain.into()),
            ..Self::default()
        }
    }

    /// Load options from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let options = serde_json::from_str(&contents)?;
        Ok(options)
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    /// Validate options and compile them into runtime settings.
    pub fn validate(self) -> Result<Settings> {
        let domain = match self.domain.as_deref().map(str::trim) {
            Some(domain) if !domain.is_empty() => parse_domain(domain)?,
            _ => return Err(WebmentionError::MissingDomain),
        };

        let url_rewrites = self
            .url_replacements
            .iter()
            .map(|(pattern, replacement)| UrlRewrite::new(pattern, replacement))
            .collect::<Result<Vec<_>>>()?;

        let cache_dir = self.cache_dir.unwrap_or_else(cache::default_cache_dir);

        Ok(Settings {
            domain,
            duration: self.duration,
            max_cache_age: self.max_cache_age,
            key: self.key,
            allowed_html: self.allowed_html,
            url_rewrites,
            maximum_html_length: self.maximum_html_length,
            cache_dir,
            endpoint: self.endpoint,
            token: self.token,
        })
    }
}

/// Validated configuration handed to the store, fetcher and query engine.
#[derive(Debug, Clone)]
pub struct Settings {
    pub domain: Url,
    pub duration: Duration,
    pub max_cache_age: Duration,
    pub key: String,
    pub allowed_html: AllowedHtml,
    pub url_rewrites: Vec<UrlRewrite>,
    pub maximum_html_length: usize,
    pub cache_dir: PathBuf,
    pub endpoint: String,
    pub token: Option<String>,
}

impl Settings {
    /// Host portion of the configured domain, as sent to the API.
    pub fn hostname(&self) -> &str {
        self.domain.host_str().unwrap_or_default()
    }
}

/// One ordered pattern -> replacement rule applied to webmention targets.
#[derive(Debug, Clone)]
pub struct UrlRewrite {
    pattern: Regex,
    replacement: String,
}

impl UrlRewrite {
    pub fn new(pattern: &str, replacement: &str) -> Result<Self> {
        let compiled = Regex::new(pattern).map_err(|source| WebmentionError::InvalidUrlPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            pattern: compiled,
            replacement: replacement.to_string(),
        })
    }

    /// Replace every match in `input`.
    pub fn apply(&self, input: &str) -> String {
        self.pattern
            .replace_all(input, self.replacement.as_str())
            .into_owned()
    }
}

fn parse_domain(domain: &str) -> Result<Url> {
    if domain.contains("//") {
        return Ok(Url::parse(domain)?);
    }
    Ok(Url::parse(&format!("https://{domain}"))?)
}

/// Parse a humanized duration such as `30s`, `23h`, `2w` or `9001y`.
/// `*` means the entry never expires.
pub fn parse_duration(value: &str) -> Result<Duration> {
    let value = value.trim();
    if value == "*" {
        return Ok(Duration::MAX);
    }

    let invalid = || WebmentionError::InvalidDuration(value.to_string());
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(invalid)?;
    let (amount, unit) = value.split_at(split);
    let amount: u64 = amount.parse().map_err(|_| invalid())?;

    let seconds_per_unit = match unit {
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        "w" => 7 * 24 * 60 * 60,
        "y" => 365 * 24 * 60 * 60,
        _ => return Err(invalid()),
    };

    amount
        .checked_mul(seconds_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(invalid)
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_duration(&raw).map_err(de::Error::custom)
}

/// Accepts either `[["pattern", "replacement"], ...]` or an object whose
/// entries are applied in document order.
fn deserialize_replacements<'de, D>(
    deserializer: D,
) -> std::result::Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct ReplacementsVisitor;

    impl<'de> Visitor<'de> for ReplacementsVisitor {
        type Value = Vec<(String, String)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a list of [pattern, replacement] pairs or a pattern map")
        }

        fn visit_seq<A: SeqAccess<'de>>(
            self,
            mut seq: A,
        ) -> std::result::Result<Self::Value, A::Error> {
            let mut rules = Vec::new();
            while let Some(rule) = seq.next_element::<(String, String)>()? {
                rules.push(rule);
            }
            Ok(rules)
        }

        fn visit_map<A: MapAccess<'de>>(
            self,
            mut map: A,
        ) -> std::result::Result<Self::Value, A::Error> {
            let mut rules = Vec::new();
            while let Some(rule) = map.next_entry::<String, String>()? {
                rules.push(rule);
            }
            Ok(rules)
        }
    }

    deserializer.deserialize_any(ReplacementsVisitor)
}
