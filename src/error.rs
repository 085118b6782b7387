// Error types for the webmention cache.
// Configuration errors are fatal at setup; everything on the data path is soft.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WebmentionError {
    #[error(
        "domain is a required option to be passed when registering the webmentions filter"
    )]
    MissingDomain,

    #[error("Invalid domain: {0}")]
    InvalidDomain(#[from] url::ParseError),

    #[error("Invalid duration {0:?}: expected <number><s|m|h|d|w|y> or *")]
    InvalidDuration(String),

    #[error("Invalid URL replacement pattern {pattern:?}: {source}")]
    InvalidUrlPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Webmention API error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webmention API returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("Missing WEBMENTION_IO_TOKEN")]
    MissingToken,

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WebmentionError {
    /// Whether this error must abort the surrounding build.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            WebmentionError::MissingDomain
                | WebmentionError::InvalidDomain(_)
                | WebmentionError::InvalidDuration(_)
                | WebmentionError::InvalidUrlPattern { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, WebmentionError>;
