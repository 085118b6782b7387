// webmention.io API HTTP client.
// Handles token authentication, query building, and status checking.

use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, Response, header::USER_AGENT};
use tracing::debug;

use crate::error::{Result, WebmentionError};

use super::types::Feed;

/// Page size requested from the API; large enough to return everything.
pub const PER_PAGE: u32 = 9001;

const CLIENT_USER_AGENT: &str = concat!("webmention-cache/", env!("CARGO_PKG_VERSION"));

/// Client for the jf2 mentions endpoint.
#[derive(Debug, Clone)]
pub struct WebmentionClient {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

impl WebmentionClient {
    /// Create a client for the given endpoint and token.
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(WebmentionError::Http)?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token,
        })
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Fetch every mention of `domain`, optionally only those newer than `since`.
    pub async fn mentions(&self, domain: &str, since: Option<DateTime<Utc>>) -> Result<Feed> {
        let token = self.token.as_deref().ok_or(WebmentionError::MissingToken)?;

        let per_page = PER_PAGE.to_string();
        let mut params = vec![
            ("domain", domain.to_string()),
            ("token", token.to_string()),
            ("per-page", per_page),
        ];
        if let Some(since) = since {
            params.push(("since", since.to_rfc3339_opts(SecondsFormat::Secs, true)));
        }

        debug!(%domain, ?since, endpoint = %self.endpoint, "requesting webmentions");
        let response = self
            .client
            .get(&self.endpoint)
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .query(&params)
            .send()
            .await
            .map_err(WebmentionError::Http)?;

        let response = self.check_response(response)?;
        let feed: Feed = response.json().await?;
        Ok(feed)
    }

    /// Check response status and convert errors.
    fn check_response(&self, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(WebmentionError::Status(status))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn endpoint(server: &MockServer) -> String {
        format!("{}/api/mentions.jf2", server.uri())
    }

    #[tokio::test]
    async fn test_mentions_sends_query() {
        let server = MockServer::start().await;
        let since = Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 0).unwrap();

        Mock::given(method("GET"))
            .and(path("/api/mentions.jf2"))
            .and(query_param("domain", "example.com"))
            .and(query_param("token", "secret"))
            .and(query_param("per-page", "9001"))
            .and(query_param("since", "2024-03-01T08:30:00Z"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "type": "feed",
                "name": "Webmentions",
                "children": [{ "wm-id": 1, "wm-target": "https://example.com/" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = WebmentionClient::new(endpoint(&server), Some("secret".into())).unwrap();
        let feed = client.mentions("example.com", Some(since)).await.unwrap();

        assert_eq!(feed.len(), 1);
    }

    #[tokio::test]
    async fn test_mentions_non_success_status() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = WebmentionClient::new(endpoint(&server), Some("bad".into())).unwrap();
        let err = client.mentions("example.com", None).await.unwrap_err();

        assert!(matches!(err, WebmentionError::Status(s) if s.as_u16() == 401));
    }

    #[tokio::test]
    async fn test_mentions_without_token() {
        let client = WebmentionClient::new("http://127.0.0.1:9/unused", None).unwrap();
        assert!(!client.has_token());

        let err = client.mentions("example.com", None).await.unwrap_err();
        assert!(matches!(err, WebmentionError::MissingToken));
    }
}
