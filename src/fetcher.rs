// Incremental fetcher.
// Serves the cached feed while fresh, otherwise asks the API for mentions
// newer than the last write and merges them in.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::FeedStore;
use crate::config::Settings;
use crate::error::Result;
use crate::webmention::{Feed, WebmentionClient};

pub struct Fetcher {
    store: FeedStore,
    client: WebmentionClient,
    key: String,
    hostname: String,
    duration: Duration,
    max_cache_age: Duration,
}

impl Fetcher {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = WebmentionClient::new(settings.endpoint.clone(), settings.token.clone())?;
        Ok(Self::with_parts(
            FeedStore::new(settings.cache_dir.clone()),
            client,
            settings,
        ))
    }

    pub fn with_parts(store: FeedStore, client: WebmentionClient, settings: &Settings) -> Self {
        Self {
            store,
            client,
            key: settings.key.clone(),
            hostname: settings.hostname().to_string(),
            duration: settings.duration,
            max_cache_age: settings.max_cache_age,
        }
    }

    pub fn store(&self) -> &FeedStore {
        &self.store
    }

    /// Return the feed, refreshing it from the API when the cache is stale.
    /// Never fails: remote and store errors degrade to the data already held.
    pub async fn fetch(&self) -> Feed {
        // Only a feed that survived the backstop can short-circuit the network.
        let (mut feed, since) = match self.store.entry(&self.key) {
            Some(cached) if cached.is_valid(self.max_cache_age) => {
                if cached.is_valid(self.duration) {
                    debug!(key = %self.key, count = cached.data.len(), "webmention cache is fresh");
                    return cached.data;
                }
                (cached.data, Some(cached.cached_at))
            }
            _ => (Feed::default(), None),
        };

        let fresh = match self.client.mentions(&self.hostname, since).await {
            Ok(fresh) => fresh,
            Err(err) => {
                warn!(
                    domain = %self.hostname,
                    error = %err,
                    "could not fetch webmentions, using cached data"
                );
                return feed;
            }
        };

        if !fresh.is_empty() {
            info!(
                "[{}] {} new Webmentions fetched into cache.",
                self.hostname,
                fresh.len()
            );
        }

        let mut children = fresh.children;
        children.append(&mut feed.children);
        feed.children = children;
        feed.sort_newest_first();

        if let Err(err) = self.store.write(&self.key, &feed) {
            warn!(key = %self.key, error = %err, "could not persist webmention cache");
        }

        feed
    }
}
