// Templating integration.
// Wires fetch -> group -> query behind one handle and exposes it as an async
// template filter with direct-return and callback calling conventions.

use std::sync::Arc;

use crate::cache::FeedStore;
use crate::config::{Options, Settings};
use crate::error::{Result, WebmentionError};
use crate::fetcher::Fetcher;
use crate::group::{GroupedIndex, group};
use crate::query::query;
use crate::webmention::{Feed, Webmention};

/// Name under which the filter is registered with the template engine.
pub const FILTER_NAME: &str = "getWebmentions";

/// Template engines that can host an async filter.
pub trait FilterRegistry {
    fn add_async_filter(&mut self, name: &str, filter: WebmentionFilter);
}

/// Validate `options` and register the webmentions filter.
/// Fails at setup when the configuration is unusable, e.g. no domain.
pub fn register<R>(registry: &mut R, options: Options) -> Result<WebmentionFilter>
where
    R: FilterRegistry + ?Sized,
{
    let filter = WebmentionFilter::new(Webmentions::from_options(options)?);
    registry.add_async_filter(FILTER_NAME, filter.clone());
    Ok(filter)
}

/// The webmention pipeline for one configured site.
pub struct Webmentions {
    settings: Settings,
    fetcher: Fetcher,
}

impl Webmentions {
    pub fn new(settings: Settings) -> Result<Self> {
        let fetcher = Fetcher::new(&settings)?;
        Ok(Self { settings, fetcher })
    }

    pub fn from_options(options: Options) -> Result<Self> {
        Self::new(options.validate()?)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn store(&self) -> &FeedStore {
        self.fetcher.store()
    }

    /// The full feed, refreshed from the API when the cache is stale.
    pub async fn fetch(&self) -> Feed {
        self.fetcher.fetch().await
    }

    /// Every webmention, bucketed by normalized target URL.
    pub async fn grouped(&self) -> GroupedIndex {
        let feed = self.fetch().await;
        group(&feed, &self.settings.url_rewrites)
    }

    /// Display-ready webmentions for one page, oldest first.
    pub async fn get(
        &self,
        page_url: &str,
        allowed_types: Option<&[String]>,
    ) -> Result<Vec<Webmention>> {
        let index = self.grouped().await;
        Ok(query(&index, page_url, allowed_types, &self.settings))
    }
}

/// Cloneable handle handed to the template engine.
#[derive(Clone)]
pub struct WebmentionFilter {
    inner: Arc<Webmentions>,
}

impl WebmentionFilter {
    pub fn new(webmentions: Webmentions) -> Self {
        Self {
            inner: Arc::new(webmentions),
        }
    }

    pub fn webmentions(&self) -> &Webmentions {
        &self.inner
    }

    /// Direct-return convention.
    pub async fn call(
        &self,
        page_url: &str,
        allowed_types: Option<&[String]>,
    ) -> Result<Vec<Webmention>> {
        self.inner.get(page_url, allowed_types).await
    }

    /// Completion-callback convention: `callback(error, result)`.
    pub async fn call_with<F>(&self, page_url: &str, allowed_types: Option<&[String]>, callback: F)
    where
        F: FnOnce(Option<WebmentionError>, Vec<Webmention>),
    {
        match self.call(page_url, allowed_types).await {
            Ok(mentions) => callback(None, mentions),
            Err(err) => callback(Some(err), Vec::new()),
        }
    }
}
