// Webmention cache library.
// Fetches webmentions incrementally, persists them between builds, and serves
// grouped, sanitized per-page results to a template engine.

pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod filter;
pub mod group;
pub mod query;
pub mod webmention;

pub use config::{Options, Settings};
pub use error::{Result, WebmentionError};
pub use filter::{FILTER_NAME, FilterRegistry, WebmentionFilter, Webmentions, register};
pub use group::GroupedIndex;
pub use webmention::{Feed, Webmention};
