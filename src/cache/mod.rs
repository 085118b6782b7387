// Cache module for local filesystem caching.
// Persists the webmention feed between builds with a write timestamp.

pub mod paths;
pub mod store;

pub use paths::{default_cache_dir, feed_path};
pub use store::{CachedData, FeedStore};
