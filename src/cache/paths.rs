// Cache path utilities.
// Resolves the cache directory and the file backing each cache key.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;

/// Fallback directory when no platform cache directory is available.
const FALLBACK_CACHE_DIR: &str = ".cache";

/// Get the base cache directory (~/.cache/webmention-cache on Linux).
pub fn default_cache_dir() -> PathBuf {
    ProjectDirs::from("", "", "webmention-cache")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(FALLBACK_CACHE_DIR))
}

/// Path to the feed file for a cache key.
pub fn feed_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{}.json", sanitize_name(key)))
}

/// Sanitize a name for use in filesystem paths.
/// Replaces problematic characters with underscores.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '.' => '_',
            _ => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("webmentions"), "webmentions");
        assert_eq!(sanitize_name("site/webmentions"), "site_webmentions");
        assert_eq!(sanitize_name("../escape"), "___escape");
    }

    #[test]
    fn test_feed_path() {
        let path = feed_path(Path::new("/tmp/cache"), "webmentions");
        assert!(path.ends_with("cache/webmentions.json"));
    }
}
