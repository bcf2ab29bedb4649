//! garunner Cache - Local persistence for report queries
//!
//! File-based storage for:
//! - Report responses, addressed by a hash of the query fingerprint
//! - Per-identity credentials with their expiry
//!
//! ## Architecture
//!
//! Both stores are plain directory trees. The response cache shards files
//! by the first two hex characters of the key; the token store keeps one
//! JSON file per identity. Neither store holds anything in memory, so any
//! number of runners may share the same directories.
//!
//! ## Key Components
//!
//! - [`FingerprintCache`] - Content-addressed response cache
//! - [`freshness`] - The policy deciding whether a cached response may be served
//! - [`TokenStore`] - Per-identity credential cache with re-authorization
//! - [`CacheError`] - Error types for cache operations
//!
//! ## Usage
//!
//! ```no_run
//! use chrono::Local;
//! use garunner_cache::FingerprintCache;
//! use garunner_core::domain::QueryParams;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let query = QueryParams::new()
//!     .with_dates("2024-01-01", "2024-01-31")
//!     .with_metrics("ga:sessions")
//!     .with_dimensions("ga:date")
//!     .with_filters(vec![])
//!     .with_page_size(100)
//!     .validate()?;
//!
//! let cache = FingerprintCache::new("/var/cache/garunner");
//! let key = FingerprintCache::key_for(&query)?;
//! if let Some(report) = cache.lookup(&query, &key, Local::now()).await {
//!     println!("{report}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod fingerprint;
pub mod freshness;
pub mod tokens;

pub use fingerprint::{CacheEntry, CacheKey, FingerprintCache};
pub use tokens::TokenStore;

use std::sync::atomic::{AtomicU64, Ordering};

use garunner_core::domain::QueryError;

/// Errors that can occur during cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Reading or writing a cache file failed
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File or directory the operation was working on
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Serialization or deserialization of a stored record failed
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl CacheError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Unique sibling path a file is written to before being renamed over `target`.
///
/// Each call yields a new name, so concurrent writers of the same target
/// never share a partial file and the last rename wins.
pub(crate) fn partial_path(target: &std::path::Path) -> std::path::PathBuf {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    let n = NEXT.fetch_add(1, Ordering::Relaxed);
    let mut name = target.as_os_str().to_owned();
    name.push(format!(".{}.{n}.partial", std::process::id()));
    name.into()
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        Self::SerializationError(e.to_string())
    }
}

impl From<CacheError> for QueryError {
    fn from(e: CacheError) -> Self {
        QueryError::Storage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn test_partial_paths_are_unique_siblings() {
        let target = Path::new("/cache/ab/cdef");
        let first = partial_path(target);
        let second = partial_path(target);

        assert_ne!(first, second);
        for partial in [&first, &second] {
            assert_eq!(partial.parent(), target.parent());
            let name = partial.file_name().unwrap().to_str().unwrap();
            assert!(name.starts_with("cdef."));
            assert!(name.ends_with(".partial"));
        }
    }
}
