//! Content-addressed response cache.
//!
//! Responses are stored in a hash-based directory structure:
//! `{cache_dir}/{first_2_chars_of_key}/{rest_of_key}`, where the key is the
//! SHA-256 of the query's canonical fingerprint. The file's modification time
//! is the only metadata kept; [`freshness`](crate::freshness) decides whether
//! an entry may be served.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Local};
use garunner_core::{domain::ReportQuery, ports::Report};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::{freshness, CacheError};

/// Lowercase hex SHA-256 of a query fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Hashes canonical fingerprint bytes into a key
    pub fn from_canonical_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored response together with the time it was written
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub body: Vec<u8>,
    pub modified: DateTime<Local>,
}

/// Manages cached report responses on disk.
#[derive(Debug, Clone)]
pub struct FingerprintCache {
    dir: PathBuf,
}

impl FingerprintCache {
    /// Creates a cache rooted at `dir`. Directories are created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Computes the cache key of a query.
    ///
    /// The identity/quota key does not take part, so queries made on behalf
    /// of different identities share entries.
    pub fn key_for(query: &ReportQuery) -> Result<CacheKey, CacheError> {
        let bytes = query.fingerprint().canonical_bytes()?;
        Ok(CacheKey::from_canonical_bytes(&bytes))
    }

    /// Path of the entry for `key`.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        let (prefix, rest) = key.as_str().split_at(2);
        self.dir.join(prefix).join(rest)
    }

    /// Reads the entry for `key`, or `None` if nothing is stored.
    pub async fn read(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        let path = self.path_for(key);
        let body = match tokio::fs::read(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::io(&path, e)),
        };
        let modified = tokio::fs::metadata(&path)
            .await
            .and_then(|meta| meta.modified())
            .map_err(|e| CacheError::io(&path, e))?;

        Ok(Some(CacheEntry {
            body,
            modified: DateTime::<Local>::from(modified),
        }))
    }

    /// Stores `body` under `key`, replacing any previous entry.
    ///
    /// Returns the path of the written entry. Its modification time is the
    /// time of this write.
    pub async fn write(&self, key: &CacheKey, body: &[u8]) -> Result<PathBuf, CacheError> {
        let path = self.path_for(key);
        let partial = crate::partial_path(&path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CacheError::io(parent, e))?;
        }

        tokio::fs::write(&partial, body)
            .await
            .map_err(|e| CacheError::io(&partial, e))?;
        if let Err(e) = tokio::fs::rename(&partial, &path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(CacheError::io(&path, e));
        }

        debug!(path = %path.display(), bytes = body.len(), "Created new cached file");
        Ok(path)
    }

    /// Removes the entry for `key`. Returns true if one existed.
    pub async fn remove(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::io(&path, e)),
        }
    }

    /// Returns the cached report for `query` if one is stored and fresh at `now`.
    ///
    /// Unreadable or undecodable entries are logged and reported as a miss.
    pub async fn lookup(
        &self,
        query: &ReportQuery,
        key: &CacheKey,
        now: DateTime<Local>,
    ) -> Option<Report> {
        let entry = match self.read(key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!(key = %key, "Cache miss");
                return None;
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to read cached file, treating as miss");
                return None;
            }
        };

        if !freshness::is_fresh(entry.modified.date_naive(), query, now.date_naive()) {
            debug!(key = %key, modified = %entry.modified, "Cached file is stale");
            return None;
        }

        match serde_json::from_slice(&entry.body) {
            Ok(report) => {
                debug!(path = %self.path_for(key).display(), "Get cached file");
                Some(report)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cached file is not valid JSON, treating as miss");
                None
            }
        }
    }
}
