//! Per-identity credential storage
//!
//! Each identity's [`Credentials`] live in `{token_dir}/ga-runner-{identity}`
//! as JSON. [`TokenStore::ensure`] returns the stored credential while it is
//! valid and otherwise runs the supplied authorization future, persisting
//! whatever it yields.

use std::{
    future::Future,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use garunner_core::domain::{Credentials, QueryError};
use tracing::{debug, info, warn};

use crate::CacheError;

/// File name prefix for token files
const TOKEN_FILE_PREFIX: &str = "ga-runner-";

/// File-backed credential store
#[derive(Debug, Clone)]
pub struct TokenStore {
    dir: PathBuf,
}

impl TokenStore {
    /// Creates a store rooted at `dir`. The directory is created on first store.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the token file for `identity`.
    ///
    /// Characters outside `[A-Za-z0-9._-]` are replaced with `_` so that an
    /// identity can never escape the token directory.
    pub fn path_for(&self, identity: &str) -> PathBuf {
        let sanitized: String = identity
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{TOKEN_FILE_PREFIX}{sanitized}"))
    }

    /// Stores credentials for `identity`, replacing any previous record.
    pub async fn store(&self, identity: &str, credentials: &Credentials) -> Result<(), CacheError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| CacheError::io(&self.dir, e))?;

        let path = self.path_for(identity);
        let partial = crate::partial_path(&path);
        let json = serde_json::to_vec_pretty(credentials)?;
        tokio::fs::write(&partial, json)
            .await
            .map_err(|e| CacheError::io(&partial, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&partial, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| CacheError::io(&partial, e))?;
        }

        if let Err(e) = tokio::fs::rename(&partial, &path).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(CacheError::io(&path, e));
        }

        debug!(identity, path = %path.display(), "Stored token");
        Ok(())
    }

    /// Loads the credentials for `identity`.
    ///
    /// Returns `None` if no token file exists. A file that cannot be parsed
    /// is logged and also reported as `None`.
    pub async fn load(&self, identity: &str) -> Result<Option<Credentials>, CacheError> {
        let path = self.path_for(identity);
        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(identity, "No stored token");
                return Ok(None);
            }
            Err(e) => return Err(CacheError::io(&path, e)),
        };

        match serde_json::from_slice::<Credentials>(&content) {
            Ok(credentials) => {
                debug!(identity, "Loaded stored token");
                Ok(Some(credentials))
            }
            Err(e) => {
                warn!(identity, path = %path.display(), error = %e, "Ignoring unreadable token file");
                Ok(None)
            }
        }
    }

    /// Removes the stored credentials for `identity`. Returns true if a file was removed.
    pub async fn clear(&self, identity: &str) -> Result<bool, CacheError> {
        let path = self.path_for(identity);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(identity, "Cleared stored token");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(identity, "No token to clear");
                Ok(false)
            }
            Err(e) => Err(CacheError::io(&path, e)),
        }
    }

    /// Returns a credential for `identity` that is valid at `now`.
    ///
    /// A stored credential is used while its expiry lies after `now`.
    /// Otherwise `authorize` is awaited and its result persisted before being
    /// returned. Failing to persist is logged; the fresh credential is still
    /// returned. Errors from `authorize` are returned unchanged.
    pub async fn ensure<F, Fut>(
        &self,
        identity: &str,
        now: DateTime<Utc>,
        authorize: F,
    ) -> Result<Credentials, QueryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Credentials, QueryError>>,
    {
        match self.load(identity).await {
            Ok(Some(credentials)) if !credentials.is_expired_at(now) => return Ok(credentials),
            Ok(Some(credentials)) => {
                debug!(identity, expired_at = %credentials.expires_at, "Stored token expired");
            }
            Ok(None) => {}
            Err(e) => {
                warn!(identity, error = %e, "Failed to read token file, re-authorizing");
            }
        }

        info!(identity, "Authorizing");
        let credentials = authorize().await?;

        if let Err(e) = self.store(identity, &credentials).await {
            warn!(identity, error = %e, "Failed to persist token");
        }
        Ok(credentials)
    }
}
