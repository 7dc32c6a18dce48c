//! File-backed cache store.
//!
//! One file per entry, named `{key}_{suffix}.cache` under the cache root.
//! File content is the JSON-serialized [`CacheEntry`] envelope. File names
//! derive solely from [`CacheKey`] digests, never raw user input, and every
//! path is validated against the root before it touches the filesystem.

use crate::entry::CacheEntry;
use crate::key::CacheKey;
use pulldeck_core::error::CacheError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Envelope format revision, embedded in entry file names so a future
/// incompatible envelope can coexist with old files.
const ENTRY_SUFFIX: &str = "v1";

const ENTRY_EXTENSION: &str = "cache";

/// Persistent TTL cache over a directory of entry files.
pub struct DiskCache {
    root: PathBuf,
}

impl DiskCache {
    /// Open a cache rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| CacheError::Io {
            path: root.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read a value. Returns `None` on absence, deserialization failure, or
    /// expiry; the latter two delete the backing file as a side effect.
    /// Cache-layer read errors never propagate.
    pub fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let path = match self.entry_path(key) {
            Ok(path) => path,
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "rejected cache path");
                return None;
            }
        };

        let bytes = fs::read(&path).ok()?;
        match serde_json::from_slice::<CacheEntry<T>>(&bytes) {
            Ok(entry) if entry.is_expired() => {
                let _ = fs::remove_file(&path);
                tracing::debug!(key = %key, "purged expired cache entry");
                None
            }
            Ok(entry) => Some(entry.data),
            Err(e) => {
                let _ = fs::remove_file(&path);
                tracing::debug!(key = %key, error = %e, "purged unreadable cache entry");
                None
            }
        }
    }

    /// Persist a value under `key` with the given TTL, replacing any
    /// existing entry wholesale. The entry is written to a temporary file
    /// and renamed into place so readers never observe a partial envelope.
    pub fn set<T: Serialize>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let path = self.entry_path(key)?;
        let entry = CacheEntry::new(value, ttl);
        let bytes = serde_json::to_vec(&entry).map_err(|e| CacheError::Serialize {
            reason: e.to_string(),
        })?;

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, &bytes).map_err(|e| CacheError::Io {
            path: tmp.display().to_string(),
            reason: e.to_string(),
        })?;
        fs::rename(&tmp, &path).map_err(|e| CacheError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Explicitly invalidate an entry. Removing an absent entry is not an
    /// error.
    pub fn remove(&self, key: &CacheKey) -> Result<(), CacheError> {
        let path = self.entry_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Whether a backing file currently exists for `key`, expired or not.
    pub fn entry_exists(&self, key: &CacheKey) -> bool {
        self.entry_path(key).map(|p| p.exists()).unwrap_or(false)
    }

    /// Scan every entry and purge the expired ones. Cooperatively
    /// cancellable between files. Maintenance only: read correctness is
    /// already self-enforced by [`get`](Self::get).
    ///
    /// Returns the number of entries purged.
    pub fn clean_expired(&self, token: &CancellationToken) -> Result<usize, CacheError> {
        let dir = fs::read_dir(&self.root).map_err(|e| CacheError::Io {
            path: self.root.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut purged = 0usize;
        for item in dir {
            if token.is_cancelled() {
                return Err(CacheError::SweepCancelled);
            }

            let path = match item {
                Ok(item) => item.path(),
                Err(_) => continue,
            };
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }

            // The envelope is self-describing JSON, so the payload can be
            // inspected without knowing its concrete type.
            let expired = match fs::read(&path) {
                Ok(bytes) => serde_json::from_slice::<CacheEntry<serde_json::Value>>(&bytes)
                    .map(|entry| entry.is_expired())
                    // Unreadable envelopes are purged along with expired ones.
                    .unwrap_or(true),
                Err(_) => continue,
            };

            if expired && fs::remove_file(&path).is_ok() {
                purged += 1;
            }
        }

        if purged > 0 {
            tracing::info!(purged, root = %self.root.display(), "cache sweep purged expired entries");
        }
        Ok(purged)
    }

    /// Resolve the backing file for `key`, refusing any name that would
    /// escape the cache root.
    fn entry_path(&self, key: &CacheKey) -> Result<PathBuf, CacheError> {
        let name = format!("{}_{}.{}", key.as_str(), ENTRY_SUFFIX, ENTRY_EXTENSION);
        if name.contains(['/', '\\']) || name.contains("..") {
            return Err(CacheError::PathTraversal { path: name });
        }

        let path = self.root.join(&name);
        if path.parent() != Some(self.root.as_path()) {
            return Err(CacheError::PathTraversal {
                path: path.display().to_string(),
            });
        }
        Ok(path)
    }
}
