//! Durable key-value persistence for credentials and cached list snapshots.
//!
//! # Design
//! - Values are JSON-encoded under fixed, namespaced keys so a later launch
//!   reads back exactly what was written.
//! - The typed wrappers ([`CredentialStore`], [`SnapshotCache`]) swallow
//!   storage failures after logging them; a broken disk degrades to "nothing
//!   stored" rather than an error the caller has to handle.
//! - Writes are synchronous, so a `read` issued after a `save` in the same
//!   process always observes it.

use std::collections::HashMap;
use std::fmt::Debug;
use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;

use crate::error::{StoreError, StoreResult};

/// Storage slot for the access token.
pub const AUTH_TOKEN_KEY: &str = "tavola.auth.token";
/// Storage slot for the refresh token.
pub const REFRESH_TOKEN_KEY: &str = "tavola.auth.refresh_token";
/// Storage slot for the cached store list.
pub const STORES_CACHE_KEY: &str = "tavola.cache.stores";
/// Storage slot for the cached campaign list.
pub const CAMPAIGNS_CACHE_KEY: &str = "tavola.cache.campaigns";

/// Minimal string key-value storage primitive.
pub trait KeyValueStore: Send + Sync + Debug {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing storage cannot be read or decoded.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing storage cannot be written.
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Remove `key`; removing a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing storage cannot be modified.
    fn remove(&self, key: &str) -> StoreResult<()>;
}

/// File-backed store: one JSON document per key inside a namespace directory.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open (and create when missing) the namespace directory at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StoreError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    /// Directory holding the stored values.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> StoreResult<PathBuf> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-'));
        if !valid {
            return Err(StoreError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let path = self.path_for(key)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        serde_json::from_slice::<String>(&bytes)
            .map(Some)
            .map_err(|source| StoreError::Corrupt {
                key: key.to_string(),
                source,
            })
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        let encoded = serde_json::to_vec(value).map_err(|source| StoreError::Encode {
            key: key.to_string(),
            source,
        })?;

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let io_error = |source: io::Error| StoreError::Io {
            path: path.clone(),
            source,
        };
        let mut staged = NamedTempFile::new_in(&self.root).map_err(io_error)?;
        staged.write_all(&encoded).map_err(io_error)?;
        staged.as_file().sync_all().map_err(io_error)?;
        staged.persist(&path).map_err(|err| io_error(err.error))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let path = self.path_for(key)?;
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }
}

/// Process-local store; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

/// Access and refresh token slots.
#[derive(Clone, Debug)]
pub struct CredentialStore {
    backend: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    /// Wrap a storage backend.
    #[must_use]
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Credential store that forgets everything on exit.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Persist the access token.
    pub fn save(&self, token: &str) {
        set_logged(self.backend.as_ref(), AUTH_TOKEN_KEY, token);
    }

    /// Persist the refresh token.
    pub fn save_refresh(&self, token: &str) {
        set_logged(self.backend.as_ref(), REFRESH_TOKEN_KEY, token);
    }

    /// Current access token, if one is stored and readable.
    #[must_use]
    pub fn read(&self) -> Option<String> {
        get_logged(self.backend.as_ref(), AUTH_TOKEN_KEY)
    }

    /// Current refresh token, if one is stored and readable.
    #[must_use]
    pub fn read_refresh(&self) -> Option<String> {
        get_logged(self.backend.as_ref(), REFRESH_TOKEN_KEY)
    }

    /// Drop only the refresh token slot.
    pub fn clear_refresh(&self) {
        remove_logged(self.backend.as_ref(), REFRESH_TOKEN_KEY);
    }

    /// Drop both token slots.
    pub fn clear(&self) {
        remove_logged(self.backend.as_ref(), AUTH_TOKEN_KEY);
        remove_logged(self.backend.as_ref(), REFRESH_TOKEN_KEY);
    }
}

/// Named list snapshots kept for offline display.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SnapshotKey {
    /// Franchise store list.
    Stores,
    /// Campaign list.
    Campaigns,
}

impl SnapshotKey {
    /// Storage slot backing this snapshot.
    #[must_use]
    pub const fn storage_key(self) -> &'static str {
        match self {
            Self::Stores => STORES_CACHE_KEY,
            Self::Campaigns => CAMPAIGNS_CACHE_KEY,
        }
    }
}

/// Serialized list snapshots read back verbatim on the next launch.
#[derive(Clone, Debug)]
pub struct SnapshotCache {
    backend: Arc<dyn KeyValueStore>,
}

impl SnapshotCache {
    /// Wrap a storage backend.
    #[must_use]
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Replace the snapshot stored under `key`.
    pub fn save<T: Serialize>(&self, key: SnapshotKey, rows: &[T]) {
        match serde_json::to_string(rows) {
            Ok(encoded) => set_logged(self.backend.as_ref(), key.storage_key(), &encoded),
            Err(err) => tracing::warn!(
                key = key.storage_key(),
                error = %err,
                "failed to encode list snapshot"
            ),
        }
    }

    /// Load the snapshot stored under `key`; undecodable snapshots read as absent.
    #[must_use]
    pub fn load<T: DeserializeOwned>(&self, key: SnapshotKey) -> Option<Vec<T>> {
        let raw = get_logged(self.backend.as_ref(), key.storage_key())?;
        match serde_json::from_str(&raw) {
            Ok(rows) => Some(rows),
            Err(err) => {
                tracing::warn!(
                    key = key.storage_key(),
                    error = %err,
                    "discarding undecodable list snapshot"
                );
                None
            }
        }
    }

    /// Drop the snapshot stored under `key`.
    pub fn clear(&self, key: SnapshotKey) {
        remove_logged(self.backend.as_ref(), key.storage_key());
    }
}

fn set_logged(backend: &dyn KeyValueStore, key: &'static str, value: &str) {
    if let Err(err) = backend.set(key, value) {
        log_storage_error("set", key, &err);
    }
}

fn get_logged(backend: &dyn KeyValueStore, key: &'static str) -> Option<String> {
    match backend.get(key) {
        Ok(value) => value,
        Err(err) => {
            log_storage_error("get", key, &err);
            None
        }
    }
}

fn remove_logged(backend: &dyn KeyValueStore, key: &'static str) {
    if let Err(err) = backend.remove(key) {
        log_storage_error("remove", key, &err);
    }
}

fn log_storage_error(operation: &'static str, key: &'static str, err: &StoreError) {
    let detail = std::error::Error::source(err).map(ToString::to_string);
    tracing::warn!(operation, key, error = %err, detail = ?detail, "storage operation failed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn file_store_round_trips_and_removes() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = FileStore::open(dir.path())?;
        assert_eq!(store.get("a.b")?, None);
        store.set("a.b", "value with \"quotes\"")?;
        assert_eq!(store.get("a.b")?.as_deref(), Some("value with \"quotes\""));
        store.remove("a.b")?;
        store.remove("a.b")?;
        assert_eq!(store.get("a.b")?, None);
        Ok(())
    }

    #[test]
    fn file_store_rejects_path_like_keys() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let store = FileStore::open(dir.path())?;
        for key in ["", "../escape", "a/b", ".hidden"] {
            assert!(matches!(
                store.set(key, "x"),
                Err(StoreError::InvalidKey { .. })
            ));
        }
        Ok(())
    }

    #[test]
    fn corrupted_token_reads_as_absent() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let backend = Arc::new(FileStore::open(dir.path())?);
        fs::write(dir.path().join(format!("{AUTH_TOKEN_KEY}.json")), b"{not json")?;
        let credentials = CredentialStore::new(backend);
        assert_eq!(credentials.read(), None);
        Ok(())
    }

    #[test]
    fn clear_drops_both_slots() {
        let credentials = CredentialStore::in_memory();
        credentials.save("access");
        credentials.save_refresh("refresh");
        assert_eq!(credentials.read().as_deref(), Some("access"));
        assert_eq!(credentials.read_refresh().as_deref(), Some("refresh"));
        credentials.clear();
        assert_eq!(credentials.read(), None);
        assert_eq!(credentials.read_refresh(), None);
    }

    #[test]
    fn snapshot_cache_round_trips_and_discards_garbage() {
        let backend: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let cache = SnapshotCache::new(Arc::clone(&backend));
        cache.save(SnapshotKey::Stores, &["centro".to_string(), "norte".to_string()]);
        assert_eq!(
            cache.load::<String>(SnapshotKey::Stores),
            Some(vec!["centro".to_string(), "norte".to_string()])
        );
        assert_eq!(cache.load::<String>(SnapshotKey::Campaigns), None);

        backend
            .set(CAMPAIGNS_CACHE_KEY, "not a list")
            .expect("memory store accepts writes");
        assert_eq!(cache.load::<String>(SnapshotKey::Campaigns), None);

        cache.clear(SnapshotKey::Stores);
        assert_eq!(cache.load::<String>(SnapshotKey::Stores), None);
    }
}
