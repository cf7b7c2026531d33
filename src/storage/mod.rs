//! Local device storage.
//!
//! A small key/value store holding JSON documents under fixed keys, the
//! equivalent of a browser's local storage. Two implementations are
//! provided: [`FileStore`] keeps one file per key in a directory and
//! [`MemoryStore`] keeps everything in process (tests, ephemeral sessions).

use dashmap::DashMap;
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::errors::ServiceError;

pub const CART_KEY: &str = "phk_cart";
pub const SERVICES_KEY: &str = "phk_services";
pub const COOKIE_CONSENT_KEY: &str = "phk_cookie_consent";
pub const SESSION_KEY: &str = "phk_user_session";
/// Mock mode accounts, profiles and sessions.
pub const USERS_KEY: &str = "phk_users";
/// Mock mode orders with their items.
pub const ORDERS_KEY: &str = "phk_orders";

#[cfg_attr(test, mockall::automock)]
pub trait LocalStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, ServiceError>;
    fn set(&self, key: &str, value: &str) -> Result<(), ServiceError>;
    fn remove(&self, key: &str) -> Result<(), ServiceError>;
}

/// Serializes `value` as JSON under `key`.
pub fn save_json<T: Serialize + ?Sized>(
    store: &dyn LocalStore,
    key: &str,
    value: &T,
) -> Result<(), ServiceError> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

/// Reads and decodes the JSON document under `key`.
///
/// A missing key yields `Ok(None)`. Undecodable data is logged and also
/// yields `Ok(None)`, so callers fall back to their empty state.
pub fn load_json<T: DeserializeOwned>(
    store: &dyn LocalStore,
    key: &str,
) -> Result<Option<T>, ServiceError> {
    let Some(raw) = store.get(key)? else {
        return Ok(None);
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(err) => {
            warn!(key, error = %err, "Discarding malformed local storage entry");
            Ok(None)
        }
    }
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, ServiceError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "Opened local storage directory");
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, ServiceError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(ServiceError::StorageError(format!(
                "Invalid storage key: {key:?}"
            )));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl LocalStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, ServiceError> {
        match fs::read_to_string(self.path_for(key)?) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ServiceError> {
        let path = self.path_for(key)?;
        // Readers never observe a partially written document.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ServiceError> {
        match fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, ServiceError> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ServiceError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ServiceError> {
        self.entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn file_store_round_trips_and_removes() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        assert_eq!(store.get(CART_KEY).unwrap(), None);
        store.set(CART_KEY, "[1,2,3]").unwrap();
        assert_eq!(store.get(CART_KEY).unwrap().as_deref(), Some("[1,2,3]"));

        store.remove(CART_KEY).unwrap();
        assert_eq!(store.get(CART_KEY).unwrap(), None);
        // removing twice is fine
        store.remove(CART_KEY).unwrap();
    }

    #[test]
    fn file_store_rejects_path_like_keys() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        assert!(store.set("../escape", "x").is_err());
    }

    #[test]
    fn malformed_json_loads_as_none() {
        let store = MemoryStore::new();
        store.set(CART_KEY, "{not json").unwrap();
        let loaded: Option<Vec<u32>> = load_json(&store, CART_KEY).unwrap();
        assert_eq!(loaded, None);
    }

    #[test]
    fn save_then_load_json() {
        let store = MemoryStore::new();
        save_json(&store, COOKIE_CONSENT_KEY, &true).unwrap();
        let loaded: Option<bool> = load_json(&store, COOKIE_CONSENT_KEY).unwrap();
        assert_eq!(loaded, Some(true));
    }
}
