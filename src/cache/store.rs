//! Byte-level key/value stores backing the weather cache

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use fjall::Keyspace;
use parking_lot::Mutex;
use tokio::task;

use crate::{Result, WeatherError};

/// Durable key/value storage for encoded cache entries
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn save(&self, key: &str, value: Vec<u8>) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// On-disk store backed by a fjall keyspace
pub struct FjallStore {
    store: Keyspace,
}

fn store_error(err: impl std::fmt::Display) -> WeatherError {
    WeatherError::cache(err.to_string())
}

impl FjallStore {
    /// Open (or create) the store under `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        std::fs::create_dir_all(path.as_ref())?;
        let db = fjall::Database::builder(path.as_ref())
            .open()
            .map_err(store_error)?;
        let items = db
            .keyspace("weather", fjall::KeyspaceCreateOptions::default)
            .map_err(store_error)?;
        Ok(Self { store: items })
    }
}

#[async_trait]
impl CacheStore for FjallStore {
    #[tracing::instrument(name = "query_store", level = "debug", skip(self))]
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let store = self.store.clone();
        let key = key.as_bytes().to_vec();
        task::spawn_blocking(move || {
            store
                .get(key)
                .map(|v| v.map(|bytes| bytes.to_vec()))
                .map_err(store_error)
        })
        .await?
    }

    #[tracing::instrument(name = "put_store", level = "debug", skip(self, value))]
    async fn save(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let store = self.store.clone();
        let key = key.as_bytes().to_vec();
        task::spawn_blocking(move || store.insert(key, value))
            .await?
            .map_err(store_error)?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let store = self.store.clone();
        let key = key.as_bytes().to_vec();
        task::spawn_blocking(move || store.remove(key))
            .await?
            .map_err(store_error)?;
        Ok(())
    }
}

/// In-process store, used by tests and when no cache directory is wanted
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn save(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

#[async_trait]
impl<S: CacheStore + ?Sized> CacheStore for std::sync::Arc<S> {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>> {
        (**self).load(key).await
    }

    async fn save(&self, key: &str, value: Vec<u8>) -> Result<()> {
        (**self).save(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key).await
    }
}
