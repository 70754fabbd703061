//! Ephemeral, TTL-bounded key/value store backing all room-scoped state.
//!
//! Every datum that must survive a request handler lives here under a
//! `room:{roomId}:…` key as UTF-8 JSON. Writes are last-writer-wins at the
//! key level and refresh the key's TTL; a room whose keys expire is simply
//! gone and subsequent reads surface `notFound` at the service layer.

pub mod keys;
pub mod memory;

use std::{error::Error, sync::Arc, time::Duration};

use futures::future::BoxFuture;
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;

pub use memory::MemoryStore;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error raised by store backends and the typed wrapper.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("wrong value kind at `{key}`")]
    WrongKind { key: String },
    #[error("failed to decode value at `{key}`")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode value for `{key}`")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("store unavailable: {message}")]
    Unavailable {
        message: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

/// Abstraction over the TTL-bounded key/value/list/set store.
///
/// The contract mirrors what the service layer relies on: reads return the
/// last successful write or absence, writes refresh the TTL, and the backend
/// may evict any key past its TTL at any time.
pub trait StateStore: Send + Sync {
    fn get(&self, key: &str) -> BoxFuture<'static, StoreResult<Option<String>>>;
    fn set(&self, key: &str, value: String, ttl: Duration) -> BoxFuture<'static, StoreResult<()>>;
    fn delete(&self, key: &str) -> BoxFuture<'static, StoreResult<()>>;
    /// Append to a list value, returning the new length.
    fn list_append(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> BoxFuture<'static, StoreResult<u64>>;
    fn list_range(&self, key: &str) -> BoxFuture<'static, StoreResult<Vec<String>>>;
    /// Add a member to a set value, returning whether it was newly inserted.
    fn set_add(
        &self,
        key: &str,
        member: String,
        ttl: Duration,
    ) -> BoxFuture<'static, StoreResult<bool>>;
    fn set_size(&self, key: &str) -> BoxFuture<'static, StoreResult<u64>>;
    fn exists(&self, key: &str) -> BoxFuture<'static, StoreResult<bool>>;
    fn expire(&self, key: &str, ttl: Duration) -> BoxFuture<'static, StoreResult<()>>;
}

/// Typed facade over the raw store: JSON (de)serialization plus the
/// application-wide TTL, so call sites never repeat either.
#[derive(Clone)]
pub struct RoomStore {
    backend: Arc<dyn StateStore>,
    ttl: Duration,
}

impl RoomStore {
    pub fn new(backend: Arc<dyn StateStore>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    pub async fn read_json<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        let Some(raw) = self.backend.get(key).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Decode {
                key: key.to_string(),
                source,
            })
    }

    pub async fn write_json<T: Serialize>(&self, key: &str, value: &T) -> StoreResult<()> {
        let raw = serde_json::to_string(value).map_err(|source| StoreError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.backend.set(key, raw, self.ttl).await
    }

    pub async fn delete(&self, key: &str) -> StoreResult<()> {
        self.backend.delete(key).await
    }

    pub async fn list_append<T: Serialize>(&self, key: &str, value: &T) -> StoreResult<u64> {
        let raw = serde_json::to_string(value).map_err(|source| StoreError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.backend.list_append(key, raw, self.ttl).await
    }

    pub async fn list_json<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Vec<T>> {
        let items = self.backend.list_range(key).await?;
        items
            .into_iter()
            .map(|raw| {
                serde_json::from_str(&raw).map_err(|source| StoreError::Decode {
                    key: key.to_string(),
                    source,
                })
            })
            .collect()
    }

    pub async fn set_add(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.backend.set_add(key, member.to_string(), self.ttl).await
    }

    pub async fn set_size(&self, key: &str) -> StoreResult<u64> {
        self.backend.set_size(key).await
    }

    pub async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.backend.exists(key).await
    }

    pub async fn expire(&self, key: &str) -> StoreResult<()> {
        self.backend.expire(key, self.ttl).await
    }
}
