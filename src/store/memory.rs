//! In-process TTL map implementing [`StateStore`].
//!
//! Expiry is lazy: a key past its deadline is treated as absent and removed
//! on the next access. That is enough to honor the contract, since callers
//! must already tolerate eviction at any time.

use std::{
    collections::HashSet,
    sync::Arc,
    time::{Duration, Instant},
};

use dashmap::DashMap;
use futures::{FutureExt, future::BoxFuture};

use super::{StateStore, StoreError, StoreResult};

#[derive(Debug, Clone)]
enum ValueKind {
    Text(String),
    List(Vec<String>),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: ValueKind,
    expires_at: Instant,
}

impl Entry {
    fn expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

#[derive(Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the entry when expired, returning whether it was live.
    fn prune(&self, key: &str) -> bool {
        match self.entries.get(key) {
            Some(entry) if entry.expired() => {
                drop(entry);
                self.entries.remove(key);
                false
            }
            Some(_) => true,
            None => false,
        }
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> BoxFuture<'static, StoreResult<Option<String>>> {
        let live = self.prune(key);
        let result = if !live {
            Ok(None)
        } else {
            match self.entries.get(key).map(|entry| entry.value.clone()) {
                Some(ValueKind::Text(value)) => Ok(Some(value)),
                Some(_) => Err(StoreError::WrongKind {
                    key: key.to_string(),
                }),
                None => Ok(None),
            }
        };
        async move { result }.boxed()
    }

    fn set(&self, key: &str, value: String, ttl: Duration) -> BoxFuture<'static, StoreResult<()>> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: ValueKind::Text(value),
                expires_at: Instant::now() + ttl,
            },
        );
        async move { Ok(()) }.boxed()
    }

    fn delete(&self, key: &str) -> BoxFuture<'static, StoreResult<()>> {
        self.entries.remove(key);
        async move { Ok(()) }.boxed()
    }

    fn list_append(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> BoxFuture<'static, StoreResult<u64>> {
        self.prune(key);
        let mut guard = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: ValueKind::List(Vec::new()),
            expires_at: Instant::now() + ttl,
        });
        let entry = &mut *guard;
        let result = match &mut entry.value {
            ValueKind::List(items) => {
                items.push(value);
                entry.expires_at = Instant::now() + ttl;
                Ok(items.len() as u64)
            }
            _ => Err(StoreError::WrongKind {
                key: key.to_string(),
            }),
        };
        drop(guard);
        async move { result }.boxed()
    }

    fn list_range(&self, key: &str) -> BoxFuture<'static, StoreResult<Vec<String>>> {
        let live = self.prune(key);
        let result = if !live {
            Ok(Vec::new())
        } else {
            match self.entries.get(key).map(|entry| entry.value.clone()) {
                Some(ValueKind::List(items)) => Ok(items),
                Some(_) => Err(StoreError::WrongKind {
                    key: key.to_string(),
                }),
                None => Ok(Vec::new()),
            }
        };
        async move { result }.boxed()
    }

    fn set_add(
        &self,
        key: &str,
        member: String,
        ttl: Duration,
    ) -> BoxFuture<'static, StoreResult<bool>> {
        self.prune(key);
        let mut guard = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: ValueKind::Set(HashSet::new()),
            expires_at: Instant::now() + ttl,
        });
        let entry = &mut *guard;
        let result = match &mut entry.value {
            ValueKind::Set(members) => {
                let inserted = members.insert(member);
                entry.expires_at = Instant::now() + ttl;
                Ok(inserted)
            }
            _ => Err(StoreError::WrongKind {
                key: key.to_string(),
            }),
        };
        drop(guard);
        async move { result }.boxed()
    }

    fn set_size(&self, key: &str) -> BoxFuture<'static, StoreResult<u64>> {
        let live = self.prune(key);
        let result = if !live {
            Ok(0)
        } else {
            match self.entries.get(key).map(|entry| entry.value.clone()) {
                Some(ValueKind::Set(members)) => Ok(members.len() as u64),
                Some(_) => Err(StoreError::WrongKind {
                    key: key.to_string(),
                }),
                None => Ok(0),
            }
        };
        async move { result }.boxed()
    }

    fn exists(&self, key: &str) -> BoxFuture<'static, StoreResult<bool>> {
        let live = self.prune(key);
        async move { Ok(live) }.boxed()
    }

    fn expire(&self, key: &str, ttl: Duration) -> BoxFuture<'static, StoreResult<()>> {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.expires_at = Instant::now() + ttl;
        }
        async move { Ok(()) }.boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn get_returns_last_write() {
        let store = MemoryStore::new();
        store.set("k", "v1".into(), TTL).await.unwrap();
        store.set("k", "v2".into(), TTL).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v2".into()));
    }

    #[tokio::test]
    async fn expired_key_reads_as_absent() {
        let store = MemoryStore::new();
        store
            .set("k", "v".into(), Duration::from_millis(0))
            .await
            .unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(!store.exists("k").await.unwrap());
    }

    #[tokio::test]
    async fn list_append_grows_and_preserves_order() {
        let store = MemoryStore::new();
        assert_eq!(store.list_append("l", "a".into(), TTL).await.unwrap(), 1);
        assert_eq!(store.list_append("l", "b".into(), TTL).await.unwrap(), 2);
        assert_eq!(
            store.list_range("l").await.unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );
    }

    #[tokio::test]
    async fn set_add_deduplicates() {
        let store = MemoryStore::new();
        assert!(store.set_add("s", "m".into(), TTL).await.unwrap());
        assert!(!store.set_add("s", "m".into(), TTL).await.unwrap());
        assert_eq!(store.set_size("s").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn kind_mismatch_is_rejected() {
        let store = MemoryStore::new();
        store.set("k", "v".into(), TTL).await.unwrap();
        let err = store.list_append("k", "a".into(), TTL).await.unwrap_err();
        assert!(matches!(err, StoreError::WrongKind { .. }));
    }
}
