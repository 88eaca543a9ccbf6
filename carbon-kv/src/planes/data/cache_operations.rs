use crate::domain::{CacheEntry, CachedValue, StoredRecord};
use crate::planes::control::Store;
use crate::planes::data::live_query::LiveQuery;
use crate::ports::DocumentCollection;
use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::{Result, TtlMinutes};
use std::sync::Arc;

/// Application service behind the public cache API.
///
/// Owns the lifecycle of cache entries: one document per key, replaced on
/// every upsert and observed through live queries.
#[derive(Clone)]
pub struct CacheService {
    collection: Arc<dyn DocumentCollection>,
}

impl CacheService {
    pub fn new(store: &Store) -> Self {
        Self::from_collection(store.collection())
    }

    pub fn from_collection(collection: Arc<dyn DocumentCollection>) -> Self {
        Self { collection }
    }

    /// Store `value` under `key`, replacing any previous entry.
    ///
    /// The value is serialized before storage is touched, so a value that
    /// cannot be serialized leaves the previous entry in place.
    pub async fn upsert<T>(
        &self,
        key: &str,
        value: &T,
        ttl_minutes: i64,
    ) -> Result<StoredRecord>
    where
        T: Serialize + ?Sized,
    {
        let entry = CacheEntry::from_value(key, value, TtlMinutes(ttl_minutes), Utc::now())?;
        let record = self.collection.replace(entry).await?;

        tracing::debug!(
            "Cached key '{}' (revision {}, expires {})",
            key,
            record.revision,
            record.entry.cache_time
        );

        Ok(record)
    }

    /// Live view of `key`, starting with its current state
    pub async fn get<T>(&self, key: &str) -> Result<LiveQuery<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        // Subscribe before reading so no write in between is missed
        let changes = self.collection.subscribe();
        let initial = self.collection.find_one(key).await?;

        Ok(LiveQuery::new(
            key,
            Arc::clone(&self.collection),
            changes,
            initial,
        ))
    }

    /// Current value of `key` without subscribing to later changes
    pub async fn get_once<T>(&self, key: &str) -> Result<Option<CachedValue<T>>>
    where
        T: DeserializeOwned,
    {
        let record = self.collection.find_one(key).await?;
        Ok(record.map(|record| CachedValue::from_payload(key, &record.entry.data)))
    }

    /// Remove `key`, returning whether an entry existed
    pub async fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.collection.remove(key).await?.is_some())
    }
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("collection", &self.collection.name())
            .finish()
    }
}
