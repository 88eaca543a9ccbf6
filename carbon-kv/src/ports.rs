#![deny(clippy::all)]

use crate::domain::{CacheEntry, CollectionSchema, StoredRecord};
use crate::events::CollectionChange;
use async_trait::async_trait;
use shared::Result;
use tokio::sync::broadcast;

// Ports are the pluggable extension points for the underlying document store

/// Port for a schema-validated document collection keyed by its primary key
#[async_trait]
pub trait DocumentCollection: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn schema(&self) -> &CollectionSchema;

    /// Register for write events. Receivers created before a read never miss
    /// a write that completes after it.
    fn subscribe(&self) -> broadcast::Receiver<CollectionChange>;

    async fn find_one(&self, key: &str) -> Result<Option<StoredRecord>>;

    async fn find(&self) -> Result<Vec<StoredRecord>>;

    /// Atomically swap whatever is stored under the entry's key for a new document
    async fn replace(&self, entry: CacheEntry) -> Result<StoredRecord>;

    async fn remove(&self, key: &str) -> Result<Option<StoredRecord>>;
}
