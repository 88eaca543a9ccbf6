use crate::domain::{CacheEntry, CollectionSchema, StoredRecord};
use crate::events::{
    now_timestamp, CollectionChange, DocumentRemovedEvent, DocumentWrittenEvent,
};
use crate::ports::DocumentCollection;
use async_trait::async_trait;
use shared::{Error, Result};
use tokio::sync::broadcast;

/// Buffered change events per collection before slow live queries lag
pub const CHANGE_FEED_CAPACITY: usize = 1024;

/// Sled-backed document collection.
///
/// Documents are stored as JSON under their primary key in a dedicated tree.
/// Every successful write is published on the collection's change feed.
pub struct SledCollection {
    name: String,
    schema: CollectionSchema,
    validator: jsonschema::Validator,
    db: sled::Db,
    tree: sled::Tree,
    changes: broadcast::Sender<CollectionChange>,
}

impl SledCollection {
    pub(crate) fn new(
        name: impl Into<String>,
        schema: CollectionSchema,
        db: sled::Db,
        tree: sled::Tree,
    ) -> Result<Self> {
        let validator = schema.compile()?;
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);

        Ok(Self {
            name: name.into(),
            schema,
            validator,
            db,
            tree,
            changes,
        })
    }

    /// Validate an entry and wrap it into a fresh record ready for storage
    fn prepare(&self, entry: CacheEntry) -> Result<(StoredRecord, Vec<u8>)> {
        let document = serde_json::to_value(&entry)
            .map_err(|e| Error::StorageWriteFailed(format!("Failed to encode document: {}", e)))?;
        if !self.validator.is_valid(&document) {
            let violations: Vec<String> = self
                .validator
                .iter_errors(&document)
                .map(|e| e.to_string())
                .collect();
            return Err(Error::StorageWriteFailed(format!(
                "Document with key '{}' violates schema of collection '{}': {}",
                entry.key,
                self.name,
                violations.join("; ")
            )));
        }

        let revision = self
            .db
            .generate_id()
            .map_err(|e| Error::StorageWriteFailed(format!("Failed to allocate revision: {}", e)))?;

        let record = StoredRecord::new(entry, revision);
        let bytes = serde_json::to_vec(&record)
            .map_err(|e| Error::StorageWriteFailed(format!("Failed to encode document: {}", e)))?;

        Ok((record, bytes))
    }

    fn decode(&self, bytes: &[u8]) -> Result<StoredRecord> {
        serde_json::from_slice(bytes).map_err(|e| {
            Error::StorageReadFailed(format!(
                "Failed to decode document in collection '{}': {}",
                self.name, e
            ))
        })
    }

    fn flush(&self) -> Result<()> {
        self.tree
            .flush()
            .map_err(|e| Error::StorageWriteFailed(format!("Failed to flush database: {}", e)))?;
        Ok(())
    }

    fn publish(&self, change: CollectionChange) {
        let kind = change.kind();
        let key = change.key().to_string();

        match self.changes.send(change) {
            Ok(subscriber_count) => {
                tracing::debug!(
                    "Broadcasted {} event for key '{}' in collection '{}' to {} subscriber(s)",
                    kind,
                    key,
                    self.name,
                    subscriber_count
                );
            }
            Err(_) => {
                tracing::debug!(
                    "No live queries for {} event on key '{}' in collection '{}'",
                    kind,
                    key,
                    self.name
                );
            }
        }
    }
}

#[async_trait]
impl DocumentCollection for SledCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    fn subscribe(&self) -> broadcast::Receiver<CollectionChange> {
        self.changes.subscribe()
    }

    async fn find_one(&self, key: &str) -> Result<Option<StoredRecord>> {
        let value = self
            .tree
            .get(key.as_bytes())
            .map_err(|e| Error::StorageReadFailed(format!("Failed to get document: {}", e)))?;

        value.map(|bytes| self.decode(&bytes)).transpose()
    }

    async fn find(&self) -> Result<Vec<StoredRecord>> {
        let mut records = Vec::new();

        for result in self.tree.iter() {
            let (_, value) = result.map_err(|e| {
                Error::StorageReadFailed(format!("Failed to iterate collection: {}", e))
            })?;

            records.push(self.decode(&value)?);
        }

        Ok(records)
    }

    async fn replace(&self, entry: CacheEntry) -> Result<StoredRecord> {
        let (record, bytes) = self.prepare(entry)?;

        let previous = self
            .tree
            .insert(record.key().as_bytes(), bytes)
            .map_err(|e| Error::StorageWriteFailed(format!("Failed to replace document: {}", e)))?;
        self.flush()?;

        let event = DocumentWrittenEvent {
            collection: self.name.clone(),
            record: record.clone(),
            timestamp: now_timestamp(),
        };
        self.publish(match previous {
            Some(_) => CollectionChange::Replaced(event),
            None => CollectionChange::Inserted(event),
        });

        Ok(record)
    }

    async fn remove(&self, key: &str) -> Result<Option<StoredRecord>> {
        let previous = self
            .tree
            .remove(key.as_bytes())
            .map_err(|e| Error::StorageWriteFailed(format!("Failed to remove document: {}", e)))?;

        let Some(bytes) = previous else {
            return Ok(None);
        };
        self.flush()?;

        self.publish(CollectionChange::Removed(DocumentRemovedEvent {
            collection: self.name.clone(),
            key: key.to_string(),
            timestamp: now_timestamp(),
        }));

        self.decode(&bytes).map(Some)
    }
}

impl std::fmt::Debug for SledCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledCollection")
            .field("name", &self.name)
            .field("documents", &self.tree.len())
            .field("live_queries", &self.changes.receiver_count())
            .finish()
    }
}
