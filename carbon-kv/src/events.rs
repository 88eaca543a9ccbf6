use crate::domain::StoredRecord;
use serde::{Deserialize, Serialize};

/// Write events published on a collection's change feed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CollectionChange {
    Inserted(DocumentWrittenEvent),
    Replaced(DocumentWrittenEvent),
    Removed(DocumentRemovedEvent),
}

impl CollectionChange {
    pub fn collection(&self) -> &str {
        match self {
            CollectionChange::Inserted(e) | CollectionChange::Replaced(e) => &e.collection,
            CollectionChange::Removed(e) => &e.collection,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            CollectionChange::Inserted(e) | CollectionChange::Replaced(e) => e.record.key(),
            CollectionChange::Removed(e) => &e.key,
        }
    }

    /// Document state after the change, `None` once removed
    pub fn record(&self) -> Option<&StoredRecord> {
        match self {
            CollectionChange::Inserted(e) | CollectionChange::Replaced(e) => Some(&e.record),
            CollectionChange::Removed(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CollectionChange::Inserted(_) => "inserted",
            CollectionChange::Replaced(_) => "replaced",
            CollectionChange::Removed(_) => "removed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentWrittenEvent {
    pub collection: String,
    pub record: StoredRecord,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRemovedEvent {
    pub collection: String,
    pub key: String,
    pub timestamp: i64,
}

/// Current time in milliseconds since UNIX epoch
pub fn now_timestamp() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
