use crate::domain::{CachedValue, EntrySnapshot};
use crate::ports::DocumentCollection;
use chrono::Utc;
use shared::Result;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BuildMode {
    Development,
    Production,
}

impl BuildMode {
    /// Release builds count as production
    pub const fn current() -> Self {
        if cfg!(debug_assertions) {
            BuildMode::Development
        } else {
            BuildMode::Production
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, BuildMode::Production)
    }
}

/// Developer aid that logs everything stored in a collection
#[derive(Clone, Copy, Debug)]
pub struct Diagnostics {
    mode: BuildMode,
}

impl Diagnostics {
    pub fn new(mode: BuildMode) -> Self {
        Self { mode }
    }

    /// Snapshot and log every entry. Does nothing in production builds.
    pub async fn dump_all(&self, collection: &dyn DocumentCollection) -> Result<Vec<EntrySnapshot>> {
        if self.mode.is_production() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let snapshots: Vec<EntrySnapshot> = collection
            .find()
            .await?
            .into_iter()
            .map(|record| EntrySnapshot {
                expired: record.entry.is_expired(now),
                data: CachedValue::from_payload(&record.entry.key, &record.entry.data),
                key: record.entry.key,
                cache_time: record.entry.cache_time,
            })
            .collect();

        tracing::info!(
            "Last cached data in Database: {} entr{} in '{}'",
            snapshots.len(),
            if snapshots.len() == 1 { "y" } else { "ies" },
            collection.name()
        );
        for snapshot in &snapshots {
            let data = match &snapshot.data {
                CachedValue::Value(value) => value.to_string(),
                CachedValue::Raw(raw) => format!("<raw> {}", raw),
            };
            tracing::info!(
                key = %snapshot.key,
                cache_time = %snapshot.cache_time,
                expired = snapshot.expired,
                "{}",
                data
            );
        }

        Ok(snapshots)
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new(BuildMode::current())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CacheEntry, CollectionSchema};
    use crate::persistence::SledCollection;
    use serde_json::json;

    fn open_collection(dir: &tempfile::TempDir) -> SledCollection {
        let db = sled::open(dir.path().join("test.sled")).unwrap();
        let tree = db.open_tree("app").unwrap();
        SledCollection::new("app", CollectionSchema::cache_entries(), db, tree).unwrap()
    }

    #[tokio::test]
    async fn test_dump_all_decodes_every_entry() {
        let temp_dir = tempfile::tempdir().unwrap();
        let collection = open_collection(&temp_dir);

        collection
            .replace(CacheEntry::new("fresh", "2999-01-01T00:00:00Z", r#"{"name":"Denis2"}"#))
            .await
            .unwrap();
        collection
            .replace(CacheEntry::new("stale", "2000-01-01T00:00:00Z", "not json"))
            .await
            .unwrap();

        let snapshots = Diagnostics::new(BuildMode::Development)
            .dump_all(&collection)
            .await
            .unwrap();

        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].key, "fresh");
        assert_eq!(snapshots[0].data, CachedValue::Value(json!({"name": "Denis2"})));
        assert!(!snapshots[0].expired);
        assert_eq!(snapshots[1].key, "stale");
        assert_eq!(snapshots[1].data, CachedValue::Raw("not json".to_string()));
        assert!(snapshots[1].expired);
    }

    #[tokio::test]
    async fn test_dump_all_is_noop_in_production() {
        let temp_dir = tempfile::tempdir().unwrap();
        let collection = open_collection(&temp_dir);

        collection
            .replace(CacheEntry::new("k", "2999-01-01T00:00:00Z", "1"))
            .await
            .unwrap();

        let snapshots = Diagnostics::new(BuildMode::Production)
            .dump_all(&collection)
            .await
            .unwrap();
        assert!(snapshots.is_empty());
    }

    #[test]
    fn test_build_mode_follows_debug_assertions() {
        assert_eq!(
            BuildMode::current().is_production(),
            !cfg!(debug_assertions)
        );
    }
}
