use super::diagnostics::{BuildMode, Diagnostics};
use crate::domain::CollectionSchema;
use crate::persistence::{Database, SledCollection};
use crate::ports::DocumentCollection;
use shared::Result;
use shared::config::Config;
use std::sync::Arc;

/// Wipe the database on every bootstrap. Operator switch, flip and rebuild
/// to reset local state.
pub const RESET_ON_BOOTSTRAP: bool = false;

/// Name of the single collection holding cache entries
pub const CACHE_COLLECTION: &str = "app";

/// Open database handle plus its cache collection.
///
/// Created once by [`create_db`] and shared by every cache operation.
pub struct Store {
    database: Database,
    collection: Arc<SledCollection>,
}

impl Store {
    pub fn collection(&self) -> Arc<dyn DocumentCollection> {
        self.collection.clone()
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Flush pending writes and release the database
    pub fn close(self) -> Result<()> {
        self.database.flush()?;
        tracing::info!("Closed database '{}'", self.database.name());
        Ok(())
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("database", &self.database)
            .field("collection", &self.collection)
            .finish()
    }
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct BootstrapOptions {
    pub reset: bool,
    pub mode: BuildMode,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            reset: RESET_ON_BOOTSTRAP,
            mode: BuildMode::current(),
        }
    }
}

/// Open (or create) the database, ensure the cache collection exists and,
/// outside production builds, log its contents.
///
/// Must complete before any cache operation runs.
pub async fn create_db(config: &Config) -> Result<Store> {
    bootstrap(config, BootstrapOptions::default()).await
}

pub(crate) async fn bootstrap(config: &Config, options: BootstrapOptions) -> Result<Store> {
    let mut database = Database::open(config)?;

    if options.reset {
        database = database.drop_and_recreate()?;
    }

    let collection = database
        .ensure_collection(CACHE_COLLECTION, CollectionSchema::cache_entries())
        .await?;

    Diagnostics::new(options.mode)
        .dump_all(&*collection)
        .await?;

    Ok(Store {
        database,
        collection,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planes::data::CacheService;
    use crate::domain::CachedValue;
    use shared::Error;

    fn config(dir: &tempfile::TempDir) -> Config {
        Config::new(dir.path().to_string_lossy(), "app-db")
    }

    #[tokio::test]
    async fn test_create_db_yields_usable_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = create_db(&config(&temp_dir)).await.unwrap();

        assert_eq!(store.database().name(), "app-db");
        assert_eq!(store.collection().name(), CACHE_COLLECTION);
        assert_eq!(store.collection().schema(), &CollectionSchema::cache_entries());

        let cache = CacheService::new(&store);
        cache.upsert("k", &42, 1).await.unwrap();
        assert_eq!(
            cache.get_once::<i32>("k").await.unwrap(),
            Some(CachedValue::Value(42))
        );

        drop(cache);
        store.close().unwrap();
    }

    #[tokio::test]
    async fn test_bootstrap_preserves_data_across_restarts() {
        let temp_dir = tempfile::tempdir().unwrap();

        {
            let store = create_db(&config(&temp_dir)).await.unwrap();
            CacheService::new(&store).upsert("k", "kept", 1).await.unwrap();
            store.close().unwrap();
        }

        let store = create_db(&config(&temp_dir)).await.unwrap();
        let cache = CacheService::new(&store);
        assert_eq!(
            cache.get_once::<String>("k").await.unwrap(),
            Some(CachedValue::Value("kept".to_string()))
        );
    }

    #[tokio::test]
    async fn test_bootstrap_with_reset_wipes_data() {
        let temp_dir = tempfile::tempdir().unwrap();

        {
            let store = create_db(&config(&temp_dir)).await.unwrap();
            CacheService::new(&store).upsert("k", "gone", 1).await.unwrap();
            store.close().unwrap();
        }

        let options = BootstrapOptions {
            reset: true,
            mode: BuildMode::Development,
        };
        let store = bootstrap(&config(&temp_dir), options).await.unwrap();
        assert!(store.collection().find().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bootstrap_fails_when_storage_unavailable() {
        let temp_dir = tempfile::tempdir().unwrap();
        let blocker = temp_dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let config = Config::new(blocker.to_string_lossy(), "app-db");
        let result = create_db(&config).await;

        assert!(matches!(result, Err(Error::StorageUnavailable(_))));
    }
}
