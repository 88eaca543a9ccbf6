use super::sled_store::SledCollection;
use crate::domain::CollectionSchema;
use crate::ports::DocumentCollection;
use shared::config::Config;
use shared::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

const SCHEMAS_TREE: &str = "__schemas";

/// A named, persistent sled database holding schema-validated collections
pub struct Database {
    name: String,
    path: PathBuf,
    db: sled::Db,
    collections: RwLock<HashMap<String, Arc<SledCollection>>>,
}

impl Database {
    /// Open the database described by `config`, creating it on first use
    pub fn open(config: &Config) -> Result<Self> {
        Self::open_at(&config.db_name, config.db_path())
    }

    fn open_at(name: &str, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::StorageUnavailable(format!("Failed to create directory: {}", e))
            })?;
        }

        let db = sled::open(&path).map_err(|e| {
            Error::StorageUnavailable(format!("Failed to open database '{}': {}", name, e))
        })?;

        tracing::info!(
            "Opened database '{}' at {} ({})",
            name,
            path.display(),
            if db.was_recovered() { "existing" } else { "created" }
        );

        Ok(Self {
            name: name.to_string(),
            path,
            db,
            collections: RwLock::new(HashMap::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Irreversibly delete every document and schema of this database and
    /// reopen it empty
    pub fn drop_and_recreate(self) -> Result<Self> {
        let Self {
            name,
            path,
            db,
            collections,
        } = self;

        tracing::warn!("Dropping database '{}' at {}", name, path.display());

        db.flush()
            .map_err(|e| Error::StorageUnavailable(format!("Failed to flush database: {}", e)))?;

        // Every handle must be released before the files go away
        drop(collections);
        drop(db);

        if path.exists() {
            std::fs::remove_dir_all(&path).map_err(|e| {
                Error::StorageUnavailable(format!("Failed to remove database files: {}", e))
            })?;
        }

        Self::open_at(&name, path)
    }

    /// Declare a collection with its schema.
    ///
    /// Re-declaring with the identical schema returns the already open
    /// collection; a different schema under the same name is rejected.
    pub async fn ensure_collection(
        &self,
        name: &str,
        schema: CollectionSchema,
    ) -> Result<Arc<SledCollection>> {
        if name.is_empty() || name.starts_with("__") {
            return Err(Error::StorageWriteFailed(format!(
                "Invalid collection name '{}'",
                name
            )));
        }

        let mut collections = self.collections.write().await;

        if let Some(existing) = collections.get(name) {
            if existing.schema() != &schema {
                return Err(Error::SchemaMismatch {
                    collection: name.to_string(),
                    stored: existing.schema().version(),
                    requested: schema.version(),
                });
            }
            return Ok(Arc::clone(existing));
        }

        let tree = self.db.open_tree(name).map_err(|e| {
            Error::StorageUnavailable(format!("Failed to open collection '{}': {}", name, e))
        })?;
        let collection = Arc::new(SledCollection::new(name, schema, self.db.clone(), tree)?);
        self.register_schema(name, collection.schema())?;
        collections.insert(name.to_string(), Arc::clone(&collection));

        tracing::info!("Collection '{}' ready in database '{}'", name, self.name);

        Ok(collection)
    }

    /// Persist the schema on first declaration, otherwise check it matches
    fn register_schema(&self, name: &str, schema: &CollectionSchema) -> Result<()> {
        let schemas = self.db.open_tree(SCHEMAS_TREE).map_err(|e| {
            Error::StorageUnavailable(format!("Failed to open schema registry: {}", e))
        })?;

        let stored = schemas
            .get(name.as_bytes())
            .map_err(|e| Error::StorageReadFailed(format!("Failed to read schema: {}", e)))?;

        match stored {
            Some(bytes) => {
                let stored: CollectionSchema = serde_json::from_slice(&bytes).map_err(|e| {
                    Error::StorageReadFailed(format!("Failed to decode stored schema: {}", e))
                })?;

                if &stored != schema {
                    return Err(Error::SchemaMismatch {
                        collection: name.to_string(),
                        stored: stored.version(),
                        requested: schema.version(),
                    });
                }
            }
            None => {
                let bytes = serde_json::to_vec(schema).map_err(|e| {
                    Error::Serialization(format!("Failed to serialize schema: {}", e))
                })?;
                schemas.insert(name.as_bytes(), bytes).map_err(|e| {
                    Error::StorageWriteFailed(format!("Failed to save schema: {}", e))
                })?;
                schemas.flush().map_err(|e| {
                    Error::StorageWriteFailed(format!("Failed to flush database: {}", e))
                })?;
            }
        }

        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| Error::StorageWriteFailed(format!("Failed to flush database: {}", e)))?;
        Ok(())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish()
    }
}
