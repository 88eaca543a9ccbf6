pub mod domain;
pub mod events;
pub mod persistence;
pub mod planes;
pub mod ports;

// Re-export commonly used types
pub use domain::{CacheEntry, CachedValue, CollectionSchema, EntrySnapshot, StoredRecord};
pub use events::CollectionChange;
pub use planes::control::{create_db, BuildMode, Diagnostics, Store};
pub use planes::data::{CacheService, LiveQuery};
pub use ports::DocumentCollection;
pub use shared::{Error, Result};
