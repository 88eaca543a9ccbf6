// shared/src/lib.rs

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
    #[error("schema mismatch for collection '{collection}': stored version {stored}, requested version {requested}")]
    SchemaMismatch {
        collection: String,
        stored: u32,
        requested: u32,
    },
    #[error("serialization: {0}")]
    Serialization(String),
    #[error("storage write failed: {0}")]
    StorageWriteFailed(String),
    #[error("storage read failed: {0}")]
    StorageReadFailed(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Time-to-live expressed in whole minutes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TtlMinutes(pub i64);

pub mod config;
