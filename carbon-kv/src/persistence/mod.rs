pub mod database;
pub mod sled_store;

pub use database::Database;
pub use sled_store::{SledCollection, CHANGE_FEED_CAPACITY};
