pub mod bootstrap;
pub mod diagnostics;

pub use bootstrap::{create_db, Store, CACHE_COLLECTION, RESET_ON_BOOTSTRAP};
pub use diagnostics::{BuildMode, Diagnostics};
