pub mod cache_operations;
pub mod live_query;

pub use cache_operations::CacheService;
pub use live_query::LiveQuery;
