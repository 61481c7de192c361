//! Page cache for rendered listings.
//!
//! Rendered responses are kept for a fixed timeout and replayed verbatim.
//! Writes never invalidate entries; only the timeout, LRU capacity and an
//! explicit [`PageCache::clear`] remove them.
//!
//! ```toml
//! [cache]
//! enabled = true
//! index_timeout_seconds = 20
//! capacity = 256
//! sweep_interval_seconds = 60
//! ```

mod config;
mod keys;
pub(crate) mod lock;
pub mod metrics;
mod middleware;
mod store;
mod sweeper;

pub use config::CacheConfig;
pub use keys::{CacheKey, INDEX_PAGE_PREFIX};
pub use middleware::{CacheState, page_cache_layer};
pub use store::{CachedResponse, PageCache};
pub use sweeper::spawn_sweeper;
