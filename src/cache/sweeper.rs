use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use super::PageCache;

/// Periodically drop expired page cache entries.
pub fn spawn_sweeper(store: Arc<PageCache>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await; // Skip the first immediate tick
        loop {
            interval.tick().await;
            let removed = store.purge_expired();
            if removed > 0 {
                debug!(cache = "page", removed, "swept expired entries");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use bytes::Bytes;

    use super::*;
    use crate::cache::{CacheConfig, CacheKey, CachedResponse};

    #[tokio::test]
    async fn sweeper_purges_expired_entries() {
        let config = CacheConfig {
            index_timeout: Duration::from_millis(10),
            ..CacheConfig::default()
        };
        let store = Arc::new(PageCache::new(&config));
        store.set_at(
            CacheKey::index_page(None, "/"),
            CachedResponse {
                status: 200,
                headers: Vec::new(),
                body: Bytes::from_static(b"stale"),
            },
            Instant::now()
                .checked_sub(Duration::from_secs(1))
                .unwrap_or_else(Instant::now),
        );

        let handle = spawn_sweeper(store.clone(), Duration::from_millis(5));
        for _ in 0..100 {
            if store.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        handle.abort();

        assert!(store.is_empty());
    }
}
