//! Metric names emitted by the page cache.

pub const PAGE_CACHE_HIT: &str = "yatube_page_cache_hit_total";
pub const PAGE_CACHE_MISS: &str = "yatube_page_cache_miss_total";
pub const PAGE_CACHE_EXPIRED: &str = "yatube_page_cache_expired_total";
pub const PAGE_CACHE_EVICT: &str = "yatube_page_cache_evict_total";
pub const PAGE_CACHE_ENTRIES: &str = "yatube_page_cache_entries";
