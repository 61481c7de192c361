use std::fmt;

/// Prefix of every cached index render.
pub const INDEX_PAGE_PREFIX: &str = "index_page";

const ANONYMOUS: &str = "anonymous";

/// Page cache key: prefix, viewer and request target.
///
/// Different viewers and different `?page=` values never share an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    prefix: &'static str,
    viewer: Option<String>,
    target: String,
}

impl CacheKey {
    pub fn new(prefix: &'static str, viewer: Option<&str>, target: &str) -> Self {
        Self {
            prefix,
            viewer: viewer.map(str::to_string),
            target: target.to_string(),
        }
    }

    /// Key for an index render seen by `viewer` at `target` (path and query).
    pub fn index_page(viewer: Option<&str>, target: &str) -> Self {
        Self::new(INDEX_PAGE_PREFIX, viewer, target)
    }

    pub fn prefix(&self) -> &'static str {
        self.prefix
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let viewer = self.viewer.as_deref().unwrap_or(ANONYMOUS);
        write!(f, "{}:{}:{}", self.prefix, viewer, self.target)
    }
}
