//! Page cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

const DEFAULT_INDEX_TIMEOUT: Duration = Duration::from_secs(20);
const DEFAULT_CAPACITY: usize = 256;
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Serve and store cached index renders.
    pub enabled: bool,
    /// How long a rendered index page is reused.
    pub index_timeout: Duration,
    /// Maximum number of cached renders across all viewers and pages.
    pub capacity: usize,
    /// Period of the background task that drops expired entries.
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            index_timeout: DEFAULT_INDEX_TIMEOUT,
            capacity: DEFAULT_CAPACITY,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            index_timeout: Duration::from_secs(settings.index_timeout_seconds.get()),
            capacity: settings.capacity.get(),
            sweep_interval: Duration::from_secs(settings.sweep_interval_seconds.get()),
        }
    }
}

impl CacheConfig {
    /// Capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.capacity).unwrap_or(NonZeroUsize::MIN)
    }
}
