use std::time::Duration;

pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_GC_TIME: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);
pub const MAX_RETRY_DELAY: Duration = Duration::from_millis(30_000);

/// Per-subscription fetch policy.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    /// Data younger than this is served without a new fetch.
    pub stale_time: Duration,
    /// When false nothing is ever requested for this subscription.
    pub enabled: bool,
    /// Automatic re-attempts after a failed fetch.
    pub retry_count: usize,
    /// Delay before the first re-attempt, doubled for each one after.
    pub retry_delay: Duration,
    pub refetch_on_refocus: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            stale_time: DEFAULT_STALE_TIME,
            enabled: true,
            retry_count: 1,
            retry_delay: DEFAULT_RETRY_DELAY,
            refetch_on_refocus: false,
        }
    }
}

impl QueryOptions {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = stale_time;
        self
    }

    pub fn retry_count(mut self, retry_count: usize) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn refetch_on_refocus(mut self, refetch: bool) -> Self {
        self.refetch_on_refocus = refetch;
        self
    }
}

/// Store-wide settings.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long an entry without subscribers is kept around.
    pub gc_time: Duration,
    /// Upper bound on retained entries; idle ones are evicted past it.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            gc_time: DEFAULT_GC_TIME,
            max_entries: 1000,
        }
    }
}
