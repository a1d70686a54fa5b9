mod entry;
pub mod error;
pub mod key;
pub mod metrics;
pub mod options;
pub mod result;
pub mod retry;
pub mod store;

pub use error::FetchError;
pub use key::{KeyPart, QueryKey};
pub use metrics::{CacheMetrics, MetricsSnapshot};
pub use options::{CacheConfig, QueryOptions};
pub use result::{QueryResult, QueryStatus};
pub use retry::RetryPolicy;
pub use store::{CacheStats, QueryCache, Subscription};
