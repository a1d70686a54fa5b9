pub mod error;
pub mod memory;
pub mod postgrest;
pub mod request;

pub use error::BackendError;
pub use memory::MemoryBackend;
pub use postgrest::PostgrestBackend;
pub use request::{EqFilter, Field, Order, SelectRequest, Selection};

use std::future::Future;

/// One returned row: column name to scalar or embedded row.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Read access to the relational backend.
pub trait Backend: Send + Sync + 'static {
    fn select(
        &self,
        request: &SelectRequest,
    ) -> impl Future<Output = Result<Vec<Row>, BackendError>> + Send;

    /// Liveness probe. Backends without a remote side are always up.
    fn ping(&self) -> impl Future<Output = Result<(), BackendError>> + Send {
        async { Ok(()) }
    }
}
