use serde::Serialize;
use std::sync::Arc;
use tokio::time::Instant;

use crate::error::FetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    /// Never fetched because the query is disabled.
    Idle,
    /// First fetch running, nothing to show yet.
    Loading,
    Success,
    /// Retries exhausted.
    Error,
}

/// What a subscriber sees for one key at one point in time.
#[derive(Debug)]
pub struct QueryResult<T> {
    pub status: QueryStatus,
    pub data: Option<Arc<T>>,
    pub error: Option<FetchError>,
    /// A fetch is running, including background refreshes of stale data.
    pub is_fetching: bool,
    pub updated_at: Option<Instant>,
}

impl<T> Clone for QueryResult<T> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            is_fetching: self.is_fetching,
            updated_at: self.updated_at,
        }
    }
}

impl<T> QueryResult<T> {
    pub fn is_idle(&self) -> bool {
        self.status == QueryStatus::Idle
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    /// Neither waiting for a first result nor refreshing one.
    pub fn is_settled(&self) -> bool {
        !self.is_loading() && !self.is_fetching
    }
}

impl<R> QueryResult<Vec<R>> {
    /// Rows, or an empty slice when nothing has been fetched.
    pub fn rows(&self) -> &[R] {
        self.data.as_deref().map(Vec::as_slice).unwrap_or(&[])
    }
}
