use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::warn;

use crate::error::FetchError;
use crate::key::QueryKey;
use crate::options::QueryOptions;
use crate::result::{QueryResult, QueryStatus};

pub(crate) type ErasedData = Arc<dyn Any + Send + Sync>;
pub(crate) type FetchFuture = Pin<Box<dyn Future<Output = Result<ErasedData, FetchError>> + Send>>;
pub(crate) type Fetcher = Arc<dyn Fn() -> FetchFuture + Send + Sync>;

/// Type-erased view published to subscribers.
#[derive(Clone)]
pub(crate) struct Snapshot {
    status: QueryStatus,
    data: Option<ErasedData>,
    error: Option<FetchError>,
    is_fetching: bool,
    updated_at: Option<Instant>,
}

impl Snapshot {
    pub(crate) fn typed<T: Send + Sync + 'static>(&self, key: &QueryKey) -> QueryResult<T> {
        let data = self.data.clone().and_then(|d| match d.downcast::<T>() {
            Ok(typed) => Some(typed),
            Err(_) => {
                warn!(key = %key, "Cached data has a different type than requested");
                None
            }
        });

        QueryResult {
            status: self.status,
            data,
            error: self.error.clone(),
            is_fetching: self.is_fetching,
            updated_at: self.updated_at,
        }
    }
}

pub(crate) struct EntryState {
    pub status: QueryStatus,
    pub data: Option<ErasedData>,
    pub error: Option<FetchError>,
    pub fetched_at: Option<Instant>,
    pub invalidated: bool,
    pub in_flight: bool,
    pub subscribers: usize,
    pub unsubscribed_at: Option<Instant>,
    pub fetcher: Option<Fetcher>,
    pub options: QueryOptions,
}

impl EntryState {
    pub fn is_stale(&self, now: Instant) -> bool {
        if self.invalidated {
            return true;
        }
        match self.fetched_at {
            Some(at) => now.duration_since(at) > self.options.stale_time,
            None => true,
        }
    }

    /// Unsubscribed long enough, with nothing running.
    pub fn is_collectable(&self, now: Instant, gc_time: Duration) -> bool {
        if self.subscribers > 0 || self.in_flight {
            return false;
        }
        match self.unsubscribed_at {
            Some(at) => now.duration_since(at) >= gc_time,
            None => false,
        }
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            is_fetching: self.in_flight,
            updated_at: self.fetched_at,
        }
    }
}

pub(crate) struct Entry {
    pub key: QueryKey,
    state: Mutex<EntryState>,
    tx: watch::Sender<Snapshot>,
}

impl Entry {
    pub fn new(key: QueryKey, options: QueryOptions) -> Self {
        let state = EntryState {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            fetched_at: None,
            invalidated: false,
            in_flight: false,
            subscribers: 0,
            unsubscribed_at: None,
            fetcher: None,
            options,
        };
        let (tx, _rx) = watch::channel(state.snapshot());
        Self {
            key,
            state: Mutex::new(state),
            tx,
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, EntryState> {
        // State stays consistent across a panicking holder; every write is a
        // plain field assignment.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn watch(&self) -> watch::Receiver<Snapshot> {
        self.tx.subscribe()
    }

    pub fn publish(&self, state: &EntryState) {
        self.tx.send_replace(state.snapshot());
    }
}
