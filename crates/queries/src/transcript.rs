use backend::Backend;
use cache::{FetchError, QueryResult, Subscription};
use std::sync::Arc;
use tracing::debug;

use crate::client::DashboardClient;
use crate::definitions::CallDetails;
use crate::schema::CallDetail;

#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptState {
    Closed,
    Opening { call_id: i64 },
    Loaded { call_id: i64, lines: Arc<Vec<CallDetail>> },
    Empty { call_id: i64 },
    Errored { call_id: i64, error: FetchError },
}

impl TranscriptState {
    pub fn call_id(&self) -> Option<i64> {
        match self {
            TranscriptState::Closed => None,
            TranscriptState::Opening { call_id }
            | TranscriptState::Loaded { call_id, .. }
            | TranscriptState::Empty { call_id }
            | TranscriptState::Errored { call_id, .. } => Some(*call_id),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TranscriptState::Opening { .. })
    }
}

/// Selected-call transcript. Holds at most one call-details subscription,
/// keyed by the open call.
pub struct TranscriptViewer<B: Backend> {
    client: DashboardClient<B>,
    selected: Option<i64>,
    subscription: Option<Subscription<Vec<CallDetail>>>,
}

impl<B: Backend> TranscriptViewer<B> {
    pub fn new(client: DashboardClient<B>) -> Self {
        Self {
            client,
            selected: None,
            subscription: None,
        }
    }

    /// Show the transcript of `call_id`. Ids that are not positive close
    /// the viewer instead. Opening the failed transcript that is already
    /// selected retries it.
    pub fn open(&mut self, call_id: i64) {
        if call_id <= 0 {
            debug!(call_id, "Ignoring transcript request for unset call");
            self.close();
            return;
        }
        if self.selected == Some(call_id) {
            if let TranscriptState::Errored { .. } = self.state() {
                debug!(call_id, "Retrying failed transcript");
                self.client.refetch(&CallDetails::new(Some(call_id)));
            }
            return;
        }
        // Release the previous call first so its entry becomes collectable.
        self.subscription = None;
        self.selected = Some(call_id);
        self.subscription = Some(self.client.call_details(Some(call_id)));
    }

    pub fn close(&mut self) {
        self.selected = None;
        self.subscription = None;
    }

    pub fn selected(&self) -> Option<i64> {
        self.selected
    }

    pub fn is_open(&self) -> bool {
        self.selected.is_some()
    }

    pub fn state(&self) -> TranscriptState {
        match (self.selected, &self.subscription) {
            (Some(call_id), Some(sub)) => classify(call_id, &sub.current()),
            _ => TranscriptState::Closed,
        }
    }

    /// Wait until the open transcript has loaded, come back empty or failed.
    pub async fn settle(&mut self) -> TranscriptState {
        match (self.selected, self.subscription.as_mut()) {
            (Some(call_id), Some(sub)) => {
                let result = sub.settled().await;
                classify(call_id, &result)
            }
            _ => TranscriptState::Closed,
        }
    }
}

fn classify(call_id: i64, result: &QueryResult<Vec<CallDetail>>) -> TranscriptState {
    if let (true, Some(error)) = (result.is_error(), &result.error) {
        return TranscriptState::Errored {
            call_id,
            error: error.clone(),
        };
    }
    match &result.data {
        Some(lines) if !lines.is_empty() => TranscriptState::Loaded {
            call_id,
            lines: lines.clone(),
        },
        Some(_) => TranscriptState::Empty { call_id },
        None => TranscriptState::Opening { call_id },
    }
}
