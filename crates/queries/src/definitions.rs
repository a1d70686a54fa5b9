use backend::{BackendError, Row, SelectRequest, Selection};
use cache::{FetchError, QueryKey};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::schema::{Appointment, Call, CallDetail, Company, Document, RagChunk};

/// Declarative binding of a cache key to a backend read and a row shape.
pub trait EntityQuery: Send + Sync + 'static {
    type Row: DeserializeOwned + Send + Sync + 'static;

    fn key(&self) -> QueryKey;

    fn request(&self) -> SelectRequest;

    /// Activation predicate; a disabled query never fetches.
    fn enabled(&self) -> bool {
        true
    }

    /// Order rows the way consumers expect them. Re-applied after every
    /// fetch so the result does not depend on the backend honouring `order`.
    fn sort(rows: &mut [Self::Row]);
}

fn company_ref() -> Selection {
    Selection::columns(["id", "name"])
}

pub struct Companies;

impl EntityQuery for Companies {
    type Row = Company;

    fn key(&self) -> QueryKey {
        QueryKey::new("companies")
    }

    fn request(&self) -> SelectRequest {
        SelectRequest::from_relation("companies").order_by("created_at", false)
    }

    fn sort(rows: &mut [Company]) {
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }
}

pub struct Calls;

impl EntityQuery for Calls {
    type Row = Call;

    fn key(&self) -> QueryKey {
        QueryKey::new("calls")
    }

    fn request(&self) -> SelectRequest {
        SelectRequest::from_relation("calls")
            .select(Selection::all().embed("companies", company_ref()))
            .order_by("start_time", false)
    }

    fn sort(rows: &mut [Call]) {
        rows.sort_by(|a, b| b.start_time.cmp(&a.start_time));
    }
}

/// Transcript lines of one call. Only active for a positive call id.
pub struct CallDetails {
    pub call_id: Option<i64>,
}

impl CallDetails {
    pub fn new(call_id: Option<i64>) -> Self {
        Self { call_id }
    }

    fn id(&self) -> i64 {
        self.call_id.unwrap_or(0)
    }
}

impl EntityQuery for CallDetails {
    type Row = CallDetail;

    fn key(&self) -> QueryKey {
        QueryKey::new("call-details").with(self.id())
    }

    fn request(&self) -> SelectRequest {
        SelectRequest::from_relation("call_details")
            .filter_eq("call_id", self.id())
            .order_by("timestamp", true)
    }

    fn enabled(&self) -> bool {
        self.id() > 0
    }

    fn sort(rows: &mut [CallDetail]) {
        rows.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    }
}

pub struct Appointments;

impl EntityQuery for Appointments {
    type Row = Appointment;

    fn key(&self) -> QueryKey {
        QueryKey::new("appointments")
    }

    fn request(&self) -> SelectRequest {
        SelectRequest::from_relation("appointments")
            .select(
                Selection::all()
                    .embed("companies", company_ref())
                    .embed("calls", Selection::columns(["id", "start_time"])),
            )
            .order_by("appointment_time", false)
    }

    fn sort(rows: &mut [Appointment]) {
        rows.sort_by(|a, b| b.appointment_time.cmp(&a.appointment_time));
    }
}

pub struct Documents;

impl EntityQuery for Documents {
    type Row = Document;

    fn key(&self) -> QueryKey {
        QueryKey::new("documents")
    }

    fn request(&self) -> SelectRequest {
        SelectRequest::from_relation("documents")
            .select(Selection::all().embed("companies", company_ref()))
            .order_by("created_at", false)
    }

    fn sort(rows: &mut [Document]) {
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }
}

pub struct RagChunks;

impl EntityQuery for RagChunks {
    type Row = RagChunk;

    fn key(&self) -> QueryKey {
        QueryKey::new("rag-chunks")
    }

    fn request(&self) -> SelectRequest {
        SelectRequest::from_relation("rag_chunks")
            .select(Selection::all().embed(
                "documents",
                Selection::columns(["id", "file_name", "company_id"]).embed("companies", company_ref()),
            ))
            .order_by("created_at", false)
    }

    fn sort(rows: &mut [RagChunk]) {
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }
}

pub fn to_fetch_error(e: BackendError) -> FetchError {
    match e {
        BackendError::Decode(msg) => FetchError::Decode(msg),
        other => FetchError::NetworkOrBackend(other.to_string()),
    }
}

/// Validate raw rows against the query's row type.
pub fn decode_rows<T: DeserializeOwned>(relation: &str, rows: Vec<Row>) -> Result<Vec<T>, FetchError> {
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| {
            let id = row.get("id").cloned().unwrap_or(Value::Null);
            serde_json::from_value(Value::Object(row))
                .map_err(|e| FetchError::Decode(format!("{} row {} (id {}): {}", relation, i, id, e)))
        })
        .collect()
}
