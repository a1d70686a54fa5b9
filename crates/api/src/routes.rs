use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use backend::Backend;
use cache::{CacheStats, FetchError, MetricsSnapshot, QueryResult, QueryStatus, Subscription};
use queries::{
    Appointments, CallDetails, Calls, Companies, DashboardClient, DashboardSummary, Documents, EntityQuery,
    RagChunks,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub struct AppState<B: Backend> {
    pub client: DashboardClient<B>,
}

impl<B: Backend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
        }
    }
}

/// Same shape for every query route.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse<T> {
    pub key: String,
    pub status: QueryStatus,
    pub is_loading: bool,
    pub is_fetching: bool,
    pub data: Option<Vec<T>>,
    pub error: Option<FetchError>,
}

impl<T: Clone> QueryResponse<T> {
    fn from_result(key: String, result: &QueryResult<Vec<T>>) -> Self {
        Self {
            key,
            status: result.status,
            is_loading: result.is_loading(),
            is_fetching: result.is_fetching,
            data: result.data.as_ref().map(|rows| rows.as_ref().clone()),
            error: result.error.clone(),
        }
    }
}

#[derive(Deserialize)]
pub struct ReadParams {
    /// Return the current state instead of waiting for a first load.
    #[serde(default)]
    pub nowait: bool,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    backend: String,
    cache: CacheStats,
}

#[derive(Serialize)]
struct MetricsResponse {
    cache: CacheStats,
    fetches: MetricsSnapshot,
}

#[derive(Serialize)]
struct RefocusResponse {
    refetched: usize,
}

#[derive(Serialize)]
struct RefetchResponse {
    key: String,
    started: bool,
}

pub fn router<B: Backend>(state: AppState<B>) -> Router {
    Router::new()
        .route("/health", get(health_check::<B>))
        .route("/companies", get(companies::<B>))
        .route("/calls", get(calls::<B>))
        .route("/calls/:id/details", get(call_details::<B>))
        .route("/appointments", get(appointments::<B>))
        .route("/documents", get(documents::<B>))
        .route("/rag-chunks", get(rag_chunks::<B>))
        .route("/summary", get(summary::<B>))
        .route("/metrics", get(metrics::<B>))
        .route("/refocus", post(refocus::<B>))
        .route("/refetch/:query", post(refetch::<B>))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn respond<T: Clone + Send + Sync + 'static>(
    mut subscription: Subscription<Vec<T>>,
    params: &ReadParams,
) -> Json<QueryResponse<T>> {
    // Only a first load is waited for; stale rows are served while they refresh.
    let result = if params.nowait {
        subscription.current()
    } else {
        subscription.loaded().await
    };
    Json(QueryResponse::from_result(subscription.key().to_string(), &result))
}

async fn health_check<B: Backend>(State(state): State<AppState<B>>) -> Json<HealthResponse> {
    let backend = match state.client.backend().ping().await {
        Ok(()) => "ok".to_string(),
        Err(e) => format!("error: {}", e),
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        backend,
        cache: state.client.cache().stats(),
    })
}

async fn companies<B: Backend>(
    State(state): State<AppState<B>>,
    Query(params): Query<ReadParams>,
) -> Json<QueryResponse<queries::Company>> {
    respond(state.client.companies(), &params).await
}

async fn calls<B: Backend>(
    State(state): State<AppState<B>>,
    Query(params): Query<ReadParams>,
) -> Json<QueryResponse<queries::Call>> {
    respond(state.client.calls(), &params).await
}

async fn call_details<B: Backend>(
    State(state): State<AppState<B>>,
    Path(id): Path<i64>,
    Query(params): Query<ReadParams>,
) -> Json<QueryResponse<queries::CallDetail>> {
    respond(state.client.call_details(Some(id)), &params).await
}

async fn appointments<B: Backend>(
    State(state): State<AppState<B>>,
    Query(params): Query<ReadParams>,
) -> Json<QueryResponse<queries::Appointment>> {
    respond(state.client.appointments(), &params).await
}

async fn documents<B: Backend>(
    State(state): State<AppState<B>>,
    Query(params): Query<ReadParams>,
) -> Json<QueryResponse<queries::Document>> {
    respond(state.client.documents(), &params).await
}

async fn rag_chunks<B: Backend>(
    State(state): State<AppState<B>>,
    Query(params): Query<ReadParams>,
) -> Json<QueryResponse<queries::RagChunk>> {
    respond(state.client.rag_chunks(), &params).await
}

async fn summary<B: Backend>(State(state): State<AppState<B>>) -> Json<DashboardSummary> {
    let summary = state.client.summary().await;
    if !summary.unavailable.is_empty() {
        warn!(unavailable = ?summary.unavailable, "Summary is missing collections");
    }
    Json(summary)
}

async fn metrics<B: Backend>(State(state): State<AppState<B>>) -> Json<MetricsResponse> {
    let cache = state.client.cache();
    Json(MetricsResponse {
        cache: cache.stats(),
        fetches: cache.metrics().snapshot(),
    })
}

async fn refocus<B: Backend>(State(state): State<AppState<B>>) -> Json<RefocusResponse> {
    let refetched = state.client.cache().on_refocus();
    info!(refetched, "Refocus");
    Json(RefocusResponse { refetched })
}

/// `:query` is a query key as displayed (`calls`, `call-details:5`).
async fn refetch<B: Backend>(
    State(state): State<AppState<B>>,
    Path(query): Path<String>,
) -> Result<Json<RefetchResponse>, StatusCode> {
    let key = match query.split_once(':') {
        None => match query.as_str() {
            "companies" => Companies.key(),
            "calls" => Calls.key(),
            "appointments" => Appointments.key(),
            "documents" => Documents.key(),
            "rag-chunks" => RagChunks.key(),
            _ => return Err(StatusCode::NOT_FOUND),
        },
        Some(("call-details", id)) => {
            let id = id.parse::<i64>().map_err(|_| StatusCode::BAD_REQUEST)?;
            CallDetails::new(Some(id)).key()
        }
        Some(_) => return Err(StatusCode::NOT_FOUND),
    };

    let started = state.client.cache().refetch(&key);
    Ok(Json(RefetchResponse {
        key: key.to_string(),
        started,
    }))
}
