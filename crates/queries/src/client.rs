use backend::{Backend, SelectRequest};
use cache::{FetchError, QueryCache, QueryOptions, Subscription};
use std::sync::Arc;
use tracing::debug;

use crate::definitions::{
    decode_rows, to_fetch_error, Appointments, CallDetails, Calls, Companies, Documents, EntityQuery,
    RagChunks,
};
use crate::schema::{Appointment, Call, CallDetail, Company, Document, RagChunk};
use crate::summary::DashboardSummary;

/// Binds the entity queries to one shared cache and backend.
///
/// Every query gets the same options (5 minute staleness, one retry, no
/// refetch on refocus) except for its own activation predicate.
pub struct DashboardClient<B: Backend> {
    cache: Arc<QueryCache>,
    backend: Arc<B>,
    options: QueryOptions,
}

impl<B: Backend> Clone for DashboardClient<B> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            backend: self.backend.clone(),
            options: self.options.clone(),
        }
    }
}

impl<B: Backend> DashboardClient<B> {
    pub fn new(cache: Arc<QueryCache>, backend: Arc<B>) -> Self {
        Self {
            cache,
            backend,
            options: QueryOptions::default(),
        }
    }

    pub fn with_options(mut self, options: QueryOptions) -> Self {
        self.options = options;
        self
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Subscribe to any entity query.
    pub fn query<Q: EntityQuery>(&self, query: Q) -> Subscription<Vec<Q::Row>> {
        let key = query.key();
        let request = query.request();
        let options = self.options.clone().enabled(query.enabled());
        let backend = self.backend.clone();

        let fetch = move || {
            let backend = backend.clone();
            let request = request.clone();
            async move { fetch_rows::<Q, B>(&backend, &request).await }
        };
        self.cache.subscribe(key, fetch, options)
    }

    /// Explicit refetch of a query, ignoring freshness.
    pub fn refetch<Q: EntityQuery>(&self, query: &Q) -> bool {
        self.cache.refetch(&query.key())
    }

    pub fn companies(&self) -> Subscription<Vec<Company>> {
        self.query(Companies)
    }

    pub fn calls(&self) -> Subscription<Vec<Call>> {
        self.query(Calls)
    }

    pub fn call_details(&self, call_id: Option<i64>) -> Subscription<Vec<CallDetail>> {
        self.query(CallDetails::new(call_id))
    }

    pub fn appointments(&self) -> Subscription<Vec<Appointment>> {
        self.query(Appointments)
    }

    pub fn documents(&self) -> Subscription<Vec<Document>> {
        self.query(Documents)
    }

    pub fn rag_chunks(&self) -> Subscription<Vec<RagChunk>> {
        self.query(RagChunks)
    }

    /// Counts of every collection plus the latest calls, fetched together.
    pub async fn summary(&self) -> DashboardSummary {
        let mut companies = self.companies();
        let mut calls = self.calls();
        let mut appointments = self.appointments();
        let mut documents = self.documents();
        let mut rag_chunks = self.rag_chunks();

        let (companies, calls, appointments, documents, rag_chunks) = tokio::join!(
            companies.settled(),
            calls.settled(),
            appointments.settled(),
            documents.settled(),
            rag_chunks.settled(),
        );

        DashboardSummary::from_results(&companies, &calls, &appointments, &documents, &rag_chunks)
    }
}

async fn fetch_rows<Q: EntityQuery, B: Backend>(
    backend: &B,
    request: &SelectRequest,
) -> Result<Vec<Q::Row>, FetchError> {
    let rows = backend.select(request).await.map_err(to_fetch_error)?;
    let mut decoded = decode_rows::<Q::Row>(&request.relation, rows)?;
    Q::sort(&mut decoded);
    debug!(relation = %request.relation, rows = decoded.len(), "Fetched rows");
    Ok(decoded)
}
