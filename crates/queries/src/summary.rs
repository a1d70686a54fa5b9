use cache::QueryResult;
use serde::Serialize;

use crate::schema::{Appointment, Call, Company, Document, RagChunk};

const RECENT_CALLS: usize = 5;

/// Home page overview. A collection that failed to load counts what the
/// cache still holds for it (possibly nothing) and is listed in
/// `unavailable`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DashboardSummary {
    pub companies: usize,
    pub calls: usize,
    pub appointments: usize,
    pub documents: usize,
    pub rag_chunks: usize,
    pub recent_calls: Vec<Call>,
    pub unavailable: Vec<String>,
}

impl DashboardSummary {
    pub fn from_results(
        companies: &QueryResult<Vec<Company>>,
        calls: &QueryResult<Vec<Call>>,
        appointments: &QueryResult<Vec<Appointment>>,
        documents: &QueryResult<Vec<Document>>,
        rag_chunks: &QueryResult<Vec<RagChunk>>,
    ) -> Self {
        let mut unavailable = Vec::new();
        let mut count = |name: &str, len: usize, failed: bool| {
            if failed {
                unavailable.push(name.to_string());
            }
            len
        };

        Self {
            companies: count("companies", companies.rows().len(), companies.is_error()),
            calls: count("calls", calls.rows().len(), calls.is_error()),
            appointments: count("appointments", appointments.rows().len(), appointments.is_error()),
            documents: count("documents", documents.rows().len(), documents.is_error()),
            rag_chunks: count("rag-chunks", rag_chunks.rows().len(), rag_chunks.is_error()),
            recent_calls: calls.rows().iter().take(RECENT_CALLS).cloned().collect(),
            unavailable,
        }
    }
}
