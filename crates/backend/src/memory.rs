use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, RwLock};
use std::time::Duration;
use tracing::debug;

use crate::error::BackendError;
use crate::request::{Field, SelectRequest, Selection};
use crate::{Backend, Row};

/// In-process backend holding relations as JSON rows.
///
/// Embedded relations are resolved through a `<singular>_id` foreign key on
/// the parent row (`companies` via `company_id`).
pub struct MemoryBackend {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    failures: Mutex<HashMap<String, (usize, String)>>,
    selects: Mutex<HashMap<String, usize>>,
    latency: Duration,
    server_ordering: bool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            selects: Mutex::new(HashMap::new()),
            latency: Duration::ZERO,
            server_ordering: true,
        }
    }

    /// Add rows to `relation`. Non-object values are ignored.
    pub fn with_table(self, relation: &str, rows: Vec<Value>) -> Self {
        for row in rows {
            self.insert(relation, row);
        }
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Return rows in insertion order, ignoring the requested ordering.
    pub fn without_server_ordering(mut self) -> Self {
        self.server_ordering = false;
        self
    }

    pub fn insert(&self, relation: &str, row: Value) {
        if let Value::Object(row) = row {
            let mut tables = self.tables.write().unwrap_or_else(|p| p.into_inner());
            tables.entry(relation.to_string()).or_default().push(row);
        }
    }

    /// Make the next `count` selects on `relation` fail with `message`.
    pub fn fail_next(&self, relation: &str, count: usize, message: &str) {
        lock(&self.failures).insert(relation.to_string(), (count, message.to_string()));
    }

    /// How many selects hit `relation` so far.
    pub fn select_count(&self, relation: &str) -> usize {
        lock(&self.selects).get(relation).copied().unwrap_or(0)
    }

    fn take_failure(&self, relation: &str) -> Option<String> {
        let mut failures = lock(&self.failures);
        let (remaining, message) = failures.get_mut(relation)?;
        if *remaining == 0 {
            return None;
        }
        *remaining -= 1;
        Some(message.clone())
    }

    fn run(&self, request: &SelectRequest) -> Vec<Row> {
        let tables = self.tables.read().unwrap_or_else(|p| p.into_inner());
        let Some(rows) = tables.get(&request.relation) else {
            return Vec::new();
        };

        let mut result: Vec<Row> = rows
            .iter()
            .filter(|row| request.filter.as_ref().is_none_or(|f| f.matches(row)))
            .map(|row| project(&tables, row, &request.selection))
            .collect();

        if self.server_ordering {
            if let Some(order) = &request.order {
                result.sort_by(|a, b| {
                    let ord = compare_values(a.get(&order.column), b.get(&order.column));
                    if order.ascending { ord } else { ord.reverse() }
                });
            }
        }
        result
    }
}

impl Backend for MemoryBackend {
    async fn select(&self, request: &SelectRequest) -> Result<Vec<Row>, BackendError> {
        *lock(&self.selects).entry(request.relation.clone()).or_default() += 1;

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        if let Some(message) = self.take_failure(&request.relation) {
            debug!(relation = %request.relation, "Injected failure");
            return Err(BackendError::Query {
                status: 500,
                message,
            });
        }

        Ok(self.run(request))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

/// `companies` -> `company_id`, `calls` -> `call_id`.
fn foreign_key(relation: &str) -> String {
    let singular = if let Some(stem) = relation.strip_suffix("ies") {
        format!("{}y", stem)
    } else {
        relation.strip_suffix('s').unwrap_or(relation).to_string()
    };
    format!("{}_id", singular)
}

fn project(tables: &HashMap<String, Vec<Row>>, row: &Row, selection: &Selection) -> Row {
    let mut out = Map::new();
    let all = Selection::all();
    let selection = if selection.fields().is_empty() { &all } else { selection };

    for field in selection.fields() {
        match field {
            Field::All => {
                for (k, v) in row {
                    out.insert(k.clone(), v.clone());
                }
            }
            Field::Column(name) => {
                out.insert(name.clone(), row.get(name).cloned().unwrap_or(Value::Null));
            }
            Field::Embed { relation, selection } => {
                let related = row
                    .get(&foreign_key(relation))
                    .filter(|id| !id.is_null())
                    .and_then(|id| {
                        tables
                            .get(relation)?
                            .iter()
                            .find(|candidate| candidate.get("id") == Some(id))
                    })
                    .map(|found| Value::Object(project(tables, found, selection)))
                    .unwrap_or(Value::Null);
                out.insert(relation.clone(), related);
            }
        }
    }
    out
}

/// Nulls sort last; numbers numerically, strings lexically.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> MemoryBackend {
        MemoryBackend::new()
            .with_table(
                "companies",
                vec![json!({"id": 1, "name": "Acme", "created_at": "2024-01-01T00:00:00Z"})],
            )
            .with_table(
                "calls",
                vec![
                    json!({"id": 1, "company_id": 1, "start_time": "2024-01-01T10:00:00Z"}),
                    json!({"id": 2, "company_id": 99, "start_time": "2024-01-02T09:00:00Z"}),
                ],
            )
    }

    #[test]
    fn test_foreign_key_names() {
        assert_eq!(foreign_key("companies"), "company_id");
        assert_eq!(foreign_key("calls"), "call_id");
        assert_eq!(foreign_key("documents"), "document_id");
    }

    #[tokio::test]
    async fn test_embed_resolves_and_tolerates_missing_parent() {
        let backend = sample();
        let request = SelectRequest::from_relation("calls")
            .select(Selection::all().embed("companies", Selection::columns(["id", "name"])))
            .order_by("start_time", false);

        let rows = backend.select(&request).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], json!(2));
        assert_eq!(rows[0]["companies"], Value::Null);
        assert_eq!(rows[1]["companies"], json!({"id": 1, "name": "Acme"}));
    }

    #[tokio::test]
    async fn test_filter_and_injected_failures() {
        let backend = sample();
        backend.fail_next("calls", 1, "permission denied for table calls");
        let request = SelectRequest::from_relation("calls").filter_eq("id", 1);

        let err = backend.select(&request).await.unwrap_err();
        assert_eq!(err.to_string(), "permission denied for table calls");

        let rows = backend.select(&request).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(backend.select_count("calls"), 2);
    }
}
