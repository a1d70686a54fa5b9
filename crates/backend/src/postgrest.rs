use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::error::BackendError;
use crate::request::SelectRequest;
use crate::{Backend, Row};

/// REST client for a PostgREST endpoint (`{base_url}/rest/v1/{relation}`).
#[derive(Clone)]
pub struct PostgrestBackend {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

/// Error body PostgREST sends with non-2xx responses.
#[derive(Deserialize)]
struct PostgrestErrorBody {
    message: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    hint: Option<String>,
}

impl PostgrestBackend {
    pub fn new(base_url: String, api_key: String, timeout: Duration) -> Result<Self, BackendError> {
        if base_url.trim().is_empty() {
            return Err(BackendError::Config("backend url is empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Config(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    fn relation_url(&self, relation: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, relation)
    }

    /// Build the HTTP request for `request` without sending it.
    pub fn build_request(&self, request: &SelectRequest) -> reqwest::RequestBuilder {
        self.client
            .get(self.relation_url(&request.relation))
            .query(&request.query_pairs())
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
    }
}

impl Backend for PostgrestBackend {
    async fn select(&self, request: &SelectRequest) -> Result<Vec<Row>, BackendError> {
        debug!(relation = %request.relation, select = %request.selection, "Backend select");

        let response = self.build_request(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            let message = match serde_json::from_str::<PostgrestErrorBody>(&error_text) {
                Ok(body) => {
                    debug!(code = ?body.code, hint = ?body.hint, "Backend rejected query");
                    body.message
                }
                Err(_) if error_text.is_empty() => format!("Request failed: {}", status),
                Err(_) => error_text,
            };
            return Err(BackendError::Query {
                status: status.as_u16(),
                message,
            });
        }

        let rows: Vec<Row> = response.json().await?;
        Ok(rows)
    }

    /// Liveness probe against the REST root.
    async fn ping(&self) -> Result<(), BackendError> {
        let url = format!("{}/rest/v1/", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BackendError::Query {
                status: response.status().as_u16(),
                message: format!("Health check failed: {}", response.status()),
            });
        }
        Ok(())
    }
}
