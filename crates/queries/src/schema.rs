use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::timestamp;

/// `companies(id,name)` as embedded in other rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyRef {
    pub id: i64,
    pub name: String,
}

/// `calls(id,start_time)` as embedded in appointments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRef {
    pub id: i64,
    #[serde(with = "timestamp")]
    pub start_time: DateTime<Utc>,
}

/// `documents(id,file_name,company_id,companies(id,name))` as embedded in chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRef {
    pub id: i64,
    pub file_name: String,
    pub company_id: i64,
    #[serde(rename = "companies", default)]
    pub company: Option<CompanyRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub rag_system_instructions: Option<String>,
    #[serde(default)]
    pub llm_model: Option<String>,
    /// Whether a provider key is configured. The key itself is not kept.
    #[serde(
        rename(deserialize = "openai_api_key"),
        deserialize_with = "credential_present",
        default
    )]
    pub has_api_key: bool,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp::option", default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Call {
    pub id: i64,
    pub company_id: i64,
    #[serde(with = "timestamp")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "timestamp::option", default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_seconds: Option<i64>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(with = "timestamp::option", default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "companies", default)]
    pub company: Option<CompanyRef>,
}

impl Call {
    /// No duration recorded yet, so the call is still in progress.
    pub fn is_live(&self) -> bool {
        self.duration_seconds.is_none() && self.end_time.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    Agent,
    /// Anything that is not the agent.
    #[serde(other)]
    Caller,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallDetail {
    pub id: i64,
    pub call_id: i64,
    pub speaker: Speaker,
    pub message: String,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub company_id: i64,
    #[serde(default)]
    pub call_id: Option<i64>,
    pub caller_name: String,
    #[serde(default)]
    pub caller_phone: Option<String>,
    #[serde(default)]
    pub caller_email: Option<String>,
    #[serde(with = "timestamp")]
    pub appointment_time: DateTime<Utc>,
    #[serde(default)]
    pub status: AppointmentStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(rename = "companies", default)]
    pub company: Option<CompanyRef>,
    #[serde(rename = "calls", default)]
    pub call: Option<CallRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: i64,
    pub company_id: i64,
    pub file_name: String,
    pub file_path: String,
    #[serde(default)]
    pub file_size: Option<i64>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "companies", default)]
    pub company: Option<CompanyRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagChunk {
    pub id: i64,
    pub document_id: i64,
    pub chunk_index: i64,
    pub chunk_text: String,
    #[serde(deserialize_with = "embedding_vector", default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "documents", default)]
    pub document: Option<DocumentRef>,
}

impl RagChunk {
    /// Owning company, through the embedded document.
    pub fn company(&self) -> Option<&CompanyRef> {
        self.document.as_ref()?.company.as_ref()
    }
}

fn credential_present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.is_some_and(|key| !key.trim().is_empty()))
}

/// pgvector columns arrive as text (`"[0.1,0.2]"`) over REST; plain arrays
/// are accepted too.
fn embedding_vector<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Vec<f32>>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        List(Vec<f32>),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::List(values)) => Ok(Some(values)),
        Some(Raw::Text(text)) => {
            let inner = text.trim().trim_start_matches('[').trim_end_matches(']');
            if inner.trim().is_empty() {
                return Ok(Some(Vec::new()));
            }
            inner
                .split(',')
                .map(|v| v.trim().parse::<f32>())
                .collect::<Result<Vec<_>, _>>()
                .map(Some)
                .map_err(|e| serde::de::Error::custom(format!("invalid embedding: {}", e)))
        }
    }
}
