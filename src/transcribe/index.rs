//! Storage of finished transcripts in an OpenSearch index.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::state_machine::{JobRecord, Stage};

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("search index error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// The document stored per finished job. The job id doubles as the
/// document id, so re-uploading a job overwrites it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptDocument {
    pub job_id: String,
    pub url: String,
    pub title: String,
    pub transcription: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub status: Stage,
    pub created_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub processing_time_seconds: f64,
}

impl TranscriptDocument {
    pub fn from_record(record: &JobRecord, completed_at: DateTime<Utc>) -> Self {
        let elapsed = completed_at - record.created_at();
        Self {
            job_id: record.id().to_string(),
            url: record.url().to_string(),
            title: record.title().unwrap_or_default().to_string(),
            transcription: record.transcription().unwrap_or_default().to_string(),
            summary: record.summary().map(str::to_string),
            tags: record.tags().to_vec(),
            status: Stage::Completed,
            created_at: record.created_at(),
            completed_at,
            processing_time_seconds: elapsed.num_milliseconds() as f64 / 1000.0,
        }
    }
}

pub trait SearchIndex {
    fn upsert(
        &self,
        doc: &TranscriptDocument,
    ) -> impl Future<Output = Result<(), IndexError>> + Send;
}

pub struct OpenSearchIndex {
    client: Client,
    endpoint: String,
    index: String,
    username: Option<String>,
    password: Option<String>,
}

impl OpenSearchIndex {
    /// `endpoint` may omit the scheme, in which case https is assumed.
    pub fn new(endpoint: &str, index: impl Into<String>) -> Result<Self, IndexError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            endpoint: normalize_endpoint(endpoint),
            index: index.into(),
            username: None,
            password: None,
        })
    }

    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: Option<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = password;
        self
    }

    fn url(&self, action: &str, id: &str) -> String {
        format!("{}/{}/{}/{}", self.endpoint, self.index, action, id)
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.username {
            Some(user) => builder.basic_auth(user, self.password.as_deref()),
            None => builder,
        }
    }

    pub async fn get(&self, job_id: &str) -> Result<Option<TranscriptDocument>, IndexError> {
        let response = self
            .request(Method::GET, self.url("_doc", job_id))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: GetResponse = check(response).await?.json().await?;
        Ok(body.found.then_some(body.source).flatten())
    }

    pub async fn update_tags(&self, job_id: &str, tags: &[String]) -> Result<(), IndexError> {
        let response = self
            .request(Method::POST, self.url("_update", job_id))
            .json(&serde_json::json!({ "doc": { "tags": tags } }))
            .send()
            .await?;
        check(response).await?;
        debug!(job_id, ?tags, "updated document tags");
        Ok(())
    }

    /// Returns `false` when there was nothing to delete.
    pub async fn delete(&self, job_id: &str) -> Result<bool, IndexError> {
        let response = self
            .request(Method::DELETE, self.url("_doc", job_id))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        check(response).await?;
        info!(job_id, "deleted document");
        Ok(true)
    }
}

impl SearchIndex for OpenSearchIndex {
    async fn upsert(&self, doc: &TranscriptDocument) -> Result<(), IndexError> {
        let url = format!("{}?refresh=true", self.url("_doc", &doc.job_id));
        let response = self.request(Method::PUT, url).json(doc).send().await?;
        check(response).await?;
        info!(job_id = %doc.job_id, index = %self.index, "indexed transcript");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct GetResponse {
    #[serde(default)]
    found: bool,
    #[serde(rename = "_source", default)]
    source: Option<TranscriptDocument>,
}

async fn check(response: Response) -> Result<Response, IndexError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string());
    Err(IndexError::Api {
        status: status.as_u16(),
        message,
    })
}

fn normalize_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim_end_matches('/');
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        endpoint.to_string()
    } else {
        format!("https://{endpoint}")
    }
}
