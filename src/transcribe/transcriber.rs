use std::future::Future;
use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Error)]
pub enum TranscribeError {
    #[error("could not read audio file: {0}")]
    Io(#[from] std::io::Error),

    #[error("transcription rate limited")]
    RateLimited,

    #[error("transcription API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl TranscribeError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, TranscribeError::RateLimited)
    }
}

/// Speech-to-text over a local audio file.
pub trait Transcriber {
    fn transcribe(
        &self,
        audio: &Path,
    ) -> impl Future<Output = Result<String, TranscribeError>> + Send;
}

/// Uploads audio to an OpenAI-compatible `/audio/transcriptions` endpoint.
pub struct HttpTranscriber {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    language: String,
}

impl HttpTranscriber {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        language: impl Into<String>,
    ) -> Result<Self, TranscribeError> {
        // Long recordings take minutes to transcribe.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(600))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            language: language.into(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
    #[serde(default)]
    usage: Option<TranscriptionUsage>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, audio: &Path) -> Result<String, TranscribeError> {
        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.mp3".to_string());

        let part = Part::bytes(bytes).file_name(file_name).mime_str("audio/mpeg")?;
        let form = Form::new()
            .text("model", self.model.clone())
            .text("response_format", "json")
            .text("language", self.language.clone())
            .part("file", part);

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(TranscribeError::RateLimited);
        }
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(TranscribeError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: TranscriptionResponse = response.json().await?;
        if let Some(usage) = &body.usage {
            debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "transcription usage"
            );
        }
        Ok(body.text)
    }
}
