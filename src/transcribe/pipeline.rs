use std::convert::Infallible;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use indicatif::ProgressBar;
use tracing::{debug, error, info, warn};

use super::index::{SearchIndex, TranscriptDocument};
use super::media::{MediaError, MediaSource};
use super::summarizer::Summarizer;
use super::transcriber::{TranscribeError, Transcriber};
use crate::aggregate::BatchSummary;
use crate::error::RunnerError;
use crate::llm::MessageSender;
use crate::retry::{RetryPolicy, retry};
use crate::runner::{self, JobResult, WorkItem};
use crate::state_machine::{JobRecord, Stage};

/// Drives one [`JobRecord`] through download, transcription and the
/// optional summary and upload stages.
pub struct TranscriptionPipeline<M, T, S, C> {
    media: M,
    transcriber: T,
    index: Option<S>,
    summarizer: Option<Summarizer<C>>,
    retry: RetryPolicy,
    cleanup_files: bool,
}

impl<M, T, S, C> TranscriptionPipeline<M, T, S, C>
where
    M: MediaSource + Sync,
    T: Transcriber + Sync,
    S: SearchIndex + Sync,
    C: MessageSender + Sync,
{
    pub fn new(media: M, transcriber: T) -> Self {
        Self {
            media,
            transcriber,
            index: None,
            summarizer: None,
            retry: RetryPolicy::default(),
            cleanup_files: true,
        }
    }

    pub fn with_index(mut self, index: Option<S>) -> Self {
        self.index = index;
        self
    }

    pub fn with_summarizer(mut self, summarizer: Option<Summarizer<C>>) -> Self {
        self.summarizer = summarizer;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cleanup(mut self, cleanup_files: bool) -> Self {
        self.cleanup_files = cleanup_files;
        self
    }

    /// Run every stage. Errors end up on the record, never in the return
    /// value.
    pub async fn process(&self, mut record: JobRecord) -> JobRecord {
        info!(job_id = %record.id(), url = %record.url(), "starting job");

        match self.run_stages(&mut record).await {
            Ok(()) => info!(job_id = %record.id(), "job completed"),
            Err(e) => {
                let message = format!("{e:#}");
                error!(job_id = %record.id(), error = %message, "job failed");
                if let Err(stage_err) = record.fail(message) {
                    warn!(job_id = %record.id(), error = %stage_err, "could not mark job failed");
                }
            }
        }

        self.cleanup(&record).await;
        record
    }

    async fn run_stages(&self, record: &mut JobRecord) -> Result<()> {
        record.advance(Stage::Downloading)?;
        let url = record.url().to_string();
        let artifact = retry(
            &self.retry,
            || self.media.fetch_audio(&url),
            MediaError::is_retryable,
        )
        .await
        .context("audio download failed")?;
        record.set_title(artifact.title)?;
        record.set_audio_path(artifact.path.clone())?;

        record.advance(Stage::Transcribing)?;
        let text = retry(
            &self.retry,
            || self.transcriber.transcribe(&artifact.path),
            TranscribeError::is_rate_limited,
        )
        .await
        .context("transcription failed")?;
        debug!(job_id = %record.id(), chars = text.len(), "transcribed");
        record.set_transcription(text)?;

        if let Some(summarizer) = &self.summarizer {
            record.advance(Stage::Summarizing)?;
            let transcript = record.transcription().unwrap_or_default();
            let summary = summarizer
                .summarize(transcript)
                .await
                .context("summarization failed")?;
            record.set_summary(summary)?;
        }

        let completed_at = Utc::now();
        match &self.index {
            Some(index) => {
                record.advance(Stage::Uploading)?;
                let doc = TranscriptDocument::from_record(record, completed_at);
                index
                    .upsert(&doc)
                    .await
                    .context("upload to search index failed")?;
            }
            None => warn!(
                job_id = %record.id(),
                "no search index configured, skipping upload"
            ),
        }

        record.complete(completed_at)?;
        Ok(())
    }

    async fn cleanup(&self, record: &JobRecord) {
        if !self.cleanup_files {
            return;
        }
        let Some(path) = record.audio_path() else {
            return;
        };
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!(
                job_id = %record.id(),
                path = %path.display(),
                "removed audio file"
            ),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                job_id = %record.id(),
                path = %path.display(),
                error = %e,
                "could not remove audio file"
            ),
        }
    }
}

/// Transcribe every URL with at most `max_concurrency` jobs in flight.
/// Returns one record per URL, in input order.
pub async fn transcribe_batch<M, T, S, C>(
    pipeline: Arc<TranscriptionPipeline<M, T, S, C>>,
    urls: Vec<String>,
    tags: Vec<String>,
    max_concurrency: usize,
    progress: ProgressBar,
) -> Result<Vec<JobRecord>, RunnerError>
where
    M: MediaSource + Send + Sync + 'static,
    T: Transcriber + Send + Sync + 'static,
    S: SearchIndex + Send + Sync + 'static,
    C: MessageSender + Send + Sync + 'static,
{
    let records: Vec<JobRecord> = urls
        .into_iter()
        .map(|url| JobRecord::new(url, tags.clone()))
        .collect();
    let submitted: Vec<(String, String)> = records
        .iter()
        .map(|r| (r.id().to_string(), r.url().to_string()))
        .collect();

    let results = runner::run(
        records,
        move |item: WorkItem<JobRecord>| {
            let pipeline = Arc::clone(&pipeline);
            let progress = progress.clone();
            async move {
                let record = pipeline.process(item.input).await;
                progress.inc(1);
                Ok::<_, Infallible>(record)
            }
        },
        max_concurrency,
    )
    .await?;

    Ok(results
        .into_iter()
        .map(|result| match result {
            JobResult::Success { value, .. } => value,
            JobResult::Failure { index, error } => {
                // The task died before handing its record back.
                let (id, url) = &submitted[index];
                let mut record = JobRecord::with_id(id.clone(), url.clone(), tags.clone());
                if let Err(e) = record.fail(error) {
                    warn!(job_id = %id, error = %e, "could not mark job failed");
                }
                record
            }
        })
        .collect())
}

pub fn summarize_records(records: &[JobRecord]) -> BatchSummary {
    let mut summary = BatchSummary::default();
    for record in records {
        summary.record(record.is_completed());
    }
    summary
}
