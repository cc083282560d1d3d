use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stage::{Stage, StageError, check_transition};

/// Per-item state for one transcription job.
///
/// A record is owned by exactly one task for its whole life. The stage only
/// moves forward, and once it is terminal the record is frozen.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    id: String,
    url: String,
    title: Option<String>,
    stage: Stage,
    stage_history: Vec<Stage>,
    transcription: Option<String>,
    summary: Option<String>,
    audio_path: Option<PathBuf>,
    tags: Vec<String>,
    error: Option<String>,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    pub fn new(url: impl Into<String>, tags: Vec<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), url, tags)
    }

    pub fn with_id(id: impl Into<String>, url: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            title: None,
            stage: Stage::Pending,
            stage_history: Vec::new(),
            transcription: None,
            summary: None,
            audio_path: None,
            tags,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn transcription(&self) -> Option<&str> {
        self.transcription.as_deref()
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Downloaded audio, if the download stage got that far.
    pub fn audio_path(&self) -> Option<&Path> {
        self.audio_path.as_deref()
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn set_title(&mut self, title: impl Into<String>) -> Result<(), StageError> {
        self.ensure_open()?;
        self.title = Some(title.into());
        Ok(())
    }

    pub fn set_transcription(&mut self, text: impl Into<String>) -> Result<(), StageError> {
        self.ensure_open()?;
        self.transcription = Some(text.into());
        Ok(())
    }

    pub fn set_summary(&mut self, summary: impl Into<String>) -> Result<(), StageError> {
        self.ensure_open()?;
        self.summary = Some(summary.into());
        Ok(())
    }

    pub fn set_audio_path(&mut self, path: impl Into<PathBuf>) -> Result<(), StageError> {
        self.ensure_open()?;
        self.audio_path = Some(path.into());
        Ok(())
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Stages this record has left, oldest first.
    pub fn stage_history(&self) -> &[Stage] {
        &self.stage_history
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn is_completed(&self) -> bool {
        self.stage == Stage::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.stage == Stage::Failed
    }

    /// Move to `next`. Use [`JobRecord::complete`] and [`JobRecord::fail`]
    /// for the terminal stages so the completion time gets stamped.
    pub fn advance(&mut self, next: Stage) -> Result<(), StageError> {
        if next.is_terminal() {
            return Err(StageError::InvalidTransition {
                from: self.stage,
                to: next,
            });
        }
        self.transition(next)
    }

    pub fn complete(&mut self, at: DateTime<Utc>) -> Result<(), StageError> {
        self.transition(Stage::Completed)?;
        self.completed_at = Some(at);
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), StageError> {
        self.transition(Stage::Failed)?;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Wall-clock time from submission to completion.
    pub fn processing_time(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|done| done - self.created_at)
    }

    fn ensure_open(&self) -> Result<(), StageError> {
        if self.stage.is_terminal() {
            return Err(StageError::Terminal(self.stage));
        }
        Ok(())
    }

    fn transition(&mut self, next: Stage) -> Result<(), StageError> {
        check_transition(self.stage, next)?;
        self.stage_history.push(self.stage);
        self.stage = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> JobRecord {
        JobRecord::new("https://example.com/watch?v=abc", vec!["tutorial".into()])
    }

    #[test]
    fn new_record_defaults() {
        let job = record();
        assert_eq!(job.stage(), Stage::Pending);
        assert!(job.stage_history().is_empty());
        assert!(job.title().is_none());
        assert!(job.error().is_none());
        assert!(job.completed_at().is_none());
        assert_eq!(job.tags(), &["tutorial".to_string()]);
        assert!(Uuid::parse_str(job.id()).is_ok());
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(record().id(), record().id());
    }

    #[test]
    fn happy_path_records_history() {
        let mut job = record();
        job.advance(Stage::Downloading).unwrap();
        job.advance(Stage::Transcribing).unwrap();
        job.advance(Stage::Uploading).unwrap();
        let done = Utc::now();
        job.complete(done).unwrap();

        assert!(job.is_completed());
        assert_eq!(job.completed_at(), Some(done));
        assert_eq!(
            job.stage_history(),
            &[
                Stage::Pending,
                Stage::Downloading,
                Stage::Transcribing,
                Stage::Uploading
            ]
        );
        assert!(job.processing_time().unwrap() >= chrono::Duration::zero());
    }

    #[test]
    fn fail_sets_error_and_completion_time() {
        let mut job = record();
        job.advance(Stage::Downloading).unwrap();
        job.fail("artifact missing").unwrap();

        assert!(job.is_failed());
        assert_eq!(job.error(), Some("artifact missing"));
        assert!(job.completed_at().is_some());
    }

    #[test]
    fn terminal_record_is_frozen() {
        let mut job = record();
        job.fail("boom").unwrap();

        assert_eq!(job.fail("again"), Err(StageError::Terminal(Stage::Failed)));
        assert_eq!(
            job.advance(Stage::Downloading),
            Err(StageError::Terminal(Stage::Failed))
        );
        assert_eq!(job.error(), Some("boom"));
        assert_eq!(job.stage_history(), &[Stage::Pending]);
    }

    #[test]
    fn terminal_record_refuses_field_updates() {
        let mut job = record();
        job.advance(Stage::Downloading).unwrap();
        job.set_title("Talk").unwrap();
        job.advance(Stage::Transcribing).unwrap();
        job.set_transcription("hello").unwrap();
        job.complete(Utc::now()).unwrap();

        let frozen = Err(StageError::Terminal(Stage::Completed));
        assert_eq!(job.set_title("Other"), frozen);
        assert_eq!(job.set_transcription("changed"), frozen);
        assert_eq!(job.set_summary("late"), frozen);
        assert_eq!(job.set_audio_path("/tmp/late.mp3"), frozen);
        assert_eq!(job.title(), Some("Talk"));
        assert_eq!(job.transcription(), Some("hello"));
        assert!(job.summary().is_none());
        assert!(job.audio_path().is_none());
    }

    #[test]
    fn advance_refuses_terminal_targets() {
        let mut job = record();
        job.advance(Stage::Downloading).unwrap();
        job.advance(Stage::Transcribing).unwrap();
        assert!(job.advance(Stage::Completed).is_err());
        assert!(job.advance(Stage::Failed).is_err());
        assert_eq!(job.stage(), Stage::Transcribing);
    }

    #[test]
    fn backwards_move_is_rejected() {
        let mut job = record();
        job.advance(Stage::Downloading).unwrap();
        job.advance(Stage::Transcribing).unwrap();
        assert_eq!(
            job.advance(Stage::Downloading),
            Err(StageError::InvalidTransition {
                from: Stage::Transcribing,
                to: Stage::Downloading
            })
        );
    }

    #[test]
    fn record_serialization_roundtrip() {
        let mut job = record();
        job.advance(Stage::Downloading).unwrap();
        let json = serde_json::to_string(&job).unwrap();
        let parsed: JobRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id(), job.id());
        assert_eq!(parsed.stage(), Stage::Downloading);
        assert_eq!(parsed.stage_history(), &[Stage::Pending]);
    }
}
