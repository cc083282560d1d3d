use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pipeline stage of a transcription job.
///
/// Jobs move forward through:
/// PENDING → DOWNLOADING → TRANSCRIBING → (SUMMARIZING) → (UPLOADING) → COMPLETED
/// and may drop to FAILED from any non-terminal stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Pending,
    Downloading,
    Transcribing,
    Summarizing,
    Uploading,
    Completed,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Stage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Stage::Pending => "pending",
            Stage::Downloading => "downloading",
            Stage::Transcribing => "transcribing",
            Stage::Summarizing => "summarizing",
            Stage::Uploading => "uploading",
            Stage::Completed => "completed",
            Stage::Failed => "failed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Stage::Completed | Stage::Failed)
    }

    /// The allowed-transition table.
    pub const fn allowed_next(self) -> &'static [Stage] {
        match self {
            Stage::Pending => &[Stage::Downloading, Stage::Failed],
            Stage::Downloading => &[Stage::Transcribing, Stage::Failed],
            Stage::Transcribing => &[
                Stage::Summarizing,
                Stage::Uploading,
                Stage::Completed,
                Stage::Failed,
            ],
            Stage::Summarizing => &[Stage::Uploading, Stage::Completed, Stage::Failed],
            Stage::Uploading => &[Stage::Completed, Stage::Failed],
            Stage::Completed | Stage::Failed => &[],
        }
    }

    pub fn can_transition_to(self, next: Stage) -> bool {
        self.allowed_next().contains(&next)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StageError {
    #[error("invalid stage transition {from} -> {to}")]
    InvalidTransition { from: Stage, to: Stage },

    #[error("job already finished in stage {0}")]
    Terminal(Stage),
}

/// Validate a single move through the transition table.
pub fn check_transition(from: Stage, to: Stage) -> Result<(), StageError> {
    if from.is_terminal() {
        return Err(StageError::Terminal(from));
    }
    if !from.can_transition_to(to) {
        return Err(StageError::InvalidTransition { from, to });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Stage; 7] = [
        Stage::Pending,
        Stage::Downloading,
        Stage::Transcribing,
        Stage::Summarizing,
        Stage::Uploading,
        Stage::Completed,
        Stage::Failed,
    ];

    fn rank(stage: Stage) -> usize {
        ALL.iter().position(|s| *s == stage).unwrap()
    }

    #[test]
    fn linear_pipeline_is_allowed() {
        let path = [
            Stage::Pending,
            Stage::Downloading,
            Stage::Transcribing,
            Stage::Summarizing,
            Stage::Uploading,
            Stage::Completed,
        ];
        for pair in path.windows(2) {
            assert!(check_transition(pair[0], pair[1]).is_ok(), "{pair:?}");
        }
    }

    #[test]
    fn optional_stages_can_be_skipped() {
        assert!(Stage::Transcribing.can_transition_to(Stage::Uploading));
        assert!(Stage::Transcribing.can_transition_to(Stage::Completed));
        assert!(Stage::Summarizing.can_transition_to(Stage::Completed));
    }

    #[test]
    fn failed_reachable_from_every_non_terminal_stage() {
        for stage in ALL.into_iter().filter(|s| !s.is_terminal()) {
            assert!(stage.can_transition_to(Stage::Failed), "{stage}");
        }
    }

    #[test]
    fn transitions_never_go_backwards() {
        for from in ALL {
            for &to in from.allowed_next() {
                assert!(rank(to) > rank(from), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn mandatory_stages_cannot_be_skipped() {
        assert_eq!(
            check_transition(Stage::Pending, Stage::Transcribing),
            Err(StageError::InvalidTransition {
                from: Stage::Pending,
                to: Stage::Transcribing
            })
        );
        assert!(check_transition(Stage::Downloading, Stage::Uploading).is_err());
    }

    #[test]
    fn terminal_stages_reject_everything() {
        for to in ALL {
            assert_eq!(
                check_transition(Stage::Completed, to),
                Err(StageError::Terminal(Stage::Completed))
            );
            assert_eq!(
                check_transition(Stage::Failed, to),
                Err(StageError::Terminal(Stage::Failed))
            );
        }
    }

    #[test]
    fn stage_display_and_serde_agree() {
        for stage in ALL {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json, format!("\"{stage}\""));
        }
        assert_eq!(Stage::Downloading.to_string(), "downloading");
    }
}
