//! Audio acquisition through `yt-dlp`, with optional `ffmpeg` clean-up.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to launch {tool}: {source}")]
    Launch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}: {stderr}")]
    ToolFailed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("downloaded audio file not found for video {video_id}")]
    ArtifactMissing { video_id: String },

    #[error("could not read video metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Download hiccups and missing artifacts are worth another attempt;
    /// a tool that cannot even be launched is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            MediaError::ArtifactMissing { .. } | MediaError::ToolFailed { .. }
        )
    }
}

/// A local audio file ready for transcription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioArtifact {
    pub path: PathBuf,
    pub video_id: String,
    pub title: String,
}

pub trait MediaSource {
    fn fetch_audio(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<AudioArtifact, MediaError>> + Send;
}

/// ffmpeg settings applied after download to shrink the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioPreprocess {
    #[serde(default = "default_remove_silence")]
    pub remove_silence: bool,
    /// Playback speed multiplier; 1.0 leaves the tempo alone.
    #[serde(default = "default_speed")]
    pub speed: f64,
    #[serde(default = "default_silence_threshold")]
    pub silence_threshold: String,
}

fn default_remove_silence() -> bool {
    true
}

fn default_speed() -> f64 {
    1.5
}

fn default_silence_threshold() -> String {
    "-50dB".to_string()
}

impl Default for AudioPreprocess {
    fn default() -> Self {
        Self {
            remove_silence: default_remove_silence(),
            speed: default_speed(),
            silence_threshold: default_silence_threshold(),
        }
    }
}

impl AudioPreprocess {
    /// The `-af` filter graph, or `None` when there is nothing to do.
    ///
    /// `atempo` only accepts factors in 0.5..=2.0, so larger changes are
    /// chained.
    pub fn filter_chain(&self) -> Option<String> {
        let mut filters = Vec::new();

        if self.remove_silence {
            let t = &self.silence_threshold;
            filters.push(format!(
                "silenceremove=start_periods=1:start_duration=0:start_threshold={t}:\
                 stop_periods=-1:stop_duration=0.02:stop_threshold={t},apad=pad_dur=0.02"
            ));
        }

        let mut speed = self.speed;
        if speed > 0.0 && (speed - 1.0).abs() > f64::EPSILON {
            if speed > 2.0 {
                while speed > 2.0 {
                    filters.push("atempo=2.0".to_string());
                    speed /= 2.0;
                }
                if speed > 1.0 {
                    filters.push(format!("atempo={speed:.2}"));
                }
            } else if speed < 0.5 {
                while speed < 0.5 {
                    filters.push("atempo=0.5".to_string());
                    speed *= 2.0;
                }
                if speed < 1.0 {
                    filters.push(format!("atempo={speed:.2}"));
                }
            } else {
                filters.push(format!("atempo={speed:.2}"));
            }
        }

        (!filters.is_empty()).then(|| filters.join(","))
    }
}

pub fn ffmpeg_args(input: &Path, output: &Path, filter: Option<&str>) -> Vec<String> {
    let mut args = vec![
        "-i".to_string(),
        input.display().to_string(),
        "-y".to_string(),
        "-ac".to_string(),
        "1".to_string(),
        "-b:a".to_string(),
        "64k".to_string(),
    ];
    if let Some(filter) = filter {
        args.push("-af".to_string());
        args.push(filter.to_string());
    }
    args.push(output.display().to_string());
    args
}

#[derive(Debug, Deserialize)]
struct VideoInfo {
    id: String,
    #[serde(default)]
    title: Option<String>,
}

/// Downloads the best audio stream of a video as mp3.
pub struct YtDlpSource {
    output_dir: PathBuf,
    ytdlp: String,
    ffmpeg: String,
    preprocess: Option<AudioPreprocess>,
}

impl YtDlpSource {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ytdlp: "yt-dlp".to_string(),
            ffmpeg: "ffmpeg".to_string(),
            preprocess: Some(AudioPreprocess::default()),
        }
    }

    pub fn with_tools(mut self, ytdlp: impl Into<String>, ffmpeg: impl Into<String>) -> Self {
        self.ytdlp = ytdlp.into();
        self.ffmpeg = ffmpeg.into();
        self
    }

    pub fn with_preprocess(mut self, preprocess: Option<AudioPreprocess>) -> Self {
        self.preprocess = preprocess;
        self
    }

    fn download_args(&self, url: &str) -> Vec<String> {
        let template = self.output_dir.join("%(id)s.%(ext)s");
        vec![
            "-f".to_string(),
            "bestaudio/best".to_string(),
            "-x".to_string(),
            "--audio-format".to_string(),
            "mp3".to_string(),
            "--audio-quality".to_string(),
            "192K".to_string(),
            "--quiet".to_string(),
            "--no-warnings".to_string(),
            "-o".to_string(),
            template.display().to_string(),
            url.to_string(),
        ]
    }

    async fn probe(&self, url: &str) -> Result<VideoInfo, MediaError> {
        let args = [
            "--dump-single-json".to_string(),
            "--skip-download".to_string(),
            "--no-warnings".to_string(),
            url.to_string(),
        ];
        let stdout = run_tool(&self.ytdlp, &args).await?;
        Ok(serde_json::from_slice(&stdout)?)
    }

    /// Run ffmpeg over `input`. Falls back to the untouched file if ffmpeg
    /// is missing or fails.
    async fn preprocess(
        &self,
        settings: &AudioPreprocess,
        input: PathBuf,
        video_id: &str,
    ) -> PathBuf {
        let output = self.output_dir.join(format!("{video_id}_processed.mp3"));
        let filter = settings.filter_chain();
        let args = ffmpeg_args(&input, &output, filter.as_deref());

        match run_tool(&self.ffmpeg, &args).await {
            Ok(_) => {
                if let Err(e) = tokio::fs::remove_file(&input).await {
                    warn!(
                        path = %input.display(),
                        error = %e,
                        "could not remove original audio file"
                    );
                }
                output
            }
            Err(e) => {
                warn!(
                    error = %e,
                    path = %input.display(),
                    "audio preprocessing failed, using original file"
                );
                input
            }
        }
    }
}

impl MediaSource for YtDlpSource {
    async fn fetch_audio(&self, url: &str) -> Result<AudioArtifact, MediaError> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let info = self.probe(url).await?;
        debug!(video_id = %info.id, url, "downloading audio");
        run_tool(&self.ytdlp, &self.download_args(url)).await?;

        let raw = locate_artifact(&self.output_dir, &info.id).await?;
        let path = match &self.preprocess {
            Some(settings) => self.preprocess(settings, raw, &info.id).await,
            None => raw,
        };
        info!(video_id = %info.id, path = %path.display(), "audio ready");

        Ok(AudioArtifact {
            path,
            video_id: info.id,
            title: info.title.unwrap_or_else(|| "Untitled".to_string()),
        })
    }
}

/// `<dir>/<video_id>.mp3`, or `ArtifactMissing` if extraction produced
/// nothing.
pub async fn locate_artifact(dir: &Path, video_id: &str) -> Result<PathBuf, MediaError> {
    let path = dir.join(format!("{video_id}.mp3"));
    if tokio::fs::try_exists(&path).await? {
        Ok(path)
    } else {
        Err(MediaError::ArtifactMissing {
            video_id: video_id.to_string(),
        })
    }
}

async fn run_tool(program: &str, args: &[String]) -> Result<Vec<u8>, MediaError> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|source| MediaError::Launch {
            tool: program.to_string(),
            source,
        })?;

    if !output.status.success() {
        return Err(MediaError::ToolFailed {
            tool: program.to_string(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speed_only(speed: f64) -> AudioPreprocess {
        AudioPreprocess {
            remove_silence: false,
            speed,
            ..AudioPreprocess::default()
        }
    }

    #[test]
    fn default_chain_removes_silence_then_speeds_up() {
        let chain = AudioPreprocess::default().filter_chain().unwrap();
        assert!(
            chain.starts_with("silenceremove=start_periods=1:start_duration=0:start_threshold=-50dB:")
        );
        assert!(chain.contains("stop_threshold=-50dB,apad=pad_dur=0.02"));
        assert!(chain.ends_with(",atempo=1.50"));
    }

    #[test]
    fn large_speedups_are_chained() {
        assert_eq!(
            speed_only(5.0).filter_chain().unwrap(),
            "atempo=2.0,atempo=2.0,atempo=1.25"
        );
        assert_eq!(speed_only(4.0).filter_chain().unwrap(), "atempo=2.0,atempo=2.0");
    }

    #[test]
    fn large_slowdowns_are_chained() {
        assert_eq!(
            speed_only(0.2).filter_chain().unwrap(),
            "atempo=0.5,atempo=0.5,atempo=0.80"
        );
    }

    #[test]
    fn unit_speed_without_silence_removal_is_a_no_op() {
        assert_eq!(speed_only(1.0).filter_chain(), None);
    }

    #[test]
    fn ffmpeg_args_put_filter_before_output() {
        let args = ffmpeg_args(Path::new("in.mp3"), Path::new("out.mp3"), Some("atempo=1.50"));
        assert_eq!(
            args,
            ["-i", "in.mp3", "-y", "-ac", "1", "-b:a", "64k", "-af", "atempo=1.50", "out.mp3"]
        );

        let args = ffmpeg_args(Path::new("in.mp3"), Path::new("out.mp3"), None);
        assert!(!args.contains(&"-af".to_string()));
    }

    #[test]
    fn download_args_target_output_dir() {
        let source = YtDlpSource::new("/tmp/audio");
        let args = source.download_args("https://example.com/v");
        assert_eq!(args.last().unwrap(), "https://example.com/v");
        assert!(args.contains(&"/tmp/audio/%(id)s.%(ext)s".to_string()));
        assert!(args.contains(&"bestaudio/best".to_string()));
    }

    #[test]
    fn video_info_tolerates_missing_title() {
        let info: VideoInfo =
            serde_json::from_str(r#"{"id": "qf27qzFKv60", "duration": 12}"#).unwrap();
        assert_eq!(info.id, "qf27qzFKv60");
        assert!(info.title.is_none());
    }

    #[tokio::test]
    async fn locate_artifact_reports_missing_file_as_retryable() {
        let dir = tempfile::tempdir().unwrap();
        let err = locate_artifact(dir.path(), "abc").await.unwrap_err();
        assert!(matches!(err, MediaError::ArtifactMissing { ref video_id } if video_id == "abc"));
        assert!(err.is_retryable());

        std::fs::write(dir.path().join("abc.mp3"), b"id3").unwrap();
        let path = locate_artifact(dir.path(), "abc").await.unwrap();
        assert_eq!(path, dir.path().join("abc.mp3"));
    }

    #[tokio::test]
    async fn missing_tool_is_not_retryable() {
        let err = run_tool("batchwork-definitely-not-installed", &[]).await.unwrap_err();
        assert!(matches!(err, MediaError::Launch { .. }));
        assert!(!err.is_retryable());
    }
}
