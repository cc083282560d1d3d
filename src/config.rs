//! Configuration loaded from `batchwork.toml`.
//!
//! Every field has a default, so a missing file or a partial one is fine.
//! Credentials and endpoints from the environment take precedence over the
//! file.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::retry::RetryPolicy;
use crate::transcribe::AudioPreprocess;

pub const CONFIG_FILE: &str = "batchwork.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchworkConfig {
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub reviews: ReviewsConfig,
    #[serde(default)]
    pub transcribe: TranscribeConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub wiki: WikiConfig,
    #[serde(default)]
    pub matches: MatchesConfig,
}

/// Messages API used for review classification and summaries.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_url")]
    pub base_url: String,
}

fn default_llm_model() -> String {
    "claude-haiku-4-5-20251001".to_string()
}

fn default_llm_url() -> String {
    crate::llm::API_URL.to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_llm_model(),
            base_url: default_llm_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewsConfig {
    #[serde(default = "default_review_concurrency")]
    pub max_concurrency: usize,
}

fn default_review_concurrency() -> usize {
    5
}

impl Default for ReviewsConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_review_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscribeConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_transcribe_url")]
    pub base_url: String,
    #[serde(default = "default_transcribe_model")]
    pub model: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_transcribe_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_audio_dir")]
    pub audio_dir: PathBuf,
    #[serde(default = "default_true")]
    pub cleanup_files: bool,
    /// Run ffmpeg over downloaded audio before transcribing.
    #[serde(default = "default_true")]
    pub preprocess_audio: bool,
    #[serde(default)]
    pub preprocess: AudioPreprocess,
    #[serde(default = "default_ytdlp")]
    pub ytdlp: String,
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
}

fn default_transcribe_url() -> String {
    crate::transcribe::transcriber::DEFAULT_BASE_URL.to_string()
}

fn default_transcribe_model() -> String {
    "gpt-4o-transcribe".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_transcribe_concurrency() -> usize {
    3
}

fn default_audio_dir() -> PathBuf {
    PathBuf::from("audio")
}

fn default_true() -> bool {
    true
}

fn default_ytdlp() -> String {
    "yt-dlp".to_string()
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

impl Default for TranscribeConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_transcribe_url(),
            model: default_transcribe_model(),
            language: default_language(),
            max_concurrency: default_transcribe_concurrency(),
            audio_dir: default_audio_dir(),
            cleanup_files: true,
            preprocess_audio: true,
            preprocess: AudioPreprocess::default(),
            ytdlp: default_ytdlp(),
            ffmpeg: default_ffmpeg(),
        }
    }
}

/// Search index for finished transcripts. Upload is skipped without an
/// endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default = "default_index")]
    pub index: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

fn default_index() -> String {
    "video-transcriptions".to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            index: default_index(),
            username: None,
            password: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WikiConfig {
    #[serde(default = "default_wiki_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub roster_path: Option<PathBuf>,
    #[serde(default = "default_wiki_concurrency")]
    pub max_concurrency: usize,
}

fn default_wiki_url() -> String {
    crate::wiki::DEFAULT_BASE_URL.to_string()
}

fn default_user_agent() -> String {
    crate::wiki::DEFAULT_USER_AGENT.to_string()
}

fn default_wiki_concurrency() -> usize {
    4
}

impl Default for WikiConfig {
    fn default() -> Self {
        Self {
            base_url: default_wiki_url(),
            user_agent: default_user_agent(),
            roster_path: None,
            max_concurrency: default_wiki_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchesConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub puuid: String,
    #[serde(default = "default_matches_url")]
    pub base_url: String,
    #[serde(default = "default_pages")]
    pub pages: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Pause after every successful match request, in milliseconds.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
    #[serde(default = "default_ids_path")]
    pub ids_path: PathBuf,
    #[serde(default = "default_dates_path")]
    pub dates_path: PathBuf,
}

fn default_matches_url() -> String {
    crate::matches::DEFAULT_BASE_URL.to_string()
}

fn default_pages() -> u32 {
    10
}

fn default_page_size() -> u32 {
    100
}

fn default_pacing_ms() -> u64 {
    100
}

fn default_ids_path() -> PathBuf {
    PathBuf::from("match_ids.json")
}

fn default_dates_path() -> PathBuf {
    PathBuf::from("match_dates.json")
}

impl Default for MatchesConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            puuid: String::new(),
            base_url: default_matches_url(),
            pages: default_pages(),
            page_size: default_page_size(),
            pacing_ms: default_pacing_ms(),
            ids_path: default_ids_path(),
            dates_path: default_dates_path(),
        }
    }
}

impl BatchworkConfig {
    /// Load `path`, or `batchwork.toml` in the current directory when no
    /// path is given. Only an explicitly named file has to exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) if !path.exists() => {
                return Err(ConfigError::NotFound(path.display().to_string()));
            }
            Some(path) => Self::from_file(path)?,
            None if Path::new(CONFIG_FILE).exists() => Self::from_file(Path::new(CONFIG_FILE))?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Override credentials and endpoints from `lookup`. Empty values are
    /// ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

        if let Some(key) = get("ANTHROPIC_API_KEY") {
            self.llm.api_key = key;
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.transcribe.api_key = key;
        }
        if let Some(key) = get("RIOT_API_KEY") {
            self.matches.api_key = key;
        }
        if let Some(puuid) = get("PUUID") {
            self.matches.puuid = puuid;
        }
        if let Some(endpoint) = get("OPENSEARCH_ENDPOINT") {
            self.search.endpoint = Some(endpoint);
        }
        if let Some(username) = get("OPENSEARCH_USERNAME") {
            self.search.username = Some(username);
        }
        if let Some(password) = get("OPENSEARCH_PASSWORD") {
            self.search.password = Some(password);
        }
    }

    pub fn require_llm_key(&self) -> Result<&str, ConfigError> {
        require(&self.llm.api_key, "ANTHROPIC_API_KEY")
    }

    pub fn require_transcription_key(&self) -> Result<&str, ConfigError> {
        require(&self.transcribe.api_key, "OPENAI_API_KEY")
    }

    pub fn require_riot_key(&self) -> Result<&str, ConfigError> {
        require(&self.matches.api_key, "RIOT_API_KEY")
    }

    pub fn require_puuid(&self) -> Result<&str, ConfigError> {
        require(&self.matches.puuid, "PUUID")
    }
}

fn require<'a>(value: &'a str, name: &'static str) -> Result<&'a str, ConfigError> {
    if value.is_empty() {
        Err(ConfigError::MissingCredential(name))
    } else {
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn default_config_values() {
        let config = BatchworkConfig::default();
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.reviews.max_concurrency, 5);
        assert_eq!(config.transcribe.max_concurrency, 3);
        assert_eq!(config.transcribe.language, "en");
        assert!(config.transcribe.cleanup_files);
        assert_eq!(config.search.index, "video-transcriptions");
        assert!(config.search.endpoint.is_none());
        assert_eq!(config.matches.pages, 10);
        assert_eq!(config.matches.page_size, 100);
        assert!(config.llm.api_key.is_empty());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            [retry]
            max_retries = 8
            unbounded = true

            [transcribe]
            max_concurrency = 2
            audio_dir = "/tmp/audio"

            [transcribe.preprocess]
            speed = 2.0

            [search]
            endpoint = "search.example.com"
        "#;
        let config: BatchworkConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.retry.max_retries, 8);
        assert!(config.retry.unbounded);
        assert_eq!(config.retry.base_delay_ms, 100);
        assert_eq!(config.transcribe.max_concurrency, 2);
        assert_eq!(config.transcribe.audio_dir, PathBuf::from("/tmp/audio"));
        assert!(config.transcribe.preprocess_audio);
        assert_eq!(config.transcribe.preprocess.speed, 2.0);
        assert!(config.transcribe.preprocess.remove_silence);
        assert_eq!(config.search.endpoint.as_deref(), Some("search.example.com"));
        assert_eq!(config.reviews.max_concurrency, 5);
    }

    #[test]
    fn environment_takes_precedence_over_file() {
        let mut config: BatchworkConfig = toml::from_str(
            r#"
            [llm]
            api_key = "from-file"
            [matches]
            puuid = "file-puuid"
            "#,
        )
        .unwrap();

        config.apply_env(env(&[
            ("ANTHROPIC_API_KEY", "from-env"),
            ("RIOT_API_KEY", "RGAPI-env"),
            ("PUUID", ""),
            ("OPENSEARCH_ENDPOINT", "https://search.example.com"),
            ("OPENSEARCH_USERNAME", "admin"),
        ]));

        assert_eq!(config.llm.api_key, "from-env");
        assert_eq!(config.matches.api_key, "RGAPI-env");
        // Empty variables do not clobber the file value.
        assert_eq!(config.matches.puuid, "file-puuid");
        assert_eq!(config.search.endpoint.as_deref(), Some("https://search.example.com"));
        assert_eq!(config.search.username.as_deref(), Some("admin"));
        assert!(config.search.password.is_none());
    }

    #[test]
    fn missing_credentials_are_reported_by_name() {
        let config = BatchworkConfig::default();
        let err = config.require_riot_key().unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential("RIOT_API_KEY")));
        assert!(matches!(
            config.require_transcription_key(),
            Err(ConfigError::MissingCredential("OPENAI_API_KEY"))
        ));

        let mut config = config;
        config.apply_env(env(&[("ANTHROPIC_API_KEY", "sk-1")]));
        assert_eq!(config.require_llm_key().unwrap(), "sk-1");
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let err =
            BatchworkConfig::load(Some(Path::new("/nonexistent/batchwork.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn explicit_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[wiki]\nmax_concurrency = 9\n").unwrap();

        let config = BatchworkConfig::load(Some(&path)).unwrap();
        assert_eq!(config.wiki.max_concurrency, 9);
    }

    #[test]
    fn invalid_toml_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[retry\nmax_retries = ").unwrap();

        let err = BatchworkConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }
}
