//! Match history download against the rate-limited match API.
//!
//! Match dates are fetched one at a time. A 429 sleeps with a backoff that
//! carries over between matches and only resets after a success, and every
//! success is written to disk straight away so an interrupted run resumes
//! where it stopped.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::retry::RetryPolicy;

pub const DEFAULT_BASE_URL: &str = "https://americas.api.riotgames.com/lol/match/v5/matches";

#[derive(Debug, Error)]
pub enum MatchError {
    #[error("rate limited")]
    RateLimited,

    #[error("match API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub struct MatchClient {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct MatchDetail {
    #[serde(default)]
    info: MatchInfo,
}

#[derive(Deserialize, Default)]
struct MatchInfo {
    #[serde(rename = "gameStartTimestamp", default)]
    game_start_timestamp: Option<i64>,
}

impl MatchClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, MatchError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    async fn get(&self, url: String) -> Result<Response, MatchError> {
        let response = self
            .client
            .get(url)
            .header("X-Riot-Token", &self.api_key)
            .send()
            .await?;
        check(response).await
    }

    pub async fn match_ids_page(
        &self,
        puuid: &str,
        start: u32,
        count: u32,
    ) -> Result<Vec<String>, MatchError> {
        let url = format!(
            "{}/by-puuid/{puuid}/ids?start={start}&count={count}",
            self.base_url.trim_end_matches('/')
        );
        Ok(self.get(url).await?.json().await?)
    }

    /// Page through a player's match ids. A page that fails is logged and
    /// left out.
    pub async fn fetch_match_ids(&self, puuid: &str, pages: u32, page_size: u32) -> Vec<String> {
        let mut ids = Vec::new();
        for page in 0..pages {
            let start = page * page_size;
            match self.match_ids_page(puuid, start, page_size).await {
                Ok(batch) => {
                    debug!(start, count = batch.len(), "fetched match id page");
                    ids.extend(batch);
                }
                Err(e) => warn!(start, error = %e, "failed to fetch match id page"),
            }
        }
        ids
    }

    /// `info.gameStartTimestamp` of a match, `None` if the API omits it.
    pub async fn match_start_timestamp(&self, match_id: &str) -> Result<Option<i64>, MatchError> {
        let url = format!("{}/{match_id}", self.base_url.trim_end_matches('/'));
        let detail: MatchDetail = self.get(url).await?.json().await?;
        Ok(detail.info.game_start_timestamp)
    }
}

async fn check(response: Response) -> Result<Response, MatchError> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(MatchError::RateLimited);
    }
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        return Err(MatchError::Api {
            status: status.as_u16(),
            message,
        });
    }
    Ok(response)
}

/// Match id to start timestamp, mirrored to a JSON file.
#[derive(Debug)]
pub struct MatchDateStore {
    path: PathBuf,
    dates: BTreeMap<String, Option<i64>>,
}

impl MatchDateStore {
    /// Load `path`, starting empty if it does not exist yet.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, MatchError> {
        let path = path.into();
        let dates = match tokio::fs::read_to_string(&path).await {
            Ok(json) => serde_json::from_str(&json)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, dates })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, match_id: &str) -> bool {
        self.dates.contains_key(match_id)
    }

    pub fn get(&self, match_id: &str) -> Option<Option<i64>> {
        self.dates.get(match_id).copied()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn insert(&mut self, match_id: impl Into<String>, timestamp: Option<i64>) {
        self.dates.insert(match_id.into(), timestamp);
    }

    /// Rewrite the whole file. Goes through a temp file so a crash never
    /// leaves a truncated store behind.
    pub async fn persist(&self) -> Result<(), MatchError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(&self.dates)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FetchReport {
    pub fetched: usize,
    /// Already present in the store.
    pub skipped: usize,
    pub failed: Vec<String>,
    pub rate_limited: u32,
}

/// Fetch the start date of every match not already in `store`.
///
/// Only store I/O errors abort the run; API failures abandon the match and
/// move on.
pub async fn fetch_match_dates(
    client: &MatchClient,
    match_ids: &[String],
    store: &mut MatchDateStore,
    policy: &RetryPolicy,
    pacing: Duration,
) -> Result<FetchReport, MatchError> {
    let mut report = FetchReport::default();
    let mut backoff = policy.backoff();

    for match_id in match_ids {
        if store.contains(match_id) {
            report.skipped += 1;
            continue;
        }

        let mut retries = 0;
        loop {
            match client.match_start_timestamp(match_id).await {
                Ok(timestamp) => {
                    store.insert(match_id.clone(), timestamp);
                    store.persist().await?;
                    report.fetched += 1;
                    debug!(match_id = %match_id, ?timestamp, "stored match date");
                    backoff.reset();
                    sleep(pacing).await;
                    break;
                }
                Err(MatchError::RateLimited) => {
                    report.rate_limited += 1;
                    if !policy.allows(retries) {
                        warn!(
                            match_id = %match_id,
                            retries,
                            "rate limit retries exhausted, skipping match"
                        );
                        report.failed.push(match_id.clone());
                        backoff.reset();
                        break;
                    }
                    retries += 1;
                    let delay = backoff.advance();
                    warn!(
                        match_id = %match_id,
                        retries,
                        delay_ms = delay.as_millis() as u64,
                        "rate limit exceeded, backing off"
                    );
                    sleep(delay).await;
                }
                Err(e) => {
                    warn!(match_id = %match_id, error = %e, "failed to fetch match");
                    report.failed.push(match_id.clone());
                    break;
                }
            }
        }
    }

    info!(
        fetched = report.fetched,
        skipped = report.skipped,
        failed = report.failed.len(),
        "match dates done"
    );
    Ok(report)
}
