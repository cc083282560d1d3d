//! Fetches game wiki pages and reduces them to searchable plain text.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use indicatif::ProgressBar;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::error::RunnerError;
use crate::runner::{self, JobResult, WorkItem};

pub const DEFAULT_BASE_URL: &str = "https://wiki.leagueoflegends.com/en-us";
pub const DEFAULT_USER_AGENT: &str = "batchwork-wiki";

static HIDDEN_METADATA: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(".hidden-metadata.navigation-not-searchable").expect("valid selector")
});

#[derive(Debug, Error)]
pub enum WikiError {
    #[error("unknown champion: {0}")]
    UnknownChampion(String),

    #[error("page unavailable: {0}")]
    Unavailable(String),

    #[error("invalid champion roster: {0}")]
    Roster(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    Champion,
    Item,
    #[default]
    Generic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WikiPage {
    pub name: String,
    pub kind: PageKind,
    pub title: String,
    pub text: String,
}

impl WikiPage {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// `"Miss Fortune"` becomes `"Miss_Fortune"`.
pub fn page_title(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join("_")
}

/// All visible text of a page, one space between fragments. Script, style
/// and hidden navigation metadata are left out.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut fragments = Vec::new();
    collect_text(document.root_element(), &mut fragments);
    fragments.join(" ")
}

fn collect_text(element: ElementRef<'_>, out: &mut Vec<String>) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if name == "script" || name == "style" || HIDDEN_METADATA.matches(&child_element) {
                continue;
            }
            collect_text(child_element, out);
        } else if let Some(text) = child.value().as_text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                out.push(trimmed.to_string());
            }
        }
    }
}

/// Known champion names, read from a Data Dragon `champion.json`.
#[derive(Debug, Clone, Default)]
pub struct ChampionRoster {
    // lowercase name -> canonical name
    names: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct RosterFile {
    data: BTreeMap<String, RosterEntry>,
}

#[derive(Deserialize)]
struct RosterEntry {
    name: String,
}

impl ChampionRoster {
    pub fn from_json(json: &str) -> Result<Self, WikiError> {
        let file: RosterFile = serde_json::from_str(json)?;
        let names = file
            .data
            .into_values()
            .map(|entry| (entry.name.to_lowercase(), entry.name))
            .collect();
        Ok(Self { names })
    }

    pub async fn load(path: &Path) -> Result<Self, WikiError> {
        let json = tokio::fs::read_to_string(path).await?;
        let roster = Self::from_json(&json)?;
        debug!(path = %path.display(), champions = roster.len(), "loaded champion roster");
        Ok(roster)
    }

    /// Canonical spelling of `name`, matched case-insensitively.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.names.get(&name.trim().to_lowercase()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

pub struct WikiClient {
    client: Client,
    base_url: String,
}

impl WikiClient {
    pub fn new(base_url: impl Into<String>, user_agent: &str) -> Result<Self, WikiError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(20))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Plain text of `page`, or `None` if it could not be fetched.
    pub async fn fetch_page(&self, page: &str) -> Option<String> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), page_title(page));
        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(url = %url, error = %e, "wiki request failed");
                return None;
            }
        };
        if !response.status().is_success() {
            debug!(url = %url, status = response.status().as_u16(), "wiki page not available");
            return None;
        }
        let body = response.text().await.ok()?;
        tokio::task::spawn_blocking(move || extract_text(&body)).await.ok()
    }

    async fn fetch(
        &self,
        name: String,
        kind: PageKind,
        roster: Option<&ChampionRoster>,
    ) -> Result<WikiPage, WikiError> {
        let name = match (kind, roster) {
            (PageKind::Champion, Some(roster)) => roster
                .resolve(&name)
                .map(str::to_string)
                .ok_or(WikiError::UnknownChampion(name))?,
            _ => name,
        };
        let title = page_title(&name);
        let text = match self.fetch_page(&name).await {
            Some(text) if !text.is_empty() => text,
            _ => return Err(WikiError::Unavailable(title)),
        };
        Ok(WikiPage { name, kind, title, text })
    }
}

/// Fetch every page with at most `max_concurrency` requests in flight.
pub async fn fetch_pages(
    client: Arc<WikiClient>,
    roster: Option<Arc<ChampionRoster>>,
    names: Vec<String>,
    kind: PageKind,
    max_concurrency: usize,
    progress: ProgressBar,
) -> Result<Vec<JobResult<WikiPage>>, RunnerError> {
    runner::run(
        names,
        move |item: WorkItem<String>| {
            let client = Arc::clone(&client);
            let roster = roster.clone();
            let progress = progress.clone();
            async move {
                let result = client.fetch(item.input, kind, roster.as_deref()).await;
                progress.inc(1);
                if let Ok(page) = &result {
                    info!(
                        index = item.index,
                        title = %page.title,
                        chars = page.char_count(),
                        "fetched wiki page"
                    );
                }
                result
            }
        },
        max_concurrency,
    )
    .await
}

pub async fn save_page(dir: &Path, page: &WikiPage) -> Result<PathBuf, WikiError> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(format!("{}.txt", page.title));
    tokio::fs::write(&path, &page.text).await?;
    Ok(path)
}
