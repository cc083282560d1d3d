//! One handler per subcommand. Credentials are checked before any batch
//! starts; per-item failures are reported, never propagated.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::aggregate::{Aggregator, Tally, failures};
use crate::cli::{Command, MatchesCommand, ReviewsCommand, SearchCommand};
use crate::config::{BatchworkConfig, SearchConfig};
use crate::error::ConfigError;
use crate::llm::LlmClient;
use crate::matches::{MatchClient, MatchDateStore, fetch_match_dates};
use crate::reviews::{
    CategorizationReport, ReviewCategorizer, categorize_all, extract_file, load_reviews,
};
use crate::runner::JobResult;
use crate::transcribe::{
    HttpTranscriber, OpenSearchIndex, Summarizer, TranscriptionPipeline, YtDlpSource,
    summarize_records, transcribe_batch,
};
use crate::ui::{BatchProgress, Printer};
use crate::wiki::{ChampionRoster, PageKind, WikiClient, fetch_pages, save_page};

pub async fn dispatch(command: Command, config: &BatchworkConfig) -> Result<()> {
    match command {
        Command::Reviews { command } => match command {
            ReviewsCommand::Extract { input, output } => reviews_extract(&input, &output).await,
            ReviewsCommand::Categorize {
                input,
                concurrency,
                output,
            } => reviews_categorize(config, &input, concurrency, &output).await,
            ReviewsCommand::Chart { report } => reviews_chart(&report).await,
        },
        Command::Transcribe {
            urls,
            concurrency,
            tags,
            summarize,
            keep_audio,
        } => transcribe(config, urls, concurrency, tags, summarize, keep_audio).await,
        Command::Wiki {
            names,
            kind,
            concurrency,
            out,
        } => wiki(config, names, kind.into(), concurrency, out).await,
        Command::Matches { command } => match command {
            MatchesCommand::Ids { output } => match_ids(config, output).await,
            MatchesCommand::Dates { ids, output } => match_dates(config, ids, output).await,
        },
        Command::Search { command } => search(config, command).await,
    }
}

async fn reviews_extract(input: &Path, output: &Path) -> Result<()> {
    let count = extract_file(input, output).await?;
    info!(count, output = %output.display(), "extracted reviews");
    println!("Extracted {count} reviews to {}", output.display());
    Ok(())
}

async fn reviews_categorize(
    config: &BatchworkConfig,
    input: &Path,
    concurrency: Option<usize>,
    output: &Path,
) -> Result<()> {
    let api_key = config.require_llm_key()?;
    let max_concurrency = concurrency.unwrap_or(config.reviews.max_concurrency);
    let reviews = load_reviews(input).await?;

    let client = LlmClient::with_base_url(api_key.to_string(), config.llm.base_url.clone())?;
    let categorizer = Arc::new(ReviewCategorizer::new(
        client,
        config.llm.model.clone(),
        config.retry.clone(),
    ));

    info!(reviews = reviews.len(), max_concurrency, "categorizing reviews");
    let progress = BatchProgress::start(reviews.len(), "categorizing");
    let results = categorize_all(categorizer, reviews, max_concurrency, progress.bar()).await;
    progress.finish();
    let results = results?;

    let report = CategorizationReport::build(&results, max_concurrency);
    let json = serde_json::to_string_pretty(&report)?;
    tokio::fs::write(output, json)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;

    let printer = Printer::new();
    printer.summary("Review categorization", &Tally.aggregate(&results));
    printer.failures(&failures(&results));
    if report.unclassified_reviews > 0 {
        warn!(count = report.unclassified_reviews, "some reviews could not be classified");
    }
    println!("Results saved to {}", output.display());
    Ok(())
}

async fn reviews_chart(path: &Path) -> Result<()> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let report: CategorizationReport = serde_json::from_str(&json)
        .with_context(|| format!("{} is not a categorization report", path.display()))?;
    Printer::new().chart(&report);
    Ok(())
}

async fn transcribe(
    config: &BatchworkConfig,
    urls: Vec<String>,
    concurrency: Option<usize>,
    tags: Vec<String>,
    summarize: bool,
    keep_audio: bool,
) -> Result<()> {
    let settings = &config.transcribe;
    let api_key = config.require_transcription_key()?;
    let summarizer = if summarize {
        let client = LlmClient::with_base_url(
            config.require_llm_key()?.to_string(),
            config.llm.base_url.clone(),
        )?;
        Some(Summarizer::new(client, config.llm.model.clone(), config.retry.clone()))
    } else {
        None
    };
    let index = search_index(&config.search)?;

    let media = YtDlpSource::new(settings.audio_dir.clone())
        .with_tools(settings.ytdlp.clone(), settings.ffmpeg.clone())
        .with_preprocess(settings.preprocess_audio.then(|| settings.preprocess.clone()));
    let transcriber = HttpTranscriber::new(
        api_key,
        settings.base_url.clone(),
        settings.model.clone(),
        settings.language.clone(),
    )?;

    let pipeline = TranscriptionPipeline::new(media, transcriber)
        .with_index(index)
        .with_summarizer(summarizer)
        .with_retry(config.retry.clone())
        .with_cleanup(settings.cleanup_files && !keep_audio);

    let max_concurrency = concurrency.unwrap_or(settings.max_concurrency);
    info!(jobs = urls.len(), max_concurrency, "starting transcription batch");
    let progress = BatchProgress::start(urls.len(), "transcribing");
    let records = transcribe_batch(
        Arc::new(pipeline),
        urls,
        tags,
        max_concurrency,
        progress.bar(),
    )
    .await;
    progress.finish();
    let records = records?;

    let printer = Printer::new();
    printer.summary("Transcription", &summarize_records(&records));
    printer.records(&records);
    Ok(())
}

async fn wiki(
    config: &BatchworkConfig,
    names: Vec<String>,
    kind: PageKind,
    concurrency: Option<usize>,
    out: Option<PathBuf>,
) -> Result<()> {
    let settings = &config.wiki;
    let client = Arc::new(WikiClient::new(settings.base_url.clone(), &settings.user_agent)?);
    let roster = match &settings.roster_path {
        Some(path) => {
            let roster = ChampionRoster::load(path)
                .await
                .with_context(|| format!("failed to load champion roster {}", path.display()))?;
            if roster.is_empty() {
                warn!(
                    path = %path.display(),
                    "champion roster is empty, every champion lookup will fail"
                );
            }
            Some(Arc::new(roster))
        }
        None => None,
    };

    let max_concurrency = concurrency.unwrap_or(settings.max_concurrency);
    let progress = BatchProgress::start(names.len(), "fetching");
    let results = fetch_pages(client, roster, names, kind, max_concurrency, progress.bar()).await;
    progress.finish();
    let results = results?;

    if let Some(dir) = &out {
        for page in results.iter().filter_map(JobResult::value) {
            let path = save_page(dir, page).await?;
            debug!(path = %path.display(), "saved wiki page");
        }
    }

    let printer = Printer::new();
    printer.pages(&results);
    printer.summary("Wiki pages", &Tally.aggregate(&results));
    Ok(())
}

async fn match_ids(config: &BatchworkConfig, output: Option<PathBuf>) -> Result<()> {
    let settings = &config.matches;
    let api_key = config.require_riot_key()?;
    let puuid = config.require_puuid()?;
    let output = output.unwrap_or_else(|| settings.ids_path.clone());

    let client = MatchClient::new(settings.base_url.clone(), api_key)?;
    let ids = client.fetch_match_ids(puuid, settings.pages, settings.page_size).await;

    let json = serde_json::to_string_pretty(&ids)?;
    tokio::fs::write(&output, json)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;
    info!(count = ids.len(), path = %output.display(), "wrote match ids");
    println!("Saved {} match ids to {}", ids.len(), output.display());
    Ok(())
}

async fn match_dates(
    config: &BatchworkConfig,
    ids: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    let settings = &config.matches;
    let api_key = config.require_riot_key()?;
    let ids_path = ids.unwrap_or_else(|| settings.ids_path.clone());
    let dates_path = output.unwrap_or_else(|| settings.dates_path.clone());

    let json = tokio::fs::read_to_string(&ids_path)
        .await
        .with_context(|| format!("failed to read {}", ids_path.display()))?;
    let match_ids: Vec<String> = serde_json::from_str(&json)
        .with_context(|| format!("{} is not a JSON array of match ids", ids_path.display()))?;

    let mut store = MatchDateStore::load(dates_path).await?;
    info!(
        path = %store.path().display(),
        stored = store.len(),
        total = match_ids.len(),
        "fetching match dates"
    );

    let client = MatchClient::new(settings.base_url.clone(), api_key)?;
    let report = fetch_match_dates(
        &client,
        &match_ids,
        &mut store,
        &config.retry,
        Duration::from_millis(settings.pacing_ms),
    )
    .await?;

    Printer::new().match_report(&report);
    Ok(())
}

async fn search(config: &BatchworkConfig, command: SearchCommand) -> Result<()> {
    let index = search_index(&config.search)?
        .ok_or(ConfigError::MissingCredential("OPENSEARCH_ENDPOINT"))?;
    match command {
        SearchCommand::Get { job_id } => match index.get(&job_id).await? {
            Some(doc) => println!("{}", serde_json::to_string_pretty(&doc)?),
            None => println!("No document with id {job_id}"),
        },
        SearchCommand::Tag { job_id, tags } => {
            index.update_tags(&job_id, &tags).await?;
            println!("Updated tags of {job_id}");
        }
        SearchCommand::Delete { job_id } => {
            if index.delete(&job_id).await? {
                println!("Deleted {job_id}");
            } else {
                println!("No document with id {job_id}");
            }
        }
    }
    Ok(())
}

fn search_index(settings: &SearchConfig) -> Result<Option<OpenSearchIndex>> {
    let Some(endpoint) = &settings.endpoint else {
        return Ok(None);
    };
    let index = OpenSearchIndex::new(endpoint, settings.index.clone())?;
    Ok(Some(match &settings.username {
        Some(username) => index.with_basic_auth(username.clone(), settings.password.clone()),
        None => index,
    }))
}
