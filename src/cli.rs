//! Command line interface built on clap.
//!
//! Each subcommand is one batch job: review categorization, video
//! transcription, wiki fetches and match history downloads.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::wiki::PageKind;

/// Bounded-concurrency batch jobs against rate-limited APIs.
#[derive(Debug, Parser)]
#[command(name = "batchwork", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Config file (defaults to ./batchwork.toml when present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug-level logging.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract, categorize and chart player reviews.
    Reviews {
        #[command(subcommand)]
        command: ReviewsCommand,
    },

    /// Download, transcribe and index videos.
    Transcribe {
        /// Video URLs.
        #[arg(required = true)]
        urls: Vec<String>,

        /// Jobs in flight at once.
        #[arg(long, short = 'c')]
        concurrency: Option<usize>,

        /// Tag attached to every job (repeatable).
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Add an LLM summary of each transcript.
        #[arg(long, default_value_t = false)]
        summarize: bool,

        /// Keep downloaded audio files.
        #[arg(long, default_value_t = false)]
        keep_audio: bool,
    },

    /// Fetch wiki pages as plain text.
    Wiki {
        /// Page names, e.g. "Miss Fortune".
        #[arg(required = true)]
        names: Vec<String>,

        #[arg(long, value_enum, default_value_t = PageKindArg::Generic)]
        kind: PageKindArg,

        #[arg(long, short = 'c')]
        concurrency: Option<usize>,

        /// Write each page to <DIR>/<Title>.txt.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Download match history.
    Matches {
        #[command(subcommand)]
        command: MatchesCommand,
    },

    /// Inspect or edit stored transcripts.
    Search {
        #[command(subcommand)]
        command: SearchCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum ReviewsCommand {
    /// Pull review bodies out of a raw review page dump.
    Extract {
        input: PathBuf,

        #[arg(long, short, default_value = "reviews.json")]
        output: PathBuf,
    },

    /// Classify every review and write a frequency report.
    Categorize {
        /// JSON array of review strings.
        input: PathBuf,

        #[arg(long, short = 'c')]
        concurrency: Option<usize>,

        #[arg(long, short, default_value = "categorized_reviews.json")]
        output: PathBuf,
    },

    /// Print a ranked bar chart of a categorization report.
    Chart { report: PathBuf },
}

#[derive(Debug, Subcommand)]
pub enum MatchesCommand {
    /// Page through the player's match ids.
    Ids {
        /// Output file (defaults to matches.ids_path).
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Fetch the start date of every listed match, resuming a previous run.
    Dates {
        /// Match id list (defaults to matches.ids_path).
        #[arg(long)]
        ids: Option<PathBuf>,

        /// Date store (defaults to matches.dates_path).
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
pub enum SearchCommand {
    /// Print a stored transcript document.
    Get { job_id: String },

    /// Replace the tags of a stored transcript.
    Tag {
        job_id: String,
        #[arg(required = true)]
        tags: Vec<String>,
    },

    /// Remove a stored transcript.
    Delete { job_id: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PageKindArg {
    /// Checked against the champion roster when one is configured.
    Champion,
    Item,
    Generic,
}

impl From<PageKindArg> for PageKind {
    fn from(arg: PageKindArg) -> Self {
        match arg {
            PageKindArg::Champion => PageKind::Champion,
            PageKindArg::Item => PageKind::Item,
            PageKindArg::Generic => PageKind::Generic,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_categorize_subcommand() {
        let cli = Cli::parse_from([
            "batchwork",
            "reviews",
            "categorize",
            "reviews.json",
            "-c",
            "8",
        ]);
        match cli.command {
            Command::Reviews {
                command: ReviewsCommand::Categorize { input, concurrency, output },
            } => {
                assert_eq!(input, PathBuf::from("reviews.json"));
                assert_eq!(concurrency, Some(8));
                assert_eq!(output, PathBuf::from("categorized_reviews.json"));
            }
            other => panic!("expected reviews categorize, got {other:?}"),
        }
    }

    #[test]
    fn cli_parses_global_flags() {
        let cli = Cli::parse_from([
            "batchwork",
            "--config",
            "custom.toml",
            "--verbose",
            "reviews",
            "chart",
            "report.json",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
    }

    #[test]
    fn cli_parses_transcribe_with_tags() {
        let cli = Cli::parse_from([
            "batchwork",
            "transcribe",
            "https://youtu.be/a",
            "https://youtu.be/b",
            "--tag",
            "talks",
            "--tag",
            "2024",
            "--summarize",
        ]);
        match cli.command {
            Command::Transcribe { urls, tags, summarize, keep_audio, concurrency } => {
                assert_eq!(urls.len(), 2);
                assert_eq!(tags, vec!["talks", "2024"]);
                assert!(summarize);
                assert!(!keep_audio);
                assert!(concurrency.is_none());
            }
            other => panic!("expected transcribe, got {other:?}"),
        }
    }

    #[test]
    fn cli_parses_wiki_kind() {
        let cli = Cli::parse_from([
            "batchwork",
            "wiki",
            "Ahri",
            "Miss Fortune",
            "--kind",
            "champion",
        ]);
        match cli.command {
            Command::Wiki { names, kind, .. } => {
                assert_eq!(names, vec!["Ahri", "Miss Fortune"]);
                assert_eq!(PageKind::from(kind), PageKind::Champion);
            }
            other => panic!("expected wiki, got {other:?}"),
        }
    }

    #[test]
    fn transcribe_requires_a_url() {
        assert!(Cli::try_parse_from(["batchwork", "transcribe"]).is_err());
    }

    #[test]
    fn cli_verify() {
        Cli::command().debug_assert();
    }
}
