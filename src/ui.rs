//! Terminal output: batch progress bars and coloured summaries.
//!
//! `indicatif` draws the progress bar while a batch runs and `console`
//! styles the summaries printed afterwards.

use console::{Alignment, Style, pad_str, truncate_str};
use indicatif::{ProgressBar, ProgressStyle};

use crate::aggregate::BatchSummary;
use crate::matches::FetchReport;
use crate::reviews::CategorizationReport;
use crate::runner::JobResult;
use crate::state_machine::JobRecord;
use crate::wiki::WikiPage;

const BAR_WIDTH: usize = 40;
const LABEL_WIDTH: usize = 56;

/// Progress bar for one batch. Clones of [`BatchProgress::bar`] are handed
/// to the processors, which tick it as items finish.
pub struct BatchProgress {
    pb: ProgressBar,
}

impl BatchProgress {
    pub fn start(len: usize, label: &str) -> Self {
        let pb = ProgressBar::new(len as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} {msg} [{bar:30.cyan/blue}] {pos}/{len} ({elapsed})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        pb.set_style(style);
        pb.set_message(label.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        Self { pb }
    }

    pub fn bar(&self) -> ProgressBar {
        self.pb.clone()
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

/// Coloured summaries printed after a batch.
pub struct Printer {
    green: Style,
    red: Style,
    yellow: Style,
    dim: Style,
}

impl Default for Printer {
    fn default() -> Self {
        Self::new()
    }
}

impl Printer {
    pub fn new() -> Self {
        Self {
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            dim: Style::new().dim(),
        }
    }

    pub fn summary(&self, what: &str, summary: &BatchSummary) {
        let style = if summary.all_succeeded() { &self.green } else { &self.yellow };
        println!();
        println!("{}", style.apply_to(format!("─── {what} ───")));
        println!(
            "  {} Successful: {}/{}",
            self.green.apply_to("✓"),
            summary.succeeded,
            summary.total
        );
        println!("  {} Failed: {}/{}", self.red.apply_to("✗"), summary.failed, summary.total);
    }

    pub fn failures(&self, failures: &[(usize, &str)]) {
        for (index, error) in failures {
            println!("  {} #{index}: {error}", self.red.apply_to("✗"));
        }
    }

    pub fn records(&self, records: &[JobRecord]) {
        for record in records {
            if record.is_completed() {
                let seconds = record
                    .processing_time()
                    .map(|d| d.num_milliseconds() as f64 / 1000.0)
                    .unwrap_or_default();
                let chars = record.transcription().map_or(0, str::len);
                println!(
                    "  {} {} {} {}",
                    self.green.apply_to("✓"),
                    record.title().unwrap_or(record.url()),
                    self.dim.apply_to(format!("({chars} chars, {seconds:.1}s)")),
                    self.dim.apply_to(record.id())
                );
                if let Some(summary) = record.summary() {
                    println!("      {}", self.dim.apply_to(truncate_str(summary, 100, "…")));
                }
            } else {
                println!(
                    "  {} {}: {}",
                    self.red.apply_to("✗"),
                    record.url(),
                    record.error().unwrap_or("unknown error")
                );
            }
        }
    }

    pub fn pages(&self, results: &[JobResult<WikiPage>]) {
        for result in results {
            match result {
                JobResult::Success { value, .. } => println!(
                    "  {} {} {}",
                    self.green.apply_to("✓"),
                    value.title,
                    self.dim.apply_to(format!("({} chars)", value.char_count()))
                ),
                JobResult::Failure { index, error } => {
                    println!("  {} #{index}: {error}", self.red.apply_to("✗"))
                }
            }
        }
    }

    /// Ranked horizontal bar chart of complaint frequencies, coloured by
    /// group.
    pub fn chart(&self, report: &CategorizationReport) {
        let rows = report.complaint_categories.ranked();
        let max = rows.first().map_or(0, |row| row.count);
        let mentions: u64 = rows.iter().map(|row| row.count).sum();

        println!();
        println!("{}", self.green.apply_to("─── Complaint frequencies ───"));
        for row in &rows {
            let label = pad_str(&row.description, LABEL_WIDTH, Alignment::Left, Some("…"));
            let bar = group_style(&row.group).apply_to(render_bar(row.count, max, BAR_WIDTH));
            println!("  {label} {bar} {}", row.count);
        }
        println!();
        println!(
            "  {}",
            self.dim.apply_to(format!(
                "Total reviews: {} | processed: {} | unclassified: {} | complaint mentions: {mentions}",
                report.num_reviews, report.processed_reviews, report.unclassified_reviews
            ))
        );
    }

    pub fn match_report(&self, report: &FetchReport) {
        println!();
        println!("{}", self.green.apply_to("─── Match dates ───"));
        println!("  {} Fetched: {}", self.green.apply_to("✓"), report.fetched);
        println!("  {} Already stored: {}", self.dim.apply_to("·"), report.skipped);
        println!("  {} Rate limited: {}", self.yellow.apply_to("↻"), report.rate_limited);
        println!("  {} Failed: {}", self.red.apply_to("✗"), report.failed.len());
        for match_id in &report.failed {
            println!("      {}", self.dim.apply_to(match_id));
        }
    }
}

/// A bar `width` cells long for `max`, scaled down for smaller counts. Any
/// non-zero count gets at least one cell.
pub fn render_bar(count: u64, max: u64, width: usize) -> String {
    if max == 0 || count == 0 {
        return String::new();
    }
    let cells = ((count as f64 / max as f64) * width as f64).round() as usize;
    "█".repeat(cells.clamp(1, width))
}

fn group_style(group: &str) -> Style {
    let style = Style::new();
    match group {
        "learning_curve_and_complexity" => style.red(),
        "hostile_community_environment" => style.cyan(),
        "matchmaking_issues" => style.blue(),
        "time_investment_requirements" => style.green(),
        "technical_and_interface_issues" => style.yellow(),
        _ => style.white(),
    }
}
