use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::categorizer::Categorized;
use super::labels::{CATEGORIES, describe};
use crate::aggregate::{Aggregator, Tally};
use crate::runner::JobResult;

/// Number of reviews mentioning each label, over the full label set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Frequencies(BTreeMap<String, BTreeMap<String, u64>>);

impl Default for Frequencies {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl Frequencies {
    pub fn zeroed() -> Self {
        let groups = CATEGORIES
            .iter()
            .map(|group| {
                let labels = group.labels.iter().map(|l| (l.key.to_string(), 0)).collect();
                (group.key.to_string(), labels)
            })
            .collect();
        Self(groups)
    }

    pub fn count(&self, group: &str, label: &str) -> u64 {
        self.0
            .get(group)
            .and_then(|labels| labels.get(label))
            .copied()
            .unwrap_or(0)
    }

    fn bump(&mut self, group: &str, label: &str) {
        if let Some(count) = self.0.get_mut(group).and_then(|labels| labels.get_mut(label)) {
            *count += 1;
        }
    }

    /// Rows for a ranked chart: highest count first, ties broken by group
    /// then label so the output is stable.
    pub fn ranked(&self) -> Vec<ChartRow> {
        let mut rows: Vec<ChartRow> = self
            .0
            .iter()
            .flat_map(|(group, labels)| {
                labels.iter().map(move |(label, count)| ChartRow {
                    count: *count,
                    group: group.clone(),
                    label: label.clone(),
                    description: describe(group, label).unwrap_or(label.as_str()).to_string(),
                })
            })
            .collect();
        rows.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.group.cmp(&b.group))
                .then_with(|| a.label.cmp(&b.label))
        });
        rows
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartRow {
    pub count: u64,
    pub group: String,
    pub label: String,
    pub description: String,
}

/// Sums label flags over successful results. Failed items contribute
/// nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoryFrequencies;

impl Aggregator<Categorized> for CategoryFrequencies {
    type Summary = Frequencies;

    fn aggregate(&self, results: &[JobResult<Categorized>]) -> Frequencies {
        let mut frequencies = Frequencies::zeroed();
        for categorized in results.iter().filter_map(JobResult::value) {
            for (group, label) in categorized.categories.set_labels() {
                frequencies.bump(group, label);
            }
        }
        frequencies
    }
}

/// The JSON document written after a categorization run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorizationReport {
    pub num_reviews: usize,
    pub processed_reviews: usize,
    pub failed_reviews: usize,
    #[serde(default)]
    pub unclassified_reviews: usize,
    pub max_concurrent_requests: usize,
    pub complaint_categories: Frequencies,
}

impl CategorizationReport {
    pub fn build(results: &[JobResult<Categorized>], max_concurrent_requests: usize) -> Self {
        let summary = Tally.aggregate(results);
        let unclassified = results
            .iter()
            .filter_map(JobResult::value)
            .filter(|c| !c.classified)
            .count();
        Self {
            num_reviews: summary.total,
            processed_reviews: summary.succeeded,
            failed_reviews: summary.failed,
            unclassified_reviews: unclassified,
            max_concurrent_requests,
            complaint_categories: CategoryFrequencies.aggregate(results),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reviews::labels::CategoryFlags;

    fn categorized(
        index: usize,
        labels: &[(&str, &str)],
        classified: bool,
    ) -> JobResult<Categorized> {
        let mut categories = CategoryFlags::none();
        for (group, label) in labels {
            assert!(categories.set(group, label, true));
        }
        JobResult::Success {
            index,
            value: Categorized {
                index,
                review: format!("review {index}"),
                categories,
                classified,
            },
        }
    }

    fn batch() -> Vec<JobResult<Categorized>> {
        vec![
            categorized(
                0,
                &[("matchmaking_issues", "smurfs"), ("matchmaking_issues", "long_queue")],
                true,
            ),
            categorized(1, &[("matchmaking_issues", "smurfs")], true),
            JobResult::Failure {
                index: 2,
                error: "task panicked".into(),
            },
            categorized(3, &[], false),
            categorized(4, &[("technical_and_interface_issues", "client_bugs")], true),
        ]
    }

    #[test]
    fn counts_each_flag_once_per_review() {
        let freq = CategoryFrequencies.aggregate(&batch());
        assert_eq!(freq.count("matchmaking_issues", "smurfs"), 2);
        assert_eq!(freq.count("matchmaking_issues", "long_queue"), 1);
        assert_eq!(freq.count("technical_and_interface_issues", "client_bugs"), 1);
        assert_eq!(freq.count("hostile_community_environment", "toxic_teammates"), 0);
    }

    #[test]
    fn zeroed_frequencies_cover_every_label() {
        let freq = Frequencies::zeroed();
        assert_eq!(freq.ranked().len(), 15);
        assert!(freq.ranked().iter().all(|r| r.count == 0));
    }

    #[test]
    fn aggregation_is_idempotent_and_order_independent() {
        let results = batch();
        let first = CategoryFrequencies.aggregate(&results);
        assert_eq!(first, CategoryFrequencies.aggregate(&results));

        let mut reversed = batch();
        reversed.reverse();
        assert_eq!(first, CategoryFrequencies.aggregate(&reversed));
    }

    #[test]
    fn report_counts_failures_and_fallbacks() {
        let report = CategorizationReport::build(&batch(), 5);
        assert_eq!(report.num_reviews, 5);
        assert_eq!(report.processed_reviews, 4);
        assert_eq!(report.failed_reviews, 1);
        assert_eq!(report.unclassified_reviews, 1);
        assert_eq!(report.max_concurrent_requests, 5);
    }

    #[test]
    fn report_json_matches_expected_shape() {
        let report = CategorizationReport::build(&batch(), 2);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["complaint_categories"]["matchmaking_issues"]["smurfs"], 2);
        assert_eq!(
            value["complaint_categories"]["time_investment_requirements"]["slow_progress"],
            0
        );

        let parsed: CategorizationReport = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, report);
    }

    #[test]
    fn ranked_rows_sorted_by_count_then_name() {
        let rows = CategoryFrequencies.aggregate(&batch()).ranked();
        assert_eq!(rows[0].label, "smurfs");
        assert_eq!(rows[0].count, 2);
        assert!(rows[0].description.starts_with("New players often encounter smurfs"));
        // Two labels tied at 1: matchmaking_issues sorts before technical_and_interface_issues.
        assert_eq!(rows[1].label, "long_queue");
        assert_eq!(rows[2].label, "client_bugs");
        assert!(rows[3..].iter().all(|r| r.count == 0));
    }
}
