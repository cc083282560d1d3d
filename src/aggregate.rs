use std::fmt;

use serde::{Deserialize, Serialize};

use crate::runner::JobResult;

/// Folds a finished batch into a caller-specific summary.
///
/// Implementations must be pure functions of the result slice so that
/// aggregating the same batch twice yields the same summary.
pub trait Aggregator<V> {
    type Summary;

    fn aggregate(&self, results: &[JobResult<V>]) -> Self::Summary;
}

/// Success/failure counts for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }

    /// Count an outcome that did not come straight out of a `JobResult`.
    pub fn record(&mut self, success: bool) {
        self.total += 1;
        if success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} succeeded, {}/{} failed",
            self.succeeded, self.total, self.failed, self.total
        )
    }
}

/// Plain success/failure tally.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tally;

impl<V> Aggregator<V> for Tally {
    type Summary = BatchSummary;

    fn aggregate(&self, results: &[JobResult<V>]) -> BatchSummary {
        let mut summary = BatchSummary::default();
        for result in results {
            summary.record(result.is_success());
        }
        summary
    }
}

/// `(index, error)` for every failed item, in index order.
pub fn failures<V>(results: &[JobResult<V>]) -> Vec<(usize, &str)> {
    results
        .iter()
        .filter_map(|r| r.error().map(|e| (r.index(), e)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<JobResult<u32>> {
        vec![
            JobResult::Success { index: 0, value: 1 },
            JobResult::Failure {
                index: 1,
                error: "timeout".into(),
            },
            JobResult::Success { index: 2, value: 3 },
            JobResult::Failure {
                index: 3,
                error: "404".into(),
            },
        ]
    }

    #[test]
    fn tally_counts_outcomes() {
        let summary = Tally.aggregate(&sample());
        assert_eq!(
            summary,
            BatchSummary {
                total: 4,
                succeeded: 2,
                failed: 2
            }
        );
        assert!(!summary.all_succeeded());
    }

    #[test]
    fn tally_ignores_arrival_order() {
        let mut shuffled = sample();
        shuffled.reverse();
        assert_eq!(Tally.aggregate(&shuffled), Tally.aggregate(&sample()));
    }

    #[test]
    fn empty_batch_is_all_succeeded() {
        let empty: Vec<JobResult<()>> = Vec::new();
        let summary = Tally.aggregate(&empty);
        assert_eq!(summary.total, 0);
        assert!(summary.all_succeeded());
    }

    #[test]
    fn failures_lists_index_and_error() {
        assert_eq!(failures(&sample()), vec![(1, "timeout"), (3, "404")]);
    }

    #[test]
    fn summary_display() {
        let summary = Tally.aggregate(&sample());
        assert_eq!(summary.to_string(), "2/4 succeeded, 2/4 failed");
    }
}
