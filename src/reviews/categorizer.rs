use std::convert::Infallible;
use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::labels::{CATEGORIES, CategoryFlags, group_title};
use crate::error::RunnerError;
use crate::llm::{LlmError, MessageSender, MessagesRequest, extract_json_object};
use crate::retry::{RetryPolicy, retry};
use crate::runner::{self, JobResult, WorkItem};

const SYSTEM_PROMPT: &str =
    "You are an expert at analyzing player reviews for video games. Respond with structured JSON only.";

/// One review with the labels the model assigned to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Categorized {
    pub index: usize,
    pub review: String,
    pub categories: CategoryFlags,
    /// `false` when classification failed and `categories` is the all-false
    /// fallback.
    pub classified: bool,
}

/// Classifies reviews against the fixed label set with an LLM.
pub struct ReviewCategorizer<C> {
    client: C,
    model: String,
    retry: RetryPolicy,
}

impl<C: MessageSender> ReviewCategorizer<C> {
    pub fn new(client: C, model: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            client,
            model: model.into(),
            retry,
        }
    }

    pub fn build_prompt(review: &str) -> String {
        let mut prompt = String::from(
            "You are an expert at analyzing player reviews for video games. Given the following review, \
             categorize it into the appropriate complaint categories. Return a structured JSON response.\n\n\
             Categories:\n\n",
        );
        for group in CATEGORIES {
            let _ = writeln!(prompt, "{}:", group_title(group.key));
            for label in group.labels {
                let _ = writeln!(prompt, "  - {}: {}", label.key, label.description);
            }
            prompt.push('\n');
        }
        let _ = write!(
            prompt,
            "Review:\n{review}\n\n\
             Analyze this review and return a JSON object keyed by category group \
             (e.g. \"matchmaking_issues\"), each mapping subcategory keys to true/false."
        );
        prompt
    }

    /// Never fails: a review the model could not classify comes back with
    /// every label unset and `classified == false`.
    pub async fn categorize(&self, index: usize, review: String) -> Categorized {
        match self.classify(&review).await {
            Ok(categories) => {
                debug!(index, "categorized review");
                Categorized {
                    index,
                    review,
                    categories,
                    classified: true,
                }
            }
            Err(e) => {
                warn!(index, error = %e, "could not categorize review, using empty categories");
                Categorized {
                    index,
                    review,
                    categories: CategoryFlags::none(),
                    classified: false,
                }
            }
        }
    }

    async fn classify(&self, review: &str) -> Result<CategoryFlags> {
        let req = MessagesRequest::user(&self.model, 1024, Self::build_prompt(review))
            .with_system(SYSTEM_PROMPT);

        let response = retry(
            &self.retry,
            || self.client.send_message(&req),
            LlmError::is_rate_limited,
        )
        .await?;

        let text = response.text();
        let json = extract_json_object(&text)
            .ok_or_else(|| anyhow!("reply contains no JSON object"))?;
        let value: serde_json::Value = serde_json::from_str(json)?;
        Ok(CategoryFlags::from_json(&value))
    }
}

/// Categorize every review with at most `max_concurrency` requests in
/// flight. Results come back in review order.
pub async fn categorize_all<C>(
    categorizer: Arc<ReviewCategorizer<C>>,
    reviews: Vec<String>,
    max_concurrency: usize,
    progress: ProgressBar,
) -> Result<Vec<JobResult<Categorized>>, RunnerError>
where
    C: MessageSender + Send + Sync + 'static,
{
    runner::run(
        reviews,
        move |item: WorkItem<String>| {
            let categorizer = Arc::clone(&categorizer);
            let progress = progress.clone();
            async move {
                let categorized = categorizer.categorize(item.index, item.input).await;
                progress.inc(1);
                Ok::<_, Infallible>(categorized)
            }
        },
        max_concurrency,
    )
    .await
}
