//! Pulls review bodies out of a raw copy of a review listing page.
//!
//! Each review in the dump looks like a score line, a date/user line, the
//! body, then a `Report` or `Read More` footer.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

static REVIEW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\n\d+\n.*?\n(.*?)(?:\nReport|\nRead More)").expect("valid regex")
});

pub fn extract_reviews(raw: &str) -> Vec<String> {
    REVIEW_RE
        .captures_iter(raw)
        .filter_map(|caps| caps.get(1))
        .map(|body| body.as_str().trim())
        .filter(|body| !body.is_empty())
        .map(str::to_string)
        .collect()
}

pub async fn extract_file(input: &Path, output: &Path) -> Result<usize> {
    let raw = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("failed to read {}", input.display()))?;
    let reviews = extract_reviews(&raw);
    let json = serde_json::to_string_pretty(&reviews)?;
    tokio::fs::write(output, json)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;
    Ok(reviews.len())
}

pub async fn load_reviews(path: &Path) -> Result<Vec<String>> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&contents)
        .with_context(|| format!("{} is not a JSON array of strings", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "Header\nPlayerOne\n8\nJan 1, 2024\nFun once you learn it.\nReport\n\
                       PlayerTwo\n2\nFeb 3, 2024\nQueue times are awful.\nSmurfs everywhere.\nRead More\n\
                       PlayerThree\n5\nMar 9, 2024\n   \nReport\n";

    #[test]
    fn extracts_bodies_between_score_and_footer() {
        let reviews = extract_reviews(RAW);
        assert_eq!(
            reviews,
            vec![
                "Fun once you learn it.".to_string(),
                "Queue times are awful.\nSmurfs everywhere.".to_string(),
            ]
        );
    }

    #[test]
    fn no_reviews_in_unrelated_text() {
        assert!(extract_reviews("nothing to see here").is_empty());
    }

    #[tokio::test]
    async fn extract_file_writes_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("raw.txt");
        let output = dir.path().join("reviews.json");
        std::fs::write(&input, RAW).unwrap();

        let count = extract_file(&input, &output).await.unwrap();
        assert_eq!(count, 2);

        let loaded = load_reviews(&output).await.unwrap();
        assert_eq!(loaded[0], "Fun once you learn it.");
    }

    #[tokio::test]
    async fn load_reviews_rejects_non_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"not": "an array"}"#).unwrap();
        assert!(load_reviews(&path).await.is_err());
    }
}
