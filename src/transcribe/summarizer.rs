use crate::llm::{LlmError, MessageSender, MessagesRequest};
use crate::retry::{RetryPolicy, retry};

/// Transcripts are cut to this many characters before summarizing.
pub const MAX_INPUT_CHARS: usize = 12_000;

const SYSTEM_PROMPT: &str = "You summarize video transcripts. Reply with a concise summary \
                             covering the main topics and conclusions, in the transcript's language.";

pub struct Summarizer<C> {
    client: C,
    model: String,
    max_tokens: u32,
    retry: RetryPolicy,
}

impl<C: MessageSender> Summarizer<C> {
    pub fn new(client: C, model: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            client,
            model: model.into(),
            max_tokens: 500,
            retry,
        }
    }

    pub async fn summarize(&self, transcript: &str) -> Result<String, LlmError> {
        let input = truncate_chars(transcript, MAX_INPUT_CHARS);
        let req = MessagesRequest::user(
            &self.model,
            self.max_tokens,
            format!("Summarize this transcript:\n\n{input}"),
        )
        .with_system(SYSTEM_PROMPT);

        let response = retry(
            &self.retry,
            || self.client.send_message(&req),
            LlmError::is_rate_limited,
        )
        .await
        .map_err(|e| e.into_inner())?;

        Ok(response.text().trim().to_string())
    }
}

/// The first `max` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MessagesResponse;
    use crate::llm::types::{ContentBlock, Usage};
    use std::sync::Mutex;

    /// Remembers the last prompt it was sent.
    struct Recorder {
        last_prompt: Mutex<Option<String>>,
    }

    impl MessageSender for Recorder {
        async fn send_message(&self, req: &MessagesRequest) -> Result<MessagesResponse, LlmError> {
            *self.last_prompt.lock().unwrap() = Some(req.messages[0].content.clone());
            Ok(MessagesResponse {
                id: "mock".into(),
                content: vec![ContentBlock {
                    content_type: "text".into(),
                    text: "  A short summary.\n".into(),
                }],
                model: "mock".into(),
                stop_reason: Some("end_turn".into()),
                usage: Usage {
                    input_tokens: 0,
                    output_tokens: 0,
                },
            })
        }
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[tokio::test]
    async fn long_transcripts_are_truncated_before_sending() {
        let summarizer = Summarizer::new(
            Recorder {
                last_prompt: Mutex::new(None),
            },
            "m",
            RetryPolicy::none(),
        );
        let transcript = "ab".repeat(MAX_INPUT_CHARS);

        let summary = summarizer.summarize(&transcript).await.unwrap();
        assert_eq!(summary, "A short summary.");

        let prompt = summarizer.client.last_prompt.lock().unwrap().clone().unwrap();
        let body = prompt.trim_start_matches("Summarize this transcript:\n\n");
        assert_eq!(body.chars().count(), MAX_INPUT_CHARS);
    }
}
