//! Generation backends
//!
//! The pipeline talks to any backend through [`GenerationAdapter`]: one
//! synchronous-style `generate` call and one pull-based `stream_generate`
//! yielding non-empty text fragments. Adapter failures are never caught
//! inside the pipeline.

pub mod client;

use async_trait::async_trait;
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::errors::{AdvisorError, GenerationErrorKind, Result};

pub use client::RemoteGenerationClient;

/// Default cap on generated tokens
pub const DEFAULT_MAX_TOKENS: usize = 256;

/// Lazy sequence of generated text fragments. Dropping the stream simply
/// leaves the rest unconsumed; no cancellation is sent upstream.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Sampling and budget parameters for one generation call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationParams {
    pub max_tokens: usize,
    pub temperature: f32,
    /// Ordered stop sequences; output truncates immediately before the
    /// first match found in the generated text.
    pub stop: Vec<String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: 0.2,
            stop: Vec::new(),
        }
    }
}

/// One completed generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub text: String,
    pub tokens_prompt: usize,
    pub tokens_output: usize,
    pub model: String,
}

/// Generation backend contract
#[async_trait]
pub trait GenerationAdapter: Send + Sync {
    /// Generate a full answer for `prompt`
    async fn generate(&self, prompt: &str, params: &GenerationParams)
        -> Result<GenerationOutput>;

    /// Generate lazily, yielding non-empty fragments as they arrive
    async fn stream_generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<FragmentStream>;
}

/// Truncate `text` immediately before the earliest stop-sequence match.
pub(crate) fn apply_stop(text: &str, stop: &[String]) -> String {
    let cut = stop
        .iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| text.find(s.as_str()))
        .min();
    match cut {
        Some(idx) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

fn word_count_tokens(text: &str) -> usize {
    // Roughly one token per 0.75 words.
    let words = text.split_whitespace().count().max(1);
    (words as f64 / 0.75) as usize
}

fn cap_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => text[..byte].to_string(),
        None => text.to_string(),
    }
}

/// Deterministic stub backend for tests and local development.
///
/// Echoes a prefix of the prompt (or a canned response), honors stop
/// sequences and the token cap, and can simulate tagged backend failures.
#[derive(Debug, Clone)]
pub struct StubAdapter {
    model: String,
    canned_response: Option<String>,
    simulate_failure: Option<GenerationErrorKind>,
}

impl StubAdapter {
    /// Stub that echoes the prompt prefix
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            canned_response: None,
            simulate_failure: None,
        }
    }

    /// Stub that always answers `response`
    pub fn with_response(response: &str) -> Self {
        Self {
            model: "stub-llm".to_string(),
            canned_response: Some(response.to_string()),
            simulate_failure: None,
        }
    }

    /// Fail every call with the given kind
    pub fn failing_with(kind: GenerationErrorKind) -> Self {
        Self {
            model: "stub-llm".to_string(),
            canned_response: None,
            simulate_failure: Some(kind),
        }
    }

    fn render(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        if let Some(kind) = self.simulate_failure {
            return Err(AdvisorError::generation(kind, "simulated backend failure"));
        }
        let text = match &self.canned_response {
            Some(canned) => canned.clone(),
            None => {
                let prefix = cap_chars(prompt, 120);
                let ellipsis = if prompt.chars().count() > 120 { "\u{2026}" } else { "" };
                format!("[stub:{}] {}{}", self.model, prefix, ellipsis)
            }
        };
        let text = apply_stop(&text, &params.stop);
        Ok(cap_chars(&text, params.max_tokens * 4))
    }
}

#[async_trait]
impl GenerationAdapter for StubAdapter {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<GenerationOutput> {
        let text = self.render(prompt, params)?;
        Ok(GenerationOutput {
            tokens_prompt: word_count_tokens(prompt),
            tokens_output: word_count_tokens(&text),
            model: self.model.clone(),
            text,
        })
    }

    async fn stream_generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<FragmentStream> {
        let text = self.render(prompt, params)?;
        // Split into up to four fragments to exercise consumers.
        let chars: Vec<char> = text.chars().collect();
        let step = (chars.len() / 4).max(1);
        let fragments: Vec<Result<String>> = chars
            .chunks(step)
            .map(|c| Ok(c.iter().collect::<String>()))
            .filter(|f: &Result<String>| f.as_ref().map(|s| !s.is_empty()).unwrap_or(true))
            .collect();
        Ok(Box::pin(stream::iter(fragments)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    async fn collect(mut s: FragmentStream) -> String {
        let mut out = String::new();
        while let Some(frag) = s.next().await {
            let frag = frag.unwrap();
            assert!(!frag.is_empty());
            out.push_str(&frag);
        }
        out
    }

    #[tokio::test]
    async fn test_stub_echoes_prompt_prefix() {
        let adapter = StubAdapter::new("granite-13b-chat");
        let out = adapter
            .generate("tomato irrigation advice", &GenerationParams::default())
            .await
            .unwrap();
        assert!(out.text.starts_with("[stub:granite-13b-chat]"));
        assert_eq!(out.model, "granite-13b-chat");
        assert!(out.tokens_prompt >= 1);
    }

    #[tokio::test]
    async fn test_stop_sequences_truncate_output() {
        let adapter = StubAdapter::with_response("hello STOP there");
        let params = GenerationParams {
            stop: vec!["STOP".to_string()],
            ..Default::default()
        };
        let out = adapter.generate("ignored", &params).await.unwrap();
        assert_eq!(out.text, "hello ");
    }

    #[tokio::test]
    async fn test_streaming_reassembles_response() {
        let adapter = StubAdapter::with_response("abcdef");
        let stream = adapter
            .stream_generate("ignored", &GenerationParams::default())
            .await
            .unwrap();
        assert_eq!(collect(stream).await, "abcdef");
    }

    #[tokio::test]
    async fn test_stream_respects_stop_sequence() {
        let adapter = StubAdapter::new("stub");
        let params = GenerationParams {
            stop: vec!["STOP".to_string()],
            ..Default::default()
        };
        let stream = adapter.stream_generate("abc STOP def", &params).await.unwrap();
        let merged = collect(stream).await;
        assert!(!merged.contains("STOP"));
    }

    #[tokio::test]
    async fn test_simulated_quota_error() {
        let adapter = StubAdapter::failing_with(GenerationErrorKind::QuotaExceeded);
        let err = adapter
            .generate("x", &GenerationParams::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            AdvisorError::Generation {
                kind: GenerationErrorKind::QuotaExceeded,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_simulated_credit_error_in_stream() {
        let adapter = StubAdapter::failing_with(GenerationErrorKind::InsufficientCredit);
        let err = adapter
            .stream_generate("x", &GenerationParams::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(
            err,
            AdvisorError::Generation {
                kind: GenerationErrorKind::InsufficientCredit,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_max_tokens_caps_output_chars() {
        let adapter = StubAdapter::with_response(&"x".repeat(100));
        let params = GenerationParams {
            max_tokens: 10,
            ..Default::default()
        };
        let out = adapter.generate("ignored", &params).await.unwrap();
        assert_eq!(out.text.len(), 40);
    }

    #[test]
    fn test_apply_stop_earliest_match_wins() {
        let stops = vec!["B".to_string(), "A".to_string()];
        assert_eq!(apply_stop("xxAyyB", &stops), "xx");
        assert_eq!(apply_stop("no match", &stops), "no match");
    }
}
