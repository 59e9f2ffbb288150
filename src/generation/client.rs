//! HTTP generation client
//!
//! Streams NDJSON fragments from a remote generation service. Quota and
//! credit rejections map onto tagged error kinds so callers never parse
//! error strings.

use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::{AdvisorError, GenerationErrorKind, Result};
use crate::generation::{
    apply_stop, FragmentStream, GenerationAdapter, GenerationOutput, GenerationParams,
};

/// Request timeout (30 seconds)
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Wire request for both generation endpoints
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: usize,
    temperature: f32,
    stop: &'a [String],
    stream: bool,
}

/// Full response body for non-streaming generation
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    text: String,
    #[serde(default)]
    tokens_prompt: usize,
    #[serde(default)]
    tokens_output: usize,
    #[serde(default)]
    model: String,
}

/// One NDJSON streaming fragment
#[derive(Debug, Deserialize)]
struct StreamFragment {
    #[serde(default)]
    text: String,
    #[serde(default)]
    done: bool,
}

/// Generation adapter speaking a simple NDJSON-over-HTTP protocol
#[derive(Debug, Clone)]
pub struct RemoteGenerationClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl RemoteGenerationClient {
    /// Create a client for the given backend base URL and model
    pub fn new(base_url: &str, model: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    async fn send(
        &self,
        prompt: &str,
        params: &GenerationParams,
        streaming: bool,
    ) -> Result<reqwest::Response> {
        let url = format!("{}/v1/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            stop: &params.stop,
            stream: streaming,
        };
        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let kind = match status {
            StatusCode::TOO_MANY_REQUESTS => GenerationErrorKind::QuotaExceeded,
            StatusCode::PAYMENT_REQUIRED => GenerationErrorKind::InsufficientCredit,
            _ => GenerationErrorKind::Backend,
        };
        Err(AdvisorError::generation(
            kind,
            format!("HTTP {}: {}", status, body),
        ))
    }
}

#[async_trait]
impl GenerationAdapter for RemoteGenerationClient {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<GenerationOutput> {
        let response = self.send(prompt, params, false).await?;
        let body: GenerateResponse = response.json().await?;
        // The backend is told about stop sequences but the contract is
        // enforced here as well.
        let text = apply_stop(&body.text, &params.stop);
        Ok(GenerationOutput {
            text,
            tokens_prompt: body.tokens_prompt,
            tokens_output: body.tokens_output,
            model: if body.model.is_empty() {
                self.model.clone()
            } else {
                body.model
            },
        })
    }

    async fn stream_generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<FragmentStream> {
        let response = self.send(prompt, params, true).await?;
        let bytes = response.bytes_stream().boxed();
        let state = StreamState::new(bytes, params.stop.clone());
        let fragments = stream::unfold(state, |mut state| async move {
            loop {
                if let Some(item) = state.pending.pop() {
                    return Some((item, state));
                }
                if state.finished {
                    return None;
                }
                match state.bytes.next().await {
                    Some(Ok(chunk)) => state.feed(&chunk),
                    Some(Err(err)) => {
                        state.finished = true;
                        state
                            .pending
                            .push(Err(AdvisorError::Streaming(err.to_string())));
                    }
                    None => state.finished = true,
                }
            }
        });
        Ok(Box::pin(fragments))
    }
}

type ByteStream = BoxStream<'static, std::result::Result<Bytes, reqwest::Error>>;

/// Line-buffering NDJSON decoder with cross-fragment stop matching
struct StreamState {
    bytes: ByteStream,
    buffer: String,
    emitted: String,
    stop: Vec<String>,
    /// FIFO of decoded fragments, stored reversed so pop() yields in order
    pending: Vec<Result<String>>,
    finished: bool,
}

impl StreamState {
    fn new(bytes: ByteStream, stop: Vec<String>) -> Self {
        Self {
            bytes,
            buffer: String::new(),
            emitted: String::new(),
            stop,
            pending: Vec::new(),
            finished: false,
        }
    }

    fn feed(&mut self, chunk: &[u8]) {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));
        let mut out = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<StreamFragment>(line) {
                Ok(fragment) => {
                    if !fragment.text.is_empty() && !self.finished {
                        if let Some(piece) = self.accept(&fragment.text) {
                            if !piece.is_empty() {
                                out.push(Ok(piece));
                            }
                        }
                    }
                    if fragment.done {
                        self.finished = true;
                    }
                }
                Err(err) => {
                    self.finished = true;
                    out.push(Err(AdvisorError::Streaming(format!(
                        "malformed stream fragment: {err}"
                    ))));
                    break;
                }
            }
        }
        out.reverse();
        self.pending = out;
    }

    /// Append `text` unless a stop sequence completes; in that case emit
    /// only the part before the match and end the stream.
    fn accept(&mut self, text: &str) -> Option<String> {
        if self.stop.is_empty() {
            self.emitted.push_str(text);
            return Some(text.to_string());
        }
        let candidate = format!("{}{}", self.emitted, text);
        let cut = self
            .stop
            .iter()
            .filter(|s| !s.is_empty())
            .filter_map(|s| candidate.find(s.as_str()))
            .min();
        match cut {
            Some(idx) => {
                self.finished = true;
                let piece = candidate[..idx]
                    .strip_prefix(self.emitted.as_str())
                    .unwrap_or("")
                    .to_string();
                self.emitted = candidate[..idx].to_string();
                Some(piece)
            }
            None => {
                self.emitted = candidate;
                Some(text.to_string())
            }
        }
    }
}
