//! Query orchestration
//!
//! Routes a farmer question through intent classification, situational
//! signal fetch, retrieval, prompt assembly, generation, and safety
//! interception. Retrieval and signal-fetch failures degrade the answer
//! instead of failing the request; generation failures propagate.

pub mod intent;
pub mod safety;

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::corpus::Chunk;
use crate::errors::Result;
use crate::generation::{FragmentStream, GenerationAdapter, GenerationParams, DEFAULT_MAX_TOKENS};
use crate::prompt::{
    BuiltPrompt, Citation, ExternalSignals, PromptBudget, PromptBuilder,
    DEFAULT_MAX_CONTEXT_CHARS,
};
use crate::retrieval::Retriever;
use crate::signals::{MarketPriceProvider, WeatherProvider};

pub use intent::{classify_intent, Intent};
pub use safety::{is_unsafe, SAFETY_WARNING};

/// Process-wide orchestrator defaults; per-call values in [`QueryOptions`]
/// take precedence.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub default_k: usize,
    pub max_context_chars: usize,
    pub max_generate_tokens: usize,
    pub temperature: f32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_k: 4,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
            max_generate_tokens: DEFAULT_MAX_TOKENS,
            temperature: 0.2,
        }
    }
}

/// Per-request knobs
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Language tag embedded in the prompt; empty means "auto"
    pub language: String,
    /// Metadata filters forwarded to retrieval; `crop` and `region` also
    /// gate signal fetching
    pub filters: HashMap<String, String>,
    pub k: Option<usize>,
    pub max_context_tokens: Option<usize>,
    pub max_generate_tokens: Option<usize>,
    /// Caller-supplied signals; pipeline-fetched signals win on key collision
    pub external_signals: ExternalSignals,
}

/// Completed answer with provenance
#[derive(Debug, Clone)]
pub struct OrchestratorResult {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub prompt: String,
    pub language: String,
    pub tokens_prompt: Option<usize>,
    pub tokens_output: Option<usize>,
}

/// End-to-end advice pipeline over injected stage implementations
pub struct QueryOrchestrator {
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn GenerationAdapter>,
    weather: Option<Arc<dyn WeatherProvider>>,
    mandi: Option<Arc<dyn MarketPriceProvider>>,
    config: OrchestratorConfig,
}

impl QueryOrchestrator {
    pub fn new(retriever: Arc<dyn Retriever>, generator: Arc<dyn GenerationAdapter>) -> Self {
        Self {
            retriever,
            generator,
            weather: None,
            mandi: None,
            config: OrchestratorConfig::default(),
        }
    }

    pub fn with_weather(mut self, provider: Arc<dyn WeatherProvider>) -> Self {
        self.weather = Some(provider);
        self
    }

    pub fn with_mandi(mut self, provider: Arc<dyn MarketPriceProvider>) -> Self {
        self.mandi = Some(provider);
        self
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Run the full pipeline and return the complete answer.
    pub async fn run(&self, question: &str, opts: &QueryOptions) -> Result<OrchestratorResult> {
        let trace_id = Uuid::new_v4();
        info!(%trace_id, question_len = question.len(), "query received");

        let (built, params, language) = self.prepare(question, opts, trace_id).await;
        let output = self.generator.generate(&built.prompt, &params).await?;

        let answer = if is_unsafe(question) {
            warn!(%trace_id, "hazardous practice detected, prefixing warning");
            format!("{}\n{}", SAFETY_WARNING, output.text)
        } else {
            output.text
        };

        info!(%trace_id, citations = built.citations.len(), "query answered");
        Ok(OrchestratorResult {
            answer,
            citations: built.citations,
            prompt: built.prompt,
            language,
            tokens_prompt: Some(output.tokens_prompt),
            tokens_output: Some(output.tokens_output),
        })
    }

    /// Run the pipeline up to generation and return a lazy fragment stream.
    ///
    /// For hazardous questions the warning is yielded as the first fragment
    /// before any generated text. Dropping the stream abandons the rest;
    /// nothing is cancelled upstream.
    pub async fn run_stream(&self, question: &str, opts: &QueryOptions) -> Result<FragmentStream> {
        let trace_id = Uuid::new_v4();
        info!(%trace_id, question_len = question.len(), "streaming query received");

        let (built, params, _language) = self.prepare(question, opts, trace_id).await;
        let fragments = self.generator.stream_generate(&built.prompt, &params).await?;

        if is_unsafe(question) {
            warn!(%trace_id, "hazardous practice detected, prefixing warning");
            let warning = stream::once(async { Ok(format!("{}\n", SAFETY_WARNING)) });
            Ok(warning.chain(fragments).boxed())
        } else {
            Ok(fragments)
        }
    }

    /// Shared pre-generation stages: intent, signals, retrieval, prompt.
    async fn prepare(
        &self,
        question: &str,
        opts: &QueryOptions,
        trace_id: Uuid,
    ) -> (BuiltPrompt, GenerationParams, String) {
        let intent = classify_intent(question);
        debug!(%trace_id, ?intent, "intent classified");

        let signals = self.gather_signals(intent, opts, trace_id).await;

        let k = opts.k.unwrap_or(self.config.default_k);
        let chunks: Vec<Chunk> = match self.retriever.retrieve(question, &opts.filters, k).await {
            Ok(results) => results.into_iter().map(|r| r.chunk).collect(),
            Err(err) => {
                warn!(%trace_id, error = %err, "retrieval failed, continuing without context");
                Vec::new()
            }
        };
        debug!(%trace_id, chunks = chunks.len(), "context retrieved");

        let language = if opts.language.is_empty() {
            "auto".to_string()
        } else {
            opts.language.clone()
        };
        let budget = PromptBudget {
            max_context_chars: self.config.max_context_chars,
            max_context_tokens: opts.max_context_tokens,
        };
        let signals_ref = if signals.is_empty() { None } else { Some(&signals) };
        let built = PromptBuilder::new(&language).build(question, &chunks, &budget, signals_ref);

        let params = GenerationParams {
            max_tokens: opts
                .max_generate_tokens
                .unwrap_or(self.config.max_generate_tokens),
            temperature: self.config.temperature,
            stop: Vec::new(),
        };
        (built, params, language)
    }

    /// Merge caller-supplied signals with intent-driven fetches. Fetched
    /// values overwrite caller values on key collision; fetch failures and
    /// empty results leave the map untouched.
    async fn gather_signals(
        &self,
        intent: Intent,
        opts: &QueryOptions,
        trace_id: Uuid,
    ) -> ExternalSignals {
        let mut signals = opts.external_signals.clone();

        match intent {
            Intent::MandiPrices => {
                let crop = opts.filters.get("crop");
                let region = opts.filters.get("region");
                if let (Some(mandi), Some(crop), Some(region)) = (&self.mandi, crop, region) {
                    match mandi.latest_prices(crop, region).await {
                        Ok(quotes) if !quotes.is_empty() => match serde_json::to_value(&quotes) {
                            Ok(value) => {
                                signals.insert("mandi_prices".to_string(), value);
                            }
                            Err(err) => {
                                warn!(%trace_id, error = %err, "mandi quotes not serializable")
                            }
                        },
                        Ok(_) => debug!(%trace_id, "no mandi quotes for crop/region"),
                        Err(err) => warn!(%trace_id, error = %err, "mandi fetch failed"),
                    }
                }
            }
            Intent::WeatherAdvice | Intent::GeneralAgri => {
                if let (Some(weather), Some(region)) = (&self.weather, opts.filters.get("region")) {
                    match weather.current_and_forecast(&json!({ "region": region })).await {
                        Ok(snapshot) => {
                            signals.insert("weather".to_string(), snapshot);
                        }
                        Err(err) => warn!(%trace_id, error = %err, "weather fetch failed"),
                    }
                }
            }
        }
        signals
    }
}
