//! Budget-aware prompt assembly
//!
//! Turns a question, a ranked chunk list and a map of external signals into
//! one bounded prompt string plus the citations for every chunk that made it
//! in. Chunks are consumed in the order given; the builder never re-ranks.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

use crate::corpus::Chunk;

/// Default character budget for retrieved context
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 2000;

/// Signal lines longer than this are cut with an ellipsis
const MAX_SIGNAL_LINE_CHARS: usize = 400;

const DEFAULT_SYSTEM_PREAMBLE: &str =
    "You are a smart farming assistant. Provide actionable, safe, and concise advice.";

/// External situational signals, serialized into the prompt one line per key.
/// Sorted key order keeps prompts reproducible.
pub type ExternalSignals = BTreeMap<String, JsonValue>;

/// Structured reference to a chunk included in the prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    pub doc_id: String,
    pub chunk_id: String,
    pub source_url: String,
    pub region: String,
    pub crop: String,
    pub chunk_index: String,
}

/// Assembled prompt with its citation list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    pub prompt: String,
    pub citations: Vec<Citation>,
}

/// Budgets for one build call
#[derive(Debug, Clone)]
pub struct PromptBudget {
    /// Hard character budget for the context block
    pub max_context_chars: usize,
    /// Optional token budget; once hit, assembly terminates
    pub max_context_tokens: Option<usize>,
}

impl Default for PromptBudget {
    fn default() -> Self {
        Self {
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
            max_context_tokens: None,
        }
    }
}

/// Crude token estimate, roughly four characters per token.
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() / 4).max(1)
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => &text[..byte],
        None => text,
    }
}

/// Prompt builder composing the question with retrieved chunks
pub struct PromptBuilder {
    system_preamble: String,
    language: String,
}

impl PromptBuilder {
    /// Create a builder answering in the given language tag
    pub fn new(language: &str) -> Self {
        Self {
            system_preamble: DEFAULT_SYSTEM_PREAMBLE.to_string(),
            language: language.to_string(),
        }
    }

    /// Override the system preamble line
    pub fn with_preamble(mut self, preamble: &str) -> Self {
        self.system_preamble = preamble.to_string();
        self
    }

    /// Assemble the prompt.
    ///
    /// Greedy inclusion in chunk order: an empty chunk is skipped; a chunk
    /// that would overflow the character budget ends assembly without being
    /// included; a chunk that would overflow the token budget is truncated
    /// to the remaining token allowance and, if anything is left of it,
    /// included before assembly ends. One citation is emitted per included
    /// chunk, with empty strings for absent metadata fields.
    pub fn build(
        &self,
        question: &str,
        chunks: &[Chunk],
        budget: &PromptBudget,
        external_signals: Option<&ExternalSignals>,
    ) -> BuiltPrompt {
        let mut context_parts: Vec<String> = Vec::new();
        let mut citations: Vec<Citation> = Vec::new();
        let mut used_chars = 0usize;
        let mut used_tokens = 0usize;

        for chunk in chunks {
            let mut part = chunk.text.trim().to_string();
            if part.is_empty() {
                continue;
            }
            let part_chars = part.chars().count();
            if used_chars + part_chars > budget.max_context_chars {
                break;
            }
            let mut budget_exhausted = false;
            if let Some(max_tokens) = budget.max_context_tokens {
                let tokens = estimate_tokens(&part);
                if used_tokens + tokens > max_tokens {
                    let remaining = max_tokens.saturating_sub(used_tokens);
                    let allowance = remaining * 4;
                    if allowance == 0 {
                        break;
                    }
                    part = truncate_chars(&part, allowance).trim_end().to_string();
                    if part.is_empty() {
                        break;
                    }
                    budget_exhausted = true;
                }
            }
            used_chars += part.chars().count();
            used_tokens += estimate_tokens(&part);
            context_parts.push(part);
            citations.push(Self::citation_for(chunk));
            if budget_exhausted {
                break;
            }
        }

        let context = context_parts.join("\n\n");
        let signals_block = external_signals
            .map(Self::serialize_signals)
            .unwrap_or_default();

        let mut prompt = format!(
            "[lang={}]\nSystem: {}\n\nContext:\n{}\n\n",
            self.language, self.system_preamble, context
        );
        if !signals_block.is_empty() {
            prompt.push_str(&format!("External Signals:\n{}\n\n", signals_block));
        }
        prompt.push_str(&format!(
            "User Question: {}\nAnswer in the specified language, cite sources by doc_id and chunk_index.",
            question
        ));

        BuiltPrompt { prompt, citations }
    }

    fn citation_for(chunk: &Chunk) -> Citation {
        let get = |key: &str| chunk.metadata.get(key).cloned().unwrap_or_default();
        Citation {
            doc_id: chunk.doc_id.clone(),
            chunk_id: chunk.id.clone(),
            source_url: get("source_url"),
            region: get("region"),
            crop: get("crop"),
            chunk_index: get("chunk_index"),
        }
    }

    fn serialize_signals(signals: &ExternalSignals) -> String {
        let mut lines = Vec::with_capacity(signals.len());
        for (key, value) in signals {
            let rendered = match value {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            };
            let mut line = format!("- {}: {}", key, rendered);
            if line.chars().count() > MAX_SIGNAL_LINE_CHARS {
                line = format!("{}\u{2026}", truncate_chars(&line, MAX_SIGNAL_LINE_CHARS));
            }
            lines.push(line);
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn make_chunk(text: &str, idx: usize) -> Chunk {
        let metadata: HashMap<String, String> = [
            ("chunk_index".to_string(), idx.to_string()),
            ("region".to_string(), "mh".to_string()),
            ("crop".to_string(), "tomato".to_string()),
        ]
        .into();
        Chunk {
            id: format!("c{idx}"),
            doc_id: "d1".to_string(),
            text: text.to_string(),
            metadata,
        }
    }

    fn context_of(prompt: &str) -> &str {
        let ctx = prompt.split("Context:\n").nth(1).unwrap();
        ctx.split("\n\n").next().unwrap()
    }

    #[test]
    fn test_prompt_structure() {
        let built = PromptBuilder::new("en").build(
            "Best irrigation?",
            &[make_chunk("Mulch helps.", 0)],
            &PromptBudget::default(),
            None,
        );
        assert!(built.prompt.starts_with("[lang=en]\nSystem: "));
        assert!(built.prompt.contains("Context:\nMulch helps."));
        assert!(built.prompt.contains("User Question: Best irrigation?"));
        assert!(built.prompt.ends_with("cite sources by doc_id and chunk_index."));
        assert_eq!(built.citations.len(), 1);
        assert_eq!(built.citations[0].chunk_index, "0");
    }

    #[test]
    fn test_token_budget_truncates_context() {
        let text = "A".repeat(1000);
        let built = PromptBuilder::new("en").build(
            "Q",
            &[make_chunk(&text, 0)],
            &PromptBudget {
                max_context_chars: 5000,
                max_context_tokens: Some(100),
            },
            None,
        );
        assert!(context_of(&built.prompt).len() <= 420);
        assert_eq!(built.citations.len(), 1);
    }

    #[test]
    fn test_token_budget_terminates_assembly() {
        let chunks = vec![
            make_chunk(&"A".repeat(500), 0),
            make_chunk("never included", 1),
        ];
        let built = PromptBuilder::new("en").build(
            "Q",
            &chunks,
            &PromptBudget {
                max_context_chars: 5000,
                max_context_tokens: Some(100),
            },
            None,
        );
        assert_eq!(built.citations.len(), 1);
        assert!(!built.prompt.contains("never included"));
    }

    #[test]
    fn test_char_budget_drops_offending_chunk() {
        let chunks = vec![make_chunk(&"A".repeat(90), 0), make_chunk(&"B".repeat(20), 1)];
        let built = PromptBuilder::new("en").build(
            "Q",
            &chunks,
            &PromptBudget {
                max_context_chars: 100,
                max_context_tokens: None,
            },
            None,
        );
        assert_eq!(built.citations.len(), 1);
        assert!(!built.prompt.contains('B'));
    }

    #[test]
    fn test_empty_chunks_skipped() {
        let chunks = vec![make_chunk("   ", 0), make_chunk("Advice.", 1)];
        let built =
            PromptBuilder::new("en").build("Q", &chunks, &PromptBudget::default(), None);
        assert_eq!(built.citations.len(), 1);
        assert_eq!(built.citations[0].chunk_index, "1");
    }

    #[test]
    fn test_external_signals_included_between_context_and_question() {
        let signals: ExternalSignals = [
            ("weather".to_string(), json!({"temp_c": 30.5})),
            ("prices".to_string(), json!([{"market": "Vashi", "price": 1800}])),
        ]
        .into();
        let built = PromptBuilder::new("en").build(
            "Q2",
            &[make_chunk("Advice snippet.", 0)],
            &PromptBudget::default(),
            Some(&signals),
        );
        assert!(built.prompt.contains("External Signals:\n"));
        assert!(built.prompt.contains("- weather: "));
        assert!(built.prompt.contains("- prices: "));
        let signals_at = built.prompt.find("External Signals:").unwrap();
        assert!(signals_at > built.prompt.find("Context:").unwrap());
        assert!(signals_at < built.prompt.find("User Question:").unwrap());
    }

    #[test]
    fn test_long_signal_line_truncated_with_ellipsis() {
        let signals: ExternalSignals =
            [("blob".to_string(), json!("x".repeat(600)))].into();
        let built = PromptBuilder::new("en").build(
            "Q",
            &[make_chunk("c", 0)],
            &PromptBudget::default(),
            Some(&signals),
        );
        let line = built
            .prompt
            .lines()
            .find(|l| l.starts_with("- blob:"))
            .unwrap();
        assert_eq!(line.chars().count(), 401);
        assert!(line.ends_with('\u{2026}'));
    }

    #[test]
    fn test_citation_defaults_for_absent_metadata() {
        let chunk = Chunk {
            id: "c9".to_string(),
            doc_id: "d9".to_string(),
            text: "bare".to_string(),
            metadata: HashMap::new(),
        };
        let built =
            PromptBuilder::new("hi").build("Q", &[chunk], &PromptBudget::default(), None);
        let cite = &built.citations[0];
        assert_eq!(cite.source_url, "");
        assert_eq!(cite.region, "");
        assert_eq!(cite.chunk_index, "");
    }
}
