//! AgroAdvisor - Retrieval-Augmented Farming Advice
//!
//! Turns a corpus of regional agronomy documents into grounded, cited
//! answers for farmer questions, with situational signals (weather, mandi
//! prices) injected into the prompt and a safety layer over hazardous
//! practices.
//!
//! # Pipeline
//!
//! - **Corpus**: chunked documents with normalized metadata
//! - **Retrieval**: keyword or embedding base, freshness / authority wrappers
//! - **Prompt**: budget-aware assembly with citations and external signals
//! - **Orchestrator**: intent routing, signal fetch, generation, safety

pub mod config;
pub mod corpus;
pub mod embedding;
pub mod errors;
pub mod generation;
pub mod orchestrator;
pub mod prompt;
pub mod retrieval;
pub mod signals;
pub mod vectorstore;

// Re-export commonly used types
pub use errors::{AdvisorError, GenerationErrorKind, Result};
pub use orchestrator::{OrchestratorResult, QueryOptions, QueryOrchestrator};
pub use retrieval::{build_retriever, RetrievalConfig, Retriever, SharedCorpus};
