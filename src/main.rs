//! AgroAdvisor - Main CLI Entry Point

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use tracing_subscriber::EnvFilter;

use agroadvisor::config::Config;
use agroadvisor::corpus::{ingest_text, CorpusStore, IngestAttributes, IngestParams};
use agroadvisor::embedding::{Embeddings, HashedEmbeddings};
use agroadvisor::generation::client::RemoteGenerationClient;
use agroadvisor::generation::{GenerationAdapter, StubAdapter};
use agroadvisor::orchestrator::{OrchestratorConfig, QueryOptions, QueryOrchestrator};
use agroadvisor::retrieval::embedding::index_corpus;
use agroadvisor::retrieval::{build_retriever, RetrievalProvider, SharedCorpus};
use agroadvisor::signals::{StaticMandiClient, StaticWeatherClient};
use agroadvisor::vectorstore::remote::{vector_store_from_config, HttpSearchClient, SearchClient};
use agroadvisor::vectorstore::VectorProvider;

/// AgroAdvisor - Grounded farming advice from your own document corpus
#[derive(Parser, Debug)]
#[command(name = "agroadvisor")]
#[command(version = "0.1.0")]
#[command(about = "Ask farming questions against a local advisory corpus", long_about = None)]
struct Args {
    /// Plain-text advisory documents to ingest before answering
    #[arg(short, long, value_name = "FILE")]
    ingest: Vec<PathBuf>,

    /// Region tag applied to ingested documents and used as a filter
    #[arg(long)]
    region: Option<String>,

    /// Crop tag applied to ingested documents and used as a filter
    #[arg(long)]
    crop: Option<String>,

    /// Configuration file path (defaults to ~/.agroadvisor/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer a question in one shot
    Ask {
        /// The farmer question
        question: String,
    },

    /// Answer a question, printing fragments as they arrive
    Stream {
        /// The farmer question
        question: String,
    },

    /// Display current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    if let Commands::Config = args.command {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let corpus = load_corpus(&args)?;
    let orchestrator = build_orchestrator(&config, corpus).await?;

    let mut filters = HashMap::new();
    if let Some(region) = &args.region {
        filters.insert("region".to_string(), region.to_lowercase());
    }
    if let Some(crop) = &args.crop {
        filters.insert("crop".to_string(), crop.to_lowercase());
    }
    let opts = QueryOptions {
        language: config.prompt.language.clone(),
        filters,
        ..QueryOptions::default()
    };

    match &args.command {
        Commands::Ask { question } => {
            let result = orchestrator.run(question, &opts).await?;
            println!("{}", result.answer);
            if !result.citations.is_empty() {
                println!("\nSources:");
                for citation in &result.citations {
                    println!(
                        "  [{}#{}] {}",
                        citation.doc_id, citation.chunk_index, citation.source_url
                    );
                }
            }
        }
        Commands::Stream { question } => {
            let mut stream = orchestrator.run_stream(question, &opts).await?;
            while let Some(fragment) = stream.next().await {
                print!("{}", fragment?);
            }
            println!();
        }
        Commands::Config => unreachable!(),
    }

    Ok(())
}

fn load_corpus(args: &Args) -> Result<SharedCorpus> {
    let mut store = CorpusStore::new();
    for path in &args.ingest {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let params = IngestParams {
            attrs: IngestAttributes {
                region: args.region.clone(),
                crop: args.crop.clone(),
                source_url: Some(format!("file://{}", path.display())),
                ..IngestAttributes::default()
            },
            ..IngestParams::default()
        };
        let (doc, chunks) = ingest_text(&mut store, &text, &params)?;
        tracing::info!(doc_id = %doc.id, chunks = chunks.len(), file = %path.display(), "ingested");
    }
    Ok(Arc::new(RwLock::new(store)))
}

async fn build_orchestrator(config: &Config, corpus: SharedCorpus) -> Result<QueryOrchestrator> {
    let embeddings: Arc<dyn Embeddings> =
        Arc::new(HashedEmbeddings::new(config.embedding.dim, config.embedding.seed));

    let search_client: Option<Arc<dyn SearchClient>> = match &config.vector.endpoint {
        Some(endpoint) => Some(Arc::new(HttpSearchClient::new(endpoint)?)),
        None => None,
    };
    let vector_store = vector_store_from_config(
        config.vector.provider,
        search_client,
        &config.vector.index,
        config.embedding.dim,
    )?;

    // The embedding retriever searches the vector store, so the corpus must
    // be indexed up front.
    if config.retrieval.provider == RetrievalProvider::Embedding
        && config.vector.provider == VectorProvider::Memory
    {
        let indexed = index_corpus(&corpus, embeddings.as_ref(), vector_store.as_ref()).await?;
        tracing::info!(indexed, "corpus indexed into vector store");
    }

    let retriever = build_retriever(
        &config.retrieval,
        corpus,
        Arc::clone(&embeddings),
        Arc::clone(&vector_store),
    );

    let generator: Arc<dyn GenerationAdapter> = match &config.generation.endpoint {
        Some(endpoint) => Arc::new(RemoteGenerationClient::new(endpoint, &config.generation.model)?),
        None => match config.generation.simulate_failure {
            Some(kind) => Arc::new(StubAdapter::failing_with(kind)),
            None => Arc::new(StubAdapter::new(&config.generation.model)),
        },
    };

    Ok(QueryOrchestrator::new(retriever, generator)
        .with_weather(Arc::new(StaticWeatherClient::new()))
        .with_mandi(Arc::new(StaticMandiClient::new()))
        .with_config(OrchestratorConfig {
            default_k: config.retrieval.default_k,
            max_context_chars: config.prompt.max_context_chars,
            max_generate_tokens: config.generation.max_tokens,
            temperature: config.generation.temperature,
        }))
}
