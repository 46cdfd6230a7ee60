//! Application state and service initialization
//!
//! This module centralizes all service initialization and dependency injection,
//! so handlers only ever see fully wired collaborators.

use std::sync::Arc;

use crate::model::Config;
use crate::retriever::{CorpusIndex, SimilarityIndex};
use crate::service::guardrails::{GuardrailsEngine, TracingEventSink};
use crate::service::{
    ChunkFilter, ContextRetriever, ExplanationGenerator, LlmClient, SessionHandler, SessionStore,
};

/// Application state containing all services and shared resources
pub struct AppState {
    /// Explanation pipeline shared by both endpoints
    pub generator: Arc<ExplanationGenerator>,
    pub session_handler: SessionHandler,
    pub sessions: SessionStore,
    /// Reference corpus, kept for readiness reporting
    pub index: Arc<dyn SimilarityIndex>,
    /// Guardrail event sink, kept for readiness counters
    pub sink: Arc<TracingEventSink>,
}

impl AppState {
    /// Initialize all services and build application state
    ///
    /// This performs:
    /// 1. Reference corpus loading (a missing file starts an empty index)
    /// 2. LLM client initialization (requires OPENAI_API_KEY)
    /// 3. Pipeline construction from the `pipeline` config section
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let pipeline = &config.pipeline;

        let index: Arc<dyn SimilarityIndex> = Arc::new(
            CorpusIndex::load(&pipeline.corpus_path)
                .map_err(|e| AppError::CorpusLoad(e.to_string()))?,
        );

        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| AppError::MissingConfig("OPENAI_API_KEY"))?;

        let llm_client = LlmClient::new(&api_key)
            .map_err(|_| AppError::InvalidConfig("Invalid OPENAI_API_KEY"))?;

        let model = llm_client.model().to_string();
        let sink = Arc::new(TracingEventSink::new());

        let retriever = ContextRetriever::new(
            Arc::clone(&index),
            pipeline.search_timeout(),
            ChunkFilter {
                min_chars: pipeline.min_chunk_chars,
            },
        );

        let generator = Arc::new(ExplanationGenerator::new(
            retriever,
            Arc::new(llm_client),
            GuardrailsEngine::new(sink.clone()),
            pipeline,
        ));

        tracing::info!(
            model = %model,
            corpus_chunks = index.len_hint().unwrap_or(0),
            explanation_top_k = pipeline.explanation_top_k,
            chat_top_k = pipeline.chat_top_k,
            history_window = pipeline.history_window,
            "Explanation pipeline initialized"
        );

        Ok(Self {
            session_handler: SessionHandler::new(Arc::clone(&generator)),
            sessions: SessionStore::new(pipeline.history_window, pipeline.max_sessions),
            generator,
            index,
            sink,
        })
    }
}

/// Application-level errors
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AppError {
    /// Missing required configuration
    #[error("Missing required configuration: {0}")]
    MissingConfig(&'static str),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// Reference corpus could not be read or parsed
    #[error("Failed to load reference corpus: {0}")]
    CorpusLoad(String),
}
