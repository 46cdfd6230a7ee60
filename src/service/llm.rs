//! Completion service boundary and the OpenAI-backed implementation
//!
//! The pipeline only sees `CompletionService`; `LlmClient` adapts the shared
//! rig OpenAI client to it.

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::openai;

/// Environment variable for the explanation model
const ENV_EXPLAIN_MODEL: &str = "EXPLAIN_MODEL";

const DEFAULT_MODEL: &str = openai::GPT_4O_MINI;

/// Sampling parameters for one completion call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionParams {
    pub max_tokens: u64,
    pub temperature: f64,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            max_tokens: 400,
            temperature: 0.3,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CompletionError {
    #[error("Completion timed out after {0} ms")]
    Timeout(u128),

    #[error("Completion failed: {0}")]
    Failed(String),
}

/// Black-box text completion
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, prompt: &str, params: &CompletionParams)
    -> Result<String, CompletionError>;
}

/// Shared LLM client wrapper
#[derive(Clone)]
pub struct LlmClient {
    client: openai::Client,
    model: String,
}

impl LlmClient {
    /// Create a new LLM client with the provided API key
    ///
    /// Uses EXPLAIN_MODEL when set, gpt-4o-mini otherwise.
    pub fn new(api_key: &str) -> Result<Self, String> {
        let client = openai::Client::new(api_key);

        let model =
            std::env::var(ENV_EXPLAIN_MODEL).unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        tracing::info!(model = %model, "LLM client initialized");

        Ok(Self { client, model })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionService for LlmClient {
    async fn complete(
        &self,
        prompt: &str,
        params: &CompletionParams,
    ) -> Result<String, CompletionError> {
        let start_time = std::time::Instant::now();

        tracing::debug!(
            model = %self.model,
            prompt_length = prompt.len(),
            max_tokens = params.max_tokens,
            "Initiating OpenAI API call for completion"
        );

        let agent = self
            .client
            .agent(&self.model)
            .temperature(params.temperature)
            .max_tokens(params.max_tokens)
            .build();

        match agent.prompt(prompt).await {
            Ok(text) => {
                tracing::info!(
                    model = %self.model,
                    elapsed_ms = start_time.elapsed().as_millis(),
                    response_length = text.len(),
                    "OpenAI API call completed successfully"
                );
                Ok(text)
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model,
                    elapsed_ms = start_time.elapsed().as_millis(),
                    error = %e,
                    "OpenAI API call failed"
                );
                Err(CompletionError::Failed(e.to_string()))
            }
        }
    }
}
