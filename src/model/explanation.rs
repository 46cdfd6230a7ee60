use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::model::GuardrailEvent;

/// A span of reference text returned by the retriever
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct RetrievedChunk {
    pub text: String,
    pub source: String,
    /// Higher is more relevant
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExplanationResult {
    pub text: String,
    /// Number of retrieved chunks embedded in the prompt
    pub rag_sources: usize,
    /// True when generation failed and a canned explanation was substituted
    pub fallback: bool,
    pub guardrail_events: Vec<GuardrailEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}
