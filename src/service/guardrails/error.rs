//! Error types for guardrail checks

use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GuardrailError {
    #[error("Guardrails accept UTF-8 text only: {0}")]
    InvalidInputKind(#[from] std::str::Utf8Error),
}
