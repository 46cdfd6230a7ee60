use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailStage {
    Input,
    Output,
}

impl GuardrailStage {
    pub fn as_str(self) -> &'static str {
        match self {
            GuardrailStage::Input => "input",
            GuardrailStage::Output => "output",
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Blocking,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Blocking => "blocking",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown guardrail severity: {0}")]
pub struct UnknownSeverity(pub String);

impl FromStr for Severity {
    type Err = UnknownSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Severity::Info),
            "warning" => Ok(Severity::Warning),
            "blocking" => Ok(Severity::Blocking),
            other => Err(UnknownSeverity(other.to_string())),
        }
    }
}

/// Identifier of the guardrail rule that fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailRule {
    PiiRedaction,
    PromptInjectionHeuristic,
    BlockMedicationDosage,
    ToxicityFilter,
}

impl GuardrailRule {
    pub fn as_str(self) -> &'static str {
        match self {
            GuardrailRule::PiiRedaction => "pii_redaction",
            GuardrailRule::PromptInjectionHeuristic => "prompt_injection_heuristic",
            GuardrailRule::BlockMedicationDosage => "block_medication_dosage",
            GuardrailRule::ToxicityFilter => "toxicity_filter",
        }
    }
}

impl fmt::Display for GuardrailRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Call-site information attached to every event raised during a check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageContext {
    pub endpoint: Option<String>,
}

impl StageContext {
    pub fn endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
        }
    }
}

// Structured record of one guardrail decision
// - samples are truncated and PII-redacted before they are stored here
// - consumed only by the event sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GuardrailEvent {
    pub stage: GuardrailStage,
    pub rule: GuardrailRule,
    pub severity: Severity,
    pub message: String,
    pub original_text_sample: String,
    pub sanitized_text_sample: String,
    pub endpoint: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl GuardrailEvent {
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Blocking
    }
}

/// Text after a guardrail pass together with the events it raised
#[derive(Debug, Clone, PartialEq)]
pub struct GuardrailOutcome {
    pub text: String,
    pub events: Vec<GuardrailEvent>,
}

impl GuardrailOutcome {
    pub fn blocked(&self) -> bool {
        self.events.iter().any(GuardrailEvent::is_blocking)
    }
}
