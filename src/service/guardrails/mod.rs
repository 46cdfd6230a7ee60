//! Pattern-based guardrails for the RAG and chat flows
//!
//! - Input validation: PII redaction and prompt-injection heuristics
//! - Output moderation: dosage instructions and abusive language block the whole response
//! - Every rule match becomes a `GuardrailEvent` handed to the injected sink

use std::sync::Arc;

use chrono::Utc;

use crate::model::{
    GuardrailEvent, GuardrailOutcome, GuardrailRule, GuardrailStage, Severity, StageContext,
};

pub mod error;
pub mod rules;
pub mod sink;

pub use error::GuardrailError;
pub use rules::{REDACTION_PLACEHOLDER, SAFE_DOSAGE_MESSAGE, SAFE_TOXICITY_MESSAGE};
pub use sink::{EventSink, TracingEventSink};

use rules::{INPUT_RULES, OUTPUT_RULES, pattern_matches, redact_pii};

const INPUT_SAMPLE_CHARS: usize = 120;
const OUTPUT_SAMPLE_CHARS: usize = 200;

/// Stateless policy engine; all rules are static tables
#[derive(Clone)]
pub struct GuardrailsEngine {
    sink: Arc<dyn EventSink>,
}

impl GuardrailsEngine {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    /// Redact obvious PII and detect prompt-injection phrasing
    pub fn validate_input(&self, text: &str, ctx: &StageContext) -> GuardrailOutcome {
        let mut events = Vec::new();
        let mut sanitized = text.to_string();

        for rule in INPUT_RULES.iter() {
            let Some(re) = rule.regex.as_ref() else {
                continue;
            };
            if !re.is_match(&sanitized) {
                continue;
            }

            let before = sanitized.clone();
            if let Some(replacement) = rule.replacement {
                sanitized = re.replace_all(&sanitized, replacement).into_owned();
            }

            tracing::debug!(
                rule = rule.rule.as_str(),
                pattern = rule.pattern_name,
                "Input guardrail pattern matched"
            );

            events.push(self.event(
                GuardrailStage::Input,
                rule.rule,
                rule.severity,
                rule.message.to_string(),
                &before,
                &sanitized,
                INPUT_SAMPLE_CHARS,
                ctx,
            ));
        }

        self.emit(&events);
        GuardrailOutcome {
            text: sanitized,
            events,
        }
    }

    /// Moderate generated text for dosage instructions and toxicity
    ///
    /// The first matching rule in priority order replaces the entire response.
    /// Lower-priority rules that also match are still recorded.
    pub fn moderate_output(&self, text: &str, ctx: &StageContext) -> GuardrailOutcome {
        let matched: Vec<_> = OUTPUT_RULES
            .iter()
            .filter(|rule| pattern_matches(rule.regex, text))
            .collect();

        let Some(decisive) = matched.first() else {
            return GuardrailOutcome {
                text: text.to_string(),
                events: Vec::new(),
            };
        };

        let sanitized = decisive.substitution.to_string();
        let events: Vec<GuardrailEvent> = matched
            .iter()
            .enumerate()
            .map(|(i, rule)| {
                let message = if i == 0 {
                    rule.message.to_string()
                } else {
                    format!(
                        "{} Substitution already decided by higher-priority rule '{}'.",
                        rule.message, decisive.rule
                    )
                };
                self.event(
                    GuardrailStage::Output,
                    rule.rule,
                    rule.severity,
                    message,
                    text,
                    &sanitized,
                    OUTPUT_SAMPLE_CHARS,
                    ctx,
                )
            })
            .collect();

        self.emit(&events);
        GuardrailOutcome {
            text: sanitized,
            events,
        }
    }

    /// Validate input that arrived as raw bytes
    pub fn validate_raw_input(
        &self,
        raw: &[u8],
        ctx: &StageContext,
    ) -> Result<GuardrailOutcome, GuardrailError> {
        let text = std::str::from_utf8(raw)?;
        Ok(self.validate_input(text, ctx))
    }

    /// Moderate output that arrived as raw bytes
    pub fn moderate_raw_output(
        &self,
        raw: &[u8],
        ctx: &StageContext,
    ) -> Result<GuardrailOutcome, GuardrailError> {
        let text = std::str::from_utf8(raw)?;
        Ok(self.moderate_output(text, ctx))
    }

    #[allow(clippy::too_many_arguments)]
    fn event(
        &self,
        stage: GuardrailStage,
        rule: GuardrailRule,
        severity: Severity,
        message: String,
        original: &str,
        sanitized: &str,
        sample_chars: usize,
        ctx: &StageContext,
    ) -> GuardrailEvent {
        GuardrailEvent {
            stage,
            rule,
            severity,
            message,
            original_text_sample: sample(original, sample_chars),
            sanitized_text_sample: sample(sanitized, sample_chars),
            endpoint: ctx.endpoint.clone(),
            occurred_at: Utc::now(),
        }
    }

    fn emit(&self, events: &[GuardrailEvent]) {
        for event in events {
            self.sink.record(event);
        }
    }
}

/// PII-redacted prefix of `text`, at most `max_chars` characters
fn sample(text: &str, max_chars: usize) -> String {
    redact_pii(text).chars().take(max_chars).collect()
}
