//! Destinations for guardrail events

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::model::GuardrailEvent;

/// Receives every guardrail event
///
/// Fire-and-forget: implementations must not block the caller for long and must
/// swallow their own failures.
pub trait EventSink: Send + Sync {
    fn record(&self, event: &GuardrailEvent);
}

/// Logs events through `tracing` and keeps per-rule counters
#[derive(Default)]
pub struct TracingEventSink {
    counters: Mutex<BTreeMap<String, u64>>,
}

impl TracingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Event counts keyed by `stage/rule`
    pub fn counters(&self) -> BTreeMap<String, u64> {
        match self.counters.lock() {
            Ok(counters) => counters.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EventSink for TracingEventSink {
    fn record(&self, event: &GuardrailEvent) {
        if event.is_blocking() {
            tracing::warn!(
                component = "guardrails",
                stage = event.stage.as_str(),
                rule = event.rule.as_str(),
                severity = event.severity.as_str(),
                endpoint = event.endpoint.as_deref().unwrap_or("unknown"),
                original_sample = %event.original_text_sample,
                sanitized_sample = %event.sanitized_text_sample,
                "Guardrail blocking event: {}",
                event.message
            );
        } else {
            tracing::info!(
                component = "guardrails",
                stage = event.stage.as_str(),
                rule = event.rule.as_str(),
                severity = event.severity.as_str(),
                endpoint = event.endpoint.as_deref().unwrap_or("unknown"),
                "Guardrail event: {}",
                event.message
            );
        }

        let key = format!("{}/{}", event.stage.as_str(), event.rule.as_str());
        let mut counters = match self.counters.lock() {
            Ok(counters) => counters,
            Err(poisoned) => poisoned.into_inner(),
        };
        *counters.entry(key).or_default() += 1;
    }
}
