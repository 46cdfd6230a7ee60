//! Retrieval-augmented explanation of ECG diagnoses
//!
//! `generate` never fails: any completion problem degrades to a canned,
//! per-category explanation flagged with `fallback = true`.

use std::sync::Arc;
use std::time::Duration;

use crate::model::{
    ConversationTurn, Diagnosis, ExplanationResult, GuardrailEvent, PatientContext,
    PipelineConfig, StageContext,
};
use crate::service::context::ContextRetriever;
use crate::service::guardrails::GuardrailsEngine;
use crate::service::llm::{CompletionError, CompletionParams, CompletionService};
use crate::service::query::{QueryBuilder, SearchTermTable};

mod fallback;
mod prompts;

pub use fallback::FallbackTemplates;

pub const EXPLANATION_ENDPOINT: &str = "/v1/explanations";
pub const CHAT_ENDPOINT: &str = "/v1/chat";

/// Result of one chat turn before it is written to the session
#[derive(Debug, Clone)]
pub struct ChatReply {
    /// The user's message after input guardrails; this is what gets stored
    pub question: String,
    /// `None` when the completion failed
    pub text: Option<String>,
    pub guardrail_events: Vec<GuardrailEvent>,
}

pub struct ExplanationGenerator {
    queries: QueryBuilder,
    retriever: ContextRetriever,
    completion: Arc<dyn CompletionService>,
    guardrails: GuardrailsEngine,
    templates: FallbackTemplates,
    params: CompletionParams,
    completion_timeout: Duration,
    explanation_top_k: usize,
    chat_top_k: usize,
}

impl ExplanationGenerator {
    pub fn new(
        retriever: ContextRetriever,
        completion: Arc<dyn CompletionService>,
        guardrails: GuardrailsEngine,
        pipeline: &PipelineConfig,
    ) -> Self {
        Self {
            queries: QueryBuilder::new(SearchTermTable::default()),
            retriever,
            completion,
            guardrails,
            templates: FallbackTemplates::default(),
            params: CompletionParams {
                max_tokens: pipeline.max_tokens,
                temperature: pipeline.temperature,
            },
            completion_timeout: pipeline.completion_timeout(),
            explanation_top_k: pipeline.explanation_top_k,
            chat_top_k: pipeline.chat_top_k,
        }
    }

    /// Produce a patient-facing explanation for a diagnosis
    pub async fn generate(
        &self,
        diagnosis: &Diagnosis,
        patient: &PatientContext,
    ) -> ExplanationResult {
        let start_time = std::time::Instant::now();
        let ctx = StageContext::endpoint(EXPLANATION_ENDPOINT);

        let queries = self.queries.build_queries(diagnosis.label(), patient);
        let chunks = self
            .retriever
            .retrieve(&queries, self.explanation_top_k)
            .await;

        tracing::debug!(
            diagnosis = %diagnosis.label(),
            queries = queries.len(),
            chunks = chunks.len(),
            "Retrieved explanation context"
        );

        let prompt = prompts::explanation_prompt(diagnosis, patient, &chunks);

        let raw = match self.complete(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(
                    diagnosis = %diagnosis.label(),
                    error = %e,
                    "Explanation generation failed, using fallback template"
                );
                return self.fallback(diagnosis, patient, &ctx);
            }
        };

        let text = prompts::strip_prompt_echo(&raw);
        if text.is_empty() {
            tracing::warn!(
                diagnosis = %diagnosis.label(),
                "Completion returned no text, using fallback template"
            );
            return self.fallback(diagnosis, patient, &ctx);
        }

        let moderated = self.guardrails.moderate_output(text, &ctx);

        tracing::info!(
            diagnosis = %diagnosis.label(),
            rag_sources = chunks.len(),
            blocked = moderated.blocked(),
            elapsed_ms = start_time.elapsed().as_millis(),
            "Explanation generated"
        );

        ExplanationResult {
            text: moderated.text,
            rag_sources: chunks.len(),
            fallback: false,
            guardrail_events: moderated.events,
        }
    }

    /// Answer a follow-up question in the context of a diagnosis and recent turns
    pub async fn answer(
        &self,
        question: &str,
        history: &[ConversationTurn],
        diagnosis: &Diagnosis,
        patient: &PatientContext,
    ) -> ChatReply {
        let ctx = StageContext::endpoint(CHAT_ENDPOINT);

        let validated = self.guardrails.validate_input(question, &ctx);
        let mut events = validated.events;
        let question = validated.text;

        let queries = self.queries.build_chat_query(diagnosis.label(), &question);
        let chunks = self.retriever.retrieve(&queries, self.chat_top_k).await;

        let prompt = prompts::chat_prompt(diagnosis, patient, &chunks, history, &question);

        let text = match self.complete(&prompt).await {
            Ok(raw) if !raw.trim().is_empty() => {
                let moderated = self.guardrails.moderate_output(raw.trim(), &ctx);
                events.extend(moderated.events);
                Some(moderated.text)
            }
            Ok(_) => {
                tracing::warn!(diagnosis = %diagnosis.label(), "Chat completion returned no text");
                None
            }
            Err(e) => {
                tracing::warn!(
                    diagnosis = %diagnosis.label(),
                    error = %e,
                    "Chat completion failed"
                );
                None
            }
        };

        tracing::debug!(
            diagnosis = %diagnosis.label(),
            chunks = chunks.len(),
            answered = text.is_some(),
            "Chat turn processed"
        );

        ChatReply {
            question,
            text,
            guardrail_events: events,
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        match tokio::time::timeout(
            self.completion_timeout,
            self.completion.complete(prompt, &self.params),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(CompletionError::Timeout(self.completion_timeout.as_millis())),
        }
    }

    /// Canned explanation, moderated like any other patient-facing text
    fn fallback(
        &self,
        diagnosis: &Diagnosis,
        patient: &PatientContext,
        ctx: &StageContext,
    ) -> ExplanationResult {
        let rendered = self.templates.render(diagnosis.label(), patient);
        let moderated = self.guardrails.moderate_output(&rendered, ctx);
        ExplanationResult {
            text: moderated.text,
            rag_sources: 0,
            fallback: true,
            guardrail_events: moderated.events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DiagnosisCategory, DiagnosisLabel, GuardrailRule, Sex};
    use crate::service::context::ChunkFilter;
    use crate::service::guardrails::{SAFE_DOSAGE_MESSAGE, SAFE_TOXICITY_MESSAGE, TracingEventSink};
    use crate::testing::{RecordingSink, ScriptedCompletion, ScriptedIndex, hit};

    const CHUNK_A: &str =
        "A heart attack happens when blood flow to part of the heart muscle is blocked.";
    const CHUNK_B: &str =
        "After a myocardial infarction, cardiac rehabilitation supports a safe recovery.";

    const CLEAN_REPLY: &str = "Your ECG suggests a heart attack affected part of your heart. \
        Please follow up with your cardiologist, who can guide your recovery.";

    fn pipeline() -> PipelineConfig {
        PipelineConfig {
            completion_timeout_secs: 1,
            ..PipelineConfig::default()
        }
    }

    fn generator(
        index: ScriptedIndex,
        completion: Arc<ScriptedCompletion>,
        sink: Arc<RecordingSink>,
    ) -> ExplanationGenerator {
        let retriever = ContextRetriever::new(
            Arc::new(index),
            Duration::from_millis(500),
            ChunkFilter::default(),
        );
        ExplanationGenerator::new(retriever, completion, GuardrailsEngine::new(sink), &pipeline())
    }

    fn two_chunks() -> ScriptedIndex {
        ScriptedIndex::returning(vec![
            hit("MI_Guide.pdf", CHUNK_A, 0.8),
            hit("Rehab.pdf", CHUNK_B, 0.6),
        ])
    }

    fn elderly_male() -> PatientContext {
        PatientContext::new(Some(65), Some(Sex::Male)).unwrap()
    }

    #[tokio::test]
    async fn test_end_to_end_with_context() {
        let completion = Arc::new(ScriptedCompletion::replying(CLEAN_REPLY));
        let sink = Arc::new(RecordingSink::default());
        let generator = generator(two_chunks(), completion.clone(), sink.clone());

        let result = generator
            .generate(&Diagnosis::category(DiagnosisCategory::Mi), &elderly_male())
            .await;

        assert!(!result.fallback);
        assert_eq!(result.rag_sources, 2);
        assert_eq!(result.text, CLEAN_REPLY);
        assert!(result.guardrail_events.iter().all(|e| !e.is_blocking()));
        assert!(sink.events().is_empty());

        let prompts = completion.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("[Source: MI_Guide.pdf]"));
        assert!(prompts[0].contains("65 years old"));
    }

    #[tokio::test]
    async fn test_zero_chunks_is_not_fallback() {
        let completion = Arc::new(ScriptedCompletion::replying(CLEAN_REPLY));
        let generator = generator(
            ScriptedIndex::returning(Vec::new()),
            completion,
            Arc::new(RecordingSink::default()),
        );

        let result = generator
            .generate(&Diagnosis::category(DiagnosisCategory::Norm), &PatientContext::default())
            .await;

        assert!(!result.fallback);
        assert_eq!(result.rag_sources, 0);
        assert_eq!(result.text, CLEAN_REPLY);
    }

    #[tokio::test]
    async fn test_completion_failure_uses_template() {
        let generator = generator(
            two_chunks(),
            Arc::new(ScriptedCompletion::failing()),
            Arc::new(RecordingSink::default()),
        );
        let patient = PatientContext::new(Some(70), None).unwrap();

        let result = generator
            .generate(&Diagnosis::category(DiagnosisCategory::Norm), &patient)
            .await;

        assert!(result.fallback);
        assert_eq!(result.rag_sources, 0);
        assert_eq!(
            result.text,
            "For an elderly patient aged 70, your ECG shows a normal rhythm. This is a good sign, \
indicating that your heart's electrical activity is functioning normally. Continue with regular \
check-ups and maintain a healthy lifestyle."
        );
    }

    #[tokio::test]
    async fn test_completion_timeout_uses_template() {
        let completion = Arc::new(
            ScriptedCompletion::replying(CLEAN_REPLY).with_delay(Duration::from_secs(5)),
        );
        let generator = generator(two_chunks(), completion, Arc::new(RecordingSink::default()));

        let result = generator
            .generate(&Diagnosis::category(DiagnosisCategory::Hyp), &PatientContext::default())
            .await;

        assert!(result.fallback);
        assert!(result.text.contains("hypertrophy"));
    }

    #[tokio::test]
    async fn test_empty_completion_uses_template() {
        let generator = generator(
            two_chunks(),
            Arc::new(ScriptedCompletion::replying("Your explanation:   ")),
            Arc::new(RecordingSink::default()),
        );

        let result = generator
            .generate(&Diagnosis::category(DiagnosisCategory::Cd), &PatientContext::default())
            .await;

        assert!(result.fallback);
        assert!(result.text.contains("conduction disturbance"));
    }

    #[tokio::test]
    async fn test_prompt_echo_is_stripped() {
        let generator = generator(
            two_chunks(),
            Arc::new(ScriptedCompletion::replying("Your explanation: Your heart is healthy.")),
            Arc::new(RecordingSink::default()),
        );

        let result = generator
            .generate(&Diagnosis::category(DiagnosisCategory::Norm), &PatientContext::default())
            .await;

        assert_eq!(result.text, "Your heart is healthy.");
    }

    #[tokio::test]
    async fn test_dosage_output_is_blocked_not_fallback() {
        let sink = Arc::new(RecordingSink::default());
        let generator = generator(
            two_chunks(),
            Arc::new(ScriptedCompletion::replying("You should take 81 mg of aspirin every day.")),
            sink.clone(),
        );

        let result = generator
            .generate(&Diagnosis::category(DiagnosisCategory::Mi), &elderly_male())
            .await;

        assert!(!result.fallback);
        assert_eq!(result.text, SAFE_DOSAGE_MESSAGE);
        assert_eq!(result.rag_sources, 2);
        assert_eq!(result.guardrail_events.len(), 1);
        assert_eq!(result.guardrail_events[0].rule, GuardrailRule::BlockMedicationDosage);
        assert_eq!(result.guardrail_events[0].endpoint.as_deref(), Some(EXPLANATION_ENDPOINT));
        assert_eq!(sink.events().len(), 1);
    }

    #[tokio::test]
    async fn test_unrecognized_label_still_explained() {
        let completion = Arc::new(ScriptedCompletion::failing());
        let generator = generator(two_chunks(), completion, Arc::new(RecordingSink::default()));
        let diagnosis = Diagnosis::new(DiagnosisLabel::parse("AFIB").unwrap(), 0.7).unwrap();

        let result = generator.generate(&diagnosis, &PatientContext::default()).await;

        assert!(result.fallback);
        assert!(result.text.starts_with("Your ECG shows AFIB."));
    }

    #[tokio::test]
    async fn test_fallback_text_is_moderated() {
        let sink = Arc::new(RecordingSink::default());
        let completion = Arc::new(ScriptedCompletion::failing());
        let generator = generator(two_chunks(), completion, sink.clone());
        let diagnosis = Diagnosis::new(DiagnosisLabel::parse("IDIOT").unwrap(), 0.5).unwrap();

        let result = generator.generate(&diagnosis, &PatientContext::default()).await;

        assert!(result.fallback);
        assert_eq!(result.text, SAFE_TOXICITY_MESSAGE);
        assert_eq!(result.guardrail_events.len(), 1);
        assert_eq!(result.guardrail_events[0].rule, GuardrailRule::ToxicityFilter);
        assert_eq!(sink.events().len(), 1);
    }

    #[tokio::test]
    async fn test_answer_sanitizes_question_before_use() {
        let completion =
            Arc::new(ScriptedCompletion::replying("Gentle walking is usually a good start."));
        let index = ScriptedIndex::returning(vec![hit("Rehab.pdf", CHUNK_B, 0.6)]);
        let generator = generator(index, completion.clone(), Arc::new(RecordingSink::default()));

        let reply = generator
            .answer(
                "Patient name: John Smith. Can I exercise?",
                &[],
                &Diagnosis::category(DiagnosisCategory::Mi),
                &PatientContext::default(),
            )
            .await;

        assert!(!reply.question.contains("John Smith"));
        assert!(reply.question.contains("[REDACTED]"));
        assert_eq!(reply.text.as_deref(), Some("Gentle walking is usually a good start."));
        assert!(reply.guardrail_events.iter().any(|e| e.rule == GuardrailRule::PiiRedaction));
        assert!(!completion.prompts()[0].contains("John Smith"));
    }

    #[tokio::test]
    async fn test_answer_failure_yields_none() {
        let generator = ExplanationGenerator::new(
            ContextRetriever::new(
                Arc::new(ScriptedIndex::unavailable()),
                Duration::from_millis(100),
                ChunkFilter::default(),
            ),
            Arc::new(ScriptedCompletion::failing()),
            GuardrailsEngine::new(Arc::new(TracingEventSink::new())),
            &pipeline(),
        );

        let reply = generator
            .answer(
                "Is this serious?",
                &[],
                &Diagnosis::category(DiagnosisCategory::Sttc),
                &PatientContext::default(),
            )
            .await;

        assert!(reply.text.is_none());
        assert_eq!(reply.question, "Is this serious?");
    }

}
