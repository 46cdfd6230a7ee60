//! Fakes for the external collaborators, shared by unit tests

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::model::GuardrailEvent;
use crate::retriever::{IndexError, SearchHit, SimilarityIndex};
use crate::service::guardrails::EventSink;
use crate::service::llm::{CompletionError, CompletionParams, CompletionService};

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<GuardrailEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<GuardrailEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn record(&self, event: &GuardrailEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Index that answers every query from a fixed table keyed by query text
#[derive(Default)]
pub struct ScriptedIndex {
    responses: Vec<(String, Vec<SearchHit>)>,
    default_hits: Vec<SearchHit>,
    unavailable: bool,
    delay: Option<Duration>,
    queries: Mutex<Vec<String>>,
}

impl ScriptedIndex {
    pub fn returning(hits: Vec<SearchHit>) -> Self {
        Self {
            default_hits: hits,
            ..Self::default()
        }
    }

    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn with_response(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
        self.responses.push((query.to_string(), hits));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl SimilarityIndex for ScriptedIndex {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>, IndexError> {
        self.queries.lock().unwrap().push(query.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.unavailable {
            return Err(IndexError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        let hits = self
            .responses
            .iter()
            .find(|(q, _)| q == query)
            .map(|(_, hits)| hits.clone())
            .unwrap_or_else(|| self.default_hits.clone());
        Ok(hits.into_iter().take(top_k).collect())
    }
}

/// Completion service that replays scripted replies in order
#[derive(Default)]
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<Result<String, String>>>,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    pub fn replying(reply: &str) -> Self {
        let completion = Self::default();
        completion.push_reply(reply);
        completion
    }

    pub fn failing() -> Self {
        let completion = Self::default();
        completion.push_failure("provider error");
        completion
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push_reply(&self, reply: &str) {
        self.replies.lock().unwrap().push_back(Ok(reply.to_string()));
    }

    pub fn push_failure(&self, error: &str) {
        self.replies.lock().unwrap().push_back(Err(error.to_string()));
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(
        &self,
        prompt: &str,
        _params: &CompletionParams,
    ) -> Result<String, CompletionError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(e)) => Err(CompletionError::Failed(e)),
            None => Err(CompletionError::Failed("no scripted reply".to_string())),
        }
    }
}

pub fn hit(source: &str, text: &str, score: f64) -> SearchHit {
    SearchHit {
        text: text.to_string(),
        source: source.to_string(),
        score,
    }
}
