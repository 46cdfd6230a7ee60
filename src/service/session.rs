//! Multi-turn follow-up conversations over a diagnosis
//!
//! Each session keeps a bounded window of recent turns. Exclusive access to a
//! session (`&mut ChatSession`, or the per-session lock in `SessionStore`)
//! serializes turns within it; different sessions never share state.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::model::{ConversationTurn, Diagnosis, PatientContext};
use crate::service::explanation::ExplanationGenerator;

pub const CHAT_RETRY_MESSAGE: &str = "I'm sorry, I wasn't able to answer that just now. \
    Please try asking again in a moment, and remember that your cardiologist is the best \
    person to discuss your results with.";

#[derive(Debug, Clone)]
pub struct ChatSession {
    id: String,
    window: VecDeque<ConversationTurn>,
    capacity: usize,
}

impl ChatSession {
    pub fn new(id: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            id: id.into(),
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Recent turns, oldest first
    pub fn turns(&self) -> Vec<ConversationTurn> {
        self.window.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    fn push(&mut self, turn: ConversationTurn) {
        while self.window.len() >= self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(turn);
    }
}

pub struct SessionHandler {
    generator: Arc<ExplanationGenerator>,
}

impl SessionHandler {
    pub fn new(generator: Arc<ExplanationGenerator>) -> Self {
        Self { generator }
    }

    /// Run one chat turn and record it in the session window
    pub async fn ask(
        &self,
        session: &mut ChatSession,
        message: &str,
        diagnosis: &Diagnosis,
        patient: &PatientContext,
    ) -> String {
        let history = session.turns();
        let reply = self
            .generator
            .answer(message, &history, diagnosis, patient)
            .await;

        let text = match reply.text {
            Some(text) => text,
            None => {
                tracing::warn!(
                    session_id = %session.id(),
                    "Chat turn failed, replying with retry message"
                );
                CHAT_RETRY_MESSAGE.to_string()
            }
        };

        session.push(ConversationTurn::user(reply.question));
        session.push(ConversationTurn::assistant(text.clone()));

        tracing::debug!(
            session_id = %session.id(),
            turns = session.len(),
            guardrail_events = reply.guardrail_events.len(),
            "Chat turn recorded"
        );

        text
    }
}

/// In-memory registry of chat sessions, bounded by `max_sessions`
pub struct SessionStore {
    sessions: Mutex<SessionMap>,
    history_window: usize,
    max_sessions: usize,
}

#[derive(Default)]
struct SessionMap {
    by_id: HashMap<String, Arc<tokio::sync::Mutex<ChatSession>>>,
    /// Creation order, oldest first
    order: VecDeque<String>,
}

impl SessionStore {
    pub fn new(history_window: usize, max_sessions: usize) -> Self {
        Self {
            sessions: Mutex::new(SessionMap::default()),
            history_window,
            max_sessions: max_sessions.max(1),
        }
    }

    /// Look up a session, creating it when the id is unknown or absent
    ///
    /// Returns the session id alongside the handle so callers can echo it back.
    pub fn get_or_create(
        &self,
        id: Option<&str>,
    ) -> (String, Arc<tokio::sync::Mutex<ChatSession>>) {
        let mut map = match self.sessions.lock() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(id) = id
            && let Some(session) = map.by_id.get(id)
        {
            return (id.to_string(), session.clone());
        }

        let id = id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        while map.by_id.len() >= self.max_sessions {
            let Some(oldest) = map.order.pop_front() else {
                break;
            };
            map.by_id.remove(&oldest);
            tracing::debug!(session_id = %oldest, "Evicted oldest chat session");
        }

        let session = Arc::new(tokio::sync::Mutex::new(ChatSession::new(
            id.clone(),
            self.history_window,
        )));
        map.by_id.insert(id.clone(), session.clone());
        map.order.push_back(id.clone());

        (id, session)
    }

    pub fn len(&self) -> usize {
        match self.sessions.lock() {
            Ok(map) => map.by_id.len(),
            Err(poisoned) => poisoned.into_inner().by_id.len(),
        }
    }
}
