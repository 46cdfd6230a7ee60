pub mod context;
pub mod explanation;
pub mod guardrails;
pub mod llm;
pub mod query;
pub mod session;

pub use context::{ChunkFilter, ContextRetriever};
pub use explanation::ExplanationGenerator;
pub use llm::LlmClient;
pub use session::{SessionHandler, SessionStore};
