//! Similarity index boundary and the bundled corpus-backed index

mod corpus;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use corpus::CorpusIndex;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum IndexError {
    #[error("Failed to read corpus: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse corpus: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// One similarity-search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub text: String,
    pub source: String,
    /// Higher is more relevant
    pub score: f64,
}

/// Query interface of a populated similarity index
///
/// An empty corpus yields an empty list, not an error.
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>, IndexError>;

    /// Number of chunks available, when the backend can tell
    fn len_hint(&self) -> Option<usize> {
        None
    }
}
