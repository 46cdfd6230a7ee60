//! In-memory lexical index over a pre-chunked reference corpus
//!
//! The corpus is a JSON array of `{ "text": ..., "source": ... }` objects produced
//! by the ingestion job. Scoring is token-set cosine overlap, which keeps results
//! deterministic without an embedding model.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use super::{IndexError, SearchHit, SimilarityIndex};

#[derive(Debug, Clone, Deserialize)]
struct CorpusEntry {
    text: String,
    source: String,
}

struct IndexedChunk {
    entry: CorpusEntry,
    tokens: HashSet<String>,
}

pub struct CorpusIndex {
    chunks: Vec<IndexedChunk>,
}

impl CorpusIndex {
    /// Load a corpus file; a missing file yields an empty index
    pub fn load(path: &Path) -> Result<Self, IndexError> {
        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Corpus file not found, starting with an empty index"
            );
            return Ok(Self { chunks: Vec::new() });
        }

        let contents = std::fs::read_to_string(path)?;
        let index = Self::from_json(&contents)?;

        tracing::info!(
            path = %path.display(),
            chunks = index.chunks.len(),
            "Loaded reference corpus"
        );
        Ok(index)
    }

    pub fn from_json(json: &str) -> Result<Self, IndexError> {
        if json.trim().is_empty() {
            return Ok(Self { chunks: Vec::new() });
        }
        let entries: Vec<CorpusEntry> = serde_json::from_str(json)?;
        Ok(Self::from_entries(entries))
    }

    fn from_entries(entries: Vec<CorpusEntry>) -> Self {
        let chunks = entries
            .into_iter()
            .map(|entry| IndexedChunk {
                tokens: tokenize(&entry.text),
                entry,
            })
            .collect();
        Self { chunks }
    }
}

#[async_trait]
impl SimilarityIndex for CorpusIndex {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>, IndexError> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let mut hits: Vec<SearchHit> = self
            .chunks
            .iter()
            .filter_map(|chunk| {
                let score = overlap_score(&query_tokens, &chunk.tokens);
                (score > 0.0).then(|| SearchHit {
                    text: chunk.entry.text.clone(),
                    source: chunk.entry.source.clone(),
                    score,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }

    fn len_hint(&self) -> Option<usize> {
        Some(self.chunks.len())
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Cosine similarity of two token sets
fn overlap_score(query: &HashSet<String>, doc: &HashSet<String>) -> f64 {
    if doc.is_empty() {
        return 0.0;
    }
    let shared = query.intersection(doc).count() as f64;
    shared / ((query.len() * doc.len()) as f64).sqrt()
}
