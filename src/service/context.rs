//! Context retrieval over the similarity index
//!
//! Runs one search per query term, drops low-value chunks, deduplicates by
//! (source, text) and keeps the top-k by score. Index failures never propagate:
//! the affected term is skipped and an empty result is a valid outcome.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::model::RetrievedChunk;
use crate::retriever::SimilarityIndex;

/// Markers of front-matter chunks that carry no clinical content
const BOILERPLATE_MARKERS: &[&str] = &[
    "copyright",
    "©",
    "all rights reserved",
    "wolters kluwer",
];

/// Chunk quality filter applied before ranking
#[derive(Debug, Clone)]
pub struct ChunkFilter {
    pub min_chars: usize,
}

impl Default for ChunkFilter {
    fn default() -> Self {
        Self { min_chars: 50 }
    }
}

impl ChunkFilter {
    fn accepts(&self, text: &str) -> bool {
        let trimmed = text.trim();
        if trimmed.chars().count() < self.min_chars {
            return false;
        }
        let lower = trimmed.to_lowercase();
        !BOILERPLATE_MARKERS.iter().any(|m| lower.contains(m))
    }
}

pub struct ContextRetriever {
    index: Arc<dyn SimilarityIndex>,
    search_timeout: Duration,
    filter: ChunkFilter,
}

impl ContextRetriever {
    pub fn new(
        index: Arc<dyn SimilarityIndex>,
        search_timeout: Duration,
        filter: ChunkFilter,
    ) -> Self {
        Self {
            index,
            search_timeout,
            filter,
        }
    }

    /// Retrieve at most `k` chunks for the given query terms, best first
    pub async fn retrieve(&self, queries: &[String], k: usize) -> Vec<RetrievedChunk> {
        if k == 0 {
            return Vec::new();
        }

        let mut merged: Vec<RetrievedChunk> = Vec::new();
        let mut positions: HashMap<(String, String), usize> = HashMap::new();
        let mut failed_queries = 0;

        for query in queries {
            let search = self.index.search(query, k);
            let hits = match tokio::time::timeout(self.search_timeout, search).await {
                Ok(Ok(hits)) => hits,
                Ok(Err(e)) => {
                    failed_queries += 1;
                    tracing::warn!(
                        query = %query,
                        error = %e,
                        "Similarity search failed, skipping term"
                    );
                    continue;
                }
                Err(_) => {
                    failed_queries += 1;
                    tracing::warn!(
                        query = %query,
                        timeout_ms = self.search_timeout.as_millis(),
                        "Similarity search timed out, skipping term"
                    );
                    continue;
                }
            };

            for hit in hits {
                if !self.filter.accepts(&hit.text) {
                    tracing::debug!(
                        source = %hit.source,
                        chars = hit.text.len(),
                        "Skipping short or boilerplate chunk"
                    );
                    continue;
                }

                let key = (hit.source.clone(), hit.text.clone());
                match positions.get(&key) {
                    Some(&pos) => {
                        let existing = &mut merged[pos];
                        if hit.score > existing.score {
                            existing.score = hit.score;
                        }
                    }
                    None => {
                        positions.insert(key, merged.len());
                        merged.push(RetrievedChunk {
                            text: hit.text,
                            source: hit.source,
                            score: hit.score,
                        });
                    }
                }
            }
        }

        // Stable sort: equal scores keep first-seen order
        merged.sort_by(|a, b| b.score.total_cmp(&a.score));
        merged.truncate(k);

        tracing::debug!(
            queries = queries.len(),
            failed_queries = failed_queries,
            retrieved = merged.len(),
            "Context retrieval complete"
        );

        merged
    }
}
