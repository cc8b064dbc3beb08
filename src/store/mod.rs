//! In-memory embedding store.
//!
//! A linear cosine scan over owned rows. The store is filled once at
//! startup and shared read-only behind an `Arc` afterwards.

use anyhow::Result;

// ============================================================================
// Types
// ============================================================================

/// A split chunk plus its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSegment {
    /// Chunk text.
    pub text: String,
    /// Source document (display path or URL).
    pub source: String,
}

/// One search hit.
#[derive(Debug, Clone)]
pub struct ScoredSegment {
    pub segment: TextSegment,
    /// Cosine similarity against the query (-1.0 ~ 1.0).
    pub score: f32,
}

#[derive(Debug)]
struct StoreRow {
    segment: TextSegment,
    embedding: Vec<f32>,
}

// ============================================================================
// InMemoryStore
// ============================================================================

/// In-memory vector store with linear cosine search.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    rows: Vec<StoreRow>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert segments with their embeddings.
    ///
    /// Both slices must pair up one-to-one.
    pub fn add_batch(
        &mut self,
        segments: Vec<TextSegment>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<usize> {
        if segments.len() != embeddings.len() {
            anyhow::bail!(
                "Segment/embedding count mismatch: {} vs {}",
                segments.len(),
                embeddings.len()
            );
        }

        let added = segments.len();
        self.rows.extend(
            segments
                .into_iter()
                .zip(embeddings)
                .map(|(segment, embedding)| StoreRow { segment, embedding }),
        );

        Ok(added)
    }

    /// Best-scoring segments for a query embedding.
    ///
    /// Rows below `min_score` are dropped before truncating to
    /// `max_results`; results come back in descending score order.
    pub fn search(
        &self,
        query_embedding: &[f32],
        max_results: usize,
        min_score: f32,
    ) -> Vec<ScoredSegment> {
        let mut hits: Vec<ScoredSegment> = self
            .rows
            .iter()
            .map(|row| ScoredSegment {
                segment: row.segment.clone(),
                score: cosine_similarity(query_embedding, &row.embedding),
            })
            .filter(|hit| hit.score >= min_score)
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(max_results);
        hits
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

/// Cosine similarity between two vectors (-1.0 ~ 1.0).
///
/// Mismatched or empty vectors score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

// ============================================================================
// Tests
// ============================================================================
