//! Content retrievers - passages relevant to a query.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::{EmbeddingProvider, EmbeddingTask};
use crate::search::{PageReader, TavilyClient};
use crate::store::InMemoryStore;

// ============================================================================
// Types
// ============================================================================

/// One retrieved passage.
#[derive(Debug, Clone)]
pub struct Content {
    /// Passage text.
    pub text: String,
    /// Where it came from (document path or URL).
    pub source: String,
    /// Retriever-specific relevance score.
    pub score: Option<f32>,
}

/// Retriever settings.
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Maximum passages returned per query.
    pub max_results: usize,
    /// Minimum similarity score (0.0 disables the floor).
    pub min_score: f32,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            max_results: 3,
            min_score: 0.0,
        }
    }
}

// ============================================================================
// ContentRetriever Trait
// ============================================================================

/// A source of passages for a query.
#[async_trait]
pub trait ContentRetriever: Send + Sync {
    /// Passages relevant to the query.
    async fn retrieve(&self, query: &str) -> Result<Vec<Content>>;

    /// Short identifier, used in logs.
    fn name(&self) -> &str;

    /// What this source covers. Shown to the LLM router when it picks
    /// sources for a query.
    fn description(&self) -> &str;
}

// ============================================================================
// EmbeddingRetriever
// ============================================================================

/// Retriever over an in-memory embedding store.
pub struct EmbeddingRetriever {
    store: Arc<InMemoryStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: RetrieverConfig,
    name: String,
    description: String,
}

impl EmbeddingRetriever {
    pub fn new(
        store: Arc<InMemoryStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: RetrieverConfig,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            store,
            embedder,
            config,
            name: name.into(),
            description: description.into(),
        }
    }
}

#[async_trait]
impl ContentRetriever for EmbeddingRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<Content>> {
        let query_embedding = self.embedder.embed(query, EmbeddingTask::Query).await?;

        let hits = self.store.search(
            &query_embedding,
            self.config.max_results,
            self.config.min_score,
        );

        tracing::debug!(
            retriever = %self.name,
            hits = hits.len(),
            "embedding retrieval"
        );

        Ok(hits
            .into_iter()
            .map(|hit| Content {
                text: hit.segment.text,
                source: hit.segment.source,
                score: Some(hit.score),
            })
            .collect())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }
}

// ============================================================================
// WebSearchRetriever
// ============================================================================

/// Retriever backed by the Tavily web search API.
///
/// By default a hit contributes its engine snippet; with a `PageReader`
/// attached the full page text is fetched instead, falling back to the
/// snippet when the fetch fails.
pub struct WebSearchRetriever {
    search: TavilyClient,
    pages: Option<PageReader>,
    max_results: usize,
    description: String,
}

impl WebSearchRetriever {
    pub fn new(search: TavilyClient, max_results: usize, description: impl Into<String>) -> Self {
        Self {
            search,
            pages: None,
            max_results,
            description: description.into(),
        }
    }

    /// Fetch full page text for each hit.
    pub fn with_page_reader(mut self, pages: PageReader) -> Self {
        self.pages = Some(pages);
        self
    }
}

#[async_trait]
impl ContentRetriever for WebSearchRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<Content>> {
        let hits = self.search.search(query, self.max_results).await?;

        let mut contents = Vec::with_capacity(hits.len());
        for hit in hits {
            let mut text = hit.content;

            if let Some(reader) = &self.pages {
                match reader.read(&hit.url).await {
                    Ok(page_text) if !page_text.is_empty() => text = page_text,
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!("Page fetch failed for {}: {:#}", hit.url, e);
                    }
                }
            }

            if text.is_empty() {
                continue;
            }

            contents.push(Content {
                text,
                source: hit.url,
                score: Some(hit.score),
            });
        }

        Ok(contents)
    }

    fn name(&self) -> &str {
        "web-search"
    }

    fn description(&self) -> &str {
        &self.description
    }
}

// ============================================================================
// Tests
// ============================================================================
