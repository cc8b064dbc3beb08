//! Embedding module - text vectorization through the Gemini API.
//!
//! Indexing and querying use different task types (`RETRIEVAL_DOCUMENT` vs
//! `RETRIEVAL_QUERY`); the store is only as good as both sides agreeing on
//! the same model and dimension.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::api::{self, ApiErrorBody, RequestPacer};

/// Gemini embedding endpoint (gemini-embedding-001).
const GEMINI_EMBED_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-embedding-001:embedContent";

/// Output dimensionality requested from the API.
pub const EMBEDDING_DIMENSION: usize = 768;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// What the embedding will be used for.
///
/// Gemini tunes the vector differently for stored passages and for queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingTask {
    /// Indexing a passage into a store.
    Document,
    /// Embedding a search query.
    Query,
}

impl EmbeddingTask {
    fn wire_name(self) -> &'static str {
        match self {
            EmbeddingTask::Document => "RETRIEVAL_DOCUMENT",
            EmbeddingTask::Query => "RETRIEVAL_QUERY",
        }
    }
}

/// Text-to-vector backend.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str, task: EmbeddingTask) -> Result<Vec<f32>>;

    /// Embed a batch (default: sequential calls).
    async fn embed_batch(&self, texts: &[String], task: EmbeddingTask) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for (i, text) in texts.iter().enumerate() {
            tracing::debug!("Embedding {}/{}", i + 1, texts.len());
            results.push(self.embed(text, task).await?);
        }
        Ok(results)
    }

    /// Vector dimension.
    fn dimension(&self) -> usize;

    /// Provider name.
    fn name(&self) -> &str;
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'static str,
    content: EmbedContent<'a>,
    #[serde(rename = "taskType")]
    task_type: &'static str,
    #[serde(rename = "outputDimensionality")]
    output_dimensionality: usize,
}

#[derive(Debug, Serialize)]
struct EmbedContent<'a> {
    parts: Vec<EmbedPart<'a>>,
}

#[derive(Debug, Serialize)]
struct EmbedPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbedVector,
}

#[derive(Debug, Deserialize)]
struct EmbedVector {
    values: Vec<f32>,
}

// ============================================================================
// GeminiEmbedding
// ============================================================================

/// Gemini embedding client.
pub struct GeminiEmbedding {
    api_key: String,
    client: reqwest::Client,
    pacer: Mutex<RequestPacer>,
}

impl GeminiEmbedding {
    /// Create a client with an explicit API key.
    pub fn new(api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            client,
            pacer: Mutex::new(RequestPacer::new(api::MIN_REQUEST_DELAY)),
        })
    }

    /// Create a client with the API key from the environment.
    pub fn from_env() -> Result<Self> {
        let api_key = api::get_api_key()?;
        Self::new(api_key)
    }

    /// One embedContent round trip. Ok(None) signals a retryable 429.
    async fn send(&self, request: &EmbedRequest<'_>) -> Result<Option<Vec<f32>>> {
        let response = self
            .client
            .post(GEMINI_EMBED_URL)
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .context("Failed to send embedding request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read embedding response body")?;

        if status.as_u16() == 429 {
            return Ok(None);
        }

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ApiErrorBody>(&body) {
                anyhow::bail!(
                    "Gemini API error ({}): {}",
                    error.error.status,
                    error.error.message
                );
            }
            anyhow::bail!("Gemini API error ({}): {}", status, body);
        }

        let parsed: EmbedResponse =
            serde_json::from_str(&body).context("Failed to parse embedding response")?;
        Ok(Some(parsed.embedding.values))
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedding {
    async fn embed(&self, text: &str, task: EmbeddingTask) -> Result<Vec<f32>> {
        // Blank input never reaches the API.
        if text.trim().is_empty() {
            return Ok(vec![0.0; EMBEDDING_DIMENSION]);
        }

        let request = EmbedRequest {
            model: "models/gemini-embedding-001",
            content: EmbedContent {
                parts: vec![EmbedPart { text }],
            },
            task_type: task.wire_name(),
            output_dimensionality: EMBEDDING_DIMENSION,
        };

        for attempt in 0..=api::MAX_RETRIES {
            {
                let mut pacer = self.pacer.lock().await;
                pacer.pace().await;
            }

            if let Some(values) = self.send(&request).await? {
                return Ok(values);
            }

            if attempt < api::MAX_RETRIES {
                let backoff = api::backoff_delay(attempt);
                tracing::warn!(
                    "Rate limit hit (429), backing off {:?} (attempt {}/{})",
                    backoff,
                    attempt + 1,
                    api::MAX_RETRIES
                );
                tokio::time::sleep(backoff).await;
            }
        }

        anyhow::bail!("Embedding failed after {} retries (429)", api::MAX_RETRIES)
    }

    fn dimension(&self) -> usize {
        EMBEDDING_DIMENSION
    }

    fn name(&self) -> &str {
        "gemini-embedding-001"
    }
}

// ============================================================================
// Tests
// ============================================================================
