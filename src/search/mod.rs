//! Web search - Tavily search API client.

mod page;

pub use page::PageReader;

use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Tavily search endpoint.
const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";

// ============================================================================
// API Key Management
// ============================================================================

/// Load the Tavily API key from `TAVILY_API_KEY`.
pub fn get_tavily_key() -> Result<String> {
    match std::env::var("TAVILY_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(key),
        _ => anyhow::bail!(
            "Tavily API key not found. Set the TAVILY_API_KEY environment variable.\n\
             Get your API key at: https://app.tavily.com"
        ),
    }
}

/// Whether a Tavily API key is configured.
pub fn has_tavily_key() -> bool {
    std::env::var("TAVILY_API_KEY")
        .map(|k| !k.is_empty())
        .unwrap_or(false)
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<WebSearchHit>,
}

/// One web search result.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSearchHit {
    #[serde(default)]
    pub title: String,
    pub url: String,
    /// Content snippet returned by the search engine.
    #[serde(default)]
    pub content: String,
    /// Engine relevance score.
    #[serde(default)]
    pub score: f32,
}

// ============================================================================
// TavilyClient
// ============================================================================

/// Tavily web search client.
pub struct TavilyClient {
    api_key: String,
    client: reqwest::Client,
}

impl TavilyClient {
    /// Create a client with an explicit API key.
    pub fn new(api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { api_key, client })
    }

    /// Create a client with the API key from the environment.
    pub fn from_env() -> Result<Self> {
        let api_key = get_tavily_key()?;
        Self::new(api_key)
    }

    /// Run a web search.
    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<WebSearchHit>> {
        tracing::info!("Web search: {}", query);

        let request = SearchRequest {
            api_key: &self.api_key,
            query,
            max_results,
        };

        let response = self
            .client
            .post(TAVILY_SEARCH_URL)
            .json(&request)
            .send()
            .await
            .context("Failed to send search request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read search response body")?;

        if !status.is_success() {
            anyhow::bail!("Tavily API error ({}): {}", status, body);
        }

        let parsed: SearchResponse =
            serde_json::from_str(&body).context("Failed to parse search response")?;

        tracing::debug!("Web search returned {} hits", parsed.results.len());
        Ok(parsed.results)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_parse() {
        let body = r#"{
            "query": "what is rag",
            "results": [
                {
                    "title": "Retrieval-augmented generation",
                    "url": "https://example.com/rag",
                    "content": "RAG supplies retrieved context to a model.",
                    "score": 0.97
                },
                {
                    "url": "https://example.com/bare"
                }
            ]
        }"#;

        let parsed: SearchResponse = serde_json::from_str(body).expect("parse response");
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[0].title, "Retrieval-augmented generation");
        assert!((parsed.results[0].score - 0.97).abs() < 0.001);

        // Missing fields default instead of failing the whole response.
        assert!(parsed.results[1].title.is_empty());
        assert!(parsed.results[1].content.is_empty());
    }

    #[test]
    fn test_request_serialization() {
        let request = SearchRequest {
            api_key: "key",
            query: "latest rust release",
            max_results: 3,
        };
        let value = serde_json::to_value(&request).expect("serialize request");
        assert_eq!(value["query"], "latest rust release");
        assert_eq!(value["max_results"], 3);
    }

    #[test]
    fn test_empty_results_parse() {
        let parsed: SearchResponse = serde_json::from_str("{}").expect("parse response");
        assert!(parsed.results.is_empty());
    }
}
