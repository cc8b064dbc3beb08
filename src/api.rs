//! Shared Gemini API plumbing.
//!
//! Key lookup, request pacing, and the error payload shape used by both the
//! chat and embedding clients.

use std::time::{Duration, Instant};

use anyhow::Result;
use serde::Deserialize;

/// Minimum delay between API calls (free tier: 60 RPM).
pub(crate) const MIN_REQUEST_DELAY: Duration = Duration::from_millis(1000);
/// Maximum retries after a 429 response.
pub(crate) const MAX_RETRIES: u32 = 3;
/// Initial backoff after a 429 response (ms), doubled per attempt.
pub(crate) const INITIAL_BACKOFF_MS: u64 = 2000;

/// Backoff duration for the given 0-based retry attempt.
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt))
}

// ============================================================================
// API Key Management
// ============================================================================

/// Load the Gemini API key from the environment.
///
/// Priority:
/// 1. `GEMINI_API_KEY`
/// 2. `GOOGLE_AI_API_KEY`
pub fn get_api_key() -> Result<String> {
    for var in ["GEMINI_API_KEY", "GOOGLE_AI_API_KEY"] {
        if let Ok(key) = std::env::var(var) {
            if !key.is_empty() {
                tracing::debug!("Using API key from {}", var);
                return Ok(key);
            }
        }
    }

    anyhow::bail!(
        "API key not found. Set GEMINI_API_KEY or GOOGLE_AI_API_KEY environment variable.\n\
         Get your API key at: https://aistudio.google.com/app/apikey"
    )
}

/// Whether a Gemini API key is configured.
pub fn has_api_key() -> bool {
    ["GEMINI_API_KEY", "GOOGLE_AI_API_KEY"]
        .iter()
        .any(|var| std::env::var(var).map(|k| !k.is_empty()).unwrap_or(false))
}

// ============================================================================
// Error Payload
// ============================================================================

/// Error body returned by the Gemini API.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorDetail {
    pub message: String,
    #[serde(default)]
    pub status: String,
}

// ============================================================================
// Request Pacer
// ============================================================================

/// Enforces a minimum gap between outbound requests.
#[derive(Debug)]
pub(crate) struct RequestPacer {
    min_delay: Duration,
    last_request: Option<Instant>,
}

impl RequestPacer {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            min_delay,
            last_request: None,
        }
    }

    /// Wait until the minimum gap since the previous request has passed.
    pub async fn pace(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                let wait = self.min_delay - elapsed;
                tracing::debug!("Pacing request: waiting {:?}", wait);
                tokio::time::sleep(wait).await;
            }
        }
        self.last_request = Some(Instant::now());
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(backoff_delay(0), Duration::from_millis(2000));
        assert_eq!(backoff_delay(1), Duration::from_millis(4000));
        assert_eq!(backoff_delay(2), Duration::from_millis(8000));
    }

    #[test]
    fn test_error_body_parse() {
        let body = r#"{"error":{"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
        let parsed: ApiErrorBody = serde_json::from_str(body).expect("parse error body");
        assert_eq!(parsed.error.status, "INVALID_ARGUMENT");
        assert!(parsed.error.message.contains("API key"));
    }

    #[tokio::test]
    async fn test_pacer_enforces_gap() {
        let mut pacer = RequestPacer::new(Duration::from_millis(50));
        let start = Instant::now();
        pacer.pace().await;
        pacer.pace().await;
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_pacer_first_call_is_immediate() {
        let mut pacer = RequestPacer::new(Duration::from_secs(10));
        let start = Instant::now();
        pacer.pace().await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
