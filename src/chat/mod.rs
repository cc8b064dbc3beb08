//! Chat module - Gemini `generateContent` client.
//!
//! The `ChatProvider` trait is the seam the routers and the assistant talk
//! through; `GeminiChat` is the real implementation. With `log_exchanges`
//! enabled every request and response body is emitted as a tracing event and
//! optionally appended to a JSONL exchange log.

mod exchange;

pub use exchange::{default_log_path, ExchangeLog};

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::api::{self, ApiErrorBody, RequestPacer};

/// Gemini generateContent endpoint root.
const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Default chat model.
pub const DEFAULT_CHAT_MODEL: &str = "gemini-2.5-flash";

// ============================================================================
// Messages
// ============================================================================

/// Role of a chat message (Gemini wire roles).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Model,
}

impl ChatRole {
    fn wire_name(self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Model => "model",
        }
    }
}

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            content: content.into(),
        }
    }
}

// ============================================================================
// ChatProvider Trait
// ============================================================================

/// A chat completion backend.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Generate the next reply for a conversation.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Single-turn convenience wrapper used by the routers.
    async fn complete_text(&self, prompt: &str) -> Result<String> {
        self.complete(&[ChatMessage::user(prompt)]).await
    }

    /// Provider name.
    fn name(&self) -> &str;
}

// ============================================================================
// Errors
// ============================================================================

/// Failure classes of a chat API call.
///
/// `RateLimited` is matched on by the retry loop; everything else aborts the
/// call immediately.
#[derive(Debug, Error)]
pub enum ChatApiError {
    #[error("rate limit exceeded (429)")]
    RateLimited,

    #[error("Gemini API error ({status}): {message}")]
    Api { status: String, message: String },
}

// ============================================================================
// Configuration
// ============================================================================

/// Chat client settings.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Model name (e.g. `gemini-2.5-flash`).
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Log full request and response bodies.
    pub log_exchanges: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: 0.3,
            log_exchanges: false,
        }
    }
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<WireContent>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<WireContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct WireContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<WirePart>,
}

#[derive(Debug, Serialize)]
struct WirePart {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

/// Concatenated text of the first candidate, if any.
fn extract_reply(response: GenerateResponse) -> Option<String> {
    let candidate = response.candidates.into_iter().next()?;
    let reply = candidate
        .content
        .parts
        .into_iter()
        .map(|p| p.text)
        .collect::<Vec<_>>()
        .join("");

    if reply.is_empty() {
        None
    } else {
        Some(reply)
    }
}

// ============================================================================
// GeminiChat
// ============================================================================

/// Gemini chat completion client.
pub struct GeminiChat {
    api_key: String,
    client: reqwest::Client,
    config: ChatConfig,
    system_instruction: Option<String>,
    pacer: Mutex<RequestPacer>,
    exchange_log: Option<Arc<ExchangeLog>>,
}

impl GeminiChat {
    /// Create a client with an explicit API key.
    pub fn new(api_key: String, config: ChatConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            client,
            config,
            system_instruction: None,
            pacer: Mutex::new(RequestPacer::new(api::MIN_REQUEST_DELAY)),
            exchange_log: None,
        })
    }

    /// Create a client with the API key from the environment.
    pub fn from_env(config: ChatConfig) -> Result<Self> {
        let api_key = api::get_api_key()?;
        Self::new(api_key, config)
    }

    /// Set a system instruction sent with every request.
    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    /// Attach a JSONL exchange log (written only when `log_exchanges` is set).
    pub fn with_exchange_log(mut self, log: Arc<ExchangeLog>) -> Self {
        self.exchange_log = Some(log);
        self
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", GEMINI_API_BASE, self.config.model)
    }

    fn build_request(&self, messages: &[ChatMessage]) -> GenerateRequest {
        GenerateRequest {
            contents: messages
                .iter()
                .map(|m| WireContent {
                    role: Some(m.role.wire_name()),
                    parts: vec![WirePart {
                        text: m.content.clone(),
                    }],
                })
                .collect(),
            system_instruction: self.system_instruction.as_ref().map(|text| WireContent {
                role: None,
                parts: vec![WirePart { text: text.clone() }],
            }),
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
            },
        }
    }

    /// One request/response round trip, no retries.
    async fn send(&self, request: &GenerateRequest) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await
            .context("Failed to send chat request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read chat response body")?;

        if status.as_u16() == 429 {
            return Err(ChatApiError::RateLimited.into());
        }

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ApiErrorBody>(&body) {
                return Err(ChatApiError::Api {
                    status: error.error.status,
                    message: error.error.message,
                }
                .into());
            }
            return Err(ChatApiError::Api {
                status: status.to_string(),
                message: body,
            }
            .into());
        }

        if self.config.log_exchanges {
            tracing::info!(target: "chat.exchange", response = %body, "chat response");
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&body).context("Failed to parse chat response")?;

        let reply = extract_reply(parsed)
            .ok_or_else(|| anyhow::anyhow!("Chat response contained no candidates"))?;

        if self.config.log_exchanges {
            if let Some(log) = &self.exchange_log {
                let request_value =
                    serde_json::to_value(request).context("Failed to serialize request")?;
                let response_value: serde_json::Value =
                    serde_json::from_str(&body).context("Failed to parse response body")?;
                log.append(&self.config.model, &request_value, &response_value)?;
            }
        }

        Ok(reply)
    }
}

#[async_trait]
impl ChatProvider for GeminiChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = self.build_request(messages);

        if self.config.log_exchanges {
            let request_json =
                serde_json::to_string(&request).context("Failed to serialize chat request")?;
            tracing::info!(target: "chat.exchange", request = %request_json, "chat request");
        }

        let mut attempt = 0;
        loop {
            {
                let mut pacer = self.pacer.lock().await;
                pacer.pace().await;
            }

            match self.send(&request).await {
                Ok(reply) => return Ok(reply),
                Err(e)
                    if matches!(
                        e.downcast_ref::<ChatApiError>(),
                        Some(ChatApiError::RateLimited)
                    ) =>
                {
                    if attempt >= api::MAX_RETRIES {
                        return Err(e.context(format!(
                            "Chat request still rate limited after {} retries",
                            api::MAX_RETRIES
                        )));
                    }
                    let backoff = api::backoff_delay(attempt);
                    tracing::warn!(
                        "Rate limit hit (429), backing off {:?} (attempt {}/{})",
                        backoff,
                        attempt + 1,
                        api::MAX_RETRIES
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn name(&self) -> &str {
        &self.config.model
    }
}

// ============================================================================
// Tests
// ============================================================================
