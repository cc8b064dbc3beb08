//! Query routers - which retrievers to consult for a question.
//!
//! Three strategies: always-everything (`PassthroughRouter`), an LLM
//! classifier over source descriptions (`LlmRouter`), and a yes/no topic
//! gate that can skip retrieval entirely (`TopicGateRouter`).

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::chat::ChatProvider;
use crate::retriever::ContentRetriever;

/// Retriever handle shared between the router and the augmentor.
pub type SharedRetriever = Arc<dyn ContentRetriever>;

// ============================================================================
// QueryRouter Trait
// ============================================================================

/// Picks the retrievers to consult for a query.
#[async_trait]
pub trait QueryRouter: Send + Sync {
    /// Retrievers to query, possibly none.
    async fn route(&self, query: &str) -> Result<Vec<SharedRetriever>>;
}

// ============================================================================
// PassthroughRouter
// ============================================================================

/// Routes every query to every retriever.
pub struct PassthroughRouter {
    retrievers: Vec<SharedRetriever>,
}

impl PassthroughRouter {
    pub fn new(retrievers: Vec<SharedRetriever>) -> Self {
        Self { retrievers }
    }
}

#[async_trait]
impl QueryRouter for PassthroughRouter {
    async fn route(&self, _query: &str) -> Result<Vec<SharedRetriever>> {
        Ok(self.retrievers.clone())
    }
}

// ============================================================================
// LlmRouter
// ============================================================================

/// Routes by asking the chat model which sources match the query.
///
/// Each retriever's description is listed under a number; the model replies
/// with the matching numbers (or `none`). An unparseable reply falls back
/// to every retriever.
pub struct LlmRouter {
    chat: Arc<dyn ChatProvider>,
    retrievers: Vec<SharedRetriever>,
}

impl LlmRouter {
    pub fn new(chat: Arc<dyn ChatProvider>, retrievers: Vec<SharedRetriever>) -> Self {
        Self { chat, retrievers }
    }

    fn build_prompt(&self, query: &str) -> String {
        let mut prompt = String::from(
            "Based on the user query below, decide which of the following data \
             sources should be consulted to answer it.\n\n",
        );

        for (i, retriever) in self.retrievers.iter().enumerate() {
            prompt.push_str(&format!("{}: {}\n", i + 1, retriever.description()));
        }

        prompt.push_str(
            "\nReply with the matching source numbers separated by commas, \
             or the word \"none\" if no source applies.\n\n",
        );
        prompt.push_str(&format!("Query: {}", query));
        prompt
    }
}

#[async_trait]
impl QueryRouter for LlmRouter {
    async fn route(&self, query: &str) -> Result<Vec<SharedRetriever>> {
        let prompt = self.build_prompt(query);
        let reply = self
            .chat
            .complete_text(&prompt)
            .await
            .context("Router classification failed")?;

        match parse_selection(&reply, self.retrievers.len()) {
            Some(indices) => {
                tracing::info!(?indices, reply = %reply.trim(), "router selection");
                Ok(indices
                    .into_iter()
                    .map(|i| self.retrievers[i].clone())
                    .collect())
            }
            None => {
                tracing::warn!(reply = %reply.trim(), "unparseable router reply, querying all sources");
                Ok(self.retrievers.clone())
            }
        }
    }
}

/// Parse a classifier reply into 0-based retriever indices.
///
/// Returns `Some(vec![])` for a `none` reply and `None` when nothing in the
/// reply can be read as a selection.
fn parse_selection(reply: &str, retriever_count: usize) -> Option<Vec<usize>> {
    let normalized = reply.trim().to_lowercase();

    if normalized.contains("none") {
        return Some(vec![]);
    }

    let mut indices = Vec::new();
    for token in normalized.split(|c: char| !c.is_ascii_digit()) {
        if token.is_empty() {
            continue;
        }
        if let Ok(number) = token.parse::<usize>() {
            if (1..=retriever_count).contains(&number) {
                let index = number - 1;
                if !indices.contains(&index) {
                    indices.push(index);
                }
            }
        }
    }

    if indices.is_empty() {
        None
    } else {
        Some(indices)
    }
}

// ============================================================================
// TopicGateRouter
// ============================================================================

/// Skips retrieval for questions outside a topic.
///
/// The chat model is asked whether the query concerns the topic, with the
/// answer constrained to yes / no / maybe. The decision is binary: only a
/// clear "no" routes to zero retrievers; "maybe" (or any other reply) is
/// folded into "yes" and keeps retrieval on. The third prompted option
/// exists to give the model an out that is not "no".
pub struct TopicGateRouter {
    chat: Arc<dyn ChatProvider>,
    retriever: SharedRetriever,
    topic: String,
}

impl TopicGateRouter {
    pub fn new(
        chat: Arc<dyn ChatProvider>,
        retriever: SharedRetriever,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            chat,
            retriever,
            topic: topic.into(),
        }
    }

    fn build_prompt(&self, query: &str) -> String {
        format!(
            "Does the following query concern {}?\n\
             Answer with exactly one word: yes, no, or maybe.\n\n\
             Query: {}",
            self.topic, query
        )
    }
}

#[async_trait]
impl QueryRouter for TopicGateRouter {
    async fn route(&self, query: &str) -> Result<Vec<SharedRetriever>> {
        let prompt = self.build_prompt(query);
        let reply = self
            .chat
            .complete_text(&prompt)
            .await
            .context("Topic gate classification failed")?;

        let verdict = reply.trim().to_lowercase();
        println!("Retrieval gate [{}] -> {}", self.topic, verdict);

        if contains_no_token(&verdict) {
            tracing::info!(topic = %self.topic, "gate closed, skipping retrieval");
            Ok(vec![])
        } else {
            Ok(vec![self.retriever.clone()])
        }
    }
}

/// Whether the reply contains a standalone "no" token.
///
/// A word match, not a substring test: "not" and "know" must not close the
/// gate. Anything without the token, "maybe" included, opens the gate.
fn contains_no_token(reply: &str) -> bool {
    reply
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word.eq_ignore_ascii_case("no"))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatMessage;
    use crate::retriever::Content;

    /// Chat provider with a canned reply.
    struct StaticChat {
        reply: String,
    }

    impl StaticChat {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
            })
        }
    }

    #[async_trait]
    impl ChatProvider for StaticChat {
        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
            Ok(self.reply.clone())
        }

        fn name(&self) -> &str {
            "static"
        }
    }

    /// Retriever that never returns anything.
    struct StubRetriever {
        name: &'static str,
        description: &'static str,
    }

    impl StubRetriever {
        fn shared(name: &'static str, description: &'static str) -> SharedRetriever {
            Arc::new(Self { name, description })
        }
    }

    #[async_trait]
    impl ContentRetriever for StubRetriever {
        async fn retrieve(&self, _query: &str) -> Result<Vec<Content>> {
            Ok(vec![])
        }

        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            self.description
        }
    }

    fn two_stubs() -> Vec<SharedRetriever> {
        vec![
            StubRetriever::shared("ai-docs", "Documents about AI and retrieval."),
            StubRetriever::shared("other-docs", "A general, non-AI document."),
        ]
    }

    #[tokio::test]
    async fn test_passthrough_returns_all() {
        let router = PassthroughRouter::new(two_stubs());
        let selected = router.route("anything").await.expect("route");
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn test_parse_selection_single() {
        assert_eq!(parse_selection("1", 2), Some(vec![0]));
        assert_eq!(parse_selection(" 2 ", 2), Some(vec![1]));
    }

    #[test]
    fn test_parse_selection_multiple() {
        assert_eq!(parse_selection("1, 2", 2), Some(vec![0, 1]));
        assert_eq!(parse_selection("Sources 2 and 1.", 2), Some(vec![1, 0]));
    }

    #[test]
    fn test_parse_selection_none_word() {
        assert_eq!(parse_selection("none", 2), Some(vec![]));
        assert_eq!(parse_selection("None of these apply.", 2), Some(vec![]));
    }

    #[test]
    fn test_parse_selection_out_of_range_and_duplicates() {
        assert_eq!(parse_selection("7", 2), None);
        assert_eq!(parse_selection("1, 1, 2", 2), Some(vec![0, 1]));
    }

    #[test]
    fn test_parse_selection_unparseable() {
        assert_eq!(parse_selection("the first source", 2), None);
    }

    #[tokio::test]
    async fn test_llm_router_selects_by_number() {
        let router = LlmRouter::new(StaticChat::new("2"), two_stubs());
        let selected = router.route("general question").await.expect("route");
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name(), "other-docs");
    }

    #[tokio::test]
    async fn test_llm_router_none_reply_selects_nothing() {
        let router = LlmRouter::new(StaticChat::new("none"), two_stubs());
        let selected = router.route("off-topic").await.expect("route");
        assert!(selected.is_empty());
    }

    #[tokio::test]
    async fn test_llm_router_falls_back_to_all() {
        let router = LlmRouter::new(StaticChat::new("hard to say!"), two_stubs());
        let selected = router.route("ambiguous").await.expect("route");
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn test_llm_router_prompt_lists_descriptions() {
        let router = LlmRouter::new(StaticChat::new(""), two_stubs());
        let prompt = router.build_prompt("what is RAG?");
        assert!(prompt.contains("1: Documents about AI and retrieval."));
        assert!(prompt.contains("2: A general, non-AI document."));
        assert!(prompt.contains("Query: what is RAG?"));
    }

    #[tokio::test]
    async fn test_gate_closed_on_no() {
        for reply in ["no", "No.", "NO", "  no  "] {
            let router = TopicGateRouter::new(
                StaticChat::new(reply),
                StubRetriever::shared("docs", "AI documents"),
                "artificial intelligence",
            );
            let selected = router.route("capital of France?").await.expect("route");
            assert!(selected.is_empty(), "gate should close on {:?}", reply);
        }
    }

    #[tokio::test]
    async fn test_gate_open_on_yes_and_maybe() {
        for reply in ["yes", "maybe", "Yes, it does."] {
            let router = TopicGateRouter::new(
                StaticChat::new(reply),
                StubRetriever::shared("docs", "AI documents"),
                "artificial intelligence",
            );
            let selected = router.route("what is RAG?").await.expect("route");
            assert_eq!(selected.len(), 1, "gate should open on {:?}", reply);
        }
    }

    #[tokio::test]
    async fn test_gate_ignores_no_inside_words() {
        let router = TopicGateRouter::new(
            StaticChat::new("I do not know, maybe."),
            StubRetriever::shared("docs", "AI documents"),
            "artificial intelligence",
        );
        let selected = router.route("unclear question").await.expect("route");
        // "not" and "know" are not the word "no".
        assert_eq!(selected.len(), 1);
    }
}
