//! Chat assistant - retrieval augmentation plus windowed memory.

use std::sync::Arc;

use anyhow::Result;
use futures::future::join_all;

use crate::chat::{ChatMessage, ChatProvider};
use crate::memory::MessageWindowMemory;
use crate::retriever::Content;
use crate::router::QueryRouter;

// ============================================================================
// RetrievalAugmentor
// ============================================================================

/// Routes a query and collects passages from the selected retrievers.
pub struct RetrievalAugmentor {
    router: Box<dyn QueryRouter>,
}

impl RetrievalAugmentor {
    pub fn new(router: Box<dyn QueryRouter>) -> Self {
        Self { router }
    }

    /// Passages for a query, in retriever order.
    ///
    /// Retrievers are queried concurrently. A failing retriever is logged
    /// and skipped rather than failing the whole turn; web search flakiness
    /// should not take the document arm down with it.
    pub async fn augment(&self, query: &str) -> Result<Vec<Content>> {
        let retrievers = self.router.route(query).await?;
        if retrievers.is_empty() {
            return Ok(vec![]);
        }

        let outcomes = join_all(retrievers.iter().map(|r| r.retrieve(query))).await;

        let mut contents = Vec::new();
        for (retriever, outcome) in retrievers.iter().zip(outcomes) {
            match outcome {
                Ok(mut retrieved) => {
                    tracing::debug!(
                        retriever = %retriever.name(),
                        passages = retrieved.len(),
                        "retrieved"
                    );
                    contents.append(&mut retrieved);
                }
                Err(e) => {
                    tracing::warn!(retriever = %retriever.name(), "retrieval failed: {:#}", e);
                }
            }
        }

        Ok(contents)
    }
}

// ============================================================================
// Assistant
// ============================================================================

/// Conversational assistant over a chat provider.
///
/// Each turn: route and retrieve, inject the passages beneath the question,
/// append to the window, send the whole window, record the reply.
pub struct Assistant {
    chat: Arc<dyn ChatProvider>,
    memory: MessageWindowMemory,
    augmentor: Option<RetrievalAugmentor>,
}

impl Assistant {
    pub fn new(chat: Arc<dyn ChatProvider>, max_messages: usize) -> Self {
        Self {
            chat,
            memory: MessageWindowMemory::new(max_messages),
            augmentor: None,
        }
    }

    pub fn with_augmentor(mut self, augmentor: RetrievalAugmentor) -> Self {
        self.augmentor = Some(augmentor);
        self
    }

    /// Answer one user question.
    pub async fn ask(&mut self, question: &str) -> Result<String> {
        let contents = match &self.augmentor {
            Some(augmentor) => augmentor.augment(question).await?,
            None => vec![],
        };

        let message = inject_contents(question, &contents);
        self.memory.push(ChatMessage::user(message));

        let reply = self.chat.complete(&self.memory.messages()).await?;
        self.memory.push(ChatMessage::model(reply.clone()));

        Ok(reply)
    }

    pub fn memory(&self) -> &MessageWindowMemory {
        &self.memory
    }
}

/// Append retrieved passages beneath the question.
///
/// With no passages the question goes through untouched, so a closed
/// retrieval gate degrades to plain chat.
fn inject_contents(question: &str, contents: &[Content]) -> String {
    if contents.is_empty() {
        return question.to_string();
    }

    let mut message = String::from(question);
    message.push_str("\n\nAnswer using the following information:");
    for content in contents {
        message.push_str("\n\n");
        message.push_str(&content.text);
    }
    message
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::retriever::ContentRetriever;
    use crate::router::{PassthroughRouter, SharedRetriever};

    /// Chat provider that records what it was sent.
    struct RecordingChat {
        reply: String,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl RecordingChat {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                seen: Mutex::new(vec![]),
            })
        }

        fn last_window(&self) -> Vec<ChatMessage> {
            self.seen
                .lock()
                .expect("lock")
                .last()
                .cloned()
                .expect("at least one call")
        }
    }

    #[async_trait]
    impl ChatProvider for RecordingChat {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
            self.seen.lock().expect("lock").push(messages.to_vec());
            Ok(self.reply.clone())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    struct FixedRetriever {
        passage: &'static str,
    }

    impl FixedRetriever {
        fn shared(passage: &'static str) -> SharedRetriever {
            Arc::new(Self { passage })
        }
    }

    #[async_trait]
    impl ContentRetriever for FixedRetriever {
        async fn retrieve(&self, _query: &str) -> Result<Vec<Content>> {
            Ok(vec![Content {
                text: self.passage.to_string(),
                source: "fixture".to_string(),
                score: Some(1.0),
            }])
        }

        fn name(&self) -> &str {
            "fixed"
        }

        fn description(&self) -> &str {
            "fixture passages"
        }
    }

    struct FailingRetriever;

    #[async_trait]
    impl ContentRetriever for FailingRetriever {
        async fn retrieve(&self, _query: &str) -> Result<Vec<Content>> {
            anyhow::bail!("boom")
        }

        fn name(&self) -> &str {
            "failing"
        }

        fn description(&self) -> &str {
            "always fails"
        }
    }

    fn augmentor_over(retrievers: Vec<SharedRetriever>) -> RetrievalAugmentor {
        RetrievalAugmentor::new(Box::new(PassthroughRouter::new(retrievers)))
    }

    #[test]
    fn test_inject_without_contents() {
        assert_eq!(inject_contents("plain question", &[]), "plain question");
    }

    #[test]
    fn test_inject_with_contents() {
        let contents = vec![
            Content {
                text: "passage one".to_string(),
                source: "a".to_string(),
                score: None,
            },
            Content {
                text: "passage two".to_string(),
                source: "b".to_string(),
                score: None,
            },
        ];

        let message = inject_contents("what is RAG?", &contents);
        assert!(message.starts_with("what is RAG?"));
        assert!(message.contains("Answer using the following information:"));
        assert!(message.contains("passage one"));
        assert!(message.contains("passage two"));
    }

    #[tokio::test]
    async fn test_ask_injects_and_records_memory() {
        let chat = RecordingChat::new("an answer");
        let mut assistant = Assistant::new(chat.clone(), 10)
            .with_augmentor(augmentor_over(vec![FixedRetriever::shared("ctx passage")]));

        let reply = assistant.ask("what is RAG?").await.expect("ask");
        assert_eq!(reply, "an answer");

        // The model saw the augmented question.
        let window = chat.last_window();
        assert_eq!(window.len(), 1);
        assert!(window[0].content.contains("ctx passage"));

        // Memory holds the question and the reply.
        assert_eq!(assistant.memory().len(), 2);
    }

    #[tokio::test]
    async fn test_ask_without_augmentor_is_plain_chat() {
        let chat = RecordingChat::new("hi");
        let mut assistant = Assistant::new(chat.clone(), 10);

        assistant.ask("hello").await.expect("ask");
        let window = chat.last_window();
        assert_eq!(window[0].content, "hello");
    }

    #[tokio::test]
    async fn test_failing_retriever_does_not_break_the_turn() {
        let chat = RecordingChat::new("still fine");
        let mut assistant = Assistant::new(chat.clone(), 10).with_augmentor(augmentor_over(vec![
            Arc::new(FailingRetriever),
            FixedRetriever::shared("good passage"),
        ]));

        let reply = assistant.ask("anything").await.expect("ask");
        assert_eq!(reply, "still fine");
        assert!(chat.last_window()[0].content.contains("good passage"));
    }

    #[tokio::test]
    async fn test_memory_window_is_bounded_across_turns() {
        let chat = RecordingChat::new("reply");
        let mut assistant = Assistant::new(chat.clone(), 4);

        for i in 0..10 {
            assistant.ask(&format!("question {}", i)).await.expect("ask");
        }

        assert_eq!(assistant.memory().len(), 4);
        let window = chat.last_window();
        assert!(window.len() <= 4);
        // Latest question is always the final user message sent.
        assert!(window.last().expect("window").content.contains("question 9"));
    }
}
