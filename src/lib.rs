//! rag-playground - retrieval-augmented generation demos
//!
//! Five pipelines against the Gemini chat API: naive RAG, RAG with request
//! logging, LLM-routed multi-document retrieval, a retrieval gate that skips
//! RAG for off-topic questions, and hybrid document + web-search retrieval.

pub mod api;
pub mod assistant;
pub mod chat;
pub mod cli;
pub mod document;
pub mod embedding;
pub mod memory;
pub mod retriever;
pub mod router;
pub mod search;
pub mod splitter;
pub mod store;

// Re-exports
pub use api::{get_api_key, has_api_key};
pub use assistant::{Assistant, RetrievalAugmentor};
pub use chat::{
    ChatConfig, ChatMessage, ChatProvider, ChatRole, ExchangeLog, GeminiChat,
};
pub use document::{load_document, Document};
pub use embedding::{
    EmbeddingProvider, EmbeddingTask, GeminiEmbedding, EMBEDDING_DIMENSION,
};
pub use memory::MessageWindowMemory;
pub use retriever::{
    Content, ContentRetriever, EmbeddingRetriever, RetrieverConfig, WebSearchRetriever,
};
pub use router::{LlmRouter, PassthroughRouter, QueryRouter, SharedRetriever, TopicGateRouter};
pub use search::{get_tavily_key, has_tavily_key, PageReader, TavilyClient, WebSearchHit};
pub use splitter::{RecursiveSplitter, SplitConfig, TextSplitter};
pub use store::{cosine_similarity, InMemoryStore, ScoredSegment, TextSegment};
