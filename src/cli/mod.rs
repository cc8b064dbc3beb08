//! CLI module - the five RAG demo pipelines.
//!
//! Every subcommand assembles its pipeline (load, split, embed, store,
//! retrieve, route) and then drops into the same blocking stdin loop.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use crate::api::has_api_key;
use crate::assistant::{Assistant, RetrievalAugmentor};
use crate::chat::{default_log_path, ChatConfig, ChatProvider, ExchangeLog, GeminiChat};
use crate::document::load_document;
use crate::embedding::{EmbeddingProvider, EmbeddingTask, GeminiEmbedding};
use crate::retriever::{ContentRetriever, EmbeddingRetriever, RetrieverConfig, WebSearchRetriever};
use crate::router::{LlmRouter, PassthroughRouter, TopicGateRouter};
use crate::search::{has_tavily_key, PageReader, TavilyClient};
use crate::splitter::{RecursiveSplitter, TextSplitter};
use crate::store::{InMemoryStore, TextSegment};

/// Messages kept in the chat window.
const CHAT_WINDOW: usize = 10;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "rag-playground")]
#[command(version, about = "RAG pipeline demos against the Gemini API", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Naive RAG over one document
    Naive {
        /// Source document (PDF or plain text)
        #[arg(short, long, default_value = "docs/rag.pdf")]
        document: PathBuf,

        /// Passages injected per question
        #[arg(short = 'k', long, default_value = "2")]
        top_k: usize,

        /// Chat sampling temperature
        #[arg(short, long, default_value = "0.3")]
        temperature: f32,
    },

    /// Naive RAG with chat request/response logging
    Logged {
        /// Source document (PDF or plain text)
        #[arg(short, long, default_value = "docs/rag.pdf")]
        document: PathBuf,

        /// Passages injected per question
        #[arg(short = 'k', long, default_value = "2")]
        top_k: usize,

        /// Chat sampling temperature
        #[arg(short, long, default_value = "0.3")]
        temperature: f32,

        /// JSONL exchange log file (defaults to the user data dir)
        #[arg(long)]
        log_file: Option<PathBuf>,
    },

    /// Route between two documents with an LLM classifier
    Routed {
        /// Document about AI / retrieval-augmented generation
        #[arg(long, default_value = "docs/rag.pdf")]
        ai_document: PathBuf,

        /// Unrelated document
        #[arg(long, default_value = "docs/other.pdf")]
        other_document: PathBuf,

        /// Passages injected per question and source
        #[arg(short = 'k', long, default_value = "2")]
        top_k: usize,

        /// Chat sampling temperature
        #[arg(short, long, default_value = "0.3")]
        temperature: f32,
    },

    /// Skip retrieval entirely for off-topic questions
    Gated {
        /// Source document (PDF or plain text)
        #[arg(short, long, default_value = "docs/rag.pdf")]
        document: PathBuf,

        /// Topic the retrieval gate checks questions against
        #[arg(long, default_value = "artificial intelligence")]
        topic: String,

        /// Passages injected per question
        #[arg(short = 'k', long, default_value = "3")]
        top_k: usize,

        /// Chat sampling temperature
        #[arg(short, long, default_value = "0.2")]
        temperature: f32,
    },

    /// Combine the document retriever with Tavily web search
    Websearch {
        /// Source document (PDF or plain text)
        #[arg(short, long, default_value = "docs/rag.pdf")]
        document: PathBuf,

        /// Passages injected per question and source
        #[arg(short = 'k', long, default_value = "3")]
        top_k: usize,

        /// Chat sampling temperature
        #[arg(short, long, default_value = "0.2")]
        temperature: f32,

        /// Fetch full page text for web hits instead of snippets
        #[arg(long)]
        fetch_pages: bool,
    },

    /// Show configuration status
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// Run a parsed command.
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Naive {
            document,
            top_k,
            temperature,
        } => cmd_naive(document, top_k, temperature).await,
        Commands::Logged {
            document,
            top_k,
            temperature,
            log_file,
        } => cmd_logged(document, top_k, temperature, log_file).await,
        Commands::Routed {
            ai_document,
            other_document,
            top_k,
            temperature,
        } => cmd_routed(ai_document, other_document, top_k, temperature).await,
        Commands::Gated {
            document,
            topic,
            top_k,
            temperature,
        } => cmd_gated(document, topic, top_k, temperature).await,
        Commands::Websearch {
            document,
            top_k,
            temperature,
            fetch_pages,
        } => cmd_websearch(document, top_k, temperature, fetch_pages).await,
        Commands::Status => cmd_status(),
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

/// Naive RAG. One document, top-k passages above 0.5 similarity.
async fn cmd_naive(document: PathBuf, top_k: usize, temperature: f32) -> Result<()> {
    ensure_gemini_key()?;

    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(GeminiEmbedding::from_env()?);
    let retriever = index_document(
        &document,
        embedder,
        RetrieverConfig {
            max_results: top_k,
            min_score: 0.5,
        },
        "document",
        "The indexed source document.",
    )
    .await?;

    let chat = Arc::new(GeminiChat::from_env(ChatConfig {
        temperature,
        ..Default::default()
    })?);

    let augmentor = RetrievalAugmentor::new(Box::new(PassthroughRouter::new(vec![retriever])));
    let assistant = Assistant::new(chat, CHAT_WINDOW).with_augmentor(augmentor);

    repl("Naive RAG ready - type 'exit' to quit", assistant).await
}

/// Same pipeline as `naive`, with full request/response logging.
async fn cmd_logged(
    document: PathBuf,
    top_k: usize,
    temperature: f32,
    log_file: Option<PathBuf>,
) -> Result<()> {
    ensure_gemini_key()?;

    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(GeminiEmbedding::from_env()?);
    let retriever = index_document(
        &document,
        embedder,
        RetrieverConfig {
            max_results: top_k,
            min_score: 0.5,
        },
        "document",
        "The indexed source document.",
    )
    .await?;

    let log_path = log_file.unwrap_or_else(default_log_path);
    let exchange_log = Arc::new(
        ExchangeLog::open(&log_path).context("Failed to open exchange log")?,
    );
    println!("[*] Logging chat exchanges to {}", log_path.display());

    let chat = Arc::new(
        GeminiChat::from_env(ChatConfig {
            temperature,
            log_exchanges: true,
            ..Default::default()
        })?
        .with_exchange_log(exchange_log),
    );

    let augmentor = RetrievalAugmentor::new(Box::new(PassthroughRouter::new(vec![retriever])));
    let assistant = Assistant::new(chat, CHAT_WINDOW).with_augmentor(augmentor);

    repl("Logged RAG ready - type 'exit' to quit", assistant).await
}

/// Two documents, LLM classifier picks the source(s) per question.
async fn cmd_routed(
    ai_document: PathBuf,
    other_document: PathBuf,
    top_k: usize,
    temperature: f32,
) -> Result<()> {
    ensure_gemini_key()?;

    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(GeminiEmbedding::from_env()?);

    let ai_retriever = index_document(
        &ai_document,
        embedder.clone(),
        RetrieverConfig {
            max_results: top_k,
            min_score: 0.5,
        },
        "ai-docs",
        "A document about retrieval-augmented generation, AI, embeddings, and retrieval.",
    )
    .await?;

    let other_retriever = index_document(
        &other_document,
        embedder,
        RetrieverConfig {
            max_results: top_k,
            min_score: 0.5,
        },
        "other-docs",
        "A general reference document on a non-AI subject.",
    )
    .await?;

    let chat = Arc::new(GeminiChat::from_env(ChatConfig {
        temperature,
        log_exchanges: true,
        ..Default::default()
    })?);
    let provider: Arc<dyn ChatProvider> = chat.clone();

    let router = LlmRouter::new(provider, vec![ai_retriever, other_retriever]);
    let augmentor = RetrievalAugmentor::new(Box::new(router));
    let assistant = Assistant::new(chat, CHAT_WINDOW).with_augmentor(augmentor);

    repl("Routed RAG ready - type 'exit' to quit", assistant).await
}

/// The topic gate skips retrieval for off-topic questions.
async fn cmd_gated(
    document: PathBuf,
    topic: String,
    top_k: usize,
    temperature: f32,
) -> Result<()> {
    ensure_gemini_key()?;

    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(GeminiEmbedding::from_env()?);
    let retriever = index_document(
        &document,
        embedder,
        RetrieverConfig {
            max_results: top_k,
            min_score: 0.0,
        },
        "document",
        "The indexed source document.",
    )
    .await?;

    let chat = Arc::new(GeminiChat::from_env(ChatConfig {
        temperature,
        log_exchanges: true,
        ..Default::default()
    })?);
    let provider: Arc<dyn ChatProvider> = chat.clone();

    let router = TopicGateRouter::new(provider, retriever, topic);
    let augmentor = RetrievalAugmentor::new(Box::new(router));
    let assistant = Assistant::new(chat, CHAT_WINDOW).with_augmentor(augmentor);

    repl("Gated RAG ready - type 'exit' to quit", assistant).await
}

/// Document retrieval plus web search, always both.
async fn cmd_websearch(
    document: PathBuf,
    top_k: usize,
    temperature: f32,
    fetch_pages: bool,
) -> Result<()> {
    ensure_gemini_key()?;
    ensure_tavily_key()?;

    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(GeminiEmbedding::from_env()?);
    let doc_retriever = index_document(
        &document,
        embedder,
        RetrieverConfig {
            max_results: top_k,
            min_score: 0.0,
        },
        "document",
        "The indexed source document.",
    )
    .await?;

    let mut web_retriever =
        WebSearchRetriever::new(TavilyClient::from_env()?, top_k, "Live web search results.");
    if fetch_pages {
        web_retriever = web_retriever.with_page_reader(PageReader::new()?);
    }

    let chat = Arc::new(GeminiChat::from_env(ChatConfig {
        temperature,
        log_exchanges: true,
        ..Default::default()
    })?);

    let router = PassthroughRouter::new(vec![doc_retriever, Arc::new(web_retriever)]);
    let augmentor = RetrievalAugmentor::new(Box::new(router));
    let assistant = Assistant::new(chat, CHAT_WINDOW).with_augmentor(augmentor);

    repl(
        "Hybrid RAG ready (document + web) - type 'exit' to quit",
        assistant,
    )
    .await
}

/// Status: version, configured keys, log location.
fn cmd_status() -> Result<()> {
    println!("rag-playground v{}", env!("CARGO_PKG_VERSION"));
    println!();

    if has_api_key() {
        println!("[OK] Gemini API key: set");
    } else {
        println!("[!] Gemini API key: not set");
        println!("    Set: export GEMINI_API_KEY=your-key");
    }

    if has_tavily_key() {
        println!("[OK] Tavily API key: set");
    } else {
        println!("[!] Tavily API key: not set (required for `websearch`)");
        println!("    Set: export TAVILY_API_KEY=your-key");
    }

    println!(
        "[*] Default exchange log: {}",
        default_log_path().display()
    );

    Ok(())
}

// ============================================================================
// Pipeline Assembly
// ============================================================================

/// Load, split, embed, and index one document; return its retriever.
async fn index_document(
    path: &std::path::Path,
    embedder: Arc<dyn EmbeddingProvider>,
    config: RetrieverConfig,
    name: &str,
    description: &str,
) -> Result<Arc<dyn ContentRetriever>> {
    println!("[*] Loading {}", path.display());
    let document = load_document(path)
        .with_context(|| format!("Failed to load document: {}", path.display()))?;

    let splitter = RecursiveSplitter::with_defaults();
    let chunks = splitter.split(&document.text);
    if chunks.is_empty() {
        bail!("No segments produced from {}", path.display());
    }

    println!("[*] Embedding {} segments...", chunks.len());
    let embeddings = embedder
        .embed_batch(&chunks, EmbeddingTask::Document)
        .await
        .context("Failed to embed document segments")?;

    let segments = chunks
        .into_iter()
        .map(|text| TextSegment {
            text,
            source: document.source.clone(),
        })
        .collect();

    let mut store = InMemoryStore::new();
    store.add_batch(segments, embeddings)?;
    println!("[OK] Indexed {} segments from {}", store.len(), document.source);

    Ok(Arc::new(EmbeddingRetriever::new(
        Arc::new(store),
        embedder,
        config,
        name,
        description,
    )))
}

// ============================================================================
// REPL
// ============================================================================

/// Blocking question loop over stdin.
async fn repl(banner: &str, mut assistant: Assistant) -> Result<()> {
    println!();
    println!("{}", banner);

    let stdin = io::stdin();
    loop {
        print!("Question: ");
        io::stdout().flush().context("Failed to flush stdout")?;

        let mut line = String::new();
        let read = stdin
            .read_line(&mut line)
            .context("Failed to read from stdin")?;
        if read == 0 {
            // EOF
            break;
        }

        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question.eq_ignore_ascii_case("exit") {
            break;
        }

        match assistant.ask(question).await {
            Ok(reply) => println!("\n{}\n", reply),
            Err(e) => eprintln!("[!] {:#}", e),
        }
    }

    Ok(())
}

// ============================================================================
// Key Checks
// ============================================================================

fn ensure_gemini_key() -> Result<()> {
    if !has_api_key() {
        bail!(
            "Gemini API key not set.\n\n\
             Set it with:\n  \
             export GEMINI_API_KEY=your-api-key\n  \
             or\n  \
             export GOOGLE_AI_API_KEY=your-api-key\n\n\
             Get your API key at: https://aistudio.google.com/app/apikey"
        );
    }
    Ok(())
}

fn ensure_tavily_key() -> Result<()> {
    if !has_tavily_key() {
        bail!(
            "Tavily API key not set.\n\n\
             Set it with:\n  \
             export TAVILY_API_KEY=your-api-key\n\n\
             Get your API key at: https://app.tavily.com"
        );
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_parse_naive_with_document() {
        let cli = Cli::try_parse_from(["rag-playground", "naive", "--document", "notes.txt"])
            .expect("parse");
        match cli.command {
            Commands::Naive {
                document,
                top_k,
                temperature,
            } => {
                assert_eq!(document, PathBuf::from("notes.txt"));
                assert_eq!(top_k, 2);
                assert!((temperature - 0.3).abs() < f32::EPSILON);
            }
            _ => panic!("expected naive"),
        }
    }

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::try_parse_from(["rag-playground", "gated"]).expect("parse");
        match cli.command {
            Commands::Gated {
                document,
                topic,
                top_k,
                temperature,
            } => {
                assert_eq!(document, PathBuf::from("docs/rag.pdf"));
                assert_eq!(topic, "artificial intelligence");
                assert_eq!(top_k, 3);
                assert!((temperature - 0.2).abs() < f32::EPSILON);
            }
            _ => panic!("expected gated"),
        }
    }

    #[test]
    fn test_parse_routed_documents() {
        let cli = Cli::try_parse_from([
            "rag-playground",
            "routed",
            "--ai-document",
            "a.pdf",
            "--other-document",
            "b.pdf",
        ])
        .expect("parse");
        match cli.command {
            Commands::Routed {
                ai_document,
                other_document,
                ..
            } => {
                assert_eq!(ai_document, PathBuf::from("a.pdf"));
                assert_eq!(other_document, PathBuf::from("b.pdf"));
            }
            _ => panic!("expected routed"),
        }
    }

    #[test]
    fn test_parse_tuning_overrides() {
        let cli = Cli::try_parse_from([
            "rag-playground",
            "websearch",
            "--top-k",
            "5",
            "--temperature",
            "0.7",
        ])
        .expect("parse");
        match cli.command {
            Commands::Websearch {
                top_k, temperature, ..
            } => {
                assert_eq!(top_k, 5);
                assert!((temperature - 0.7).abs() < f32::EPSILON);
            }
            _ => panic!("expected websearch"),
        }
    }

    #[test]
    fn test_parse_websearch_flag() {
        let cli = Cli::try_parse_from(["rag-playground", "websearch", "--fetch-pages"])
            .expect("parse");
        match cli.command {
            Commands::Websearch { fetch_pages, .. } => assert!(fetch_pages),
            _ => panic!("expected websearch"),
        }
    }

    #[test]
    fn test_unknown_subcommand_is_rejected() {
        let err = Cli::try_parse_from(["rag-playground", "frobnicate"])
            .expect_err("should not parse");
        assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
    }
}
