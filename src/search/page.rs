//! Readable-text extraction for web search hits.

use anyhow::{Context, Result};
use scraper::{Html, Selector};

/// Content selectors, most specific first.
const CONTENT_SELECTORS: [&str; 6] = [
    "article",
    "main",
    "[role=main]",
    ".content",
    "#content",
    "body",
];

/// Fetches a hit URL and extracts its readable text.
pub struct PageReader {
    client: reqwest::Client,
    /// Extracted text is cut off here to keep prompts bounded.
    max_chars: usize,
}

impl PageReader {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("rag-playground/", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            max_chars: 4000,
        })
    }

    /// Fetch a page and return its readable text.
    pub async fn read(&self, url: &str) -> Result<String> {
        let url = url::Url::parse(url).with_context(|| format!("Invalid URL: {}", url))?;

        tracing::debug!("Fetching page: {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("Failed to fetch page: {}", url))?;

        if !response.status().is_success() {
            anyhow::bail!("Page fetch failed ({}): {}", response.status(), url);
        }

        let html = response
            .text()
            .await
            .context("Failed to read page body")?;

        let text = extract_readable(&html);
        Ok(truncate_chars(&text, self.max_chars))
    }
}

/// Extract the main readable text from an HTML document.
///
/// Tries progressively broader containers; a candidate under 100 characters
/// is assumed to be navigation chrome and skipped.
fn extract_readable(html: &str) -> String {
    let document = Html::parse_document(html);

    for selector_str in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some(element) = document.select(&selector).next() {
            let text = collect_text(&element);
            if text.len() > 100 {
                return text;
            }
        }
    }

    // Tiny pages: settle for whatever the body has.
    if let Ok(selector) = Selector::parse("body") {
        if let Some(element) = document.select(&selector).next() {
            return collect_text(&element);
        }
    }

    String::new()
}

/// Join an element's text nodes, collapsing runs of whitespace.
fn collect_text(element: &scraper::ElementRef) -> String {
    let raw = element.text().collect::<Vec<_>>().join(" ");

    match regex::Regex::new(r"\s+") {
        Ok(re) => re.replace_all(&raw, " ").trim().to_string(),
        Err(_) => raw.split_whitespace().collect::<Vec<_>>().join(" "),
    }
}

/// UTF-8 safe character truncation.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
