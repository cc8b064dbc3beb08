//! Text splitting - recursive character splitter.
//!
//! Splits on paragraph boundaries first, then lines, then words, and only
//! slices raw characters when a single word exceeds the budget. Adjacent
//! pieces are packed back together up to the chunk budget, and a
//! word-boundary overlap is carried between consecutive chunks.

// ============================================================================
// Split Configuration
// ============================================================================

/// Splitter settings.
#[derive(Debug, Clone)]
pub struct SplitConfig {
    /// Maximum chunk size, in characters (before overlap).
    pub max_chars: usize,
    /// Overlap carried from the previous chunk, in characters.
    pub overlap_chars: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            max_chars: 500,
            overlap_chars: 50,
        }
    }
}

// ============================================================================
// TextSplitter Trait
// ============================================================================

/// Text splitting strategy.
pub trait TextSplitter: Send + Sync {
    /// Split text into chunks.
    fn split(&self, text: &str) -> Vec<String>;

    /// Splitter name.
    fn name(&self) -> &'static str;
}

// ============================================================================
// RecursiveSplitter
// ============================================================================

/// Separator hierarchy, coarsest first.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Recursive character splitter.
pub struct RecursiveSplitter {
    config: SplitConfig,
}

impl RecursiveSplitter {
    pub fn new(config: SplitConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(SplitConfig::default())
    }

    /// Split `text` so that no piece exceeds the budget, descending the
    /// separator hierarchy only for oversized pieces.
    fn split_level(&self, text: &str, level: usize) -> Vec<String> {
        if char_count(text) <= self.config.max_chars {
            return vec![text.to_string()];
        }

        let Some(separator) = SEPARATORS.get(level) else {
            return self.slice_chars(text);
        };

        let pieces: Vec<&str> = text.split(separator).collect();
        if pieces.len() == 1 {
            return self.split_level(text, level + 1);
        }

        let mut fitted = Vec::new();
        for piece in pieces {
            if piece.trim().is_empty() {
                continue;
            }
            if char_count(piece) > self.config.max_chars {
                fitted.extend(self.split_level(piece, level + 1));
            } else {
                fitted.push(piece.to_string());
            }
        }

        self.pack(fitted, separator)
    }

    /// Merge adjacent pieces back together up to the budget, re-inserting
    /// the separator they were split on.
    fn pack(&self, pieces: Vec<String>, separator: &str) -> Vec<String> {
        let sep_len = char_count(separator);
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0;

        for piece in pieces {
            let piece_len = char_count(&piece);

            if current.is_empty() {
                current = piece;
                current_len = piece_len;
                continue;
            }

            if current_len + sep_len + piece_len <= self.config.max_chars {
                current.push_str(separator);
                current.push_str(&piece);
                current_len += sep_len + piece_len;
            } else {
                chunks.push(current);
                current = piece;
                current_len = piece_len;
            }
        }

        if !current.is_empty() {
            chunks.push(current);
        }

        chunks
    }

    /// Last resort: slice an unbreakable run into raw character windows.
    fn slice_chars(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        chars
            .chunks(self.config.max_chars.max(1))
            .map(|window| window.iter().collect())
            .collect()
    }

    /// Prefix every chunk after the first with the tail of its predecessor.
    fn apply_overlap(&self, chunks: Vec<String>) -> Vec<String> {
        if self.config.overlap_chars == 0 || chunks.len() < 2 {
            return chunks;
        }

        let mut result = Vec::with_capacity(chunks.len());
        result.push(chunks[0].clone());

        for i in 1..chunks.len() {
            let tail = overlap_tail(&chunks[i - 1], self.config.overlap_chars);
            if tail.is_empty() {
                result.push(chunks[i].clone());
            } else {
                result.push(format!("{} {}", tail, chunks[i]));
            }
        }

        result
    }
}

impl TextSplitter for RecursiveSplitter {
    fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return vec![];
        }

        let chunks = self.split_level(text, 0);

        let mut chunks: Vec<String> = chunks
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();

        chunks = self.apply_overlap(chunks);
        chunks
    }

    fn name(&self) -> &'static str {
        "RecursiveSplitter"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

#[inline]
fn char_count(s: &str) -> usize {
    s.chars().count()
}

/// Last `overlap_chars` characters of `text`, advanced to the next word
/// boundary so the overlap never starts mid-word.
fn overlap_tail(text: &str, overlap_chars: usize) -> &str {
    let total = char_count(text);
    if total <= overlap_chars {
        return text.trim();
    }

    let start = text
        .char_indices()
        .nth(total - overlap_chars)
        .map(|(i, _)| i)
        .unwrap_or(0);

    let window = &text[start..];
    match window.find(char::is_whitespace) {
        Some(pos) => window[pos..].trim(),
        None => window.trim(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn no_overlap(max_chars: usize) -> RecursiveSplitter {
        RecursiveSplitter::new(SplitConfig {
            max_chars,
            overlap_chars: 0,
        })
    }

    #[test]
    fn test_empty_input() {
        let splitter = RecursiveSplitter::with_defaults();
        assert!(splitter.split("").is_empty());
        assert!(splitter.split("   \n\n  ").is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let splitter = RecursiveSplitter::with_defaults();
        let chunks = splitter.split("One short paragraph.");
        assert_eq!(chunks, vec!["One short paragraph.".to_string()]);
    }

    #[test]
    fn test_paragraphs_packed_up_to_budget() {
        let splitter = no_overlap(50);
        let text = "First paragraph.\n\nSecond one.\n\nThird paragraph here.";
        let chunks = splitter.split(text);

        // Everything fits in two 50-char chunks; paragraph breaks survive
        // inside a packed chunk.
        assert!(chunks.len() >= 2);
        assert!(chunks[0].contains("First paragraph."));
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 50);
        }
    }

    #[test]
    fn test_long_paragraph_splits_at_words() {
        let splitter = no_overlap(40);
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let chunks = splitter.split(text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 40);
            // Word boundaries preserved.
            assert!(!chunk.starts_with(' ') && !chunk.ends_with(' '));
        }
        assert_eq!(chunks.join(" "), text);
    }

    #[test]
    fn test_unbreakable_word_sliced() {
        let splitter = no_overlap(10);
        let text = "a".repeat(25);
        let chunks = splitter.split(&text);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chars().count(), 10);
        assert_eq!(chunks[2].chars().count(), 5);
    }

    #[test]
    fn test_overlap_carried_between_chunks() {
        let splitter = RecursiveSplitter::new(SplitConfig {
            max_chars: 30,
            overlap_chars: 12,
        });
        let text = "the quick brown fox jumps over the lazy dog near the river bank";
        let chunks = splitter.split(text);

        assert!(chunks.len() > 1);
        // The second chunk starts with words from the end of the first.
        let first_tail_word = chunks[0]
            .split_whitespace()
            .last()
            .expect("first chunk has words");
        assert!(chunks[1].contains(first_tail_word));
    }

    #[test]
    fn test_multibyte_text_is_boundary_safe() {
        let splitter = RecursiveSplitter::new(SplitConfig {
            max_chars: 12,
            overlap_chars: 4,
        });
        let text = "génération augmentée par récupération de données était là";
        let chunks = splitter.split(text);

        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(!chunk.is_empty());
        }
    }

    #[test]
    fn test_overlap_tail_word_boundary() {
        let tail = overlap_tail("alpha beta gamma", 7);
        // 7 chars back lands inside "beta gamma"; advancing to the next
        // word boundary leaves "gamma".
        assert_eq!(tail, "gamma");
    }

    #[test]
    fn test_overlap_tail_short_text() {
        assert_eq!(overlap_tail("tiny", 50), "tiny");
    }

    #[test]
    fn test_default_config_matches_pipeline() {
        let config = SplitConfig::default();
        assert_eq!(config.max_chars, 500);
        assert_eq!(config.overlap_chars, 50);
    }
}
