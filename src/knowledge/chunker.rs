//! Text Chunking Module
//!
//! Recursive character splitter: try the coarsest separator first
//! (markdown headers), fall back to paragraphs, lines, sentences, words and
//! finally raw characters until every piece fits. Neighbouring chunks share
//! up to `chunk_overlap` characters.

use std::collections::VecDeque;

/// Separators in priority order
pub const DEFAULT_SEPARATORS: [&str; 6] = ["\n## ", "\n### ", "\n\n", "\n", ". ", " "];

// ============================================================================
// Chunk Configuration
// ============================================================================

#[derive(Debug, Clone)]
pub struct ChunkConfig {
    /// Maximum chunk length (characters)
    pub chunk_size: usize,
    /// Characters shared with the previous chunk
    pub chunk_overlap: usize,
    pub separators: Vec<String>,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 150,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ChunkConfig {
    pub fn with_size(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap: chunk_overlap.min(chunk_size.saturating_sub(1)),
            ..Self::default()
        }
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// Text chunking strategy
pub trait Chunker: Send + Sync {
    fn chunk(&self, text: &str) -> Vec<String>;

    fn name(&self) -> &'static str;
}

// ============================================================================
// RecursiveChunker
// ============================================================================

pub struct RecursiveChunker {
    config: ChunkConfig,
}

impl RecursiveChunker {
    pub fn new(config: ChunkConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(ChunkConfig::default())
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut final_chunks = Vec::new();

        // First separator present in the text; the rest are for oversized pieces
        let found = separators
            .iter()
            .position(|sep| !sep.is_empty() && text.contains(sep.as_str()));
        let (splits, remaining) = match found {
            Some(i) => (split_keep(text, &separators[i]), &separators[i + 1..]),
            None => (vec![text.to_string()], &separators[separators.len()..]),
        };

        let mut good: Vec<String> = Vec::new();
        for piece in splits {
            if char_len(&piece) < self.config.chunk_size {
                good.push(piece);
                continue;
            }

            if !good.is_empty() {
                final_chunks.extend(self.merge_splits(&good));
                good.clear();
            }

            if remaining.is_empty() {
                final_chunks.extend(hard_split(&piece, self.config.chunk_size));
            } else {
                final_chunks.extend(self.split_recursive(&piece, remaining));
            }
        }

        if !good.is_empty() {
            final_chunks.extend(self.merge_splits(&good));
        }

        final_chunks
    }

    /// Greedily pack small pieces, carrying a tail of up to `chunk_overlap`
    /// characters into the next chunk
    fn merge_splits(&self, splits: &[String]) -> Vec<String> {
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in splits {
            let len = char_len(piece);

            if total + len > size && !current.is_empty() {
                push_trimmed(&mut docs, current.iter().copied().collect::<String>());

                while total > overlap || (total + len > size && total > 0) {
                    match current.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }

            current.push_back(piece);
            total += len;
        }

        push_trimmed(&mut docs, current.iter().copied().collect::<String>());
        docs
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return vec![];
        }
        self.split_recursive(text, &self.config.separators)
    }

    fn name(&self) -> &'static str {
        "RecursiveChunker"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

#[inline]
fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Split keeping the separator at the start of each following piece
fn split_keep(text: &str, separator: &str) -> Vec<String> {
    let mut parts = text.split(separator);
    let mut out = Vec::new();

    if let Some(first) = parts.next() {
        out.push(first.to_string());
    }
    for part in parts {
        out.push(format!("{}{}", separator, part));
    }

    out.retain(|s| !s.is_empty());
    out
}

/// Last resort: cut by character count
fn hard_split(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = Vec::new();
    for window in chars.chunks(size.max(1)) {
        push_trimmed(&mut out, window.iter().collect());
    }
    out
}

fn push_trimmed(out: &mut Vec<String>, chunk: String) {
    let trimmed = chunk.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

// ============================================================================
// Factory Functions
// ============================================================================

/// Default chunker (800 / 150)
pub fn default_chunker() -> Box<dyn Chunker> {
    Box::new(RecursiveChunker::with_defaults())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunker_empty() {
        let chunker = RecursiveChunker::with_defaults();
        assert!(chunker.chunk("").is_empty());
        assert!(chunker.chunk("   \n ").is_empty());
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunker = RecursiveChunker::with_defaults();
        let chunks = chunker.chunk("# Titre\n\nCourt paragraphe.");
        assert_eq!(chunks, vec!["# Titre\n\nCourt paragraphe.".to_string()]);
    }

    #[test]
    fn test_split_keep() {
        assert_eq!(
            split_keep("a\n## b\n## c", "\n## "),
            vec!["a", "\n## b", "\n## c"]
        );
        assert_eq!(split_keep("abc", "x"), vec!["abc"]);
    }

    #[test]
    fn test_prefers_header_boundaries() {
        let chunker = RecursiveChunker::new(ChunkConfig::with_size(60, 0));
        let text = "# Doc\n## Section A\nTexte de la section A.\n## Section B\nTexte de la section B.";
        let chunks = chunker.chunk(text);

        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].contains("Section A"));
        assert!(chunks[1].starts_with("## Section B"));
    }

    #[test]
    fn test_chunks_respect_size_and_overlap() {
        let chunker = RecursiveChunker::with_defaults();
        let text: String = (0..600).map(|i| format!("mot{} ", i)).collect();
        let chunks = chunker.chunk(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(char_len(chunk) <= 800);
        }

        // The next chunk starts with words carried over from the previous one
        let first_word = chunks[1].split_whitespace().next().unwrap();
        assert!(chunks[0].contains(first_word));
    }

    #[test]
    fn test_hard_split_multibyte() {
        let chunker = RecursiveChunker::new(ChunkConfig::with_size(4, 0));
        let chunks = chunker.chunk("éééééééééé");
        assert_eq!(chunks, vec!["éééé", "éééé", "éé"]);
    }

    #[test]
    fn test_config_clamps_overlap() {
        let config = ChunkConfig::with_size(10, 50);
        assert_eq!(config.chunk_overlap, 9);
        assert_eq!(ChunkConfig::default().separators.len(), 6);
    }
}
