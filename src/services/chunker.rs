//! Text chunking with overlap for embedding.

use crate::models::{ChunkingConfig, Document, DocumentChunk};
use crate::utils::has_meaningful_content;

/// Approximate characters per token used to turn token budgets into character budgets.
const CHARS_PER_TOKEN: usize = 4;

/// Text chunker that splits documents into bounded, optionally overlapping chunks.
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Chunk budget in characters.
    chunk_size: usize,
    /// Overlap between consecutive chunks in characters.
    overlap: usize,
    max_chunks: usize,
}

impl TextChunker {
    pub fn new(config: &ChunkingConfig) -> Self {
        let chunk_size = (config.chunk_size as usize).max(1) * CHARS_PER_TOKEN;
        let overlap = (config.chunk_overlap as usize * CHARS_PER_TOKEN).min(chunk_size - 1);
        Self {
            chunk_size,
            overlap,
            max_chunks: config.max_chunks as usize,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(&ChunkingConfig::default())
    }

    /// Split `document` into chunks owned by `document_id`.
    ///
    /// Empty or whitespace-only text yields no chunks. Chunk ids encode the
    /// ordinal, so the same text and configuration always produce the same ids.
    pub fn chunk(&self, document_id: &str, document: &Document) -> Vec<DocumentChunk> {
        let text = document.text.trim();
        if text.is_empty() {
            return Vec::new();
        }

        self.split_with_overlap(text)
            .into_iter()
            .filter(|segment| has_meaningful_content(segment))
            .take(self.max_chunks)
            .enumerate()
            .map(|(idx, segment)| {
                DocumentChunk::new(document_id, &document.metadata, segment, idx as u32)
            })
            .collect()
    }

    /// Split text into trimmed segments of at most `chunk_size` characters.
    fn split_with_overlap(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();

        if total <= self.chunk_size {
            return vec![text.to_string()];
        }

        let mut segments = Vec::new();
        let mut start = 0;

        while start < total {
            let target_end = (start + self.chunk_size).min(total);
            let end = self.find_break_point(&chars, start, target_end);

            let segment: String = chars[start..end].iter().collect();
            let segment = segment.trim();
            if !segment.is_empty() {
                segments.push(segment.to_string());
            }

            if end >= total {
                break;
            }

            // Overlap never exceeds half of the emitted segment, so each step
            // covers at least a quarter of the budget.
            start = end - self.overlap.min((end - start) / 2);
        }

        segments
    }

    /// Find a natural break point near `target_end`.
    ///
    /// Searches the second half of the window. Priority: paragraph break,
    /// line break, sentence end, whitespace. Falls back to a hard cut.
    fn find_break_point(&self, chars: &[char], start: usize, target_end: usize) -> usize {
        if target_end >= chars.len() {
            return chars.len();
        }

        let search_start = target_end
            .saturating_sub(self.chunk_size / 2)
            .max(start + 1);
        if search_start >= target_end {
            return target_end;
        }
        let window = &chars[search_start..target_end];

        let mut paragraph = None;
        let mut newline = None;
        let mut sentence = None;
        let mut space = None;

        for (i, c) in window.iter().enumerate() {
            let pos = search_start + i;
            match c {
                '\n' => {
                    if pos > 0 && chars[pos - 1] == '\n' {
                        paragraph = Some(pos + 1);
                    }
                    newline = Some(pos + 1);
                }
                '.' | '!' | '?' => {
                    if chars.get(pos + 1).is_some_and(|c| c.is_whitespace()) {
                        sentence = Some(pos + 1);
                    }
                }
                ' ' | '\t' => {
                    space = Some(pos + 1);
                }
                _ => {}
            }
        }

        paragraph
            .or(newline)
            .or(sentence)
            .or(space)
            .unwrap_or(target_end)
    }
}

/// Estimate the number of tokens in a text.
/// Uses a simple heuristic: ~4 characters per token on average.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / CHARS_PER_TOKEN
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DocumentMetadata, Source};
    use proptest::prelude::*;

    fn chunker(chunk_size: u32, chunk_overlap: u32) -> TextChunker {
        TextChunker::new(&ChunkingConfig {
            chunk_size,
            chunk_overlap,
            ..Default::default()
        })
    }

    fn document(text: &str) -> Document {
        Document::new(text, DocumentMetadata::with_source(Source::File))
    }

    #[test]
    fn test_small_document_single_chunk() {
        let chunks = TextChunker::with_defaults().chunk(
            "doc",
            &document("A cat sat on a mat. A dog ran in the park."),
        );

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "A cat sat on a mat. A dog ran in the park.");
        assert_eq!(chunks[0].id, "doc_0");
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].metadata.document_id, "doc");
        assert_eq!(chunks[0].metadata.document.source, Some(Source::File));
        assert!(chunks[0].embedding.is_empty());
    }

    #[test]
    fn test_empty_and_whitespace_documents() {
        let chunker = TextChunker::with_defaults();
        assert!(chunker.chunk("doc", &document("")).is_empty());
        assert!(chunker.chunk("doc", &document("  \n\t \n ")).is_empty());
    }

    #[test]
    fn test_breaks_on_sentence_boundary() {
        // 10 tokens = 40 characters per chunk.
        let text = "The first sentence is here. The second sentence follows it. And a third.";
        let chunks = chunker(10, 0).chunk("doc", &document(text));

        assert!(chunks.len() > 1);
        assert_eq!(chunks[0].text, "The first sentence is here.");
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 40);
        }
    }

    #[test]
    fn test_hard_cut_without_boundary() {
        let text = "x".repeat(100);
        let chunks = chunker(10, 0).chunk("doc", &document(&text));

        let lengths: Vec<usize> = chunks.iter().map(|c| c.text.len()).collect();
        assert_eq!(lengths, vec![40, 40, 20]);
    }

    #[test]
    fn test_overlap_repeats_context() {
        let text = "abcdefghij".repeat(10);
        let chunks = chunker(10, 2).chunk("doc", &document(&text));

        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let tail: String = pair[0].text.chars().rev().take(8).collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect();
            assert!(pair[1].text.starts_with(&tail));
        }
    }

    #[test]
    fn test_large_overlap_still_advances() {
        // 40-character budget with 36 characters of overlap.
        let text = "aaaaaaaaaaaaaaaaaaaa. ".repeat(50);
        let total = text.trim().chars().count();
        let chunks = chunker(10, 9).chunk("doc", &document(&text));

        assert!(chunks.len() > 1);
        assert!(
            chunks.len() <= total / 10 + 1,
            "{} chunks from {} characters",
            chunks.len(),
            total
        );
        for pair in chunks.windows(2) {
            assert_ne!(pair[0].text, pair[1].text);
        }
    }

    #[test]
    fn test_indices_are_contiguous() {
        let text = "word ".repeat(200);
        let chunks = chunker(10, 0).chunk("doc-7", &document(&text));

        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.chunk_index, i as u32);
            assert_eq!(chunk.id, format!("doc-7_{i}"));
        }
    }

    #[test]
    fn test_max_chunks_limit() {
        let chunker = TextChunker::new(&ChunkingConfig {
            chunk_size: 10,
            chunk_overlap: 0,
            max_chunks: 3,
            ..Default::default()
        });
        let chunks = chunker.chunk("doc", &document(&"y".repeat(1000)));
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn test_multibyte_text() {
        let text = "día señal überall 日本語のテキスト ".repeat(20);
        let chunks = chunker(10, 1).chunk("doc", &document(&text));
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 40);
        }
    }

    #[test]
    fn test_estimate_tokens() {
        assert_eq!(estimate_tokens("1234"), 1);
        assert_eq!(estimate_tokens("12345678"), 2);
        assert_eq!(estimate_tokens(""), 0);
    }

    proptest! {
        #[test]
        fn chunking_is_deterministic(
            text in "[a-zA-Z .,!?\n]{0,600}",
            size in 2u32..40,
            overlap in 0u32..2,
        ) {
            let chunker = chunker(size, overlap);
            let doc = document(&text);
            let first = chunker.chunk("doc", &doc);
            let second = chunker.chunk("doc", &doc);

            prop_assert_eq!(first.len(), second.len());
            for (a, b) in first.iter().zip(second.iter()) {
                prop_assert_eq!(&a.id, &b.id);
                prop_assert_eq!(&a.text, &b.text);
            }
        }

        #[test]
        fn large_overlap_bounds_chunk_count(text in "[a-z .\n]{0,600}", size in 2u32..30) {
            let total = text.trim().chars().count();
            let chunks = chunker(size, size - 1).chunk("doc", &document(&text));
            prop_assert!(chunks.len() <= total / size as usize + 2);
        }

        #[test]
        fn chunks_respect_budget(text in "[a-z \n]{0,800}", size in 2u32..30) {
            let chunks = chunker(size, 0).chunk("doc", &document(&text));
            for chunk in &chunks {
                prop_assert!(chunk.text.chars().count() <= size as usize * 4);
                prop_assert!(!chunk.text.trim().is_empty());
            }
        }
    }
}
