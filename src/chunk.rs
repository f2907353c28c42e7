//! Sliding-window text chunker.
//!
//! Splits extracted document text into fixed-size windows of `window`
//! characters with `overlap` characters shared between consecutive chunks,
//! so no sentence is lost at a boundary. Windows are measured in Unicode
//! scalar values and always cut on char boundaries.
//!
//! The chunker is lazy: [`chunk_text`] returns an iterator, and callers that
//! only need a count (e.g. a dry run) never materialize the texts.

use crate::error::{RagError, Result};
use crate::models::Chunk;

/// Split `text` into overlapping windows tagged with `source_id`.
///
/// Blank input (empty or whitespace-only) produces zero chunks. Consecutive
/// chunks overlap by exactly `overlap` characters and together cover every
/// character of the input; `sequence_index` increases strictly from 0.
///
/// # Errors
///
/// Returns `InvalidParameter` if `window == 0` or `overlap >= window`.
pub fn chunk_text<'a>(
    source_id: &'a str,
    text: &'a str,
    window: usize,
    overlap: usize,
) -> Result<ChunkIter<'a>> {
    if window == 0 {
        return Err(RagError::InvalidParameter(
            "chunking window must be > 0".to_string(),
        ));
    }
    if overlap >= window {
        return Err(RagError::InvalidParameter(format!(
            "chunk overlap ({}) must be smaller than window ({})",
            overlap, window
        )));
    }

    // Byte offsets of each char boundary, plus the end of the string. Blank
    // input yields no boundaries at all, which makes the iterator empty.
    let boundaries: Vec<usize> = if text.trim().is_empty() {
        Vec::new()
    } else {
        text.char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect()
    };

    Ok(ChunkIter {
        source_id,
        text,
        boundaries,
        window,
        stride: window - overlap,
        pos: 0,
        next_index: 0,
        done: false,
    })
}

/// Lazy sequence of [`Chunk`]s over one document. Finite and not restartable;
/// call [`chunk_text`] again to re-chunk.
#[derive(Debug)]
pub struct ChunkIter<'a> {
    source_id: &'a str,
    text: &'a str,
    /// Char-boundary byte offsets; `boundaries[i]` starts the i-th char.
    boundaries: Vec<usize>,
    window: usize,
    stride: usize,
    /// Char position where the next window starts.
    pos: usize,
    next_index: u32,
    done: bool,
}

impl Iterator for ChunkIter<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done || self.boundaries.is_empty() {
            return None;
        }

        let char_len = self.boundaries.len() - 1;
        let end = (self.pos + self.window).min(char_len);
        let chunk = Chunk {
            text: self.text[self.boundaries[self.pos]..self.boundaries[end]].to_string(),
            source_id: self.source_id.to_string(),
            sequence_index: self.next_index,
        };

        if end == char_len {
            self.done = true;
        } else {
            self.pos += self.stride;
        }
        self.next_index += 1;

        Some(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(text: &str, window: usize, overlap: usize) -> Vec<Chunk> {
        chunk_text("doc1", text, window, overlap).unwrap().collect()
    }

    #[test]
    fn small_text_single_chunk() {
        let chunks = collect("Hello, world!", 700, 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].sequence_index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!(chunks[0].source_id, "doc1");
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(collect("", 700, 100).is_empty());
    }

    #[test]
    fn whitespace_only_yields_no_chunks() {
        assert!(collect("   \n\t  \n", 700, 100).is_empty());
    }

    #[test]
    fn overlap_is_exact() {
        // window=5, overlap=2: starts at 0, 3, 6, ...
        let chunks = collect("abcdefghij", 5, 2);
        assert_eq!(chunks[0].text, "abcde");
        assert_eq!(chunks[1].text, "defgh");
        assert_eq!(chunks[2].text, "ghij");
        for pair in chunks.windows(2) {
            let tail: String = pair[0].text.chars().rev().take(2).collect();
            let tail: String = tail.chars().rev().collect();
            assert!(pair[1].text.starts_with(&tail));
        }
    }

    #[test]
    fn every_char_is_covered() {
        let text = "The quick brown fox jumps over the lazy dog.";
        let chunks = collect(text, 7, 3);
        let mut rebuilt = String::new();
        for (i, c) in chunks.iter().enumerate() {
            let skip = if i == 0 { 0 } else { 3 };
            rebuilt.extend(c.text.chars().skip(skip));
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn chunk_count_formula() {
        // count = ceil((L - O) / (W - O)) for non-blank text
        for (len, window, overlap) in [(10, 5, 2), (100, 30, 10), (7, 7, 0), (8, 7, 6)] {
            let text: String = std::iter::repeat('x').take(len).collect();
            let chunks = collect(&text, window, overlap);
            let expected = (len - overlap).div_ceil(window - overlap);
            assert_eq!(
                chunks.len(),
                expected,
                "L={} W={} O={}",
                len,
                window,
                overlap
            );
        }
    }

    #[test]
    fn indices_strictly_increasing_from_zero() {
        let text: String = std::iter::repeat("word ").take(50).collect();
        let chunks = collect(&text, 20, 5);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.sequence_index, i as u32);
        }
    }

    #[test]
    fn multibyte_text_cuts_on_char_boundaries() {
        let text = "héllo wörld çafé ☕ naïve résumé";
        let chunks = collect(text, 8, 3);
        assert!(!chunks.is_empty());
        let rebuilt: String = chunks
            .iter()
            .enumerate()
            .flat_map(|(i, c)| c.text.chars().skip(if i == 0 { 0 } else { 3 }))
            .collect();
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn overlap_equal_to_window_rejected() {
        let err = chunk_text("doc1", "some text", 5, 5).unwrap_err();
        assert!(matches!(err, RagError::InvalidParameter(_)));
    }

    #[test]
    fn zero_window_rejected() {
        let err = chunk_text("doc1", "some text", 0, 0).unwrap_err();
        assert!(matches!(err, RagError::InvalidParameter(_)));
    }

    #[test]
    fn deterministic() {
        let text = "Alpha beta gamma delta epsilon zeta eta theta";
        let a = collect(text, 12, 4);
        let b = collect(text, 12, 4);
        assert_eq!(a, b);
    }
}
