//! Fixed-size text chunking with overlap.
//!
//! Windows are measured in characters, not bytes, so multi-byte text (the
//! regulation corpus is Cyrillic) is never split inside a code point. Chunk
//! boundaries are not snapped to words or sentences.

use crate::error::{RagError, Result};

/// Splits text into fixed-size windows with a configurable overlap.
///
/// Window `i` covers `[start, start + chunk_size)`; the next window starts at
/// `start + chunk_size - chunk_overlap`. The last chunk may be shorter.
///
/// # Example
///
/// ```rust
/// use kanva_rag::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(4, 1).unwrap();
/// assert_eq!(chunker.chunk("abcdefg"), vec!["abcd", "defg", "g"]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] unless `chunk_size > chunk_overlap`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size <= chunk_overlap {
            return Err(RagError::ConfigError(format!(
                "chunk_size ({chunk_size}) must be greater than chunk_overlap ({chunk_overlap})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into chunks. Empty text yields no chunks.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        // Byte offset of every char boundary, plus the end of the string.
        let boundaries: Vec<usize> =
            text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
        let char_count = boundaries.len() - 1;
        let step = self.chunk_size - self.chunk_overlap;

        let mut chunks = Vec::with_capacity(char_count / step + 1);
        let mut start = 0;
        while start < char_count {
            let end = (start + self.chunk_size).min(char_count);
            chunks.push(text[boundaries[start]..boundaries[end]].to_string());
            start += step;
        }
        chunks
    }
}

/// Split `text` into overlapping chunks of `chunk_size` characters.
///
/// # Errors
///
/// Returns [`RagError::ConfigError`] unless `chunk_size > overlap`.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    Ok(FixedSizeChunker::new(chunk_size, overlap)?.chunk(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(chunk_text("", 1000, 200).unwrap().is_empty());
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        assert_eq!(chunk_text("hello", 1000, 200).unwrap(), vec!["hello"]);
    }

    #[test]
    fn windows_overlap_by_configured_amount() {
        let chunks = chunk_text("0123456789", 4, 2).unwrap();
        assert_eq!(chunks, vec!["0123", "2345", "4567", "6789", "89"]);
    }

    #[test]
    fn zero_overlap_partitions_text() {
        let chunks = chunk_text("abcdefgh", 3, 0).unwrap();
        assert_eq!(chunks, vec!["abc", "def", "gh"]);
    }

    #[test]
    fn cyrillic_text_is_split_on_char_boundaries() {
        let chunks = chunk_text("стенапол", 3, 1).unwrap();
        assert_eq!(chunks, vec!["сте", "ена", "апо", "ол"]);
    }

    #[test]
    fn overlap_not_smaller_than_size_is_rejected() {
        assert!(FixedSizeChunker::new(10, 10).is_err());
        assert!(FixedSizeChunker::new(0, 0).is_err());
    }
}
