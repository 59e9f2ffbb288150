//! Paragraph-aware text chunking
//!
//! Splits on blank lines first; blocks longer than the limit are sliced
//! greedily with overlap. Lengths and offsets are measured in characters so
//! multi-byte text never splits mid-codepoint.

use crate::errors::{AdvisorError, Result};

/// Split `text` into chunks of at most `max_chars` characters.
///
/// `overlap` characters are repeated between consecutive slices of an
/// oversized block. Invalid parameters are a [`AdvisorError::Validation`]:
/// `max_chars` must be positive and `overlap` must lie in `[0, max_chars)`.
pub fn chunk_text(text: &str, max_chars: usize, overlap: usize) -> Result<Vec<String>> {
    if max_chars == 0 {
        return Err(AdvisorError::Validation(
            "max_chars must be > 0".to_string(),
        ));
    }
    if overlap >= max_chars {
        return Err(AdvisorError::Validation(
            "overlap must be >= 0 and < max_chars".to_string(),
        ));
    }

    let mut chunks = Vec::new();
    for block in text.split("\n\n") {
        let block = block.trim();
        if block.is_empty() {
            continue;
        }
        let len = block.chars().count();
        if len <= max_chars {
            chunks.push(block.to_string());
            continue;
        }

        // Greedy slicing with overlap; progress is guaranteed since
        // overlap < max_chars.
        let offsets: Vec<usize> = block.char_indices().map(|(i, _)| i).collect();
        let byte_at = |pos: usize| -> usize {
            if pos >= offsets.len() {
                block.len()
            } else {
                offsets[pos]
            }
        };
        let mut start = 0;
        loop {
            let end = (start + max_chars).min(len);
            chunks.push(block[byte_at(start)..byte_at(end)].to_string());
            if end == len {
                break;
            }
            start = end - overlap;
        }
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_blocks_pass_through() {
        let chunks = chunk_text("First paragraph.\n\nSecond paragraph.", 800, 100).unwrap();
        assert_eq!(chunks, vec!["First paragraph.", "Second paragraph."]);
    }

    #[test]
    fn test_long_block_sliced_with_overlap() {
        let text = "a".repeat(250);
        let chunks = chunk_text(&text, 100, 20).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 100);
        assert_eq!(chunks[1].len(), 100);
        // 250 chars, stride 80: last slice covers 160..250
        assert_eq!(chunks[2].len(), 90);
    }

    #[test]
    fn test_rejects_invalid_params() {
        assert!(matches!(
            chunk_text("x", 0, 0),
            Err(AdvisorError::Validation(_))
        ));
        assert!(matches!(
            chunk_text("x", 10, 10),
            Err(AdvisorError::Validation(_))
        ));
    }

    #[test]
    fn test_multibyte_text_splits_on_char_boundaries() {
        let text = "\u{0917}\u{0947}\u{0939}\u{0942}\u{0902} ".repeat(50);
        let chunks = chunk_text(&text, 40, 10).unwrap();
        assert!(chunks.len() > 1);
        for ch in &chunks {
            assert!(ch.chars().count() <= 40);
        }
    }

    #[test]
    fn test_blank_input_yields_no_chunks() {
        assert!(chunk_text("", 100, 10).unwrap().is_empty());
        assert!(chunk_text("\n\n  \n\n", 100, 10).unwrap().is_empty());
    }
}
