//! Overlapping fixed-size text windows.
//!
//! Lengths and offsets are counted in `char`s, so a window never splits a
//! UTF-8 sequence.

use serde::{Deserialize, Serialize};

/// Overlap used when the caller does not supply one.
pub const DEFAULT_OVERLAP: usize = 200;

/// A window of text produced by [`split`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Sequential chunk index (0-based)
    pub index: usize,

    /// Window contents
    pub text: String,

    /// Offset of the first character, in chars
    pub start: usize,

    /// Offset one past the last character, in chars
    pub end: usize,
}

impl Chunk {
    /// Returns the number of characters in this chunk.
    #[must_use]
    pub const fn char_len(&self) -> usize {
        self.end - self.start
    }
}

/// Returns the overlap actually applied for a chunk size.
///
/// An overlap that would stall or reverse progress (`overlap >= chunk_size`)
/// is clamped to 10% of the chunk size, rounded up, and never more than
/// `chunk_size - 1`.
#[must_use]
pub fn effective_overlap(chunk_size: usize, overlap: Option<usize>) -> usize {
    let chunk_size = chunk_size.max(1);
    let overlap = overlap.unwrap_or(DEFAULT_OVERLAP);

    if overlap < chunk_size {
        overlap
    } else {
        chunk_size.div_ceil(10).min(chunk_size - 1)
    }
}

/// Splits `text` into overlapping windows of at most `chunk_size` chars.
///
/// Window `k` covers `[k * (C - O), min(k * (C - O) + C, L))`. Windows stop
/// once one reaches the end of the text, so the last window may be shorter
/// than `chunk_size`. Empty or whitespace-only text yields no chunks.
#[must_use]
pub fn split(text: &str, chunk_size: usize, overlap: Option<usize>) -> Vec<Chunk> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let chunk_size = chunk_size.max(1);
    let overlap = effective_overlap(chunk_size, overlap);

    // Byte offset of every char boundary, including the end of the text.
    let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    boundaries.push(text.len());
    let total_chars = boundaries.len() - 1;

    if chunk_size >= total_chars {
        return vec![Chunk {
            index: 0,
            text: text.to_string(),
            start: 0,
            end: total_chars,
        }];
    }

    let step = chunk_size - overlap;
    let mut chunks = Vec::with_capacity(expected_chunk_count(total_chars, chunk_size, overlap));
    let mut start = 0;

    while start < total_chars {
        let end = (start + chunk_size).min(total_chars);

        chunks.push(Chunk {
            index: chunks.len(),
            text: text[boundaries[start]..boundaries[end]].to_string(),
            start,
            end,
        });

        if end == total_chars {
            break;
        }

        start += step;
    }

    chunks
}

/// Number of chunks [`split`] produces for the given sizes.
#[must_use]
pub fn expected_chunk_count(text_chars: usize, chunk_size: usize, overlap: usize) -> usize {
    let chunk_size = chunk_size.max(1);
    if text_chars == 0 {
        return 0;
    }
    if text_chars <= chunk_size {
        return 1;
    }
    let overlap = effective_overlap(chunk_size, Some(overlap));
    (text_chars - overlap).div_ceil(chunk_size - overlap)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(chunks: &[Chunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    /// Drops the overlapping prefix of every chunk after the first.
    fn reassemble(chunks: &[Chunk]) -> String {
        let mut out = String::new();
        let mut covered = 0;
        for chunk in chunks {
            let skip = covered - chunk.start.min(covered);
            out.extend(chunk.text.chars().skip(skip));
            covered = chunk.end;
        }
        out
    }

    #[test]
    fn test_split_without_overlap() {
        let chunks = split("abcdefghij", 3, Some(0));
        assert_eq!(texts(&chunks), vec!["abc", "def", "ghi", "j"]);
    }

    #[test]
    fn test_split_with_overlap() {
        let chunks = split("abcdefghij", 3, Some(1));
        assert_eq!(texts(&chunks), vec!["abc", "cde", "efg", "ghi", "ij"]);
    }

    #[test]
    fn test_text_smaller_than_chunk() {
        let chunks = split("abc", 10, None);
        assert_eq!(texts(&chunks), vec!["abc"]);
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn test_text_equal_to_chunk_size() {
        let chunks = split("abcde", 5, Some(2));
        assert_eq!(texts(&chunks), vec!["abcde"]);
    }

    #[test]
    fn test_empty_and_whitespace_text() {
        assert!(split("", 3, None).is_empty());
        assert!(split("   \n\t ", 3, None).is_empty());
    }

    #[test]
    fn test_overlap_clamped_when_not_smaller_than_chunk() {
        assert_eq!(effective_overlap(5, Some(5)), 1);
        assert_eq!(effective_overlap(5, Some(9)), 1);
        assert_eq!(effective_overlap(100, Some(100)), 10);

        let clamped = split("abcdefghijkl", 5, Some(5));
        let explicit = split("abcdefghijkl", 5, Some(1));
        assert_eq!(clamped, explicit);
    }

    #[test]
    fn test_overlap_clamp_never_stalls_on_tiny_chunks() {
        assert_eq!(effective_overlap(1, Some(1)), 0);
        let chunks = split("abc", 1, Some(4));
        assert_eq!(texts(&chunks), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_default_overlap_is_clamped_for_small_chunks() {
        assert_eq!(effective_overlap(50, None), 5);
        assert_eq!(effective_overlap(10_000, None), DEFAULT_OVERLAP);
    }

    #[test]
    fn test_window_offsets_follow_step() {
        let chunks = split("abcdefghijklmnopqrstuvwxyz", 8, Some(3));
        for (k, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, k);
            assert_eq!(chunk.start, k * 5);
            assert_eq!(chunk.end, (k * 5 + 8).min(26));
        }
        assert_eq!(chunks.last().unwrap().end, 26);
    }

    #[test]
    fn test_chunk_count_matches_formula() {
        let text: String = (0..997).map(|i| char::from(b'a' + (i % 26) as u8)).collect();

        for (size, overlap) in [(10, 0), (10, 3), (64, 16), (100, 99), (500, 1)] {
            let chunks = split(&text, size, Some(overlap));
            assert_eq!(
                chunks.len(),
                expected_chunk_count(997, size, overlap),
                "size={size} overlap={overlap}"
            );
        }
    }

    #[test]
    fn test_reassembly_reconstructs_text() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(20);

        for (size, overlap) in [(7, 0), (7, 3), (50, 10), (33, 32)] {
            let chunks = split(&text, size, Some(overlap));
            assert_eq!(reassemble(&chunks), text, "size={size} overlap={overlap}");
            assert!(chunks.iter().all(|c| c.char_len() <= size));
        }
    }

    #[test]
    fn test_multibyte_text_splits_on_char_boundaries() {
        let text = "héllo wörld ✓✓✓ ünïcødé";
        let chunks = split(text, 4, Some(1));

        assert_eq!(reassemble(&chunks), text);
        assert_eq!(chunks[0].text, "héll");
        assert_eq!(chunks[1].text, "lo w");
    }

    #[test]
    fn test_split_is_deterministic() {
        let text = "fn main() { println!(\"hi\"); }\n".repeat(40);
        assert_eq!(split(&text, 64, None), split(&text, 64, None));
    }

    #[test]
    fn test_zero_chunk_size_is_treated_as_one() {
        let chunks = split("ab", 0, Some(0));
        assert_eq!(texts(&chunks), vec!["a", "b"]);
    }
}
