//! Chunking utilities for splitting long documents into overlapping segments.
//!
//! Documents are cut into fixed-size character windows that advance by
//! `max_chars - overlap` characters. Each window is trimmed, and windows
//! that trim to nothing are dropped without consuming a chunk index.

use serde::{Deserialize, Serialize};

/// Default window size in characters.
pub const DEFAULT_CHUNK_CHARS: usize = 1200;

/// Default overlap between consecutive windows in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Chunking parameters used for an index build.
///
/// Persisted in the index metadata so `status` can report what an index
/// was built with.
///
/// # Examples
///
/// ```
/// use arxiv_brain::chunking::{ChunkingConfig, DEFAULT_CHUNK_CHARS};
///
/// let config = ChunkingConfig::default();
/// assert_eq!(config.max_chars, DEFAULT_CHUNK_CHARS);
/// assert_eq!(config.step(), 1000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Maximum chunk size in characters.
    pub max_chars: usize,
    /// Overlap between adjacent chunks in characters.
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: DEFAULT_CHUNK_CHARS,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkingConfig {
    /// Window size, clamped to at least one character.
    pub fn window(&self) -> usize {
        self.max_chars.max(1)
    }

    /// Overlap actually applied. An overlap that is not smaller than the
    /// window is ignored.
    pub fn effective_overlap(&self) -> usize {
        if self.overlap >= self.window() {
            0
        } else {
            self.overlap
        }
    }

    /// Distance in characters between the starts of consecutive windows.
    pub fn step(&self) -> usize {
        self.window() - self.effective_overlap()
    }

    /// Chunk `text` with these parameters.
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        chunk_text(text, self.max_chars, self.overlap)
    }
}

/// A chunk of text from a larger document.
///
/// Produced by [`chunk_text`]. `index` counts surviving chunks only, so a
/// document's indices are always `0..n` without gaps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// The trimmed chunk text. Never empty.
    pub text: String,
    /// Zero-based chunk index within the document.
    pub index: usize,
    /// Character offset where the untrimmed window starts.
    pub start_char: usize,
}

/// Split text into overlapping character windows.
///
/// Offsets are counted in characters, not bytes, so multi-byte UTF-8 input
/// never splits inside a code point. Empty input yields no chunks.
///
/// # Examples
///
/// ```
/// use arxiv_brain::chunking::chunk_text;
///
/// let chunks = chunk_text("Hello, world!", 1200, 200);
/// assert_eq!(chunks.len(), 1);
/// assert_eq!(chunks[0].text, "Hello, world!");
///
/// let text = "a".repeat(2500);
/// let chunks = chunk_text(&text, 1000, 200);
/// assert_eq!(chunks.len(), 3);
/// assert_eq!(chunks[1].start_char, 800);
/// ```
pub fn chunk_text(text: &str, max_chars: usize, overlap: usize) -> Vec<Chunk> {
    let config = ChunkingConfig { max_chars, overlap };
    let window = config.window();
    let step = config.step();

    // char index -> byte index, with a trailing sentinel for the end
    let char_to_byte: Vec<usize> = text
        .char_indices()
        .map(|(byte_idx, _)| byte_idx)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_count = char_to_byte.len() - 1;

    let mut chunks = Vec::new();
    let mut start_char = 0;

    while start_char < char_count {
        let end_char = (start_char + window).min(char_count);
        let window_text = &text[char_to_byte[start_char]..char_to_byte[end_char]];

        let trimmed = window_text.trim();
        if !trimmed.is_empty() {
            chunks.push(Chunk {
                text: trimmed.to_string(),
                index: chunks.len(),
                start_char,
            });
        }

        if end_char >= char_count {
            break;
        }
        start_char += step;
    }

    chunks
}
