//! Word-window chunking of document pages.
//!
//! Pages are concatenated (each followed by a blank line) while recording the
//! character offset where each page starts. The concatenation is split into
//! whitespace-separated words and walked with a fixed-size window that steps
//! back by an overlap between consecutive chunks.

use chainfold_shared::{ChainfoldError, ChunkConfig, Page, Result, TextChunk};

/// Approximate words-to-tokens ratio used to size windows.
pub const TOKENS_PER_WORD: f64 = 1.3;

/// Window geometry in words, derived from a token budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordWindow {
    pub words_per_chunk: usize,
    pub words_overlap: usize,
}

impl WordWindow {
    /// Convert token budgets to word counts, rejecting windows that cannot advance.
    pub fn from_tokens(config: &ChunkConfig) -> Result<Self> {
        let words_per_chunk = (config.chunk_size_tokens as f64 / TOKENS_PER_WORD).floor() as usize;
        let words_overlap = (config.overlap_tokens as f64 / TOKENS_PER_WORD).floor() as usize;

        if words_per_chunk == 0 {
            return Err(ChainfoldError::validation(format!(
                "chunk size of {} tokens is smaller than one word",
                config.chunk_size_tokens
            )));
        }
        if words_overlap >= words_per_chunk {
            return Err(ChainfoldError::validation(format!(
                "overlap of {words_overlap} words must be smaller than the {words_per_chunk}-word window"
            )));
        }

        Ok(Self {
            words_per_chunk,
            words_overlap,
        })
    }
}

/// Split pages into overlapping word-window chunks.
///
/// Every chunk carries the final `total_chunks`; a trailing window shorter
/// than `words_per_chunk` is still emitted.
pub fn chunk_pages(pages: &[Page], config: &ChunkConfig) -> Result<Vec<TextChunk>> {
    let window = WordWindow::from_tokens(config)?;

    // (char offset in the concatenation, page number)
    let mut boundaries: Vec<(usize, u32)> = Vec::with_capacity(pages.len());
    let mut combined_len = 0usize;
    let mut words: Vec<&str> = Vec::new();

    for page in pages {
        boundaries.push((combined_len, page.number));
        combined_len += page.text.chars().count() + 2;
        words.extend(page.text.split_whitespace());
    }

    // prefix[i] = total chars in words[..i]
    let mut prefix = Vec::with_capacity(words.len() + 1);
    prefix.push(0usize);
    for word in &words {
        let last = prefix.last().copied().unwrap_or(0);
        prefix.push(last + word.chars().count());
    }
    let joined_len = |n: usize| if n == 0 { 0 } else { prefix[n] + n - 1 };

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < words.len() {
        let end = (start + window.words_per_chunk).min(words.len());
        let text = words[start..end].join(" ");

        let char_start = joined_len(start);
        let char_end = char_start + text.chars().count();
        let (page_start, page_end) = page_range(&boundaries, char_start, char_end);

        chunks.push(TextChunk {
            chunk_index: chunks.len(),
            total_chunks: 0,
            text,
            page_start,
            page_end,
        });

        if end >= words.len() {
            break;
        }
        start = end - window.words_overlap;
    }

    let total = chunks.len();
    for chunk in &mut chunks {
        chunk.total_chunks = total;
    }

    tracing::debug!(
        pages = pages.len(),
        words = words.len(),
        chunks = total,
        words_per_chunk = window.words_per_chunk,
        words_overlap = window.words_overlap,
        "chunked document"
    );

    Ok(chunks)
}

/// Last page boundary at or before each offset; page 1 when none precedes.
fn page_range(boundaries: &[(usize, u32)], char_start: usize, char_end: usize) -> (u32, u32) {
    let mut page_start = 1;
    let mut page_end = 1;
    for &(offset, page) in boundaries {
        if offset <= char_start {
            page_start = page;
        }
        if offset <= char_end {
            page_end = page;
        } else {
            break;
        }
    }
    (page_start, page_end)
}
