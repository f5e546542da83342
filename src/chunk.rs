//! Paragraph-boundary text chunker.
//!
//! Splits loaded pages into [`Chunk`]s that respect a configurable
//! `max_tokens` limit. Splitting happens on paragraph boundaries (`\n\n`);
//! paragraphs longer than the limit are hard-split on the last newline or
//! space before the limit. Every chunk inherits its page's metadata, and
//! indices are contiguous across the whole document.

use crate::extract::LoadedPage;
use crate::models::Chunk;

/// Approximate chars-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

/// Split every page into chunks. Pages with no text contribute nothing.
pub fn chunk_pages(pages: &[LoadedPage], max_tokens: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    for page in pages {
        for text in split_text(&page.text, max_tokens) {
            chunks.push(Chunk {
                chunk_index: chunks.len() as i64,
                text,
                metadata: page.metadata.clone(),
            });
        }
    }
    chunks
}

/// Split text into pieces of at most `max_tokens * 4` bytes.
pub fn split_text(text: &str, max_tokens: usize) -> Vec<String> {
    let max_chars = (max_tokens * CHARS_PER_TOKEN).max(CHARS_PER_TOKEN);
    let mut pieces = Vec::new();
    let mut current = String::new();

    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        let would_be = if current.is_empty() {
            trimmed.len()
        } else {
            current.len() + 2 + trimmed.len()
        };

        if would_be > max_chars && !current.is_empty() {
            pieces.push(std::mem::take(&mut current));
        }

        if trimmed.len() > max_chars {
            hard_split(trimmed, max_chars, &mut pieces);
        } else {
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(trimmed);
        }
    }

    if !current.is_empty() {
        pieces.push(current);
    }

    pieces
}

fn hard_split(paragraph: &str, max_chars: usize, out: &mut Vec<String>) {
    let mut remaining = paragraph;
    while !remaining.is_empty() {
        let actual_split = if remaining.len() > max_chars {
            let mut limit = max_chars;
            while !remaining.is_char_boundary(limit) {
                limit -= 1;
            }
            let head = &remaining[..limit];
            head.rfind('\n')
                .or_else(|| head.rfind(' '))
                .map(|pos| pos + 1)
                .unwrap_or(limit)
        } else {
            remaining.len()
        };

        let piece = remaining[..actual_split].trim();
        if !piece.is_empty() {
            out.push(piece.to_string());
        }
        remaining = &remaining[actual_split..];
    }
}
