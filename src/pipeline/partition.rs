//! Fast text partitioning: split a page's text layer into blocks.
//!
//! "Fast" means the embedded text layer is taken as-is: no OCR, no layout
//! analysis. Pages that are pure scans produce a single empty block, which
//! the orchestrator may later fill with an OCR transcript
//! ([`pages_without_text`], [`fill_pages`]). The text is lightly normalised
//! first because pdfium hands back whatever the PDF producer wrote, including
//! CR line endings and zero-width characters.
//!
//! ## Rule Order
//!
//! Line endings are normalised before anything else so that the blank-line
//! split sees `\n` only.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One structural chunk of document text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBlock {
    /// 1-indexed page the block came from.
    pub page_num: usize,
    /// Block text; `None` when the page carried no text layer.
    pub text: Option<String>,
}

/// Split raw page text into blocks separated by blank lines.
///
/// A page with no usable text yields a single block with `text: None`.
pub fn split_blocks(page_num: usize, raw: &str) -> Vec<TextBlock> {
    let s = normalise_line_endings(raw);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);

    let blocks: Vec<TextBlock> = RE_BLOCK_BREAK
        .split(&s)
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(|b| TextBlock {
            page_num,
            text: Some(collapse_inline_spaces(b)),
        })
        .collect();

    if blocks.is_empty() {
        vec![TextBlock {
            page_num,
            text: None,
        }]
    } else {
        blocks
    }
}

/// Join the non-empty block texts with single newlines.
pub fn join_text(blocks: &[TextBlock]) -> String {
    blocks
        .iter()
        .filter_map(|b| b.text.as_deref())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pages whose text layer was empty, in page order.
pub fn pages_without_text(blocks: &[TextBlock]) -> Vec<usize> {
    let mut pages: Vec<usize> = blocks
        .iter()
        .filter(|b| b.text.is_none())
        .map(|b| b.page_num)
        .collect();
    pages.dedup();
    pages
}

/// Replace the empty block of each transcribed page with blocks split from
/// its transcript. Pages with text, or without a transcript, are untouched.
pub fn fill_pages(blocks: Vec<TextBlock>, transcripts: Vec<(usize, String)>) -> Vec<TextBlock> {
    let mut by_page: HashMap<usize, String> = transcripts.into_iter().collect();
    let mut filled = Vec::with_capacity(blocks.len());
    for block in blocks {
        if block.text.is_none() {
            if let Some(text) = by_page.remove(&block.page_num) {
                filled.extend(split_blocks(block.page_num, &text));
                continue;
            }
        }
        filled.push(block);
    }
    filled
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Remove invisible Unicode characters ──────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 3: Trim trailing whitespace per line ────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 4: Split on blank lines ─────────────────────────────────────────────

static RE_BLOCK_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n+").unwrap());

// ── Rule 5: Collapse runs of spaces inside a block ───────────────────────────

static RE_INLINE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").unwrap());

fn collapse_inline_spaces(input: &str) -> String {
    RE_INLINE_SPACES.replace_all(input, " ").to_string()
}
