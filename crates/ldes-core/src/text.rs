//! Text helpers shared by the extractors.
//!
//! Spans carry character offsets (what span-labeling models report), while
//! Rust slices by byte. Conversions between the two live here.

use regex::Regex;
use std::sync::LazyLock;

static HORIZONTAL_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t\u{00A0}\u{2009}\u{202F}]+").expect("static regex"));
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("static regex"));
static ANY_WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

/// Normalize whitespace while keeping line structure.
#[must_use]
pub fn clean_document(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let collapsed = HORIZONTAL_WS.replace_all(&unified, " ");
    let trimmed: Vec<&str> = collapsed.lines().map(str::trim).collect();
    BLANK_LINES
        .replace_all(&trimmed.join("\n"), "\n\n")
        .trim()
        .to_string()
}

/// Collapse all whitespace to single spaces and strip edge punctuation.
#[must_use]
pub fn clean_value(text: &str) -> String {
    let collapsed = ANY_WS.replace_all(text, " ");
    collapsed
        .trim_matches(|c: char| c.is_whitespace() || matches!(c, ',' | ';' | ':' | '"' | '\''))
        .trim_end_matches('.')
        .trim()
        .to_string()
}

/// Character index of a byte offset. Offsets inside a code point round down.
#[must_use]
pub fn char_offset(text: &str, byte_offset: usize) -> usize {
    let mut end = byte_offset.min(text.len());
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].chars().count()
}

/// Byte index of a character offset, clamped to the end of the text.
#[must_use]
pub fn byte_offset(text: &str, char_offset: usize) -> usize {
    text.char_indices()
        .nth(char_offset)
        .map_or(text.len(), |(i, _)| i)
}

/// Slice by character range, `None` when out of bounds or inverted.
#[must_use]
pub fn char_slice(text: &str, start: usize, end: usize) -> Option<&str> {
    if start > end {
        return None;
    }
    let mut indices = text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len()));
    let start_byte = indices.nth(start)?;
    let end_byte = if end == start {
        start_byte
    } else {
        indices.nth(end - start - 1)?
    };
    Some(&text[start_byte..end_byte])
}

/// Text around a character range, extended by `radius` characters each side.
#[must_use]
pub fn window(text: &str, start: usize, end: usize, radius: usize) -> &str {
    let from = byte_offset(text, start.saturating_sub(radius));
    let to = byte_offset(text, end.saturating_add(radius));
    &text[from..to.max(from)]
}

/// The first `max_chars` characters, cut back to a whitespace boundary.
#[must_use]
pub fn head(text: &str, max_chars: usize) -> &str {
    let cut = byte_offset(text, max_chars);
    if cut >= text.len() {
        return text;
    }
    match text[..cut].rfind(char::is_whitespace) {
        Some(ws) if ws > 0 => &text[..ws],
        _ => &text[..cut],
    }
}
