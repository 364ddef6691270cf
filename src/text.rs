// src/text.rs
//! Source text input and normalization applied before any pattern scan.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Hard cap on the scanned buffer, in chars.
pub const MAX_SCAN_CHARS: usize = 20_000;

/// Immutable `{title, body}` pair supplied once per pipeline invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceText {
    pub title: String,
    #[serde(default, alias = "content")]
    pub body: String,
}

impl SourceText {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    /// Title first, then body, each normalized; joined by a newline so that
    /// no pattern can straddle the two.
    pub fn scan_buffer(&self) -> String {
        let title = normalize_text(&self.title);
        let body = normalize_text(&self.body);
        match (title.is_empty(), body.is_empty()) {
            (true, true) => String::new(),
            (false, true) => title,
            (true, false) => body,
            (false, false) => format!("{title}\n{body}"),
        }
    }

    /// True when nothing is left after normalization (whitespace, tags, entities only).
    pub fn is_blank(&self) -> bool {
        normalize_text(&self.title).is_empty() && normalize_text(&self.body).is_empty()
    }
}

/// Normalize scraped text:
/// 1) decode HTML entities
/// 2) strip tags
/// 3) fold Thai digits ๐-๙ to ASCII
/// 4) collapse whitespace (incl. NBSP) and trim
/// 5) cap length
pub fn normalize_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);
    let stripped = RE_TAGS.replace_all(&decoded, " ");

    let folded: String = stripped.chars().map(fold_thai_digit).collect();

    let mut out = RE_WS.replace_all(&folded, " ").trim().to_string();

    if out.chars().count() > MAX_SCAN_CHARS {
        out = out.chars().take(MAX_SCAN_CHARS).collect();
    }
    out
}

/// Map a Thai digit to its ASCII counterpart, leave everything else alone.
pub fn fold_thai_digit(c: char) -> char {
    match c {
        '\u{0E50}'..='\u{0E59}' => {
            let offset = c as u32 - 0x0E50;
            char::from_digit(offset, 10).unwrap_or(c)
        }
        _ => c,
    }
}

/// Thai above/below vowels and tone marks that attach to the previous
/// consonant. A number word followed by one of these is part of a longer word.
pub fn is_thai_combining(c: char) -> bool {
    matches!(c, '\u{0E31}' | '\u{0E34}'..='\u{0E3A}' | '\u{0E47}'..='\u{0E4E}')
}

/// Any character in the Thai block.
pub fn is_thai(c: char) -> bool {
    ('\u{0E00}'..='\u{0E7F}').contains(&c)
}
