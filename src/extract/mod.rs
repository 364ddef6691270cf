// src/extract/mod.rs
//! Extraction pipeline: primary structural scan, advanced enrichment and the
//! final dedup/truncate step.

pub mod advanced;
pub mod normalize;
pub mod primary;

pub use advanced::{AdvancedExtractor, AdvancedOptions};
pub use normalize::{dedup_candidates, normalize, Normalized, DEFAULT_LIMIT};
pub use primary::PrimaryExtractor;

use regex::Captures;

use crate::candidate::{is_candidate_value, zero_pad, NumericCandidate};
use crate::patterns::PatternKind;

/// True if the digit span `[start, end)` is not glued to further ASCII digits.
pub(crate) fn is_whole_run(buf: &str, start: usize, end: usize) -> bool {
    let before = buf[..start].chars().next_back();
    let after = buf[end..].chars().next();
    !before.is_some_and(|c| c.is_ascii_digit()) && !after.is_some_and(|c| c.is_ascii_digit())
}

/// Exactly four digits with a 19/20/25 prefix (Gregorian or Buddhist era year).
pub fn is_calendar_year(run: &str) -> bool {
    run.len() == 4
        && run.bytes().all(|b| b.is_ascii_digit())
        && matches!(&run[..2], "19" | "20" | "25")
}

/// Any four-digit window of `run` looks like a calendar year.
pub fn contains_calendar_year(run: &str) -> bool {
    run.len() >= 4
        && run.is_ascii()
        && (0..=run.len() - 4).any(|i| is_calendar_year(&run[i..i + 4]))
}

/// Digit run that is one piece of `1,500,000` or `14.30`.
pub(crate) fn is_embedded(buf: &str, start: usize, end: usize) -> bool {
    let mut before = buf[..start].chars().rev();
    let sep_before = matches!(before.next(), Some(',' | '.'))
        && before.next().is_some_and(|c| c.is_ascii_digit());
    let mut after = buf[end..].chars();
    let sep_after = matches!(after.next(), Some(',' | '.'))
        && after.next().is_some_and(|c| c.is_ascii_digit());
    sep_before || sep_after
}

/// Valid 24h clock reading from `hour`/`minute` groups.
pub(crate) fn clock(caps: &Captures<'_>) -> Option<(u32, u32)> {
    let h: u32 = caps.name("hour")?.as_str().parse().ok()?;
    let m: u32 = caps.name("minute")?.as_str().parse().ok()?;
    (h <= 23 && m <= 59).then_some((h, m))
}

/// Named group text, borrowed from the haystack.
pub(crate) fn group<'h>(caps: &Captures<'h>, name: &str) -> Option<&'h str> {
    caps.name(name).map(|m| m.as_str())
}

/// Every number group is a whole digit run and none is a calendar year.
pub(crate) fn number_groups_ok(buf: &str, caps: &Captures<'_>) -> bool {
    NUMBER_GROUPS.iter().filter_map(|g| caps.name(g)).all(|m| {
        is_whole_run(buf, m.start(), m.end()) && !is_calendar_year(m.as_str())
    })
}

const NUMBER_GROUPS: [&str; 5] = ["num", "digits", "amount", "hour", "minute"];

/// Last `n` chars of an ASCII digit string.
pub(crate) fn tail(digits: &str, n: usize) -> &str {
    &digits[digits.len().saturating_sub(n)..]
}

/// First `n` chars of an ASCII digit string.
pub(crate) fn head(digits: &str, n: usize) -> &str {
    &digits[..n.min(digits.len())]
}

/// 2-wide for single digits, unchanged otherwise.
pub(crate) fn pad2(digits: &str) -> String {
    zero_pad(digits, 2)
}

/// Provenance string: cue phrase, then `(kind)` or `(kind: note)`.
pub(crate) fn provenance(label: &str, matched: &str, kind: PatternKind, note: Option<&str>) -> String {
    let matched = matched.trim();
    let phrase = if matched.contains(label) {
        matched.to_string()
    } else {
        format!("{label} {matched}")
    };
    match note {
        Some(n) => format!("{phrase} ({kind}: {n})"),
        None => format!("{phrase} ({kind})"),
    }
}

/// Append a candidate when `value` satisfies the candidate invariants.
pub(crate) fn push_candidate(
    out: &mut Vec<NumericCandidate>,
    value: &str,
    provenance: &str,
    confidence: u8,
) {
    if !is_candidate_value(value) {
        tracing::debug!(target: "extract", value, "skipping out-of-shape value");
        return;
    }
    if let Ok(c) = NumericCandidate::new(value, provenance, confidence) {
        out.push(c);
    }
}
