// src/extract/primary.rs
//! Structural scan: age, plate, time, case/floor, money, then generic digit runs.

use regex::Captures;
use std::sync::Arc;

use super::{
    clock, contains_calendar_year, group, head, is_embedded, normalize::dedup_candidates,
    number_groups_ok, pad2, provenance, push_candidate, tail,
};
use crate::candidate::NumericCandidate;
use crate::patterns::{CompiledPattern, PatternKind, PatternLibrary};
use crate::text::SourceText;

/// Runs the primary patterns of a [`PatternLibrary`] in priority order.
#[derive(Debug, Clone)]
pub struct PrimaryExtractor {
    lib: Arc<PatternLibrary>,
}

impl PrimaryExtractor {
    pub fn new(lib: Arc<PatternLibrary>) -> Self {
        Self { lib }
    }

    /// Deduplicated candidates (first occurrence wins), at most `limit`.
    pub fn extract(&self, text: &SourceText, limit: usize) -> Vec<NumericCandidate> {
        let buf = text.scan_buffer();
        let mut out = dedup_candidates(self.scan(&buf));
        out.truncate(limit);
        out
    }

    /// Raw scan of an already normalized buffer. May contain duplicates.
    pub fn scan(&self, buf: &str) -> Vec<NumericCandidate> {
        let mut out = Vec::new();
        for pat in self.lib.primary() {
            let weight = self.lib.weight(pat.kind);
            for caps in pat.re.captures_iter(buf) {
                let Some(whole) = caps.get(0) else { continue };
                if pat.blocked_after(buf, whole.end()) || !number_groups_ok(buf, &caps) {
                    continue;
                }
                derive(pat, buf, &caps, weight, &mut out);
            }
        }
        out
    }
}

fn derive(
    pat: &CompiledPattern,
    buf: &str,
    caps: &Captures<'_>,
    weight: u8,
    out: &mut Vec<NumericCandidate>,
) {
    let matched = caps.get(0).map_or("", |m| m.as_str());
    let mut emit = |value: &str, note: Option<&str>| {
        let prov = provenance(&pat.label, matched, pat.kind, note);
        push_candidate(out, value, &prov, weight);
    };

    match pat.kind {
        PatternKind::Age => {
            if let Some(n) = group(caps, "num") {
                emit(&pad2(n), None);
            }
        }
        PatternKind::Plate => {
            if let Some(d) = group(caps, "digits") {
                if d.len() <= 2 {
                    emit(&pad2(d), None);
                } else {
                    emit(tail(d, 2), Some("last 2"));
                    emit(tail(d, 3), Some("last 3"));
                    emit(head(d, 2), Some("leading 2"));
                }
            }
        }
        PatternKind::Time => {
            if let Some((h, m)) = clock(caps) {
                emit(&format!("{h:02}"), Some("hour"));
                emit(&format!("{m:02}"), Some("minute"));
                let joined = format!("{h}{m:02}");
                emit(tail(&joined, 3), Some("hour+minute"));
            }
        }
        PatternKind::Case => {
            if let Some(n) = group(caps, "num") {
                if n.len() <= 3 {
                    emit(&pad2(n), None);
                } else {
                    emit(tail(n, 3), Some("last 3"));
                    emit(tail(n, 2), Some("last 2"));
                }
            }
        }
        PatternKind::Money => {
            if let Some(raw) = group(caps, "amount") {
                let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
                let sig = digits.trim_start_matches('0').trim_end_matches('0');
                if !sig.is_empty() {
                    emit(&pad2(head(sig, 3)), Some("significant digits"));
                    if sig.len() >= 3 {
                        emit(head(sig, 2), Some("leading 2"));
                    }
                }
            }
        }
        PatternKind::Generic => {
            let Some(m) = caps.name("num") else { return };
            if is_embedded(buf, m.start(), m.end()) {
                return;
            }
            let n = m.as_str();
            match n.len() {
                0 | 1 => {}
                2 | 3 => emit(n, None),
                _ if contains_calendar_year(n) => {}
                _ => emit(tail(n, 3), Some("last 3")),
            }
        }
        _ => {}
    }
}
