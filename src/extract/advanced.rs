// src/extract/advanced.rs
//! Enrichment over a base candidate list. Purely additive: cultural number
//! words, hidden patterns, pairwise synthesis and context keywords, in that order.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{clock, contains_calendar_year, group, number_groups_ok, pad2, push_candidate, tail};
use crate::candidate::NumericCandidate;
use crate::patterns::{CompiledPattern, CulturalWord, PatternKind, PatternLibrary};
use crate::text::{is_thai_combining, SourceText};

/// Per-stage switches. All on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvancedOptions {
    pub cultural: bool,
    pub hidden: bool,
    pub synthesis: bool,
    pub context: bool,
}

impl Default for AdvancedOptions {
    fn default() -> Self {
        Self {
            cultural: true,
            hidden: true,
            synthesis: true,
            context: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdvancedExtractor {
    lib: Arc<PatternLibrary>,
    opts: AdvancedOptions,
}

impl AdvancedExtractor {
    pub fn new(lib: Arc<PatternLibrary>, opts: AdvancedOptions) -> Self {
        Self { lib, opts }
    }

    pub fn options(&self) -> AdvancedOptions {
        self.opts
    }

    /// `base` followed by everything the enabled stages add. Never removes.
    pub fn enrich(&self, text: &SourceText, base: &[NumericCandidate]) -> Vec<NumericCandidate> {
        self.enrich_buffer(&text.scan_buffer(), base)
    }

    pub fn enrich_buffer(&self, buf: &str, base: &[NumericCandidate]) -> Vec<NumericCandidate> {
        let mut out = base.to_vec();
        if self.opts.cultural {
            out.extend(self.cultural(buf));
        }
        if self.opts.hidden {
            out.extend(self.hidden(buf));
        }
        if self.opts.synthesis {
            let added = self.synthesize(&out);
            out.extend(added);
        }
        if self.opts.context {
            out.extend(self.context(buf));
        }
        tracing::debug!(
            target: "extract",
            base = base.len(),
            enriched = out.len(),
            "advanced enrichment done"
        );
        out
    }

    /// Number words in order of first appearance. A single digit `d` yields `d`, `0d`, `d0`.
    pub fn cultural(&self, buf: &str) -> Vec<NumericCandidate> {
        let weight = self.lib.weight(PatternKind::Cultural);
        let mut hits: Vec<(usize, &CulturalWord)> = self
            .lib
            .cultural()
            .iter()
            .filter_map(|w| first_standalone(buf, w).map(|pos| (pos, w)))
            .collect();
        hits.sort_by_key(|(pos, _)| *pos);

        let mut out = Vec::new();
        for (_, w) in hits {
            let prov = format!("คำว่า \"{}\" ({})", w.word, PatternKind::Cultural);
            if w.digits.len() == 1 {
                push_candidate(&mut out, &w.digits, &prov, weight);
                push_candidate(&mut out, &format!("0{}", w.digits), &prov, weight);
                push_candidate(&mut out, &format!("{}0", w.digits), &prov, weight);
            } else {
                push_candidate(&mut out, &w.digits, &prov, weight);
            }
        }
        out
    }

    /// Ordinals, license codes, bare times and floor/room reversals.
    pub fn hidden(&self, buf: &str) -> Vec<NumericCandidate> {
        let mut out = Vec::new();
        for pat in self.lib.hidden() {
            let weight = self.lib.weight(pat.kind);
            for caps in pat.re.captures_iter(buf) {
                let Some(whole) = caps.get(0) else { continue };
                if pat.blocked_after(buf, whole.end()) || !number_groups_ok(buf, &caps) {
                    continue;
                }
                let matched = whole.as_str().trim();
                let mut emit = |value: &str, note: &str| {
                    let prov = hidden_provenance(pat, matched, note);
                    push_candidate(&mut out, value, &prov, weight);
                };
                match pat.kind {
                    PatternKind::Ordinal => {
                        if let Some(n) = group(&caps, "num") {
                            emit(&pad2(n), "position");
                        }
                    }
                    PatternKind::License => {
                        if let Some(n) = group(&caps, "num") {
                            if !contains_calendar_year(n) {
                                emit(tail(n, 3), "last 3");
                                emit(tail(n, 2), "last 2");
                            }
                        }
                    }
                    PatternKind::TimeVariant => {
                        if let Some((h, m)) = clock(&caps) {
                            emit(&format!("{h:02}"), "hour");
                            emit(&format!("{m:02}"), "minute");
                        }
                    }
                    PatternKind::Reversal => {
                        if let Some(n) = group(&caps, "num") {
                            emit(n, "as written");
                            let reversed: String = n.chars().rev().collect();
                            if reversed != n {
                                emit(&reversed, "reversed");
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        out
    }

    /// Sum and absolute difference (mod 100) of the first two distinct values in `known`.
    pub fn synthesize(&self, known: &[NumericCandidate]) -> Vec<NumericCandidate> {
        let mut distinct: Vec<&str> = Vec::with_capacity(2);
        for v in known.iter().map(NumericCandidate::value) {
            if distinct.len() == 2 {
                break;
            }
            if !distinct.contains(&v) {
                distinct.push(v);
            }
        }
        let &[a, b] = distinct.as_slice() else {
            return Vec::new();
        };
        let (x, y) = (parse_or_zero(a), parse_or_zero(b));

        let weight = self.lib.weight(PatternKind::Synthesis);
        let sum = pad2(&((x + y) % 100).to_string());
        let diff = pad2(&(x.abs_diff(y) % 100).to_string());

        let mut out = Vec::new();
        push_candidate(&mut out, &sum, &format!("{a}+{b} (synthesis: sum)"), weight);
        push_candidate(&mut out, &diff, &format!("|{a}-{b}| (synthesis: difference)"), weight);
        out
    }

    /// Fixed candidate sets for context keywords present in the text.
    pub fn context(&self, buf: &str) -> Vec<NumericCandidate> {
        let weight = self.lib.weight(PatternKind::Context);
        let lower = buf.to_lowercase();
        let mut out = Vec::new();
        for entry in self.lib.context() {
            if !lower.contains(&entry.keyword) {
                continue;
            }
            let prov = format!("{} ({}: {})", entry.keyword, PatternKind::Context, entry.label);
            for n in &entry.numbers {
                push_candidate(&mut out, n, &prov, weight);
            }
        }
        out
    }
}

/// Out-of-range or unparsable inputs count as zero.
fn parse_or_zero(v: &str) -> u32 {
    v.parse().unwrap_or(0)
}

fn hidden_provenance(pat: &CompiledPattern, matched: &str, note: &str) -> String {
    format!("{} {} ({}: {})", pat.label, matched, pat.kind, note)
}

/// Byte offset of the first occurrence of `w.word` that is a word on its own.
fn first_standalone(buf: &str, w: &CulturalWord) -> Option<usize> {
    buf.match_indices(w.word.as_str())
        .map(|(pos, _)| pos)
        .find(|&pos| {
            let before = &buf[..pos];
            let after = &buf[pos + w.word.len()..];
            let glued = after
                .chars()
                .next()
                .is_some_and(|c| is_thai_combining(c) || matches!(c, 'ะ' | 'า' | 'ำ'));
            !glued
                && !w.exclude_next.iter().any(|s| after.starts_with(s.as_str()))
                && !w.exclude_prev.iter().any(|s| before.ends_with(s.as_str()))
        })
}
