// src/relevance.rs
//! Go/no-go gate plus coarse category and a 0..=100 relevance score.
//!
//! Irrelevance keywords win: a single hit makes the text not relevant no
//! matter which relevance keywords co-occur. Category and score are still
//! produced for every text.

use std::sync::Arc;
use tracing::info;

use crate::candidate::{Category, MAX_CONFIDENCE};
use crate::patterns::{PatternLibrary, RelevanceTable};
use crate::telemetry::{anon_hash, dev_logging_enabled, truncate_vec};
use crate::text::SourceText;

/// Classifier verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relevance {
    pub relevant: bool,
    pub category: Category,
    pub relevance_score: u8,
    /// Keywords that decided the verdict.
    pub matched: Vec<String>,
    pub reasons: Vec<String>,
}

impl Default for Relevance {
    fn default() -> Self {
        Self {
            relevant: false,
            category: Category::General,
            relevance_score: 0,
            matched: Vec::new(),
            reasons: Vec::new(),
        }
    }
}

/// Never logs raw text: hashed id and short keyword lists only.
fn dev_log_relevance(event: &str, text: &str, rel: &Relevance) {
    if !dev_logging_enabled() {
        return;
    }
    let id = anon_hash(text);
    info!(
        target: "relevance",
        %id,
        event,
        category = %rel.category,
        score = rel.relevance_score,
        matched = ?truncate_vec(&rel.matched, 5),
        reasons = ?truncate_vec(&rel.reasons, 5)
    );
}

#[derive(Debug, Clone)]
pub struct RelevanceClassifier {
    lib: Arc<PatternLibrary>,
}

impl RelevanceClassifier {
    pub fn new(lib: Arc<PatternLibrary>) -> Self {
        Self { lib }
    }

    fn table(&self) -> &RelevanceTable {
        self.lib.relevance()
    }

    /// `unique_candidates` drives the score adjustment (more than `many_candidates`
    /// adds a bonus, fewer than `few_candidates` subtracts a penalty).
    pub fn classify(&self, text: &SourceText, unique_candidates: usize) -> Relevance {
        self.classify_buffer(&text.scan_buffer(), unique_candidates)
    }

    /// Relevance gate only, no scoring.
    pub fn is_relevant(&self, text: &SourceText) -> bool {
        let lower = text.scan_buffer().to_lowercase();
        self.find_irrelevant(&lower).is_empty() && !self.find_relevant(&lower).is_empty()
    }

    pub fn classify_buffer(&self, buf: &str, unique_candidates: usize) -> Relevance {
        let t = self.table();
        let lower = buf.to_lowercase();
        let mut rel = Relevance::default();

        // 1) Category and base score, always
        let (category, base) = self.categorize(&lower);
        rel.category = category;
        rel.reasons.push(format!("category:{category}:{base}"));

        // 2) Candidate-count adjustment
        let mut score = i32::from(base);
        if unique_candidates > t.many_candidates {
            score += i32::from(t.many_bonus);
            rel.reasons
                .push(format!("many_candidates:+{}", t.many_bonus));
        } else if unique_candidates < t.few_candidates {
            score -= i32::from(t.few_penalty);
            rel.reasons
                .push(format!("few_candidates:-{}", t.few_penalty));
        }
        rel.relevance_score = score.clamp(0, i32::from(MAX_CONFIDENCE)) as u8;

        // 3) Gate: irrelevance short-circuits
        let blockers = self.find_irrelevant(&lower);
        if !blockers.is_empty() {
            rel.reasons
                .extend(blockers.iter().map(|k| format!("irrelevant:{k}")));
            rel.matched = blockers;
            dev_log_relevance("blocked", buf, &rel);
            return rel;
        }

        let anchors = self.find_relevant(&lower);
        rel.relevant = !anchors.is_empty();
        if !rel.relevant {
            rel.reasons.push("no_relevant_keyword".into());
        }
        rel.matched = anchors;
        dev_log_relevance(if rel.relevant { "passed" } else { "neutral" }, buf, &rel);
        rel
    }

    /// First category group with a keyword hit, else general.
    pub fn categorize(&self, lower: &str) -> (Category, u8) {
        let t = self.table();
        t.categories
            .iter()
            .find(|c| c.keywords.iter().any(|k| lower.contains(k.as_str())))
            .map(|c| (c.category, c.base_score))
            .unwrap_or((Category::General, t.general_score))
    }

    pub fn find_irrelevant(&self, lower: &str) -> Vec<String> {
        hits(&self.table().irrelevant, lower)
    }

    pub fn find_relevant(&self, lower: &str) -> Vec<String> {
        hits(&self.table().relevant, lower)
    }
}

fn hits(keywords: &[String], lower: &str) -> Vec<String> {
    keywords
        .iter()
        .filter(|k| lower.contains(k.as_str()))
        .cloned()
        .collect()
}
