// src/heuristic.rs
//! Local analyzer: relevance → primary → advanced → dedup/truncate.
//! Pure and synchronous; it always answers.

use metrics::{counter, histogram};
use std::sync::Arc;
use tracing::debug;

use crate::candidate::{AnalysisResult, AnalyzerKind, Category};
use crate::extract::{normalize, AdvancedExtractor, AdvancedOptions, PrimaryExtractor, DEFAULT_LIMIT};
use crate::patterns::PatternLibrary;
use crate::relevance::RelevanceClassifier;
use crate::text::SourceText;

/// Score reported for blank input.
pub const EMPTY_INPUT_SCORE: u8 = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeuristicOptions {
    pub limit: usize,
    /// Drop numbers from results the classifier marks not relevant.
    pub require_relevance: bool,
    pub advanced: AdvancedOptions,
}

impl Default for HeuristicOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            require_relevance: false,
            advanced: AdvancedOptions::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HeuristicAnalyzer {
    primary: PrimaryExtractor,
    advanced: AdvancedExtractor,
    classifier: RelevanceClassifier,
    opts: HeuristicOptions,
}

impl HeuristicAnalyzer {
    pub fn new(lib: Arc<PatternLibrary>, opts: HeuristicOptions) -> Self {
        Self {
            primary: PrimaryExtractor::new(lib.clone()),
            advanced: AdvancedExtractor::new(lib.clone(), opts.advanced),
            classifier: RelevanceClassifier::new(lib),
            opts,
        }
    }

    pub fn options(&self) -> HeuristicOptions {
        self.opts
    }

    pub fn classifier(&self) -> &RelevanceClassifier {
        &self.classifier
    }

    pub fn analyze(&self, title: &str, content: &str) -> AnalysisResult {
        self.analyze_text(&SourceText::new(title, content), self.opts.limit)
    }

    pub fn is_relevant(&self, title: &str, content: &str) -> bool {
        self.classifier.is_relevant(&SourceText::new(title, content))
    }

    pub fn analyze_text(&self, text: &SourceText, limit: usize) -> AnalysisResult {
        counter!("lucky_heuristic_runs_total").increment(1);

        let buf = text.scan_buffer();
        if buf.is_empty() {
            return AnalysisResult::empty(
                AnalyzerKind::Heuristic,
                Category::General,
                EMPTY_INPUT_SCORE,
                "empty input",
            );
        }

        let base = self.primary.scan(&buf);
        let enriched = self.advanced.enrich_buffer(&buf, &base);
        let norm = normalize(enriched, limit);
        histogram!("lucky_candidates").record(norm.unique_total as f64);

        let rel = self.classifier.classify_buffer(&buf, norm.unique_total);
        debug!(
            target: "heuristic",
            relevant = rel.relevant,
            category = %rel.category,
            unique = norm.unique_total,
            kept = norm.numbers.len(),
            "heuristic analysis"
        );

        let mut result = AnalysisResult::empty(
            AnalyzerKind::Heuristic,
            rel.category,
            rel.relevance_score,
            String::new(),
        );
        result.relevant = rel.relevant;

        let gated = self.opts.require_relevance && !rel.relevant;
        result.reasoning = reasoning(
            &rel.matched,
            rel.category,
            norm.unique_total,
            norm.numbers.len(),
            gated,
        );
        if !gated {
            result.set_candidates(norm.detailed);
        }
        result
    }
}

fn reasoning(
    matched: &[String],
    category: Category,
    unique: usize,
    kept: usize,
    gated: bool,
) -> String {
    let mut s = format!("category {category}; {unique} unique candidates, {kept} kept");
    if !matched.is_empty() {
        s.push_str(&format!("; keywords: {}", matched.join(", ")));
    }
    if gated {
        s.push_str("; not relevant, numbers withheld");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer(opts: HeuristicOptions) -> HeuristicAnalyzer {
        HeuristicAnalyzer::new(Arc::new(PatternLibrary::builtin().expect("builtin")), opts)
    }

    #[test]
    fn blank_input_is_success_not_relevant() {
        let r = analyzer(HeuristicOptions::default()).analyze("  ", "");
        assert!(r.success);
        assert!(!r.relevant);
        assert_eq!(r.category, Category::General);
        assert_eq!(r.relevance_score, EMPTY_INPUT_SCORE);
        assert!(r.numbers.is_empty());
        assert_eq!(r.reasoning, "empty input");
    }

    #[test]
    fn accident_story_end_to_end() {
        let r = analyzer(HeuristicOptions::default()).analyze(
            "รถชนกลางดึก ชายอายุ 45 ปี บาดเจ็บ",
            "รถเก๋งทะเบียน พร 195 ชนเสาไฟเวลา 23.40 น.",
        );
        assert!(r.success);
        assert!(r.relevant);
        assert_eq!(r.category, Category::Accident);
        assert_eq!(r.analyzer_used, AnalyzerKind::Heuristic);
        assert!(!r.used_fallback);
        assert_eq!(r.numbers[0], "45");
        for n in ["95", "195", "19", "23", "40"] {
            assert!(r.numbers.contains(&n.to_string()), "missing {n}: {:?}", r.numbers);
        }
        assert!(r.is_consistent());
        assert!(r.numbers.len() <= DEFAULT_LIMIT);
    }

    #[test]
    fn limit_is_respected() {
        let a = analyzer(HeuristicOptions::default());
        let r = a.analyze_text(&SourceText::new("ทะเบียน พร 195 อายุ 45 ปี ห้อง 301", ""), 3);
        assert_eq!(r.numbers.len(), 3);
        assert!(r.is_consistent());
    }

    #[test]
    fn relevance_gate_withholds_numbers() {
        let opts = HeuristicOptions {
            require_relevance: true,
            ..HeuristicOptions::default()
        };
        let r = analyzer(opts).analyze("รีวิวร้านอาหาร โต๊ะ 12", "");
        assert!(!r.relevant);
        assert!(r.numbers.is_empty());
        assert!(r.detailed.is_empty());

        let r = analyzer(HeuristicOptions::default()).analyze("รีวิวร้านอาหาร โต๊ะ 12", "");
        assert!(!r.relevant);
        assert_eq!(r.numbers[0], "12");
    }

    #[test]
    fn idempotent_on_same_input() {
        let a = analyzer(HeuristicOptions::default());
        let first = a.analyze("เลขเด็ดงวดนี้ 59", "แม่ตะเคียนให้โชค");
        let second = a.analyze("เลขเด็ดงวดนี้ 59", "แม่ตะเคียนให้โชค");
        assert_eq!(first, second);
    }
}
