// src/candidate.rs
//! Core records: candidates, categories, analyzer tags and the final result shape.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CandidateError;

/// Upper bound of the priority scale.
pub const MAX_CONFIDENCE: u8 = 100;

/// A single proposed number with its justification and priority weight.
///
/// `value` is always 1-3 ASCII digits and `confidence` is within 0..=100;
/// both are checked on construction and on deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawCandidate")]
pub struct NumericCandidate {
    #[serde(rename = "number")]
    value: String,
    #[serde(rename = "source")]
    provenance: String,
    confidence: u8,
}

#[derive(Deserialize)]
struct RawCandidate {
    number: String,
    source: String,
    confidence: u8,
}

impl TryFrom<RawCandidate> for NumericCandidate {
    type Error = CandidateError;

    fn try_from(raw: RawCandidate) -> Result<Self, Self::Error> {
        Self::new(raw.number, raw.source, raw.confidence)
    }
}

impl NumericCandidate {
    pub fn new(
        value: impl Into<String>,
        provenance: impl Into<String>,
        confidence: u8,
    ) -> Result<Self, CandidateError> {
        let value = value.into();
        if !is_candidate_value(&value) {
            return Err(CandidateError::BadValue(value));
        }
        if confidence > MAX_CONFIDENCE {
            return Err(CandidateError::BadConfidence(confidence));
        }
        Ok(Self {
            value,
            provenance: provenance.into(),
            confidence,
        })
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn provenance(&self) -> &str {
        &self.provenance
    }

    pub fn confidence(&self) -> u8 {
        self.confidence
    }
}

/// 1-3 ASCII digits, nothing else.
pub fn is_candidate_value(s: &str) -> bool {
    (1..=3).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_digit())
}

/// Left-pad a digit string with zeros to `width`.
pub fn zero_pad(digits: &str, width: usize) -> String {
    format!("{digits:0>width$}")
}

/// Coarse topic of a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Accident,
    Celebrity,
    Politics,
    Economic,
    Crime,
    #[default]
    General,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Accident => "accident",
            Category::Celebrity => "celebrity",
            Category::Politics => "politics",
            Category::Economic => "economic",
            Category::Crime => "crime",
            Category::General => "general",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accident" => Ok(Category::Accident),
            "celebrity" => Ok(Category::Celebrity),
            "politics" => Ok(Category::Politics),
            "economic" => Ok(Category::Economic),
            "crime" => Ok(Category::Crime),
            "general" => Ok(Category::General),
            other => Err(format!("unknown category `{other}`")),
        }
    }
}

/// Closed set of analyzer backends. Remote-A is OpenAI, remote-B is Claude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyzerKind {
    #[default]
    Heuristic,
    #[serde(rename = "openai")]
    OpenAi,
    Claude,
}

impl AnalyzerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalyzerKind::Heuristic => "heuristic",
            AnalyzerKind::OpenAi => "openai",
            AnalyzerKind::Claude => "claude",
        }
    }

    pub fn is_remote(&self) -> bool {
        !matches!(self, AnalyzerKind::Heuristic)
    }
}

impl fmt::Display for AnalyzerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalyzerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "heuristic" | "local" => Ok(AnalyzerKind::Heuristic),
            "openai" | "remote-a" => Ok(AnalyzerKind::OpenAi),
            "claude" | "remote-b" => Ok(AnalyzerKind::Claude),
            other => Err(format!("unknown analyzer `{other}`")),
        }
    }
}

/// Final, immutable output of one analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub success: bool,
    pub relevant: bool,
    pub category: Category,
    pub relevance_score: u8,
    /// Exactly the values of `detailed`, same order.
    pub numbers: Vec<String>,
    pub detailed: Vec<NumericCandidate>,
    pub reasoning: String,
    pub analyzer_used: AnalyzerKind,
    pub used_fallback: bool,
}

impl AnalysisResult {
    /// Successful result without numbers.
    pub fn empty(
        analyzer: AnalyzerKind,
        category: Category,
        relevance_score: u8,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            success: true,
            relevant: false,
            category,
            relevance_score: relevance_score.min(MAX_CONFIDENCE),
            numbers: Vec::new(),
            detailed: Vec::new(),
            reasoning: reasoning.into(),
            analyzer_used: analyzer,
            used_fallback: false,
        }
    }

    /// Replace `detailed` and keep `numbers` in lock-step with it.
    pub fn set_candidates(&mut self, detailed: Vec<NumericCandidate>) {
        self.numbers = detailed.iter().map(|c| c.value().to_string()).collect();
        self.detailed = detailed;
    }

    /// `numbers` mirrors `detailed` and holds no duplicates.
    pub fn is_consistent(&self) -> bool {
        let mirrors = self.numbers.len() == self.detailed.len()
            && self
                .numbers
                .iter()
                .zip(&self.detailed)
                .all(|(n, c)| n == c.value());
        let mut seen = std::collections::HashSet::new();
        mirrors && self.numbers.iter().all(|n| seen.insert(n.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn candidate_rejects_bad_values() {
        assert!(NumericCandidate::new("45", "อายุ 45 ปี", 90).is_ok());
        assert!(NumericCandidate::new("7", "x", 0).is_ok());
        assert_eq!(
            NumericCandidate::new("1234", "x", 50),
            Err(CandidateError::BadValue("1234".into()))
        );
        assert!(NumericCandidate::new("", "x", 50).is_err());
        assert!(NumericCandidate::new("๔๕", "x", 50).is_err());
        assert!(NumericCandidate::new("4a", "x", 50).is_err());
        assert_eq!(
            NumericCandidate::new("12", "x", 101),
            Err(CandidateError::BadConfidence(101))
        );
    }

    #[test]
    fn candidate_wire_shape() {
        let c = NumericCandidate::new("95", "ทะเบียน พร 195 (plate)", 85).unwrap();
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(
            v,
            json!({"number": "95", "source": "ทะเบียน พร 195 (plate)", "confidence": 85})
        );

        let bad = json!({"number": "9999", "source": "x", "confidence": 10});
        assert!(serde_json::from_value::<NumericCandidate>(bad).is_err());
    }

    #[test]
    fn padding() {
        assert_eq!(zero_pad("9", 2), "09");
        assert_eq!(zero_pad("45", 2), "45");
        assert_eq!(zero_pad("123", 2), "123");
    }

    #[test]
    fn enums_parse_and_print() {
        assert_eq!("Accident".parse::<Category>(), Ok(Category::Accident));
        assert!("weather".parse::<Category>().is_err());
        assert_eq!("remote-b".parse::<AnalyzerKind>(), Ok(AnalyzerKind::Claude));
        assert_eq!(AnalyzerKind::OpenAi.to_string(), "openai");
        assert_eq!(
            serde_json::to_value(AnalyzerKind::OpenAi).unwrap(),
            json!("openai")
        );
    }

    #[test]
    fn set_candidates_keeps_numbers_in_sync() {
        let mut r = AnalysisResult::empty(AnalyzerKind::Heuristic, Category::General, 60, "");
        r.set_candidates(vec![
            NumericCandidate::new("12", "a", 50).unwrap(),
            NumericCandidate::new("34", "b", 50).unwrap(),
        ]);
        assert_eq!(r.numbers, vec!["12", "34"]);
        assert!(r.is_consistent());

        r.numbers.push("56".into());
        assert!(!r.is_consistent());
    }
}
