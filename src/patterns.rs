// src/patterns.rs
//! Pattern library: static cue → digits tables, loaded from TOML and compiled once.
//!
//! The tables live in `config/patterns.toml` (embedded as the default) so they can be
//! tested and extended without touching extraction logic. Construction fails fast on
//! any bad regex or table value; a broken table would otherwise silently emit wrong
//! numbers. After construction the library is read-only and is shared by reference.

use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::candidate::{is_candidate_value, Category, MAX_CONFIDENCE};
use crate::error::PatternError;

pub const DEFAULT_PATTERNS_PATH: &str = "config/patterns.toml";
pub const ENV_PATTERNS_PATH: &str = "LUCKY_PATTERNS_PATH";

const BUILTIN_TOML: &str = include_str!("../config/patterns.toml");

/// What a pattern (or extractor stage) recognizes. Doubles as the key of the
/// confidence weight table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    // primary, in scan priority order
    Age,
    Plate,
    Time,
    Case,
    Money,
    Generic,
    // hidden
    Ordinal,
    License,
    TimeVariant,
    Reversal,
    // table / synthesis stages
    Cultural,
    Synthesis,
    Context,
}

impl PatternKind {
    pub const ALL: [PatternKind; 13] = [
        PatternKind::Age,
        PatternKind::Plate,
        PatternKind::Time,
        PatternKind::Case,
        PatternKind::Money,
        PatternKind::Generic,
        PatternKind::Ordinal,
        PatternKind::License,
        PatternKind::TimeVariant,
        PatternKind::Reversal,
        PatternKind::Cultural,
        PatternKind::Synthesis,
        PatternKind::Context,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::Age => "age",
            PatternKind::Plate => "plate",
            PatternKind::Time => "time",
            PatternKind::Case => "case",
            PatternKind::Money => "money",
            PatternKind::Generic => "generic",
            PatternKind::Ordinal => "ordinal",
            PatternKind::License => "license",
            PatternKind::TimeVariant => "time_variant",
            PatternKind::Reversal => "reversal",
            PatternKind::Cultural => "cultural",
            PatternKind::Synthesis => "synthesis",
            PatternKind::Context => "context",
        }
    }

    pub fn is_primary(&self) -> bool {
        matches!(
            self,
            PatternKind::Age
                | PatternKind::Plate
                | PatternKind::Time
                | PatternKind::Case
                | PatternKind::Money
                | PatternKind::Generic
        )
    }

    pub fn is_hidden(&self) -> bool {
        matches!(
            self,
            PatternKind::Ordinal
                | PatternKind::License
                | PatternKind::TimeVariant
                | PatternKind::Reversal
        )
    }

    /// Capture groups a regex of this kind must define.
    fn required_groups(&self) -> &'static [&'static str] {
        match self {
            PatternKind::Time | PatternKind::TimeVariant => &["hour", "minute"],
            PatternKind::Plate => &["digits"],
            PatternKind::Money => &["amount"],
            _ => &["num"],
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/* ----------------------------
Config schema (from TOML)
---------------------------- */

#[derive(Debug, Clone, Deserialize)]
pub struct PatternRoot {
    pub version: u32,
    pub weights: HashMap<String, i64>,
    #[serde(default)]
    pub primary: Vec<PatternCfg>,
    #[serde(default)]
    pub hidden: Vec<PatternCfg>,
    #[serde(default)]
    pub cultural: Vec<CulturalCfg>,
    #[serde(default)]
    pub context: Vec<ContextCfg>,
    pub relevance: RelevanceCfg,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatternCfg {
    pub id: String,
    pub kind: PatternKind,
    /// Human-readable cue used in provenance strings.
    pub label: String,
    pub pattern: String,
    #[serde(default)]
    pub not_followed_by: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CulturalCfg {
    pub word: String,
    pub digits: String,
    #[serde(default)]
    pub exclude_next: Vec<String>,
    #[serde(default)]
    pub exclude_prev: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContextCfg {
    pub keyword: String,
    pub label: String,
    pub numbers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelevanceCfg {
    pub general_score: u8,
    pub many_candidates: usize,
    pub many_bonus: u8,
    pub few_candidates: usize,
    pub few_penalty: u8,
    #[serde(default)]
    pub irrelevant: Vec<String>,
    #[serde(default)]
    pub relevant: Vec<String>,
    #[serde(default)]
    pub categories: Vec<CategoryCfg>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryCfg {
    pub category: Category,
    pub base_score: u8,
    pub keywords: Vec<String>,
}

/* ----------------------------
Compiled structures
---------------------------- */

#[derive(Debug)]
pub struct CompiledPattern {
    pub id: String,
    pub kind: PatternKind,
    pub label: String,
    pub re: Regex,
    pub not_followed_by: Vec<String>,
}

impl CompiledPattern {
    /// True if the text right after `end` (leading spaces skipped) starts with a blocked suffix.
    pub fn blocked_after(&self, buf: &str, end: usize) -> bool {
        if self.not_followed_by.is_empty() {
            return false;
        }
        let rest = buf[end..].trim_start();
        self.not_followed_by.iter().any(|s| rest.starts_with(s.as_str()))
    }
}

/// A number word and the digits it stands for.
#[derive(Debug, Clone)]
pub struct CulturalWord {
    pub word: String,
    pub digits: String,
    pub exclude_next: Vec<String>,
    pub exclude_prev: Vec<String>,
}

/// A keyword with a fixed candidate set.
#[derive(Debug, Clone)]
pub struct ContextEntry {
    pub keyword: String,
    pub label: String,
    pub numbers: Vec<String>,
}

/// Keyword sets and score table used by the relevance classifier.
#[derive(Debug, Clone)]
pub struct RelevanceTable {
    pub general_score: u8,
    pub many_candidates: usize,
    pub many_bonus: u8,
    pub few_candidates: usize,
    pub few_penalty: u8,
    pub irrelevant: Vec<String>,
    pub relevant: Vec<String>,
    pub categories: Vec<CategoryCfg>,
}

/// Read-only, compiled pattern library.
#[derive(Debug)]
pub struct PatternLibrary {
    pub version: u32,
    primary: Vec<CompiledPattern>,
    hidden: Vec<CompiledPattern>,
    cultural: Vec<CulturalWord>,
    context: Vec<ContextEntry>,
    weights: HashMap<PatternKind, u8>,
    relevance: RelevanceTable,
}

impl PatternLibrary {
    /// The tables shipped with the crate.
    pub fn builtin() -> Result<Self, PatternError> {
        Self::from_toml_str(BUILTIN_TOML)
    }

    /// Load from `LUCKY_PATTERNS_PATH` when set, else the embedded tables.
    pub fn load() -> Result<Self, PatternError> {
        match std::env::var(ENV_PATTERNS_PATH) {
            Ok(p) if !p.trim().is_empty() => Self::from_path(PathBuf::from(p)),
            _ => Self::builtin(),
        }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PatternError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| PatternError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let lib = Self::from_toml_str(&content)?;
        info!(
            target: "patterns",
            path = %path.display(),
            version = lib.version,
            "pattern library loaded"
        );
        Ok(lib)
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self, PatternError> {
        let cfg: PatternRoot = toml::from_str(toml_str)?;

        let weights = compile_weights(&cfg.weights)?;

        let mut primary = cfg
            .primary
            .iter()
            .map(|p| compile_pattern(p, "primary", PatternKind::is_primary))
            .collect::<Result<Vec<_>, _>>()?;
        // Stable: keeps file order within a kind.
        primary.sort_by_key(|p| p.kind);

        let hidden = cfg
            .hidden
            .iter()
            .map(|p| compile_pattern(p, "hidden", PatternKind::is_hidden))
            .collect::<Result<Vec<_>, _>>()?;

        let cultural = cfg
            .cultural
            .iter()
            .map(compile_cultural)
            .collect::<Result<Vec<_>, _>>()?;

        let context = cfg
            .context
            .iter()
            .map(compile_context)
            .collect::<Result<Vec<_>, _>>()?;

        let relevance = compile_relevance(cfg.relevance)?;

        Ok(Self {
            version: cfg.version,
            primary,
            hidden,
            cultural,
            context,
            weights,
            relevance,
        })
    }

    /// Primary patterns in priority order.
    pub fn primary(&self) -> &[CompiledPattern] {
        &self.primary
    }

    pub fn hidden(&self) -> &[CompiledPattern] {
        &self.hidden
    }

    pub fn cultural(&self) -> &[CulturalWord] {
        &self.cultural
    }

    pub fn context(&self) -> &[ContextEntry] {
        &self.context
    }

    pub fn relevance(&self) -> &RelevanceTable {
        &self.relevance
    }

    /// Fixed priority weight of a kind. Every kind has one after construction.
    pub fn weight(&self, kind: PatternKind) -> u8 {
        self.weights.get(&kind).copied().unwrap_or(0)
    }
}

fn compile_weights(raw: &HashMap<String, i64>) -> Result<HashMap<PatternKind, u8>, PatternError> {
    let mut out = HashMap::new();
    for kind in PatternKind::ALL {
        let Some(&w) = raw.get(kind.as_str()) else {
            return Err(PatternError::MissingWeight(kind.as_str().to_string()));
        };
        if !(0..=i64::from(MAX_CONFIDENCE)).contains(&w) {
            return Err(PatternError::InvalidEntry {
                table: "weights",
                key: kind.as_str().to_string(),
                value: w.to_string(),
                reason: "weight must be within 0..=100".into(),
            });
        }
        out.insert(kind, w as u8);
    }
    Ok(out)
}

fn compile_pattern(
    p: &PatternCfg,
    table: &'static str,
    allowed: fn(&PatternKind) -> bool,
) -> Result<CompiledPattern, PatternError> {
    if !allowed(&p.kind) {
        return Err(PatternError::InvalidEntry {
            table,
            key: p.id.clone(),
            value: p.kind.as_str().to_string(),
            reason: format!("kind not allowed in `{table}`"),
        });
    }
    let re = Regex::new(&p.pattern).map_err(|e| PatternError::Regex {
        id: p.id.clone(),
        source: e,
    })?;
    for group in p.kind.required_groups() {
        if !re.capture_names().flatten().any(|n| n == *group) {
            return Err(PatternError::MissingGroup {
                id: p.id.clone(),
                group,
            });
        }
    }
    Ok(CompiledPattern {
        id: p.id.clone(),
        kind: p.kind,
        label: p.label.clone(),
        re,
        not_followed_by: p.not_followed_by.clone(),
    })
}

fn compile_cultural(c: &CulturalCfg) -> Result<CulturalWord, PatternError> {
    if c.word.trim().is_empty() {
        return Err(PatternError::InvalidEntry {
            table: "cultural",
            key: c.word.clone(),
            value: c.word.clone(),
            reason: "empty word".into(),
        });
    }
    if !is_candidate_value(&c.digits) || c.digits.len() > 2 {
        return Err(PatternError::InvalidEntry {
            table: "cultural",
            key: c.word.clone(),
            value: c.digits.clone(),
            reason: "digits must be 1-2 ASCII digits".into(),
        });
    }
    Ok(CulturalWord {
        word: c.word.clone(),
        digits: c.digits.clone(),
        exclude_next: c.exclude_next.clone(),
        exclude_prev: c.exclude_prev.clone(),
    })
}

fn compile_context(c: &ContextCfg) -> Result<ContextEntry, PatternError> {
    if c.keyword.trim().is_empty() {
        return Err(PatternError::InvalidEntry {
            table: "context",
            key: c.label.clone(),
            value: c.keyword.clone(),
            reason: "empty keyword".into(),
        });
    }
    if let Some(bad) = c.numbers.iter().find(|n| !is_candidate_value(n)) {
        return Err(PatternError::InvalidEntry {
            table: "context",
            key: c.keyword.clone(),
            value: bad.clone(),
            reason: "numbers must be 1-3 ASCII digits".into(),
        });
    }
    Ok(ContextEntry {
        keyword: c.keyword.to_lowercase(),
        label: c.label.clone(),
        numbers: c.numbers.clone(),
    })
}

fn compile_relevance(r: RelevanceCfg) -> Result<RelevanceTable, PatternError> {
    let check_score = |key: &str, v: u8| {
        if v > MAX_CONFIDENCE {
            Err(PatternError::InvalidEntry {
                table: "relevance",
                key: key.to_string(),
                value: v.to_string(),
                reason: "score must be within 0..=100".into(),
            })
        } else {
            Ok(())
        }
    };
    check_score("general_score", r.general_score)?;
    check_score("many_bonus", r.many_bonus)?;
    check_score("few_penalty", r.few_penalty)?;
    for c in &r.categories {
        check_score(c.category.as_str(), c.base_score)?;
        if c.category == Category::General {
            return Err(PatternError::InvalidEntry {
                table: "relevance.categories",
                key: c.category.as_str().to_string(),
                value: c.base_score.to_string(),
                reason: "`general` is the fallback and takes `general_score`".into(),
            });
        }
    }

    let lower = |v: Vec<String>| -> Vec<String> {
        v.into_iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    };

    Ok(RelevanceTable {
        general_score: r.general_score,
        many_candidates: r.many_candidates,
        many_bonus: r.many_bonus,
        few_candidates: r.few_candidates,
        few_penalty: r.few_penalty,
        irrelevant: lower(r.irrelevant),
        relevant: lower(r.relevant),
        categories: r
            .categories
            .into_iter()
            .map(|c| CategoryCfg {
                category: c.category,
                base_score: c.base_score,
                keywords: lower(c.keywords),
            })
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_TOML: &str = r#"
version = 7

[weights]
age = 90
plate = 85
time = 75
case = 80
money = 70
generic = 50
ordinal = 60
license = 55
time_variant = 55
reversal = 60
cultural = 65
synthesis = 45
context = 40

[[primary]]
id = "generic"
kind = "generic"
label = "n"
pattern = '(?P<num>[0-9]+)'

[[primary]]
id = "age"
kind = "age"
label = "อายุ"
pattern = 'อายุ\s*(?P<num>[0-9]{1,3})'

[relevance]
general_score = 60
many_candidates = 5
many_bonus = 10
few_candidates = 2
few_penalty = 20
"#;

    #[test]
    fn builtin_tables_compile() {
        let lib = PatternLibrary::builtin().expect("builtin tables");
        assert_eq!(lib.version, 1);
        assert!(!lib.primary().is_empty());
        assert!(!lib.hidden().is_empty());
        assert!(lib.cultural().iter().any(|c| c.word == "เก้า" && c.digits == "9"));
        assert_eq!(lib.weight(PatternKind::Age), 90);
        assert_eq!(lib.weight(PatternKind::Generic), 50);
    }

    #[test]
    fn primary_sorted_by_kind_priority() {
        let lib = PatternLibrary::builtin().unwrap();
        let kinds: Vec<PatternKind> = lib.primary().iter().map(|p| p.kind).collect();
        let mut sorted = kinds.clone();
        sorted.sort();
        assert_eq!(kinds, sorted);
        assert_eq!(kinds.first(), Some(&PatternKind::Age));
        assert_eq!(kinds.last(), Some(&PatternKind::Generic));
    }

    #[test]
    fn file_order_independent_of_priority() {
        let lib = PatternLibrary::from_toml_str(MINIMAL_TOML).unwrap();
        assert_eq!(lib.version, 7);
        assert_eq!(lib.primary()[0].id, "age");
        assert_eq!(lib.primary()[1].id, "generic");
    }

    #[test]
    fn bad_regex_fails_fast() {
        let broken = MINIMAL_TOML.replace(r"(?P<num>[0-9]+)", r"(?P<num>[0-9]+");
        match PatternLibrary::from_toml_str(&broken) {
            Err(PatternError::Regex { id, .. }) => assert_eq!(id, "generic"),
            other => panic!("expected regex error, got {other:?}"),
        }
    }

    #[test]
    fn missing_group_fails_fast() {
        let broken = MINIMAL_TOML.replace(r"(?P<num>[0-9]+)", r"([0-9]+)");
        assert!(matches!(
            PatternLibrary::from_toml_str(&broken),
            Err(PatternError::MissingGroup { group: "num", .. })
        ));
    }

    #[test]
    fn missing_weight_fails_fast() {
        let broken = MINIMAL_TOML.replace("context = 40\n", "");
        assert!(matches!(
            PatternLibrary::from_toml_str(&broken),
            Err(PatternError::MissingWeight(k)) if k == "context"
        ));
    }

    #[test]
    fn out_of_range_weight_fails_fast() {
        let broken = MINIMAL_TOML.replace("age = 90", "age = 190");
        assert!(matches!(
            PatternLibrary::from_toml_str(&broken),
            Err(PatternError::InvalidEntry { table: "weights", .. })
        ));
    }

    #[test]
    fn hidden_kind_rejected_in_primary() {
        let broken = MINIMAL_TOML.replace(r#"kind = "generic""#, r#"kind = "ordinal""#);
        assert!(matches!(
            PatternLibrary::from_toml_str(&broken),
            Err(PatternError::InvalidEntry { table: "primary", .. })
        ));
    }

    #[test]
    fn invalid_context_number_fails_fast() {
        let toml = format!(
            "{MINIMAL_TOML}\n[[context]]\nkeyword = \"x\"\nlabel = \"x\"\nnumbers = [\"1234\"]\n"
        );
        // [[context]] after [relevance] is still a top-level array of tables.
        assert!(matches!(
            PatternLibrary::from_toml_str(&toml),
            Err(PatternError::InvalidEntry { table: "context", .. })
        ));
    }

    #[test]
    fn not_followed_by_guard() {
        let lib = PatternLibrary::builtin().unwrap();
        let bare = lib
            .hidden()
            .iter()
            .find(|p| p.id == "time_bare")
            .expect("time_bare pattern");
        let buf = "ราคา 3.50 บาท";
        let m = bare.re.find(buf).unwrap();
        assert!(bare.blocked_after(buf, m.end()));
        let buf = "ช่วง 22.15 คืนนั้น";
        let m = bare.re.find(buf).unwrap();
        assert!(!bare.blocked_after(buf, m.end()));
    }
}
