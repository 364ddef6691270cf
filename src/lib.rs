// src/lib.rs
//! Lucky-number extraction and ensemble scoring for Thai news text.
//!
//! Flow: text → relevance gate + category → primary extraction → advanced
//! enrichment → dedup/truncate → [`AnalysisResult`]. The [`Switcher`] wraps the
//! flow and may hand it to a remote LLM analyzer, falling back to the local
//! heuristic on any failure.

pub mod backend;
pub mod candidate;
pub mod config;
pub mod error;
pub mod extract;
pub mod heuristic;
pub mod patterns;
pub mod relevance;
pub mod store;
pub mod switcher;
pub mod telemetry;
pub mod text;

// ---- Re-exports for stable public API ----
pub use crate::candidate::{AnalysisResult, AnalyzerKind, Category, NumericCandidate};
pub use crate::config::AnalyzerConfig;
pub use crate::error::{BackendError, CallFailure, CandidateError, PatternError};
pub use crate::heuristic::{HeuristicAnalyzer, HeuristicOptions};
pub use crate::patterns::PatternLibrary;
pub use crate::store::{FileStore, PredictionRecord, PredictionStore};
pub use crate::switcher::{Switcher, SwitcherOptions, SwitcherState};
pub use crate::text::SourceText;

use std::sync::Arc;

/// Load patterns and config from their default locations and build a ready switcher.
pub fn switcher_from_env() -> anyhow::Result<Switcher> {
    let cfg = AnalyzerConfig::load()?;
    let lib = Arc::new(PatternLibrary::load()?);
    Ok(Switcher::from_config(&cfg, lib))
}
