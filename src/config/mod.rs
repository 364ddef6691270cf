// src/config/mod.rs
//! Analyzer configuration, loaded once at the edge and passed down explicitly.

pub mod ai;

pub use ai::BackendSettings;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::candidate::{AnalyzerKind, MAX_CONFIDENCE};
use crate::extract::{AdvancedOptions, DEFAULT_LIMIT};
use crate::heuristic::HeuristicOptions;

pub const DEFAULT_CONFIG_PATH: &str = "config/analyzer.json";
pub const ENV_CONFIG_PATH: &str = "LUCKY_CONFIG_PATH";
pub const ENV_PREFERRED_BACKEND: &str = "LUCKY_PREFERRED_BACKEND";
pub const ENV_CANDIDATE_LIMIT: &str = "LUCKY_CANDIDATE_LIMIT";

pub const MAX_CANDIDATE_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub preferred_backend: AnalyzerKind,
    /// Remotes tried after the preferred one; the heuristic always closes the chain.
    pub fallback_order: Vec<AnalyzerKind>,
    pub candidate_limit: usize,
    pub require_relevance: bool,
    /// Minimum remote score for a remote result to count as relevant.
    pub remote_relevance_threshold: u8,
    pub cleanup_days: u32,
    /// Prediction store; `None` disables persistence.
    pub store_dir: Option<PathBuf>,
    pub advanced: AdvancedOptions,
    pub openai: BackendSettings,
    pub claude: BackendSettings,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            preferred_backend: AnalyzerKind::Heuristic,
            fallback_order: vec![AnalyzerKind::OpenAi, AnalyzerKind::Claude],
            candidate_limit: DEFAULT_LIMIT,
            require_relevance: false,
            remote_relevance_threshold: 50,
            cleanup_days: 30,
            store_dir: None,
            advanced: AdvancedOptions::default(),
            openai: BackendSettings::default(),
            claude: BackendSettings::default(),
        }
    }
}

impl AnalyzerConfig {
    /// `LUCKY_CONFIG_PATH` (must exist) → `config/analyzer.json` (optional) → defaults,
    /// then env overrides.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var(ENV_CONFIG_PATH) {
            Ok(p) if !p.trim().is_empty() => Self::load_from_file(p.trim())?,
            _ => {
                let p = Path::new(DEFAULT_CONFIG_PATH);
                if p.exists() {
                    Self::load_from_file(p)?
                } else {
                    info!(target: "config", "no analyzer config found, using defaults");
                    Self::default()
                }
            }
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading analyzer config {}", path.display()))?;
        let cfg = Self::from_json_str(&data)
            .with_context(|| format!("parsing analyzer config {}", path.display()))?;
        info!(
            target: "config",
            path = %path.display(),
            preferred = %cfg.preferred_backend,
            "analyzer config loaded"
        );
        Ok(cfg)
    }

    pub fn from_json_str(data: &str) -> anyhow::Result<Self> {
        let mut cfg: AnalyzerConfig = serde_json::from_str(data)?;
        cfg.sanitize();
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(raw) = std::env::var(ENV_PREFERRED_BACKEND) {
            match raw.parse::<AnalyzerKind>() {
                Ok(kind) => self.preferred_backend = kind,
                Err(e) => warn!(target: "config", error = %e, "ignoring {ENV_PREFERRED_BACKEND}"),
            }
        }
        if let Some(limit) = parse_limit_env(std::env::var(ENV_CANDIDATE_LIMIT).ok()) {
            self.candidate_limit = limit;
        }
    }

    fn sanitize(&mut self) {
        if self.candidate_limit == 0 {
            self.candidate_limit = DEFAULT_LIMIT;
        }
        self.candidate_limit = self.candidate_limit.min(MAX_CANDIDATE_LIMIT);
        self.remote_relevance_threshold = self.remote_relevance_threshold.min(MAX_CONFIDENCE);

        let mut seen = Vec::new();
        self.fallback_order.retain(|k| {
            let keep = k.is_remote() && !seen.contains(k);
            seen.push(*k);
            keep
        });

        self.openai.sanitize();
        self.claude.sanitize();
    }

    pub fn heuristic_options(&self) -> HeuristicOptions {
        HeuristicOptions {
            limit: self.candidate_limit,
            require_relevance: self.require_relevance,
            advanced: self.advanced,
        }
    }

    pub fn settings(&self, kind: AnalyzerKind) -> Option<&BackendSettings> {
        match kind {
            AnalyzerKind::OpenAi => Some(&self.openai),
            AnalyzerKind::Claude => Some(&self.claude),
            AnalyzerKind::Heuristic => None,
        }
    }

    /// Preferred backend first, then the fallback order. Heuristic ends the chain.
    pub fn backend_order(&self) -> Vec<AnalyzerKind> {
        let mut order = vec![self.preferred_backend];
        if self.preferred_backend.is_remote() {
            order.extend(
                self.fallback_order
                    .iter()
                    .copied()
                    .filter(|k| *k != self.preferred_backend),
            );
        }
        order.retain(AnalyzerKind::is_remote);
        order.push(AnalyzerKind::Heuristic);
        order
    }
}

/// Parse an optional limit and clamp to `1..=MAX_CANDIDATE_LIMIT`.
fn parse_limit_env(raw: Option<String>) -> Option<usize> {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
        .map(|v| v.clamp(1, MAX_CANDIDATE_LIMIT))
}
