// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::candidate::AnalyzerKind;
use crate::error::BackendError;

pub const OPENAI_KEY_ENV: &str = "OPENAI_API_KEY";
pub const ANTHROPIC_KEY_ENV: &str = "ANTHROPIC_API_KEY";
/// Older name, still honoured for the Claude backend.
pub const CLAUDE_KEY_ENV: &str = "CLAUDE_API_KEY";

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_CLAUDE_MODEL: &str = "claude-3-5-haiku-latest";

fn default_daily_limit() -> u32 {
    200
}
fn default_timeout_secs() -> u64 {
    20
}
fn default_connect_timeout_secs() -> u64 {
    4
}
fn default_api_key() -> String {
    "ENV".to_string()
}

/// Settings of one remote analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSettings {
    #[serde(default)]
    pub enabled: bool,
    /// Empty means the provider default.
    #[serde(default)]
    pub model: String,
    /// "ENV" means: read from OPENAI_API_KEY / ANTHROPIC_API_KEY (by backend)
    #[serde(default = "default_api_key")]
    pub api_key: String,
    /// Override of the provider URL (proxies, tests).
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Real calls per UTC day; cache hits are free.
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Response cache; `None` disables caching and the daily counter.
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            model: String::new(),
            api_key: default_api_key(),
            endpoint: None,
            daily_limit: default_daily_limit(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            cache_dir: None,
        }
    }
}

impl BackendSettings {
    pub fn model_or_default(&self, kind: AnalyzerKind) -> String {
        if !self.model.trim().is_empty() {
            return self.model.trim().to_string();
        }
        match kind {
            AnalyzerKind::Claude => DEFAULT_CLAUDE_MODEL.to_string(),
            _ => DEFAULT_OPENAI_MODEL.to_string(),
        }
    }

    /// Literal key, or the backend's env var when the value is "ENV".
    pub fn resolve_api_key(&self, kind: AnalyzerKind) -> Result<String, BackendError> {
        let raw = self.api_key.trim();
        if !raw.eq_ignore_ascii_case("env") {
            if raw.is_empty() {
                return Err(BackendError::unavailable(kind, "empty api_key"));
            }
            return Ok(raw.to_string());
        }
        let names: &[&str] = match kind {
            AnalyzerKind::OpenAi => &[OPENAI_KEY_ENV],
            AnalyzerKind::Claude => &[ANTHROPIC_KEY_ENV, CLAUDE_KEY_ENV],
            AnalyzerKind::Heuristic => {
                return Err(BackendError::unavailable(kind, "local analyzer takes no key"))
            }
        };
        names
            .iter()
            .filter_map(|n| env::var(n).ok())
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty())
            .ok_or_else(|| BackendError::unavailable(kind, format!("missing {} env var", names[0])))
    }

    /// Zero timeouts or limits fall back to defaults.
    pub(crate) fn sanitize(&mut self) {
        if self.timeout_secs == 0 {
            self.timeout_secs = default_timeout_secs();
        }
        if self.connect_timeout_secs == 0 || self.connect_timeout_secs > self.timeout_secs {
            self.connect_timeout_secs = default_connect_timeout_secs().min(self.timeout_secs);
        }
        if self.endpoint.as_deref().is_some_and(|e| e.trim().is_empty()) {
            self.endpoint = None;
        }
    }
}
