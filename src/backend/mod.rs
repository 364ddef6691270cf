// src/backend/mod.rs
//! Analyzer backends: the local heuristic and remote LLM-backed analyzers
//! behind one closed enum.

pub mod cache;
pub mod claude;
pub mod openai;
pub mod prompt;

pub use cache::CachingAnalyzer;
pub use claude::ClaudeAnalyzer;
pub use openai::OpenAiAnalyzer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::candidate::{AnalysisResult, AnalyzerKind, Category, NumericCandidate, MAX_CONFIDENCE};
use crate::config::BackendSettings;
use crate::error::{BackendError, CallFailure};
use crate::extract::normalize;
use crate::heuristic::HeuristicAnalyzer;

const USER_AGENT: &str = concat!("lucky-number-analyzer/", env!("CARGO_PKG_VERSION"));

/// Reply shape every remote analyzer must produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteAnalysis {
    pub success: bool,
    pub category: String,
    pub relevance_score: f64,
    pub numbers: Vec<String>,
    pub detailed_numbers: Vec<RemoteCandidate>,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteCandidate {
    pub number: String,
    pub source: String,
    pub confidence: f64,
}

impl RemoteAnalysis {
    /// Shape check. Nothing is coerced: any violation fails the call.
    pub fn validate(&self) -> Result<(), CallFailure> {
        self.checked_parts().map(|_| ())
    }

    fn checked_parts(&self) -> Result<(Category, u8, Vec<NumericCandidate>), CallFailure> {
        if !self.success {
            return Err(CallFailure::Malformed("backend reported success=false".into()));
        }
        let category: Category = self.category.parse().map_err(CallFailure::Malformed)?;
        let score = checked_score("relevance_score", self.relevance_score)?;

        let detailed = self
            .detailed_numbers
            .iter()
            .map(|c| {
                let conf = checked_score("confidence", c.confidence)?;
                NumericCandidate::new(c.number.clone(), c.source.clone(), conf)
                    .map_err(|e| CallFailure::Malformed(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mirrors = self.numbers.len() == detailed.len()
            && self.numbers.iter().zip(&detailed).all(|(n, c)| n == c.value());
        if !mirrors {
            return Err(CallFailure::Malformed(
                "numbers do not match detailed_numbers".into(),
            ));
        }
        Ok((category, score, detailed))
    }

    /// Validate, then normalize into the common result contract.
    pub fn into_result(
        self,
        kind: AnalyzerKind,
        limit: usize,
        relevance_threshold: u8,
    ) -> Result<AnalysisResult, CallFailure> {
        let (category, score, detailed) = self.checked_parts()?;
        let norm = normalize(detailed, limit);
        let mut result = AnalysisResult::empty(kind, category, score, self.reasoning.trim());
        result.relevant = score >= relevance_threshold;
        result.set_candidates(norm.detailed);
        Ok(result)
    }
}

fn checked_score(field: &str, v: f64) -> Result<u8, CallFailure> {
    if v.is_finite() && (0.0..=f64::from(MAX_CONFIDENCE)).contains(&v) {
        Ok(v.round() as u8)
    } else {
        Err(CallFailure::Malformed(format!("{field} {v} outside 0..=100")))
    }
}

/// A remote analyzer reached over the network.
#[async_trait]
pub trait RemoteAnalyzer: Send + Sync {
    fn kind(&self) -> AnalyzerKind;
    async fn is_relevant(&self, title: &str, content: &str) -> Result<bool, BackendError>;
    async fn analyze(&self, title: &str, content: &str) -> Result<RemoteAnalysis, BackendError>;
}

pub type DynRemote = Arc<dyn RemoteAnalyzer>;

/// Closed set of backends the switcher can hold.
#[derive(Clone)]
pub enum Backend {
    Heuristic(Arc<HeuristicAnalyzer>),
    Remote(DynRemote),
}

impl Backend {
    pub fn kind(&self) -> AnalyzerKind {
        match self {
            Backend::Heuristic(_) => AnalyzerKind::Heuristic,
            Backend::Remote(r) => r.kind(),
        }
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Backend({})", self.kind())
    }
}

/// Build the real client for `kind`, cached when `cache_dir` is set.
pub fn build_remote(kind: AnalyzerKind, settings: &BackendSettings) -> Result<DynRemote, BackendError> {
    if !settings.enabled {
        return Err(BackendError::unavailable(kind, "disabled in config"));
    }
    match kind {
        AnalyzerKind::OpenAi => Ok(wrap(OpenAiAnalyzer::from_settings(settings)?, settings)),
        AnalyzerKind::Claude => Ok(wrap(ClaudeAnalyzer::from_settings(settings)?, settings)),
        AnalyzerKind::Heuristic => Err(BackendError::unavailable(kind, "not a remote backend")),
    }
}

fn wrap<R: RemoteAnalyzer + 'static>(inner: R, settings: &BackendSettings) -> DynRemote {
    match &settings.cache_dir {
        Some(dir) => Arc::new(CachingAnalyzer::new(inner, dir.clone(), settings.daily_limit)),
        None => Arc::new(inner),
    }
}

pub(crate) fn http_client(
    kind: AnalyzerKind,
    settings: &BackendSettings,
) -> Result<reqwest::Client, BackendError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
        .timeout(Duration::from_secs(settings.timeout_secs))
        .build()
        .map_err(|e| BackendError::unavailable(kind, e.to_string()))
}

/// 429 is a quota failure, any other non-2xx a status failure.
pub(crate) fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, CallFailure> {
    let status = resp.status();
    if status.as_u16() == 429 {
        return Err(CallFailure::Quota("rate limited by provider".into()));
    }
    if !status.is_success() {
        return Err(CallFailure::Status(status.as_u16()));
    }
    Ok(resp)
}

/// Canned remote analyzer for local runs and tests. Counts calls.
#[derive(Debug)]
pub struct MockAnalyzer {
    kind: AnalyzerKind,
    analysis: Result<RemoteAnalysis, CallFailure>,
    relevant: Result<bool, CallFailure>,
    calls: AtomicUsize,
}

impl MockAnalyzer {
    pub fn answering(kind: AnalyzerKind, analysis: RemoteAnalysis) -> Self {
        let relevant = Ok(analysis.relevance_score >= 50.0);
        Self {
            kind,
            analysis: Ok(analysis),
            relevant,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(kind: AnalyzerKind, failure: CallFailure) -> Self {
        Self {
            kind,
            analysis: Err(failure.clone()),
            relevant: Err(failure),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteAnalyzer for MockAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        self.kind
    }

    async fn is_relevant(&self, _title: &str, _content: &str) -> Result<bool, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.relevant
            .clone()
            .map_err(|f| BackendError::call(self.kind, f))
    }

    async fn analyze(&self, _title: &str, _content: &str) -> Result<RemoteAnalysis, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.analysis
            .clone()
            .map_err(|f| BackendError::call(self.kind, f))
    }
}
