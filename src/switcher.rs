// src/switcher.rs
//! Ensemble switcher: picks the first available backend in configured order and
//! falls through on failure. The local heuristic always closes the chain, so
//! `analyze` always returns a successful result.
//!
//! Lifecycle: `Uninitialized` (builder) → `Probing` (`build`) → `Ready(kind)`.
//! Per call: each backend in the chain is tried at most once.

use chrono::Utc;
use metrics::counter;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::backend::{build_remote, Backend, DynRemote};
use crate::candidate::{AnalysisResult, AnalyzerKind};
use crate::config::AnalyzerConfig;
use crate::error::BackendError;
use crate::extract::DEFAULT_LIMIT;
use crate::heuristic::HeuristicAnalyzer;
use crate::patterns::PatternLibrary;
use crate::store::{PredictionRecord, PredictionStore};
use crate::telemetry::{anon_hash, ensure_metrics_described};
use crate::text::{normalize_text, SourceText};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitcherState {
    Uninitialized,
    Probing,
    Ready(AnalyzerKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitcherOptions {
    pub limit: usize,
    /// Withhold numbers from results not marked relevant.
    pub require_relevance: bool,
    pub remote_relevance_threshold: u8,
    /// Concurrent analyses in `analyze_batch`.
    pub batch_concurrency: usize,
}

impl Default for SwitcherOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            require_relevance: false,
            remote_relevance_threshold: 50,
            batch_concurrency: 4,
        }
    }
}

/// Collects candidate backends before probing.
pub struct SwitcherBuilder {
    heuristic: Arc<HeuristicAnalyzer>,
    opts: SwitcherOptions,
    order: Vec<AnalyzerKind>,
    available: Vec<DynRemote>,
    unavailable: Vec<BackendError>,
}

impl SwitcherBuilder {
    pub fn new(heuristic: Arc<HeuristicAnalyzer>) -> Self {
        Self {
            heuristic,
            opts: SwitcherOptions::default(),
            order: vec![AnalyzerKind::Heuristic],
            available: Vec::new(),
            unavailable: Vec::new(),
        }
    }

    pub fn state(&self) -> SwitcherState {
        SwitcherState::Uninitialized
    }

    pub fn options(mut self, opts: SwitcherOptions) -> Self {
        self.opts = opts;
        self
    }

    /// Preferred backend first. Anything after `Heuristic` is ignored.
    pub fn order(mut self, order: Vec<AnalyzerKind>) -> Self {
        self.order = order;
        self
    }

    pub fn remote(mut self, remote: DynRemote) -> Self {
        self.available.push(remote);
        self
    }

    /// Record a backend that failed to initialize.
    pub fn unavailable(mut self, err: BackendError) -> Self {
        self.unavailable.push(err);
        self
    }

    /// Probe: keep the ordered backends that initialized, skip the rest.
    pub fn build(self) -> Switcher {
        ensure_metrics_described();
        info!(target: "switcher", state = ?SwitcherState::Probing, order = ?self.order, "probing backends");

        let mut chain: Vec<Backend> = Vec::new();
        let mut seen: Vec<AnalyzerKind> = Vec::new();
        for kind in self.order.iter().copied() {
            if kind == AnalyzerKind::Heuristic {
                break;
            }
            if seen.contains(&kind) {
                continue;
            }
            seen.push(kind);

            if let Some(remote) = self.available.iter().find(|r| r.kind() == kind) {
                chain.push(Backend::Remote(remote.clone()));
                continue;
            }
            let reason = self
                .unavailable
                .iter()
                .find(|e| e.kind() == kind)
                .map(|e| e.to_string())
                .unwrap_or_else(|| format!("backend {kind} not configured"));
            warn!(target: "switcher", backend = %kind, %reason, "backend unavailable, skipping");
            counter!("lucky_backend_unavailable_total", "backend" => kind.as_str()).increment(1);
        }
        chain.push(Backend::Heuristic(self.heuristic.clone()));

        let active = chain.first().map(Backend::kind).unwrap_or_default();
        let state = SwitcherState::Ready(active);
        info!(
            target: "switcher",
            ?state,
            chain = ?chain.iter().map(Backend::kind).collect::<Vec<_>>(),
            "switcher ready"
        );

        Switcher {
            chain,
            heuristic: self.heuristic,
            opts: self.opts,
            state,
        }
    }
}

#[derive(Debug)]
pub struct Switcher {
    chain: Vec<Backend>,
    heuristic: Arc<HeuristicAnalyzer>,
    opts: SwitcherOptions,
    state: SwitcherState,
}

impl Switcher {
    pub fn builder(heuristic: Arc<HeuristicAnalyzer>) -> SwitcherBuilder {
        SwitcherBuilder::new(heuristic)
    }

    /// Wire the heuristic and every remote named by `cfg`, then probe.
    pub fn from_config(cfg: &AnalyzerConfig, lib: Arc<PatternLibrary>) -> Self {
        let heuristic = Arc::new(HeuristicAnalyzer::new(lib, cfg.heuristic_options()));
        let order = cfg.backend_order();
        let mut builder = Self::builder(heuristic)
            .options(SwitcherOptions {
                limit: cfg.candidate_limit,
                require_relevance: cfg.require_relevance,
                remote_relevance_threshold: cfg.remote_relevance_threshold,
                ..SwitcherOptions::default()
            })
            .order(order.clone());

        for kind in order.into_iter().filter(AnalyzerKind::is_remote) {
            let Some(settings) = cfg.settings(kind) else {
                continue;
            };
            builder = match build_remote(kind, settings) {
                Ok(remote) => builder.remote(remote),
                Err(e) => builder.unavailable(e),
            };
        }
        builder.build()
    }

    pub fn state(&self) -> SwitcherState {
        self.state
    }

    /// Backend that answers first.
    pub fn active(&self) -> AnalyzerKind {
        match self.state {
            SwitcherState::Ready(kind) => kind,
            _ => AnalyzerKind::Heuristic,
        }
    }

    /// Backends in the order they are tried.
    pub fn chain(&self) -> Vec<AnalyzerKind> {
        self.chain.iter().map(Backend::kind).collect()
    }

    pub fn options(&self) -> SwitcherOptions {
        self.opts
    }

    pub async fn analyze(&self, title: &str, content: &str) -> AnalysisResult {
        self.analyze_with_limit(title, content, self.opts.limit).await
    }

    pub async fn analyze_with_limit(&self, title: &str, content: &str, limit: usize) -> AnalysisResult {
        let text = SourceText::new(title, content);
        let (title, content) = (normalize_text(title), normalize_text(content));
        // markup-only input is blank too; it never reaches a remote
        if title.is_empty() && content.is_empty() {
            return self.finish(self.heuristic.analyze_text(&text, limit), &[]);
        }

        let mut failures: Vec<String> = Vec::new();
        for backend in &self.chain {
            let remote = match backend {
                Backend::Heuristic(h) => {
                    return self.finish(h.analyze_text(&text, limit), &failures);
                }
                Backend::Remote(r) => r,
            };
            let kind = remote.kind();
            let outcome = match remote.analyze(&title, &content).await {
                Ok(a) => a
                    .into_result(kind, limit, self.opts.remote_relevance_threshold)
                    .map_err(|f| BackendError::call(kind, f)),
                Err(e) => Err(e),
            };
            match outcome {
                Ok(result) => return self.finish(self.gate(result), &failures),
                Err(e) => {
                    warn!(
                        target: "switcher",
                        backend = %kind,
                        id = %anon_hash(&title),
                        error = %e,
                        "backend failed, falling through"
                    );
                    counter!("lucky_backend_fallback_total", "from" => kind.as_str()).increment(1);
                    failures.push(e.to_string());
                }
            }
        }
        // unreachable in practice: the chain always ends with the heuristic
        self.finish(self.heuristic.analyze_text(&text, limit), &failures)
    }

    /// Relevance gate through the same chain.
    pub async fn is_relevant(&self, title: &str, content: &str) -> bool {
        let (title, content) = (normalize_text(title), normalize_text(content));
        if title.is_empty() && content.is_empty() {
            return false;
        }
        for backend in &self.chain {
            match backend {
                Backend::Heuristic(h) => return h.is_relevant(&title, &content),
                Backend::Remote(remote) => match remote.is_relevant(&title, &content).await {
                    Ok(v) => return v,
                    Err(e) => {
                        warn!(target: "switcher", backend = %remote.kind(), error = %e, "relevance check failed");
                        counter!("lucky_backend_fallback_total", "from" => remote.kind().as_str())
                            .increment(1);
                    }
                },
            }
        }
        self.heuristic.is_relevant(&title, &content)
    }

    /// Analyze many texts concurrently. Output order matches input order.
    /// Each result is persisted to `store` when given; store errors are logged only.
    pub async fn analyze_batch(
        self: &Arc<Self>,
        items: Vec<SourceText>,
        store: Option<Arc<dyn PredictionStore>>,
    ) -> Vec<AnalysisResult> {
        let permits = Arc::new(Semaphore::new(self.opts.batch_concurrency.max(1)));
        let mut set = JoinSet::new();
        for (idx, item) in items.iter().cloned().enumerate() {
            let this = Arc::clone(self);
            let permits = Arc::clone(&permits);
            set.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                (idx, this.analyze(&item.title, &item.body).await)
            });
        }

        let mut slots: Vec<Option<AnalysisResult>> = vec![None; items.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((idx, result)) => slots[idx] = Some(result),
                Err(e) => error!(target: "switcher", error = %e, "batch task failed"),
            }
        }

        let results: Vec<AnalysisResult> = slots
            .into_iter()
            .zip(&items)
            .map(|(slot, item)| {
                slot.unwrap_or_else(|| {
                    let mut r = self.heuristic.analyze_text(item, self.opts.limit);
                    r.used_fallback = true;
                    r
                })
            })
            .collect();

        if let Some(store) = store {
            let now = Utc::now();
            for (item, result) in items.iter().zip(&results) {
                let record = PredictionRecord::new(item, result.clone(), now);
                if let Err(e) = store.save(&record) {
                    warn!(target: "switcher", id = %record.id, error = %e, "failed to persist prediction");
                    counter!("lucky_store_errors_total").increment(1);
                }
            }
        }
        results
    }

    fn gate(&self, mut result: AnalysisResult) -> AnalysisResult {
        if self.opts.require_relevance && !result.relevant {
            result.set_candidates(Vec::new());
        }
        result
    }

    fn finish(&self, mut result: AnalysisResult, failures: &[String]) -> AnalysisResult {
        if !failures.is_empty() {
            result.used_fallback = true;
            result.reasoning = format!("{} [fallback: {}]", result.reasoning, failures.join("; "));
        }
        counter!("lucky_analyses_total", "analyzer" => result.analyzer_used.as_str()).increment(1);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockAnalyzer, RemoteAnalysis, RemoteCandidate};
    use crate::error::CallFailure;
    use crate::heuristic::HeuristicOptions;

    fn heuristic() -> Arc<HeuristicAnalyzer> {
        Arc::new(HeuristicAnalyzer::new(
            Arc::new(PatternLibrary::builtin().expect("builtin")),
            HeuristicOptions::default(),
        ))
    }

    fn remote_answer() -> RemoteAnalysis {
        RemoteAnalysis {
            success: true,
            category: "accident".into(),
            relevance_score: 90.0,
            numbers: vec!["45".into()],
            detailed_numbers: vec![RemoteCandidate {
                number: "45".into(),
                source: "age".into(),
                confidence: 90.0,
            }],
            reasoning: "remote".into(),
        }
    }

    #[test]
    fn builder_starts_uninitialized() {
        let b = Switcher::builder(heuristic());
        assert_eq!(b.state(), SwitcherState::Uninitialized);
        let s = b.build();
        assert_eq!(s.state(), SwitcherState::Ready(AnalyzerKind::Heuristic));
        assert_eq!(s.chain(), vec![AnalyzerKind::Heuristic]);
    }

    #[test]
    fn unavailable_backends_are_skipped() {
        let s = Switcher::builder(heuristic())
            .order(vec![AnalyzerKind::OpenAi, AnalyzerKind::Claude, AnalyzerKind::Heuristic])
            .unavailable(BackendError::unavailable(AnalyzerKind::OpenAi, "no key"))
            .remote(Arc::new(MockAnalyzer::answering(AnalyzerKind::Claude, remote_answer())))
            .build();
        assert_eq!(s.active(), AnalyzerKind::Claude);
        assert_eq!(s.chain(), vec![AnalyzerKind::Claude, AnalyzerKind::Heuristic]);
    }

    #[tokio::test]
    async fn remote_success_is_used() {
        let s = Switcher::builder(heuristic())
            .order(vec![AnalyzerKind::OpenAi])
            .remote(Arc::new(MockAnalyzer::answering(AnalyzerKind::OpenAi, remote_answer())))
            .build();
        let r = s.analyze("รถชน อายุ 45 ปี", "").await;
        assert_eq!(r.analyzer_used, AnalyzerKind::OpenAi);
        assert!(!r.used_fallback);
        assert_eq!(r.numbers, vec!["45"]);
        assert!(r.relevant);
    }

    #[tokio::test]
    async fn failing_preferred_falls_back_once() {
        let failing = Arc::new(MockAnalyzer::failing(AnalyzerKind::OpenAi, CallFailure::Timeout));
        let s = Switcher::builder(heuristic())
            .order(vec![AnalyzerKind::OpenAi, AnalyzerKind::Heuristic])
            .remote(failing.clone())
            .build();
        let r = s.analyze("รถชน ชายอายุ 45 ปี", "").await;
        assert!(r.success);
        assert!(r.used_fallback);
        assert_eq!(r.analyzer_used, AnalyzerKind::Heuristic);
        assert!(r.reasoning.contains("timed out"));
        assert_eq!(failing.calls(), 1);
    }

    #[tokio::test]
    async fn malformed_remote_reply_is_a_failure() {
        let mut bad = remote_answer();
        bad.numbers = vec!["99".into()];
        let s = Switcher::builder(heuristic())
            .order(vec![AnalyzerKind::Claude])
            .remote(Arc::new(MockAnalyzer::answering(AnalyzerKind::Claude, bad)))
            .build();
        let r = s.analyze("อายุ 45 ปี", "").await;
        assert!(r.used_fallback);
        assert_eq!(r.analyzer_used, AnalyzerKind::Heuristic);
    }

    #[tokio::test]
    async fn blank_input_never_reaches_remote() {
        let remote = Arc::new(MockAnalyzer::answering(AnalyzerKind::OpenAi, remote_answer()));
        let s = Switcher::builder(heuristic())
            .order(vec![AnalyzerKind::OpenAi])
            .remote(remote.clone())
            .build();
        let r = s.analyze("", "   ").await;
        assert!(r.success);
        assert!(!r.relevant);
        assert_eq!(r.reasoning, "empty input");
        assert_eq!(remote.calls(), 0);
    }

    #[tokio::test]
    async fn markup_only_input_is_blank() {
        let remote = Arc::new(MockAnalyzer::answering(AnalyzerKind::OpenAi, remote_answer()));
        let s = Switcher::builder(heuristic())
            .order(vec![AnalyzerKind::OpenAi])
            .remote(remote.clone())
            .build();
        let r = s.analyze("<p>&nbsp;</p>", "<br/>").await;
        assert!(r.success);
        assert!(!r.relevant);
        assert!(r.numbers.is_empty());
        assert_eq!(r.analyzer_used, AnalyzerKind::Heuristic);
        assert_eq!(r.reasoning, "empty input");
        assert!(!s.is_relevant("<div> </div>", "&nbsp;").await);
        assert_eq!(remote.calls(), 0);
    }

    #[tokio::test]
    async fn relevance_falls_back_too() {
        let s = Switcher::builder(heuristic())
            .order(vec![AnalyzerKind::OpenAi])
            .remote(Arc::new(MockAnalyzer::failing(
                AnalyzerKind::OpenAi,
                CallFailure::Status(503),
            )))
            .build();
        assert!(s.is_relevant("รถชนที่บางนา", "").await);
        assert!(!s.is_relevant("รีวิวโรงแรม รถชน", "").await);
    }

    #[tokio::test]
    async fn require_relevance_gates_remote_results() {
        let mut low = remote_answer();
        low.relevance_score = 20.0;
        let s = Switcher::builder(heuristic())
            .options(SwitcherOptions {
                require_relevance: true,
                ..SwitcherOptions::default()
            })
            .order(vec![AnalyzerKind::OpenAi])
            .remote(Arc::new(MockAnalyzer::answering(AnalyzerKind::OpenAi, low)))
            .build();
        let r = s.analyze("อายุ 45 ปี", "").await;
        assert!(!r.relevant);
        assert!(r.numbers.is_empty());
        assert_eq!(r.relevance_score, 20);
    }
}
