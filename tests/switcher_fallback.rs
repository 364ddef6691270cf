// tests/switcher_fallback.rs
use std::sync::Arc;

use chrono::{Duration, Utc};
use lucky_number_analyzer::backend::{MockAnalyzer, RemoteAnalysis, RemoteCandidate};
use lucky_number_analyzer::{
    AnalyzerConfig, AnalyzerKind, CallFailure, FileStore, HeuristicAnalyzer, HeuristicOptions,
    PatternLibrary, PredictionStore, SourceText, Switcher, SwitcherState,
};

fn heuristic() -> Arc<HeuristicAnalyzer> {
    Arc::new(HeuristicAnalyzer::new(
        Arc::new(PatternLibrary::builtin().unwrap()),
        HeuristicOptions::default(),
    ))
}

fn answer(numbers: &[&str]) -> RemoteAnalysis {
    RemoteAnalysis {
        success: true,
        category: "celebrity".into(),
        relevance_score: 80.0,
        numbers: numbers.iter().map(|n| n.to_string()).collect(),
        detailed_numbers: numbers
            .iter()
            .map(|n| RemoteCandidate {
                number: n.to_string(),
                source: "remote".into(),
                confidence: 70.0,
            })
            .collect(),
        reasoning: "from remote".into(),
    }
}

#[tokio::test]
async fn every_remote_failing_ends_at_heuristic() {
    let openai = Arc::new(MockAnalyzer::failing(AnalyzerKind::OpenAi, CallFailure::Status(500)));
    let claude = Arc::new(MockAnalyzer::failing(
        AnalyzerKind::Claude,
        CallFailure::Quota("daily limit".into()),
    ));
    let s = Switcher::builder(heuristic())
        .order(vec![AnalyzerKind::OpenAi, AnalyzerKind::Claude, AnalyzerKind::Heuristic])
        .remote(openai.clone())
        .remote(claude.clone())
        .build();
    assert_eq!(s.state(), SwitcherState::Ready(AnalyzerKind::OpenAi));

    let r = s.analyze("อุบัติเหตุรถชน ชายอายุ 45 ปี", "").await;
    assert!(r.success);
    assert!(r.used_fallback);
    assert_eq!(r.analyzer_used, AnalyzerKind::Heuristic);
    assert_eq!(r.numbers[0], "45");
    assert!(r.reasoning.contains("[fallback:"));
    assert_eq!(openai.calls(), 1);
    assert_eq!(claude.calls(), 1);
}

#[tokio::test]
async fn second_remote_answers_after_first_fails() {
    let openai = Arc::new(MockAnalyzer::failing(AnalyzerKind::OpenAi, CallFailure::Timeout));
    let claude = Arc::new(MockAnalyzer::answering(AnalyzerKind::Claude, answer(&["07", "70"])));
    let s = Switcher::builder(heuristic())
        .order(vec![AnalyzerKind::OpenAi, AnalyzerKind::Claude])
        .remote(openai.clone())
        .remote(claude.clone())
        .build();

    let r = s.analyze("นักร้องดัง", "แต่งงาน").await;
    assert_eq!(r.analyzer_used, AnalyzerKind::Claude);
    assert!(r.used_fallback);
    assert_eq!(r.numbers, vec!["07", "70"]);
    assert!(r.is_consistent());
}

#[tokio::test]
async fn limit_applies_to_remote_results() {
    let s = Switcher::builder(heuristic())
        .order(vec![AnalyzerKind::OpenAi])
        .remote(Arc::new(MockAnalyzer::answering(
            AnalyzerKind::OpenAi,
            answer(&["11", "22", "33", "44"]),
        )))
        .build();
    let r = s.analyze_with_limit("ดารา", "", 2).await;
    assert_eq!(r.numbers, vec!["11", "22"]);
    assert_eq!(r.detailed.len(), 2);
}

#[tokio::test]
async fn default_config_is_heuristic_only() {
    let cfg = AnalyzerConfig::default();
    let s = Switcher::from_config(&cfg, Arc::new(PatternLibrary::builtin().unwrap()));
    assert_eq!(s.chain(), vec![AnalyzerKind::Heuristic]);
    assert_eq!(s.active(), AnalyzerKind::Heuristic);
    let r = s.analyze("ชายอายุ 45 ปี", "").await;
    assert!(!r.used_fallback);
}

#[tokio::test]
async fn disabled_remotes_are_skipped_from_config() {
    let cfg = AnalyzerConfig {
        preferred_backend: AnalyzerKind::OpenAi,
        ..AnalyzerConfig::default()
    };
    let s = Switcher::from_config(&cfg, Arc::new(PatternLibrary::builtin().unwrap()));
    assert_eq!(s.chain(), vec![AnalyzerKind::Heuristic]);
}

#[tokio::test]
async fn batch_keeps_order_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path()).unwrap());
    let s = Arc::new(Switcher::builder(heuristic()).build());

    let items = vec![
        SourceText::new("ชายอายุ 45 ปี", ""),
        SourceText::new("", ""),
        SourceText::new("ทะเบียน พร 195", ""),
        SourceText::new("หญิงอายุ 67 ปี", ""),
    ];
    let results = s
        .analyze_batch(items.clone(), Some(store.clone() as Arc<dyn PredictionStore>))
        .await;

    assert_eq!(results.len(), 4);
    assert_eq!(results[0].numbers[0], "45");
    assert!(results[1].numbers.is_empty());
    assert_eq!(results[1].reasoning, "empty input");
    assert_eq!(results[2].numbers[0], "95");
    assert_eq!(results[3].numbers[0], "67");

    let stored = store.list().unwrap();
    assert_eq!(stored.len(), 4);
    let first = stored.iter().find(|r| r.title == "ชายอายุ 45 ปี").unwrap();
    assert_eq!(first.result, results[0]);

    // nothing is older than 30 days yet; a week later cutoff 0 removes all
    assert_eq!(store.cleanup(30, Utc::now()).unwrap(), 0);
    assert_eq!(store.cleanup(0, Utc::now() + Duration::days(7)).unwrap(), 4);
    assert!(store.list().unwrap().is_empty());
}

#[tokio::test]
async fn batch_reanalysis_replaces_record() {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn PredictionStore> = Arc::new(FileStore::open(dir.path()).unwrap());
    let s = Arc::new(Switcher::builder(heuristic()).build());
    let items = vec![SourceText::new("ชายอายุ 45 ปี", "")];
    s.analyze_batch(items.clone(), Some(store.clone())).await;
    s.analyze_batch(items, Some(store.clone())).await;
    assert_eq!(store.list().unwrap().len(), 1);
}
