// tests/config_loading.rs
use std::{env, fs};

use lucky_number_analyzer::config::{
    ENV_CANDIDATE_LIMIT, ENV_CONFIG_PATH, ENV_PREFERRED_BACKEND,
};
use lucky_number_analyzer::patterns::ENV_PATTERNS_PATH;
use lucky_number_analyzer::{AnalyzerConfig, AnalyzerKind, PatternError, PatternLibrary};

fn clear_env() {
    for k in [
        ENV_CONFIG_PATH,
        ENV_PREFERRED_BACKEND,
        ENV_CANDIDATE_LIMIT,
        ENV_PATTERNS_PATH,
    ] {
        env::remove_var(k);
    }
}

#[serial_test::serial]
#[test]
fn analyzer_config_env_then_file_then_defaults() {
    clear_env();
    // isolate CWD so the repo's own config/ is not read
    let old = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    env::set_current_dir(tmp.path()).unwrap();

    // 1) nothing on disk: defaults
    let cfg = AnalyzerConfig::load().unwrap();
    assert_eq!(cfg, AnalyzerConfig::default());

    // 2) ./config/analyzer.json
    fs::create_dir_all(tmp.path().join("config")).unwrap();
    fs::write(
        tmp.path().join("config/analyzer.json"),
        r#"{"candidate_limit": 8, "require_relevance": true}"#,
    )
    .unwrap();
    let cfg = AnalyzerConfig::load().unwrap();
    assert_eq!(cfg.candidate_limit, 8);
    assert!(cfg.require_relevance);

    // 3) env path wins over the default location
    let p = tmp.path().join("other.json");
    fs::write(&p, r#"{"preferred_backend": "claude", "candidate_limit": 3}"#).unwrap();
    env::set_var(ENV_CONFIG_PATH, p.display().to_string());
    let cfg = AnalyzerConfig::load().unwrap();
    assert_eq!(cfg.preferred_backend, AnalyzerKind::Claude);
    assert_eq!(cfg.candidate_limit, 3);
    assert!(!cfg.require_relevance);

    // 4) scalar overrides on top
    env::set_var(ENV_PREFERRED_BACKEND, "openai");
    env::set_var(ENV_CANDIDATE_LIMIT, "999");
    let cfg = AnalyzerConfig::load().unwrap();
    assert_eq!(cfg.preferred_backend, AnalyzerKind::OpenAi);
    assert_eq!(cfg.candidate_limit, 50);

    // bad override values are ignored
    env::set_var(ENV_PREFERRED_BACKEND, "gemini");
    env::set_var(ENV_CANDIDATE_LIMIT, "lots");
    let cfg = AnalyzerConfig::load().unwrap();
    assert_eq!(cfg.preferred_backend, AnalyzerKind::Claude);
    assert_eq!(cfg.candidate_limit, 3);

    // 5) an explicit path that does not exist is an error
    env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.json").display().to_string());
    assert!(AnalyzerConfig::load().is_err());

    clear_env();
    env::set_current_dir(&old).unwrap();
}

#[test]
fn shipped_sample_config_parses() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/analyzer.json");
    let cfg = AnalyzerConfig::load_from_file(path).unwrap();
    assert_eq!(cfg.preferred_backend, AnalyzerKind::Heuristic);
    assert_eq!(cfg.fallback_order, vec![AnalyzerKind::OpenAi, AnalyzerKind::Claude]);
    assert!(!cfg.openai.enabled);
    assert!(!cfg.claude.enabled);
}

#[serial_test::serial]
#[test]
fn pattern_path_override_and_fail_fast() {
    clear_env();
    let tmp = tempfile::tempdir().unwrap();

    // a copy of the shipped tables loads through the env path
    let shipped = fs::read_to_string(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/config/patterns.toml"
    ))
    .unwrap();
    let good = tmp.path().join("patterns.toml");
    fs::write(&good, &shipped).unwrap();
    env::set_var(ENV_PATTERNS_PATH, good.display().to_string());
    let lib = PatternLibrary::load().unwrap();
    assert_eq!(lib.version, PatternLibrary::builtin().unwrap().version);

    // a broken regex is rejected at load, not at match time
    let broken = tmp.path().join("broken.toml");
    let mangled = shipped.replacen("(?P<num>", "(?P<num>(", 1);
    assert_ne!(mangled, shipped);
    fs::write(&broken, mangled).unwrap();
    env::set_var(ENV_PATTERNS_PATH, broken.display().to_string());
    assert!(matches!(PatternLibrary::load(), Err(PatternError::Regex { .. })));

    // a missing file is an I/O error
    env::set_var(ENV_PATTERNS_PATH, tmp.path().join("nope.toml").display().to_string());
    assert!(matches!(PatternLibrary::load(), Err(PatternError::Io { .. })));

    clear_env();
}
