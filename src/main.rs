//! CLI entrypoint.
//!
//! ```text
//! lucky-number-analyzer [INPUT.json]     analyze a JSON array of {title, body} (stdin if no file)
//! lucky-number-analyzer --cleanup        drop stored predictions older than `cleanup_days`
//! ```
//! Results are printed to stdout as a JSON array in input order; logs go to stderr.

use anyhow::{bail, Context};
use chrono::Utc;
use std::io::Read;
use std::sync::Arc;
use tracing::info;

use lucky_number_analyzer::telemetry::init_tracing;
use lucky_number_analyzer::{
    AnalyzerConfig, FileStore, PatternLibrary, PredictionStore, SourceText, Switcher,
};

enum Command {
    Analyze { input: Option<String> },
    Cleanup,
}

fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    match args {
        [] => Ok(Command::Analyze { input: None }),
        [flag] if flag == "--cleanup" => Ok(Command::Cleanup),
        [flag] if flag.starts_with("--") => bail!("unknown flag {flag}"),
        [path] => Ok(Command::Analyze {
            input: Some(path.clone()),
        }),
        _ => bail!("usage: lucky-number-analyzer [INPUT.json | --cleanup]"),
    }
}

/// Accepts an array of texts or a single object.
fn parse_items(raw: &str) -> anyhow::Result<Vec<SourceText>> {
    let value: serde_json::Value = serde_json::from_str(raw).context("input is not JSON")?;
    if value.is_array() {
        Ok(serde_json::from_value(value)?)
    } else {
        Ok(vec![serde_json::from_value(value)?])
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; API keys usually come from there in local runs.
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_args(&args)?;

    let cfg = AnalyzerConfig::load()?;
    let store: Option<Arc<dyn PredictionStore>> = match &cfg.store_dir {
        Some(dir) => Some(Arc::new(FileStore::open(dir)?) as Arc<dyn PredictionStore>),
        None => None,
    };

    match command {
        Command::Cleanup => {
            let Some(store) = store else {
                bail!("no store_dir configured");
            };
            let removed = store.cleanup(cfg.cleanup_days, Utc::now())?;
            println!("{}", serde_json::json!({ "removed": removed }));
        }
        Command::Analyze { input } => {
            let raw = match input {
                Some(path) => {
                    std::fs::read_to_string(&path).with_context(|| format!("reading {path}"))?
                }
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            let items = parse_items(&raw)?;

            let lib = Arc::new(PatternLibrary::load()?);
            let switcher = Arc::new(Switcher::from_config(&cfg, lib));
            info!(items = items.len(), active = %switcher.active(), "analyzing");

            let results = switcher.analyze_batch(items, store).await;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
    }
    Ok(())
}
