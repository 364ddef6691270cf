// src/telemetry.rs
//! Tracing setup, metric descriptions and anonymized dev logging helpers.

use metrics::{describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_LOG_FORMAT: &str = "LUCKY_LOG_FORMAT";
pub const ENV_DEV_LOG: &str = "LUCKY_DEV_LOG";
pub const ENV_RUNTIME_ENV: &str = "LUCKY_ENV";

const DEFAULT_FILTER: &str = "lucky_number_analyzer=info,switcher=info,warn";

/// Install the global subscriber. `LUCKY_LOG_FORMAT=json` switches to JSON lines.
/// Logs go to stderr so stdout stays clean for results.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json = std::env::var(ENV_LOG_FORMAT)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let res = if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init()
    };
    // Already installed (tests, embedding apps) is fine.
    let _ = res;
}

/// Register metric descriptions once per process.
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "lucky_analyses_total",
            "Completed analyses, labelled by the analyzer that produced the result."
        );
        describe_counter!(
            "lucky_backend_fallback_total",
            "Remote calls that failed and fell through, labelled by failing backend."
        );
        describe_counter!(
            "lucky_backend_unavailable_total",
            "Backends skipped at startup because they could not be initialized."
        );
        describe_counter!(
            "lucky_heuristic_runs_total",
            "Local heuristic pipeline runs."
        );
        describe_counter!(
            "lucky_store_errors_total",
            "Prediction records that could not be persisted."
        );
        describe_histogram!(
            "lucky_candidates",
            "Unique candidates found per heuristic run, before truncation."
        );
    });
}

/// `LUCKY_DEV_LOG=1` AND a dev environment (debug build or `LUCKY_ENV` in {local, development, dev}).
pub(crate) fn dev_logging_enabled() -> bool {
    let on = std::env::var(ENV_DEV_LOG).ok().as_deref() == Some("1");
    if !on {
        return false;
    }
    if cfg!(debug_assertions) {
        return true;
    }
    matches!(
        std::env::var(ENV_RUNTIME_ENV)
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str(),
        "local" | "development" | "dev"
    )
}

/// Short stable id for a text: first 6 bytes of SHA-256, hex.
pub fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    use std::fmt::Write as _;
    let digest = Sha256::digest(text.as_bytes());
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

pub(crate) fn truncate_vec<T: ToString>(v: &[T], max: usize) -> Vec<String> {
    v.iter().take(max).map(|x| x.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn anon_hash_is_short_and_stable() {
        let a = anon_hash("รถชนที่ถนนพระราม 2");
        assert_eq!(a.len(), 12);
        assert_eq!(a, anon_hash("รถชนที่ถนนพระราม 2"));
        assert_ne!(a, anon_hash("อื่น"));
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    #[serial]
    fn dev_logging_requires_flag() {
        std::env::remove_var(ENV_DEV_LOG);
        assert!(!dev_logging_enabled());
        std::env::set_var(ENV_DEV_LOG, "1");
        std::env::set_var(ENV_RUNTIME_ENV, "local");
        assert!(dev_logging_enabled());
        std::env::remove_var(ENV_DEV_LOG);
        std::env::remove_var(ENV_RUNTIME_ENV);
    }

    #[test]
    fn truncate_keeps_prefix() {
        assert_eq!(truncate_vec(&["a", "b", "c"], 2), vec!["a", "b"]);
    }

    #[test]
    fn describing_twice_is_harmless() {
        ensure_metrics_described();
        ensure_metrics_described();
        init_tracing();
        init_tracing();
    }
}
