// src/backend/cache.rs
//! File cache + daily call limit around any remote analyzer.
//! Cache hits are free; only real calls count towards the limit.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

use super::{RemoteAnalysis, RemoteAnalyzer};
use crate::candidate::AnalyzerKind;
use crate::error::{BackendError, CallFailure};

pub struct CachingAnalyzer<R> {
    inner: R,
    cache_dir: PathBuf,
    daily_limit: u32,
    counter: Mutex<DailyCounter>,
}

impl<R: RemoteAnalyzer> CachingAnalyzer<R> {
    pub fn new(inner: R, cache_dir: PathBuf, daily_limit: u32) -> Self {
        if let Err(e) = fs::create_dir_all(&cache_dir) {
            warn!(target: "backend", dir = %cache_dir.display(), error = %e, "cache dir not created");
        }
        let counter = Mutex::new(load_daily_counter(&cache_dir).unwrap_or_default());
        Self {
            inner,
            cache_dir,
            daily_limit,
            counter,
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Real calls made today (UTC).
    pub fn calls_today(&self) -> u32 {
        let g = self.counter.lock().unwrap_or_else(|e| e.into_inner());
        if g.is_expired() {
            0
        } else {
            g.count
        }
    }

    /// Take one slot of today's budget under the lock, so concurrent calls
    /// can never overshoot `daily_limit`.
    fn reserve_slot(&self) -> Result<(), BackendError> {
        let mut g = self.counter.lock().unwrap_or_else(|e| e.into_inner());
        if g.is_expired() {
            g.reset_to_today();
        }
        if g.count >= self.daily_limit {
            return Err(BackendError::call(
                self.inner.kind(),
                CallFailure::Quota(format!("daily limit {} reached", self.daily_limit)),
            ));
        }
        g.count = g.count.saturating_add(1);
        let _ = save_daily_counter(&self.cache_dir, &g);
        Ok(())
    }

    /// Failed calls do not count.
    fn release_slot(&self) {
        let mut g = self.counter.lock().unwrap_or_else(|e| e.into_inner());
        if g.is_expired() {
            return;
        }
        g.count = g.count.saturating_sub(1);
        let _ = save_daily_counter(&self.cache_dir, &g);
    }

    fn key(&self, op: &str, title: &str, content: &str) -> String {
        cache_key(self.inner.kind(), op, title, content)
    }
}

#[async_trait]
impl<R: RemoteAnalyzer> RemoteAnalyzer for CachingAnalyzer<R> {
    fn kind(&self) -> AnalyzerKind {
        self.inner.kind()
    }

    async fn is_relevant(&self, title: &str, content: &str) -> Result<bool, BackendError> {
        let key = self.key("relevance", title, content);
        if let Some(hit) = read_cache_file::<bool>(&self.cache_dir, &key) {
            debug!(target: "backend", backend = %self.kind(), "relevance cache hit");
            return Ok(hit);
        }
        self.reserve_slot()?;
        let fresh = self
            .inner
            .is_relevant(title, content)
            .await
            .inspect_err(|_| self.release_slot())?;
        let _ = write_cache_file(&self.cache_dir, &key, &fresh);
        Ok(fresh)
    }

    async fn analyze(&self, title: &str, content: &str) -> Result<RemoteAnalysis, BackendError> {
        let key = self.key("analyze", title, content);
        if let Some(hit) = read_cache_file::<RemoteAnalysis>(&self.cache_dir, &key) {
            if hit.validate().is_ok() {
                debug!(target: "backend", backend = %self.kind(), "analysis cache hit");
                return Ok(hit);
            }
        }
        self.reserve_slot()?;
        let fresh = self
            .inner
            .analyze(title, content)
            .await
            .inspect_err(|_| self.release_slot())?;
        if fresh.validate().is_ok() {
            let _ = write_cache_file(&self.cache_dir, &key, &fresh);
        }
        Ok(fresh)
    }
}

// ------------------------------------------------------------
// File cache helpers
// ------------------------------------------------------------

fn cache_key(kind: AnalyzerKind, op: &str, title: &str, content: &str) -> String {
    let mut h = Sha256::new();
    for part in [kind.as_str(), op, title, content] {
        h.update(part.as_bytes());
        h.update([0u8]);
    }
    h.finalize()
        .iter()
        .take(16)
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn cache_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{key}.json"))
}

fn read_cache_file<T: DeserializeOwned>(dir: &Path, key: &str) -> Option<T> {
    let s = fs::read_to_string(cache_path(dir, key)).ok()?;
    serde_json::from_str(&s).ok()
}

/// tmp + rename so readers never see a half-written file.
fn write_cache_file<T: Serialize>(dir: &Path, key: &str, value: &T) -> io::Result<()> {
    let path = cache_path(dir, key);
    write_atomic(&path, &serde_json::to_vec(value)?)
}

pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    let mut f = fs::File::create(&tmp)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    fs::rename(tmp, path)
}

// ------------------------------------------------------------
// Daily counter helpers
// ------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DailyCounter {
    date: String,
    count: u32,
}

impl Default for DailyCounter {
    fn default() -> Self {
        Self {
            date: today(),
            count: 0,
        }
    }
}

impl DailyCounter {
    fn is_expired(&self) -> bool {
        self.date != today()
    }

    fn reset_to_today(&mut self) {
        self.date = today();
        self.count = 0;
    }
}

/// UTC calendar day, e.g. `2025-03-01`.
fn today() -> String {
    chrono::Utc::now().date_naive().to_string()
}

fn counter_path(dir: &Path) -> PathBuf {
    dir.join("daily_count.json")
}

fn load_daily_counter(dir: &Path) -> io::Result<DailyCounter> {
    let s = fs::read_to_string(counter_path(dir))?;
    serde_json::from_str(&s).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

fn save_daily_counter(dir: &Path, dc: &DailyCounter) -> io::Result<()> {
    write_atomic(&counter_path(dir), &serde_json::to_vec(dc)?)
}
