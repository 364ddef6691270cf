// src/store.rs
//! Prediction persistence. One JSON file per analyzed text, keyed by a content hash.

use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::backend::cache::write_atomic;
use crate::candidate::AnalysisResult;
use crate::text::SourceText;

/// A stored analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: String,
    pub title: String,
    pub analyzed_at: DateTime<Utc>,
    pub result: AnalysisResult,
}

impl PredictionRecord {
    pub fn new(text: &SourceText, result: AnalysisResult, analyzed_at: DateTime<Utc>) -> Self {
        Self {
            id: record_id(text),
            title: text.title.trim().to_string(),
            analyzed_at,
            result,
        }
    }
}

/// Same title and body → same id, so re-analysis replaces the old record.
pub fn record_id(text: &SourceText) -> String {
    let mut h = Sha256::new();
    h.update(text.title.trim().as_bytes());
    h.update([0u8]);
    h.update(text.body.trim().as_bytes());
    h.finalize()
        .iter()
        .take(16)
        .map(|b| format!("{b:02x}"))
        .collect()
}

pub trait PredictionStore: Send + Sync {
    fn save(&self, record: &PredictionRecord) -> anyhow::Result<()>;

    /// Oldest first.
    fn list(&self) -> anyhow::Result<Vec<PredictionRecord>>;

    /// Delete records analyzed more than `older_than_days` before `now`. Returns how many.
    fn cleanup(&self, older_than_days: u32, now: DateTime<Utc>) -> anyhow::Result<usize>;
}

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating prediction store {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    fn record_files(&self) -> anyhow::Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir)
            .with_context(|| format!("listing {}", self.dir.display()))?
        {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                out.push(path);
            }
        }
        Ok(out)
    }

    fn read_record(path: &Path) -> Option<PredictionRecord> {
        let parsed = fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|s| serde_json::from_str(&s).map_err(anyhow::Error::from));
        match parsed {
            Ok(r) => Some(r),
            Err(e) => {
                warn!(target: "store", path = %path.display(), error = %e, "skipping unreadable record");
                None
            }
        }
    }
}

impl PredictionStore for FileStore {
    fn save(&self, record: &PredictionRecord) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec_pretty(record)?;
        let path = self.path_for(&record.id);
        write_atomic(&path, &bytes).with_context(|| format!("writing {}", path.display()))
    }

    fn list(&self) -> anyhow::Result<Vec<PredictionRecord>> {
        let mut records: Vec<PredictionRecord> = self
            .record_files()?
            .iter()
            .filter_map(|p| Self::read_record(p))
            .collect();
        records.sort_by(|a, b| a.analyzed_at.cmp(&b.analyzed_at).then_with(|| a.id.cmp(&b.id)));
        Ok(records)
    }

    fn cleanup(&self, older_than_days: u32, now: DateTime<Utc>) -> anyhow::Result<usize> {
        let cutoff = now - Duration::days(i64::from(older_than_days));
        let mut removed = 0;
        for path in self.record_files()? {
            let Some(record) = Self::read_record(&path) else {
                continue;
            };
            if record.analyzed_at < cutoff {
                fs::remove_file(&path).with_context(|| format!("removing {}", path.display()))?;
                removed += 1;
            }
        }
        info!(target: "store", removed, older_than_days, "prediction cleanup done");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::{AnalyzerKind, Category};

    fn record(title: &str, at: DateTime<Utc>) -> PredictionRecord {
        let result = AnalysisResult::empty(AnalyzerKind::Heuristic, Category::General, 60, "x");
        PredictionRecord::new(&SourceText::new(title, "body"), result, at)
    }

    #[test]
    fn ids_are_stable_and_distinct() {
        let a = record_id(&SourceText::new("a", "b"));
        assert_eq!(a, record_id(&SourceText::new(" a ", "b\n")));
        assert_ne!(a, record_id(&SourceText::new("ab", "")));
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn save_list_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("preds")).unwrap();
        let now = Utc::now();

        store.save(&record("old", now - Duration::days(40))).unwrap();
        store.save(&record("new", now - Duration::days(1))).unwrap();
        // same text again replaces, not duplicates
        store.save(&record("new", now)).unwrap();

        let all = store.list().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].title, "old");

        assert_eq!(store.cleanup(30, now).unwrap(), 1);
        let left = store.list().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].title, "new");
    }

    #[test]
    fn junk_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        fs::write(dir.path().join("broken.json"), "{").unwrap();
        fs::write(dir.path().join("notes.txt"), "hi").unwrap();
        store.save(&record("ok", Utc::now())).unwrap();
        assert_eq!(store.list().unwrap().len(), 1);
        assert_eq!(store.cleanup(0, Utc::now() + Duration::days(1)).unwrap(), 1);
    }
}
