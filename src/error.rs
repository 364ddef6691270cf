// src/error.rs
//! Error taxonomy for the pipeline.
//!
//! Blank input is not an error at all: it yields a successful, empty result.
//! Pattern errors are fatal at startup. Backend errors are values the
//! switcher inspects to decide on fallback; they never escape `analyze()`.

use thiserror::Error;

use crate::candidate::AnalyzerKind;

/// Broken pattern table or config. Raised while building the library, never per call.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("pattern table parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to read pattern table at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("pattern `{id}` regex error: {source}")]
    Regex {
        id: String,
        #[source]
        source: regex::Error,
    },

    #[error("pattern `{id}` is missing capture group `{group}`")]
    MissingGroup { id: String, group: &'static str },

    #[error("table `{table}` entry `{key}` has invalid value `{value}`: {reason}")]
    InvalidEntry {
        table: &'static str,
        key: String,
        value: String,
        reason: String,
    },

    #[error("no confidence weight configured for pattern kind `{0}`")]
    MissingWeight(String),
}

/// Violation of the `NumericCandidate` invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CandidateError {
    #[error("candidate value `{0}` must be 1-3 ASCII digits")]
    BadValue(String),

    #[error("candidate confidence {0} outside 0..=100")]
    BadConfidence(u8),
}

/// Why a remote call failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallFailure {
    #[error("timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("quota exhausted: {0}")]
    Quota(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Backend errors, recovered by the switcher through fallback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Missing credentials or failed initialization.
    #[error("backend {kind} unavailable: {reason}")]
    Unavailable { kind: AnalyzerKind, reason: String },

    /// Timeout, transport, status, quota or shape failure on a single call.
    #[error("backend {kind} call failed: {failure}")]
    CallFailed {
        kind: AnalyzerKind,
        failure: CallFailure,
    },
}

impl BackendError {
    pub fn call(kind: AnalyzerKind, failure: CallFailure) -> Self {
        Self::CallFailed { kind, failure }
    }

    pub fn unavailable(kind: AnalyzerKind, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            kind,
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> AnalyzerKind {
        match self {
            Self::Unavailable { kind, .. } | Self::CallFailed { kind, .. } => *kind,
        }
    }
}

impl From<reqwest::Error> for CallFailure {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            CallFailure::Timeout
        } else if let Some(status) = e.status() {
            CallFailure::Status(status.as_u16())
        } else if e.is_decode() {
            CallFailure::Malformed(e.to_string())
        } else {
            CallFailure::Network(e.to_string())
        }
    }
}
