// src/backend/claude.rs
//! Remote-B: Anthropic Messages API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::prompt::{parse_analysis, parse_relevance, user_prompt, ANALYZE_SYSTEM, RELEVANCE_SYSTEM};
use super::{check_status, http_client, RemoteAnalysis, RemoteAnalyzer};
use crate::candidate::AnalyzerKind;
use crate::config::BackendSettings;
use crate::error::{BackendError, CallFailure};

pub const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct ClaudeAnalyzer {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl ClaudeAnalyzer {
    pub fn from_settings(settings: &BackendSettings) -> Result<Self, BackendError> {
        let kind = AnalyzerKind::Claude;
        let api_key = settings.resolve_api_key(kind)?;
        Ok(Self {
            http: http_client(kind, settings)?,
            api_key,
            model: settings.model_or_default(kind),
            endpoint: settings
                .endpoint
                .clone()
                .unwrap_or_else(|| ANTHROPIC_MESSAGES_URL.to_string()),
        })
    }

    async fn message(&self, system: &str, user: &str, max_tokens: u32) -> Result<String, CallFailure> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            max_tokens: u32,
            temperature: f32,
            system: &'a str,
            messages: Vec<Msg<'a>>,
        }
        #[derive(Deserialize)]
        struct Resp {
            content: Vec<Block>,
        }
        #[derive(Deserialize)]
        struct Block {
            #[serde(rename = "type")]
            kind: String,
            #[serde(default)]
            text: String,
        }

        let req = Req {
            model: &self.model,
            max_tokens,
            temperature: 0.2,
            system,
            messages: vec![Msg {
                role: "user",
                content: user,
            }],
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&req)
            .send()
            .await?;
        let body: Resp = check_status(resp)?.json().await?;
        debug!(target: "backend", backend = "claude", blocks = body.content.len(), "message received");

        let text: String = body
            .content
            .into_iter()
            .filter(|b| b.kind == "text")
            .map(|b| b.text)
            .collect();
        if text.trim().is_empty() {
            return Err(CallFailure::Malformed("no text block in reply".into()));
        }
        Ok(text)
    }
}

#[async_trait]
impl RemoteAnalyzer for ClaudeAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::Claude
    }

    async fn is_relevant(&self, title: &str, content: &str) -> Result<bool, BackendError> {
        let raw = self
            .message(RELEVANCE_SYSTEM, &user_prompt(title, content), 20)
            .await
            .map_err(|f| BackendError::call(self.kind(), f))?;
        parse_relevance(&raw).map_err(|f| BackendError::call(self.kind(), f))
    }

    async fn analyze(&self, title: &str, content: &str) -> Result<RemoteAnalysis, BackendError> {
        let raw = self
            .message(ANALYZE_SYSTEM, &user_prompt(title, content), 800)
            .await
            .map_err(|f| BackendError::call(self.kind(), f))?;
        parse_analysis(&raw).map_err(|f| BackendError::call(self.kind(), f))
    }
}
