// src/backend/openai.rs
//! Remote-A: OpenAI Chat Completions in JSON mode.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::prompt::{parse_analysis, parse_relevance, user_prompt, ANALYZE_SYSTEM, RELEVANCE_SYSTEM};
use super::{check_status, http_client, RemoteAnalysis, RemoteAnalyzer};
use crate::candidate::AnalyzerKind;
use crate::config::BackendSettings;
use crate::error::{BackendError, CallFailure};

pub const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

pub struct OpenAiAnalyzer {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiAnalyzer {
    /// Fails with `Unavailable` when no key can be resolved.
    pub fn from_settings(settings: &BackendSettings) -> Result<Self, BackendError> {
        let kind = AnalyzerKind::OpenAi;
        let api_key = settings.resolve_api_key(kind)?;
        Ok(Self {
            http: http_client(kind, settings)?,
            api_key,
            model: settings.model_or_default(kind),
            endpoint: settings
                .endpoint
                .clone()
                .unwrap_or_else(|| OPENAI_CHAT_URL.to_string()),
        })
    }

    async fn complete(&self, system: &str, user: &str, max_tokens: u32) -> Result<String, CallFailure> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct ResponseFormat {
            #[serde(rename = "type")]
            kind: &'static str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
            response_format: ResponseFormat,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: Option<String>,
        }

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.2,
            max_tokens,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?;
        let body: Resp = check_status(resp)?.json().await?;
        debug!(target: "backend", backend = "openai", choices = body.choices.len(), "completion received");

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| CallFailure::Malformed("empty completion".into()))
    }
}

#[async_trait]
impl RemoteAnalyzer for OpenAiAnalyzer {
    fn kind(&self) -> AnalyzerKind {
        AnalyzerKind::OpenAi
    }

    async fn is_relevant(&self, title: &str, content: &str) -> Result<bool, BackendError> {
        let raw = self
            .complete(RELEVANCE_SYSTEM, &user_prompt(title, content), 20)
            .await
            .map_err(|f| BackendError::call(self.kind(), f))?;
        parse_relevance(&raw).map_err(|f| BackendError::call(self.kind(), f))
    }

    async fn analyze(&self, title: &str, content: &str) -> Result<RemoteAnalysis, BackendError> {
        let raw = self
            .complete(ANALYZE_SYSTEM, &user_prompt(title, content), 800)
            .await
            .map_err(|f| BackendError::call(self.kind(), f))?;
        parse_analysis(&raw).map_err(|f| BackendError::call(self.kind(), f))
    }
}
