// src/backend/prompt.rs
//! Prompts sent to remote analyzers and strict parsing of their replies.

use serde::Deserialize;

use super::RemoteAnalysis;
use crate::error::CallFailure;

/// Content beyond this many chars is cut before sending.
pub const MAX_PROMPT_CONTENT_CHARS: usize = 4_000;

pub const ANALYZE_SYSTEM: &str = "You analyze Thai news for lottery players. \
Extract numbers a Thai lottery player would consider lucky from the text: ages, \
licence plates, house/room/floor numbers, times, amounts, and number words. \
Numbers are 1-3 ASCII digits. Never return calendar years. \
Reply with ONLY a JSON object, no prose, no code fences, of the form: \
{\"success\": true, \"category\": \"accident|celebrity|politics|economic|crime|general\", \
\"relevance_score\": 0-100, \"numbers\": [\"45\"], \
\"detailed_numbers\": [{\"number\": \"45\", \"source\": \"why\", \"confidence\": 0-100}], \
\"reasoning\": \"one short sentence\"}. \
`numbers` must list exactly the `number` fields of `detailed_numbers`, in order, without duplicates.";

pub const RELEVANCE_SYSTEM: &str = "You decide whether a Thai news item is worth \
mining for lucky lottery numbers (accidents, celebrities, politics, economy, crime, \
dreams, lottery talk). Travel, recipes, reviews and promotions are not. \
Reply with ONLY a JSON object: {\"relevant\": true} or {\"relevant\": false}.";

/// User message: title and (cut) content.
pub fn user_prompt(title: &str, content: &str) -> String {
    let content: String = content.chars().take(MAX_PROMPT_CONTENT_CHARS).collect();
    format!("Title: {}\n\nContent:\n{}", title.trim(), content.trim())
}

/// Drop a surrounding ``` / ```json fence if present.
pub fn strip_code_fence(raw: &str) -> &str {
    let s = raw.trim();
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Strict: missing fields, wrong types or invariant violations are failures.
pub fn parse_analysis(raw: &str) -> Result<RemoteAnalysis, CallFailure> {
    let body = strip_code_fence(raw);
    let parsed: RemoteAnalysis =
        serde_json::from_str(body).map_err(|e| CallFailure::Malformed(e.to_string()))?;
    parsed.validate()?;
    Ok(parsed)
}

pub fn parse_relevance(raw: &str) -> Result<bool, CallFailure> {
    #[derive(Deserialize)]
    struct Verdict {
        relevant: bool,
    }
    let v: Verdict = serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| CallFailure::Malformed(e.to_string()))?;
    Ok(v.relevant)
}
