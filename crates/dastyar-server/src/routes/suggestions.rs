//! `POST /api/suggestions`: follow-up search queries from the fast model.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use dastyar_shared::constants::SUGGESTION_COUNT;
use dastyar_shared::types::MessageRole;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::api::AppState;
use crate::error::ApiError;
use crate::llm::{strip_code_fence, ChatMessage, GenerationRequest, ModelTier};

const SUGGESTIONS_SYSTEM_PROMPT: &str = "You suggest follow-up web searches. \
Given the user's search query, answer with a JSON array of exactly 3 related search queries, \
each at most 80 characters, written in Persian or English to match the query. \
If no sensible suggestions exist, answer with []. Output the JSON array only.";

const SUGGESTIONS_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Serialize)]
pub struct SuggestionsResponse {
    suggestions: Vec<String>,
}

/// Accept only a JSON array of exactly [`SUGGESTION_COUNT`] strings.
/// Anything else degrades to no suggestions.
pub fn parse_suggestions(text: &str) -> Vec<String> {
    let Ok(Value::Array(items)) = serde_json::from_str::<Value>(strip_code_fence(text)) else {
        return Vec::new();
    };
    if items.len() != SUGGESTION_COUNT {
        return Vec::new();
    }
    items
        .into_iter()
        .map(|item| match item {
            Value::String(s) => Some(s),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()
        .unwrap_or_default()
}

pub async fn suggest(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<SuggestionsResponse>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let query = body
        .get("query")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ApiError::BadRequest("query must be a non-empty string".into()))?;

    let request = GenerationRequest {
        tier: ModelTier::Fast,
        system: Some(SUGGESTIONS_SYSTEM_PROMPT.to_string()),
        messages: vec![ChatMessage::new(MessageRole::User, format!("query: {query}"))],
        temperature: Some(SUGGESTIONS_TEMPERATURE),
        json_output: true,
        ..Default::default()
    };

    let text = state
        .model
        .generate(request)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    let suggestions = parse_suggestions(&text);
    debug!(count = suggestions.len(), "Suggestions generated");
    Ok(Json(SuggestionsResponse { suggestions }))
}
