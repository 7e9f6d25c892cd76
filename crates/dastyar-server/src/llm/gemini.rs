//! Google Gemini REST client.

use std::collections::VecDeque;

use async_trait::async_trait;
use dastyar_shared::types::MessageRole;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::sse::SseDecoder;
use super::{ChatModel, GenerationRequest, LlmError, ModelTier, TextStream};
use crate::config::ServerConfig;

pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    chat_model: String,
    fast_model: String,
}

impl GeminiClient {
    pub fn new(config: &ServerConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: config.gemini_base_url.clone(),
            api_key: config.gemini_api_key.clone(),
            chat_model: config.gemini_chat_model.clone(),
            fast_model: config.gemini_fast_model.clone(),
        }
    }

    fn url(&self, tier: ModelTier, method: &str) -> String {
        let model = match tier {
            ModelTier::Chat => &self.chat_model,
            ModelTier::Fast => &self.fast_model,
        };
        format!("{}/v1beta/models/{model}:{method}", self.base_url)
    }

    async fn post(&self, url: String, request: &GenerationRequest) -> Result<reqwest::Response, LlmError> {
        if self.api_key.is_empty() {
            return Err(LlmError::NotConfigured);
        }

        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body(request))
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    async fn stream(&self, request: GenerationRequest) -> Result<TextStream, LlmError> {
        let url = self.url(request.tier, "streamGenerateContent?alt=sse");
        let response = self.post(url, &request).await?;
        debug!(tier = ?request.tier, "Generation stream opened");

        let state = StreamState {
            body: response.bytes_stream().boxed(),
            decoder: SseDecoder::default(),
            pending: VecDeque::new(),
            done: false,
        };
        Ok(stream::unfold(state, StreamState::next).boxed())
    }

    async fn generate(&self, request: GenerationRequest) -> Result<String, LlmError> {
        let url = self.url(request.tier, "generateContent");
        let response = self.post(url, &request).await?;
        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Malformed(e.to_string()))?;
        Ok(body.text())
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// Translate a request into the provider's `generateContent` body. System
/// messages are lifted into `systemInstruction`; assistant turns use the
/// provider's `model` role.
pub(crate) fn request_body(request: &GenerationRequest) -> Value {
    let mut system: Vec<&str> = request.system.iter().map(String::as_str).collect();
    let mut contents = Vec::new();

    for message in &request.messages {
        let role = match message.role {
            MessageRole::System => {
                system.push(&message.content);
                continue;
            }
            MessageRole::User => "user",
            MessageRole::Assistant => "model",
        };
        contents.push(json!({
            "role": role,
            "parts": [{ "text": message.content }],
        }));
    }

    let mut body = json!({ "contents": contents });

    if !system.is_empty() {
        body["systemInstruction"] = json!({ "parts": [{ "text": system.join("\n\n") }] });
    }
    if request.grounded_search {
        body["tools"] = json!([{ "google_search": {} }]);
    }

    let mut generation = serde_json::Map::new();
    if let Some(t) = request.temperature {
        generation.insert("temperature".into(), json!(t));
    }
    if request.json_output {
        generation.insert("responseMimeType".into(), json!("application/json"));
    }
    if !generation.is_empty() {
        body["generationConfig"] = Value::Object(generation);
    }

    body
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.iter().filter_map(|p| p.text.as_deref()).collect())
            .unwrap_or_default()
    }
}

struct StreamState {
    body: BoxStream<'static, reqwest::Result<bytes::Bytes>>,
    decoder: SseDecoder,
    pending: VecDeque<Result<String, LlmError>>,
    done: bool,
}

impl StreamState {
    async fn next(mut self) -> Option<(Result<String, LlmError>, Self)> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                if item.is_err() {
                    self.done = true;
                    self.pending.clear();
                }
                return Some((item, self));
            }
            if self.done {
                return None;
            }

            match self.body.next().await {
                Some(Ok(chunk)) => {
                    for event in self.decoder.push(&chunk) {
                        self.queue(&event);
                    }
                }
                Some(Err(e)) => {
                    self.pending.push_back(Err(LlmError::Transport(e.to_string())));
                }
                None => {
                    self.done = true;
                    if let Some(event) = self.decoder.finish() {
                        self.queue(&event);
                    }
                }
            }
        }
    }

    fn queue(&mut self, event: &str) {
        match serde_json::from_str::<GenerateResponse>(event) {
            Ok(chunk) => {
                let text = chunk.text();
                if !text.is_empty() {
                    self.pending.push_back(Ok(text));
                }
            }
            Err(e) => self.pending.push_back(Err(LlmError::Malformed(e.to_string()))),
        }
    }
}
