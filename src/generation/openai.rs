//! OpenAI-compatible chat completions client
//!
//! Serves OpenAI itself, Gemini's OpenAI-compatible endpoint and Vertex AI's
//! OpenAPI endpoint, which differ only in base URL and credentials.

use super::config::EndpointConfig;
use super::provider::{ChatModel, ChunkStream, GenerationError, GenerationRequest};
use super::streaming::{chunk_stream_from_sse, SseStep};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

/// Client for `/chat/completions`
pub struct OpenAiCompatibleClient {
    http: Client,
    endpoint: EndpointConfig,
}

impl OpenAiCompatibleClient {
    pub fn new(endpoint: EndpointConfig) -> Result<Self, GenerationError> {
        let http = Client::builder()
            .timeout(endpoint.timeout())
            .build()
            .map_err(|e| GenerationError::Network(e.to_string()))?;
        Ok(Self { http, endpoint })
    }

    fn url(&self, request: &GenerationRequest) -> String {
        format!("{}/chat/completions", self.endpoint.resolve_base_url(&request.location))
    }

    fn api_key(&self) -> Option<&SecretString> {
        self.endpoint.api_key.as_ref()
    }

    async fn send(&self, request: &GenerationRequest, stream: bool) -> Result<reqwest::Response, GenerationError> {
        let url = self.url(request);
        debug!(model = %request.model, max_tokens = request.max_tokens, stream, "Calling chat completions");

        let mut req = self.http.post(&url).json(&build_body(request, stream));
        if let Some(api_key) = self.api_key() {
            req = req.bearer_auth(api_key.expose_secret());
        }

        let response = req.send().await.map_err(GenerationError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GenerationError::upstream(status.as_u16(), &error_text));
        }
        Ok(response)
    }
}

fn build_body(request: &GenerationRequest, stream: bool) -> Value {
    json!({
        "model": request.model,
        "messages": [{ "role": "user", "content": request.prompt }],
        "max_tokens": request.max_tokens,
        "temperature": request.temperature,
        "stream": stream,
    })
}

#[derive(Debug, Deserialize)]
struct Completion {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Map one `data:` payload to a stream step
fn parse_stream_event(data: &str) -> Result<SseStep, GenerationError> {
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(SseStep::Done);
    }
    if data.is_empty() {
        return Ok(SseStep::Skip);
    }

    let value: Value = serde_json::from_str(data)
        .map_err(|e| GenerationError::InvalidResponse(format!("{e}: {data}")))?;
    if let Some(error) = value.get("error") {
        return Err(GenerationError::Stream(error.to_string()));
    }

    let chunk: StreamChunk = serde_json::from_value(value)
        .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;
    match chunk.choices.into_iter().next().and_then(|c| c.delta.content) {
        Some(text) if !text.is_empty() => Ok(SseStep::Emit(text)),
        _ => Ok(SseStep::Skip),
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatibleClient {
    async fn complete(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let response = self.send(request, false).await?;
        let completion: Completion = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidResponse(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| GenerationError::InvalidResponse("completion has no content".to_string()))
    }

    async fn stream(&self, request: &GenerationRequest) -> Result<ChunkStream, GenerationError> {
        let response = self.send(request, true).await?;
        Ok(chunk_stream_from_sse(response, |_event, data| parse_stream_event(data)))
    }
}
