use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use super::error::LlmError;
use super::sse::SseDecoder;
use super::stateless_llm_interface::{ChatRequest, ChatRole, StatelessLLMInterface, TextStream};
use crate::config_manager::{GenerationConfig, LlmConfig};

/// Finish reasons that fail the chunk even when it carries text.
const BLOCKING_FINISH_REASONS: &[&str] = &["SAFETY", "RECITATION", "LANGUAGE"];

/// Google Gemini client using `streamGenerateContent` over SSE
pub struct GeminiLLM {
    client: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl GeminiLLM {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                LlmError::Configuration("API key required for Gemini (set GEMINI_API_KEY)".into())
            })?;

        // Generation can outlast any fixed deadline, so only connecting is bounded.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        info!(
            "Initialized GeminiLLM: model={}, base_url={}",
            config.model, config.base_url
        );

        Ok(Self {
            client,
            api_key: SecretString::from(api_key.to_string()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        )
    }

    fn build_request(request: &ChatRequest) -> GeminiRequest {
        GeminiRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: request.system_instruction.to_string(),
                }],
            },
            contents: request
                .contents
                .iter()
                .map(|turn| GeminiContent {
                    role: Some(turn.role),
                    parts: vec![GeminiPart {
                        text: turn.text.clone(),
                    }],
                })
                .collect(),
            generation_config: GeminiGenerationConfig::from(request.generation),
        }
    }

    /// Turn one SSE payload into the text it carries.
    fn chunk_text(payload: &str) -> Result<String, LlmError> {
        let response: GeminiStreamResponse = serde_json::from_str(payload)
            .map_err(|e| LlmError::InvalidResponse(format!("{}: {}", e, payload)))?;

        if let Some(error) = response.error {
            return Err(LlmError::Api {
                status: error.code.unwrap_or(500),
                message: error.message,
            });
        }

        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(LlmError::Blocked(format!("prompt blocked due to {}", reason)));
        }

        let candidate = match response.candidates.into_iter().next() {
            Some(c) => c,
            None => return Ok(String::new()),
        };

        if let Some(reason) = candidate.finish_reason.as_deref() {
            if BLOCKING_FINISH_REASONS.contains(&reason) {
                return Err(LlmError::Blocked(format!(
                    "response stopped due to {}",
                    reason
                )));
            }
        }

        Ok(candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default())
    }

    /// Names of the models the configured key can use, following pagination.
    pub async fn list_models(&self) -> Result<Vec<String>, LlmError> {
        let url = format!("{}/v1beta/models", self.base_url);
        let mut names = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(&url)
                .header("x-goog-api-key", self.api_key.expose_secret());
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = request.send().await?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message: Self::error_message(&body),
                });
            }

            let page: GeminiModelList = response.json().await?;
            names.extend(page.models.into_iter().map(|m| m.name));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!("Listed {} Gemini models", names.len());
        Ok(names)
    }

    fn error_message(body: &str) -> String {
        serde_json::from_str::<GeminiErrorEnvelope>(body)
            .map(|e| e.error.message)
            .unwrap_or_else(|_| body.trim().to_string())
    }
}

#[async_trait]
impl StatelessLLMInterface for GeminiLLM {
    async fn stream_chat(&self, request: ChatRequest) -> Result<TextStream, LlmError> {
        let body = Self::build_request(&request);
        debug!(
            "Gemini request: model={}, turns={}",
            self.model,
            body.contents.len()
        );

        let response = self
            .client
            .post(self.stream_url())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: Self::error_message(&body),
            });
        }

        let byte_stream = response.bytes_stream();
        let stream = async_stream::try_stream! {
            let mut decoder = SseDecoder::new();
            futures::pin_mut!(byte_stream);

            while let Some(result) = byte_stream.next().await {
                let bytes = result.map_err(|e| LlmError::Stream(e.to_string()))?;
                decoder.push(&bytes)?;

                while let Some(payload) = decoder.next_payload() {
                    yield Self::chunk_text(&payload)?;
                }
            }

            if let Some(payload) = decoder.finish() {
                yield Self::chunk_text(&payload)?;
            }
        };

        Ok(Box::pin(stream))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

// API request/response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    system_instruction: GeminiContent,
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<ChatRole>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

impl From<GenerationConfig> for GeminiGenerationConfig {
    fn from(config: GenerationConfig) -> Self {
        Self {
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiStreamResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<GeminiPromptFeedback>,
    #[serde(default)]
    error: Option<GeminiErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiModelList {
    #[serde(default)]
    models: Vec<GeminiModel>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiModel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    #[serde(default)]
    code: Option<u16>,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::stateless_llm::ChatTurn;
    use std::sync::Arc;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const STREAM_PATH: &str = "/v1beta/models/test-model:streamGenerateContent";

    fn config(base_url: &str) -> LlmConfig {
        LlmConfig {
            api_key: Some("test-key".to_string()),
            base_url: base_url.to_string(),
            model: "test-model".to_string(),
            ..LlmConfig::default()
        }
    }

    fn request() -> ChatRequest {
        ChatRequest {
            system_instruction: Arc::from("be a coach"),
            contents: vec![ChatTurn::user("be a coach"), ChatTurn::user("\"hola\"")],
            generation: GenerationConfig::default(),
        }
    }

    fn text_event(text: &str) -> String {
        format!(
            "data: {}\r\n\r\n",
            serde_json::json!({
                "candidates": [{"content": {"role": "model", "parts": [{"text": text}]}}]
            })
        )
    }

    async fn collect(stream: TextStream) -> Vec<Result<String, LlmError>> {
        stream.collect().await
    }

    #[test]
    fn missing_api_key_is_a_configuration_error() {
        let config = LlmConfig::default();
        assert!(matches!(
            GeminiLLM::new(&config),
            Err(LlmError::Configuration(_))
        ));
    }

    #[test]
    fn request_body_matches_gemini_schema() {
        let body = serde_json::to_value(GeminiLLM::build_request(&request())).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "systemInstruction": {"parts": [{"text": "be a coach"}]},
                "contents": [
                    {"role": "user", "parts": [{"text": "be a coach"}]},
                    {"role": "user", "parts": [{"text": "\"hola\""}]}
                ],
                "generationConfig": {
                    "temperature": 1.0,
                    "topP": 0.95f32,
                    "topK": 40,
                    "maxOutputTokens": 8192
                }
            })
        );
    }

    #[test]
    fn chunk_text_joins_parts_and_flags_blocks() {
        let joined = GeminiLLM::chunk_text(
            r#"{"candidates":[{"content":{"parts":[{"text":"Ho"},{"text":"la"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(joined, "Hola");

        let finished = GeminiLLM::chunk_text(
            r#"{"candidates":[{"content":{"parts":[{"text":""}]},"finishReason":"STOP"}]}"#,
        )
        .unwrap();
        assert_eq!(finished, "");

        assert!(matches!(
            GeminiLLM::chunk_text(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#),
            Err(LlmError::Blocked(_))
        ));
        assert!(matches!(
            GeminiLLM::chunk_text(r#"{"candidates":[{"finishReason":"RECITATION"}]}"#),
            Err(LlmError::Blocked(_))
        ));
        assert!(matches!(
            GeminiLLM::chunk_text(r#"{"error":{"code":503,"message":"overloaded"}}"#),
            Err(LlmError::Api { status: 503, .. })
        ));
        assert!(matches!(
            GeminiLLM::chunk_text("not json"),
            Err(LlmError::InvalidResponse(_))
        ));
    }

    #[test]
    fn blocking_finish_reason_fails_even_with_text() {
        match GeminiLLM::chunk_text(
            r#"{"candidates":[{"content":{"parts":[{"text":"Ho"}]},"finishReason":"SAFETY"}]}"#,
        ) {
            Err(LlmError::Blocked(message)) => assert!(message.contains("SAFETY")),
            other => panic!("expected a blocked error, got {:?}", other),
        }
    }

    #[test]
    fn other_finish_reasons_end_quietly() {
        for reason in ["OTHER", "BLOCKLIST", "PROHIBITED_CONTENT", "SPII", "MAX_TOKENS"] {
            let payload = format!(r#"{{"candidates":[{{"finishReason":"{}"}}]}}"#, reason);
            assert_eq!(GeminiLLM::chunk_text(&payload).unwrap(), "");
        }

        let truncated = GeminiLLM::chunk_text(
            r#"{"candidates":[{"content":{"parts":[{"text":"fin"}]},"finishReason":"MAX_TOKENS"}]}"#,
        )
        .unwrap();
        assert_eq!(truncated, "fin");
    }

    #[tokio::test]
    async fn list_models_follows_page_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1beta/models"))
            .and(query_param("pageToken", "next"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": [{"name": "models/gemini-pro"}]
            })))
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1beta/models"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": [{"name": "models/gemini-flash-latest"}],
                "nextPageToken": "next"
            })))
            .mount(&server)
            .await;

        let llm = GeminiLLM::new(&config(&server.uri())).unwrap();
        let names = llm.list_models().await.unwrap();
        assert_eq!(names, vec!["models/gemini-flash-latest", "models/gemini-pro"]);
    }

    #[tokio::test]
    async fn streams_fragments_in_order() {
        let server = MockServer::start().await;
        let body = format!("{}{}", text_event("Hola"), text_event(" mundo"));

        Mock::given(method("POST"))
            .and(path(STREAM_PATH))
            .and(query_param("alt", "sse"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .expect(1)
            .mount(&server)
            .await;

        let llm = GeminiLLM::new(&config(&server.uri())).unwrap();
        let items = collect(llm.stream_chat(request()).await.unwrap()).await;
        let texts: Vec<String> = items.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(texts, vec!["Hola", " mundo"]);

        let received = server.received_requests().await.unwrap();
        let sent: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        assert_eq!(sent["contents"][1]["parts"][0]["text"], "\"hola\"");
        assert_eq!(sent["generationConfig"]["topK"], 40);
    }

    #[tokio::test]
    async fn error_status_surfaces_upstream_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(STREAM_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT"}
            })))
            .mount(&server)
            .await;

        let llm = GeminiLLM::new(&config(&server.uri())).unwrap();
        match llm.stream_chat(request()).await {
            Err(LlmError::Api { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "API key not valid.");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected an error"),
        }
    }

    #[tokio::test]
    async fn mid_stream_error_event_ends_with_err() {
        let server = MockServer::start().await;
        let body = format!(
            "{}data: {{\"error\":{{\"code\":500,\"message\":\"internal\"}}}}\n\n",
            text_event("partial")
        );
        Mock::given(method("POST"))
            .and(path(STREAM_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let llm = GeminiLLM::new(&config(&server.uri())).unwrap();
        let items = collect(llm.stream_chat(request()).await.unwrap()).await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_deref().unwrap(), "partial");
        assert!(matches!(items[1], Err(LlmError::Api { status: 500, .. })));
    }
}
