//! Gemini REST API provider.
//!
//! Talks to `generateContent` for single-turn structured calls and to
//! `streamGenerateContent?alt=sse` for chat. The API key travels in the
//! `x-goog-api-key` header, never in the URL.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use super::{ChatChannel, ContentPart, GenerateRequest, GenerativeProvider};
use crate::engine::credentials::Credential;
use crate::engine::failover::provider_error;
use crate::error::AppError;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const API_KEY_HEADER: &str = "x-goog-api-key";

// ============================================================================
// Helper
// ============================================================================

/// Transport failures: connection problems are transient, anything else is not.
fn transport_err(e: reqwest::Error) -> AppError {
    let message = format!("Gemini API request failed: {e}");
    if e.is_connect() || e.is_timeout() {
        AppError::retriable(message, None)
    } else {
        provider_error(e.status().map(|s| s.as_u16()), message)
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentBody<'a> {
    contents: &'a [Content],
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'static str,
    response_schema: &'a serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

impl Content {
    fn text(role: Option<&'static str>, text: &str) -> Self {
        Self {
            role,
            parts: vec![Part::Text {
                text: text.to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineDataPayload,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineDataPayload {
    mime_type: String,
    data: String,
}

impl From<&ContentPart> for Part {
    fn from(part: &ContentPart) -> Self {
        match part {
            ContentPart::Text(text) => Part::Text { text: text.clone() },
            ContentPart::InlineData { mime_type, data } => Part::InlineData {
                inline_data: InlineDataPayload {
                    mime_type: mime_type.clone(),
                    data: BASE64_STANDARD.encode(data),
                },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Debug, Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate's parts.
    ///
    /// `Ok(None)` means the response carried no text at all. A blocked prompt
    /// is a business-logic rejection and maps to a fatal provider error.
    fn text(&self) -> Result<Option<String>, AppError> {
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            return Err(AppError::fatal(
                format!("Gemini blocked the request: {reason}"),
                None,
            ));
        }

        let Some(candidate) = self.candidates.first() else {
            return Ok(None);
        };

        if let Some(reason @ ("SAFETY" | "RECITATION" | "PROHIBITED_CONTENT" | "BLOCKLIST")) =
            candidate.finish_reason.as_deref()
        {
            return Err(AppError::fatal(
                format!("Gemini stopped generation: {reason}"),
                None,
            ));
        }

        let text: String = candidate
            .content
            .iter()
            .flat_map(|c| c.parts.iter())
            .filter_map(|p| p.text.as_deref())
            .collect();

        Ok((!text.is_empty()).then_some(text))
    }
}

/// Turn a non-success HTTP response into a classified provider error.
fn map_http_error(status: reqwest::StatusCode, body: &str) -> AppError {
    let detail = serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| {
            let status_text = wrapper.error.status.unwrap_or_default();
            let msg = wrapper.error.message.unwrap_or_else(|| body.to_string());
            if status_text.is_empty() {
                msg
            } else {
                format!("{status_text}: {msg}")
            }
        })
        .unwrap_or_else(|_| body.to_string());

    provider_error(
        Some(status.as_u16()),
        format!("HTTP {}: {}", status.as_u16(), detail.trim()),
    )
}

// ============================================================================
// SSE decoding
// ============================================================================

/// Incremental decoder for `text/event-stream` bodies.
///
/// Bytes may split anywhere, including inside a UTF-8 sequence, so lines are
/// assembled from raw bytes and only decoded once complete.
#[derive(Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feed bytes; returns the `data:` payloads of every completed line.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);
        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(data) = Self::data_payload(&line) {
                payloads.push(data);
            }
        }
        payloads
    }

    /// Flush a final line that had no trailing newline.
    pub(crate) fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        Self::data_payload(&rest)
    }

    fn data_payload(line: &[u8]) -> Option<String> {
        let line = String::from_utf8_lossy(line);
        let line = line.trim_end_matches(['\r', '\n']);
        let data = line.strip_prefix("data:")?.trim_start();
        (!data.is_empty()).then(|| data.to_string())
    }
}

// ============================================================================
// GeminiProvider
// ============================================================================

/// HTTP client for the Gemini `models` endpoints.
#[derive(Clone)]
pub struct GeminiProvider {
    http: reqwest::Client,
    base_url: String,
}

impl GeminiProvider {
    /// Create a provider rooted at `base_url` (e.g. [`DEFAULT_BASE_URL`]).
    ///
    /// No request timeout is configured; transport defaults apply.
    pub fn new(base_url: impl Into<String>) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, model, method)
    }

    async fn post(
        &self,
        url: String,
        credential: &Credential,
        body: &GenerateContentBody<'_>,
    ) -> Result<reqwest::Response, AppError> {
        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, credential.secret())
            .json(body)
            .send()
            .await
            .map_err(transport_err)?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read Gemini error body".to_string());
        Err(map_http_error(status, &body_text))
    }
}

#[async_trait]
impl GenerativeProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "Gemini"
    }

    async fn generate(
        &self,
        credential: &Credential,
        request: &GenerateRequest,
    ) -> Result<String, AppError> {
        let contents = [Content {
            role: Some("user"),
            parts: request.parts.iter().map(Part::from).collect(),
        }];
        let body = GenerateContentBody {
            contents: &contents,
            system_instruction: None,
            generation_config: request.response_schema.as_ref().map(|schema| GenerationConfig {
                response_mime_type: "application/json",
                response_schema: schema,
            }),
        };

        let response = self
            .post(self.endpoint(&request.model, "generateContent"), credential, &body)
            .await?;

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AppError::Parse(format!("Gemini response envelope: {e}")))?;

        parsed
            .text()?
            .ok_or_else(|| AppError::Parse("Gemini returned no text in the response candidates".into()))
    }

    async fn open_chat(
        &self,
        credential: &Credential,
        model: &str,
        system_instruction: &str,
    ) -> Result<Box<dyn ChatChannel>, AppError> {
        Ok(Box::new(GeminiChat {
            provider: self.clone(),
            credential: credential.clone(),
            model: model.to_string(),
            system_instruction: (!system_instruction.trim().is_empty())
                .then(|| Content::text(None, system_instruction)),
            history: Vec::new(),
        }))
    }
}

// ============================================================================
// GeminiChat
// ============================================================================

/// Chat session bound to one credential. The REST API is stateless, so the
/// transcript is replayed on every turn.
struct GeminiChat {
    provider: GeminiProvider,
    credential: Credential,
    model: String,
    system_instruction: Option<Content>,
    history: Vec<Content>,
}

#[async_trait]
impl ChatChannel for GeminiChat {
    async fn send_streaming(
        &mut self,
        message: &str,
        on_chunk: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<String, AppError> {
        let mut contents = self.history.clone();
        contents.push(Content::text(Some("user"), message));

        let body = GenerateContentBody {
            contents: &contents,
            system_instruction: self.system_instruction.clone(),
            generation_config: None,
        };
        let url = format!(
            "{}?alt=sse",
            self.provider.endpoint(&self.model, "streamGenerateContent")
        );
        let response = self.provider.post(url, &self.credential, &body).await?;

        let mut decoder = SseDecoder::default();
        let mut reply = String::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| stream_err(&reply, e))?;
            for payload in decoder.push(&chunk) {
                apply_event(&payload, &mut reply, on_chunk)?;
            }
        }
        if let Some(payload) = decoder.finish() {
            apply_event(&payload, &mut reply, on_chunk)?;
        }

        if reply.is_empty() {
            return Err(AppError::Parse("Gemini stream ended without any text".into()));
        }

        self.history = contents;
        self.history.push(Content::text(Some("model"), &reply));
        Ok(reply)
    }
}

/// Once part of a reply has been shown, a broken stream is not retried elsewhere.
fn stream_err(reply: &str, e: reqwest::Error) -> AppError {
    if reply.is_empty() {
        transport_err(e)
    } else {
        AppError::fatal(format!("Gemini stream interrupted: {e}"), None)
    }
}

fn apply_event(
    payload: &str,
    reply: &mut String,
    on_chunk: &mut (dyn FnMut(&str) + Send),
) -> Result<(), AppError> {
    let event: GenerateContentResponse = serde_json::from_str(payload)
        .map_err(|e| AppError::Parse(format!("Gemini stream event: {e}")))?;
    if let Some(delta) = event.text()? {
        reply.push_str(&delta);
        on_chunk(&delta);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sse_decoder_handles_split_lines() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: {\"a\"").is_empty());
        let payloads = decoder.push(b":1}\r\n\r\ndata: {\"b\":2}\n");
        assert_eq!(payloads, vec![r#"{"a":1}"#, r#"{"b":2}"#]);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_sse_decoder_split_utf8_and_trailing_line() {
        let mut decoder = SseDecoder::default();
        let bytes = "data: héllo".as_bytes();
        // split inside the two-byte 'é'
        assert!(decoder.push(&bytes[..8]).is_empty());
        assert!(decoder.push(&bytes[8..]).is_empty());
        assert_eq!(decoder.finish().as_deref(), Some("héllo"));
    }

    #[test]
    fn test_sse_decoder_ignores_comments_and_fields() {
        let mut decoder = SseDecoder::default();
        let payloads = decoder.push(b": keep-alive\nevent: message\ndata: x\n");
        assert_eq!(payloads, vec!["x"]);
    }

    #[test]
    fn test_response_text_concatenates_parts() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"[{\"a\""},{"text":":1}]"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(response.text().unwrap().as_deref(), Some(r#"[{"a":1}]"#));
    }

    #[test]
    fn test_blocked_prompt_is_fatal() {
        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        let err = response.text().unwrap_err();
        assert!(matches!(err, AppError::Provider { retriable: false, .. }));
    }

    #[test]
    fn test_empty_candidates_yield_none() {
        let response: GenerateContentResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert_eq!(response.text().unwrap(), None);
    }

    #[test]
    fn test_map_http_error_classification() {
        let invalid_key = map_http_error(
            reqwest::StatusCode::BAD_REQUEST,
            r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#,
        );
        assert!(invalid_key.is_retriable());
        assert!(invalid_key.to_string().contains("INVALID_ARGUMENT: API key not valid"));

        let bad_request = map_http_error(
            reqwest::StatusCode::BAD_REQUEST,
            r#"{"error":{"code":400,"message":"Invalid JSON payload received.","status":"INVALID_ARGUMENT"}}"#,
        );
        assert!(!bad_request.is_retriable());

        let unavailable = map_http_error(reqwest::StatusCode::SERVICE_UNAVAILABLE, "overloaded");
        assert!(unavailable.is_retriable());
        assert_eq!(unavailable.to_string(), "Provider error: HTTP 503: overloaded");
    }

    #[test]
    fn test_inline_data_is_base64() {
        let part = Part::from(&ContentPart::InlineData {
            mime_type: "image/png".into(),
            data: vec![1, 2, 3],
        });
        let value = serde_json::to_value(&part).unwrap();
        assert_eq!(value["inlineData"]["mimeType"], "image/png");
        assert_eq!(value["inlineData"]["data"], "AQID");
    }
}
