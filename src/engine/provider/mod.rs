pub mod gemini;

use async_trait::async_trait;

use super::credentials::Credential;
use crate::error::AppError;

// =============================================================================
// Request shape
// =============================================================================

/// One ordered piece of request content.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    /// Raw bytes; providers encode them as their wire format requires.
    InlineData { mime_type: String, data: Vec<u8> },
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text(text.into())
    }
}

/// A single-turn generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub model: String,
    pub parts: Vec<ContentPart>,
    /// Provider-dialect response schema. When set, the provider is asked for
    /// JSON output conforming to it.
    pub response_schema: Option<serde_json::Value>,
}

// =============================================================================
// Provider traits
// =============================================================================

/// Abstraction over a hosted generative model API.
///
/// Every call takes the credential explicitly so the failover invoker decides
/// which account is used for each attempt.
#[async_trait]
pub trait GenerativeProvider: Send + Sync {
    /// Human-readable provider name for logs.
    fn name(&self) -> &'static str;

    /// Single-turn generation. Returns the raw response text.
    async fn generate(
        &self,
        credential: &Credential,
        request: &GenerateRequest,
    ) -> Result<String, AppError>;

    /// Open a multi-turn chat bound to `credential` and `system_instruction`.
    ///
    /// Opening is local; the first network call happens on the first send.
    async fn open_chat(
        &self,
        credential: &Credential,
        model: &str,
        system_instruction: &str,
    ) -> Result<Box<dyn ChatChannel>, AppError>;
}

/// A bound, stateful chat handle.
#[async_trait]
pub trait ChatChannel: Send {
    /// Send `message` and stream the reply.
    ///
    /// `on_chunk` receives each text delta in arrival order. Returns the full
    /// reply once the stream completes; on error the channel's history is
    /// left as it was before the call.
    async fn send_streaming(
        &mut self,
        message: &str,
        on_chunk: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<String, AppError>;
}
