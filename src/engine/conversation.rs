//! Streaming follow-up chat about a generated routine.
//!
//! A session is `Uninit` until the first message. That message opens a chat
//! through the failover invoker and is sent within the same attempt, so the
//! credential that answered stays bound to the chat. Later messages go
//! straight through the bound chat. Any failure drops the chat and returns the
//! session to `Uninit`; the next message starts over from the first credential.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use super::credentials::Credential;
use super::failover::{FailoverInvoker, FailoverOperation};
use super::prompt;
use super::provider::{ChatChannel, GenerativeProvider};
use super::types::{ChatMessage, Routine, SkinConditionCategory, Sender};
use crate::error::AppError;
use crate::validation;

/// Appended to every partial reply while a stream is still open.
pub const STREAMING_MARKER: &str = "▌";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Uninit,
    Initializing,
    Ready,
}

/// What the assistant knows about the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContext {
    pub analysis: Vec<SkinConditionCategory>,
    pub goals: Vec<String>,
    pub routine: Routine,
}

enum Binding {
    Uninit,
    Initializing,
    Ready(Box<dyn ChatChannel>),
}

/// Accumulates streamed chunks and reports `partial + marker` after each one.
struct PartialReply<'a> {
    text: String,
    observer: &'a mut (dyn FnMut(&str) + Send),
}

impl<'a> PartialReply<'a> {
    fn new(observer: &'a mut (dyn FnMut(&str) + Send)) -> Self {
        Self {
            text: String::new(),
            observer,
        }
    }

    fn push(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        self.text.push_str(chunk);
        (self.observer)(&format!("{}{STREAMING_MARKER}", self.text));
    }

    fn delivered(&self) -> bool {
        !self.text.is_empty()
    }
}

/// Failover operation: open a chat on the attempt's credential and send the
/// first message through it.
struct OpenAndSend<'a> {
    provider: &'a dyn GenerativeProvider,
    model: &'a str,
    system_instruction: &'a str,
    message: &'a str,
    partial: PartialReply<'a>,
}

impl FailoverOperation for OpenAndSend<'_> {
    type Output = (Box<dyn ChatChannel>, String);

    async fn attempt(&mut self, credential: &Credential) -> Result<Self::Output, AppError> {
        let mut channel = self
            .provider
            .open_chat(credential, self.model, self.system_instruction)
            .await?;

        let result = {
            let partial = &mut self.partial;
            let mut on_chunk = |chunk: &str| partial.push(chunk);
            channel.send_streaming(self.message, &mut on_chunk).await
        };

        match result {
            Ok(reply) => Ok((channel, reply)),
            // partials already shown must never shrink
            Err(err) if self.partial.delivered() && err.is_retriable() => Err(AppError::fatal(
                format!("chat stream interrupted: {err}"),
                None,
            )),
            Err(err) => Err(err),
        }
    }
}

pub struct ConversationSession {
    provider: Arc<dyn GenerativeProvider>,
    invoker: FailoverInvoker,
    model: String,
    brand: String,
    context: ConversationContext,
    binding: Binding,
    transcript: Vec<ChatMessage>,
}

impl ConversationSession {
    pub fn new(
        provider: Arc<dyn GenerativeProvider>,
        invoker: FailoverInvoker,
        model: impl Into<String>,
        brand: impl Into<String>,
        context: ConversationContext,
    ) -> Self {
        Self {
            provider,
            invoker,
            model: model.into(),
            brand: brand.into(),
            context,
            binding: Binding::Uninit,
            transcript: vec![ChatMessage::new(Sender::Ai, prompt::CHAT_GREETING)],
        }
    }

    pub fn state(&self) -> SessionState {
        match self.binding {
            Binding::Uninit => SessionState::Uninit,
            Binding::Initializing => SessionState::Initializing,
            Binding::Ready(_) => SessionState::Ready,
        }
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn context(&self) -> &ConversationContext {
        &self.context
    }

    /// Replace the user context. Any bound chat is dropped; the transcript is kept.
    pub fn set_context(&mut self, context: ConversationContext) {
        if matches!(self.binding, Binding::Ready(_)) {
            tracing::debug!("Context replaced, releasing bound chat");
        }
        self.context = context;
        self.binding = Binding::Uninit;
    }

    /// Send one user message and stream the reply.
    ///
    /// `observer` receives the growing partial reply followed by
    /// [`STREAMING_MARKER`] after every chunk. The returned string is the
    /// clean final reply, also recorded in the transcript.
    pub async fn send_message(
        &mut self,
        text: &str,
        observer: &mut (dyn FnMut(&str) + Send),
    ) -> Result<String, AppError> {
        validation::require_non_empty("message", text)?;
        self.transcript.push(ChatMessage::new(Sender::User, text));

        match self.exchange(text, observer).await {
            Ok(reply) => {
                self.transcript.push(ChatMessage::new(Sender::Ai, reply.clone()));
                Ok(reply)
            }
            Err(err) => {
                tracing::error!(kind = err.kind(), "Chat message failed: {}", err);
                self.binding = Binding::Uninit;
                self.transcript
                    .push(ChatMessage::new(Sender::Ai, prompt::CHAT_FAILURE_REPLY));
                Err(err)
            }
        }
    }

    async fn exchange(
        &mut self,
        text: &str,
        observer: &mut (dyn FnMut(&str) + Send),
    ) -> Result<String, AppError> {
        if let Binding::Ready(channel) = &mut self.binding {
            let mut partial = PartialReply::new(observer);
            let mut on_chunk = |chunk: &str| partial.push(chunk);
            return channel.send_streaming(text, &mut on_chunk).await;
        }

        self.binding = Binding::Initializing;
        tracing::info!(provider = self.provider.name(), model = %self.model, "Opening chat session");

        let system_instruction = prompt::chat_system_instruction(
            &self.brand,
            &self.context.analysis,
            &self.context.goals,
            &self.context.routine,
        );
        let operation = OpenAndSend {
            provider: self.provider.as_ref(),
            model: &self.model,
            system_instruction: &system_instruction,
            message: text,
            partial: PartialReply::new(observer),
        };
        let (channel, reply) = self.invoker.invoke("open_chat", operation).await?;

        self.binding = Binding::Ready(channel);
        Ok(reply)
    }
}
