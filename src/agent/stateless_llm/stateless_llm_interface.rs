use async_trait::async_trait;
use futures::Stream;
use serde::Serialize;
use std::pin::Pin;
use std::sync::Arc;

use super::error::LlmError;
use crate::config_manager::GenerationConfig;

/// Lazy, finite sequence of text fragments for one request
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
}

/// One turn of conversation history
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }
}

/// Everything the upstream needs for a single streamed completion
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system_instruction: Arc<str>,
    pub contents: Vec<ChatTurn>,
    pub generation: GenerationConfig,
}

/// Interface for a stateless language model.
/// Conversation state lives in the caller; each call carries the full request.
#[async_trait]
pub trait StatelessLLMInterface: Send + Sync {
    /// Start a streamed completion. Errors returned here happen before the
    /// first fragment; later failures surface as `Err` items of the stream.
    async fn stream_chat(&self, request: ChatRequest) -> Result<TextStream, LlmError>;

    fn model(&self) -> &str;
}
