use std::sync::Arc;

use crate::agent::stateless_llm::{
    ChatRequest, ChatTurn, LlmError, StatelessLLMInterface, TextStream,
};
use crate::config_manager::GenerationConfig;

/// A conversation opened against one model with a fixed system instruction.
///
/// The session owns its history; the model itself stays stateless and sees
/// the full history on every call.
pub struct ChatSession {
    llm: Arc<dyn StatelessLLMInterface>,
    system_instruction: Arc<str>,
    generation: GenerationConfig,
    history: Vec<ChatTurn>,
}

impl ChatSession {
    pub fn new(
        llm: Arc<dyn StatelessLLMInterface>,
        system_instruction: Arc<str>,
        generation: GenerationConfig,
    ) -> Self {
        Self {
            llm,
            system_instruction,
            generation,
            history: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<ChatTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    /// Send `message` as the next user turn and stream the reply.
    pub async fn send_message_stream(&self, message: &str) -> Result<TextStream, LlmError> {
        let mut contents = self.history.clone();
        contents.push(ChatTurn::user(message));

        self.llm
            .stream_chat(ChatRequest {
                system_instruction: self.system_instruction.clone(),
                contents,
                generation: self.generation,
            })
            .await
    }
}
