//! In-process model used by tests: replays a fixed script and records the
//! requests it receives.

use async_trait::async_trait;
use std::sync::Mutex;

use super::error::LlmError;
use super::stateless_llm_interface::{ChatRequest, StatelessLLMInterface, TextStream};

pub enum Script {
    /// Fail before any fragment is produced.
    FailToOpen(String),
    /// Yield these items in order; `Err` items end the stream.
    Items(Vec<Result<String, String>>),
}

pub struct ScriptedLLM {
    script: Script,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedLLM {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn fragments(fragments: &[&str]) -> Self {
        Self::new(Script::Items(
            fragments.iter().map(|f| Ok(f.to_string())).collect(),
        ))
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatelessLLMInterface for ScriptedLLM {
    async fn stream_chat(&self, request: ChatRequest) -> Result<TextStream, LlmError> {
        self.requests.lock().unwrap().push(request);

        match &self.script {
            Script::FailToOpen(message) => Err(LlmError::Stream(message.clone())),
            Script::Items(items) => {
                let items: Vec<Result<String, LlmError>> = items
                    .iter()
                    .map(|item| item.clone().map_err(LlmError::Stream))
                    .collect();
                Ok(Box::pin(futures::stream::iter(items)))
            }
        }
    }

    fn model(&self) -> &str {
        "scripted"
    }
}
