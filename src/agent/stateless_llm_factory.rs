use std::sync::Arc;
use tracing::info;

use crate::agent::stateless_llm::{GeminiLLM, LlmError, StatelessLLMInterface};
use crate::config_manager::LlmConfig;

/// Factory for creating stateless LLM instances
pub struct StatelessLLMFactory;

impl StatelessLLMFactory {
    /// Create an LLM for `config.provider`, bound to `config.model`.
    pub fn create_llm(config: &LlmConfig) -> Result<Arc<dyn StatelessLLMInterface>, LlmError> {
        info!("Initializing LLM: {} ({})", config.provider, config.model);

        match config.provider.as_str() {
            "gemini_llm" => Ok(Arc::new(GeminiLLM::new(config)?)),
            other => Err(LlmError::Configuration(format!(
                "Unsupported LLM provider: {}",
                other
            ))),
        }
    }
}
