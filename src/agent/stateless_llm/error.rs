use thiserror::Error;

/// Failures raised while talking to the upstream model
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM configuration error: {0}")]
    Configuration(String),

    #[error("Request to the language model failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Language model returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Response was blocked: {0}")]
    Blocked(String),

    #[error("Malformed response from the language model: {0}")]
    InvalidResponse(String),

    #[error("Response stream interrupted: {0}")]
    Stream(String),
}

impl LlmError {
    /// Short label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            LlmError::Configuration(_) => "configuration",
            LlmError::Http(_) => "transport",
            LlmError::Api { .. } => "api",
            LlmError::Blocked(_) => "blocked",
            LlmError::InvalidResponse(_) => "invalid_response",
            LlmError::Stream(_) => "stream",
        }
    }
}
