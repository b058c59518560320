pub mod error;
pub mod gemini_llm;
pub mod sse;
pub mod stateless_llm_interface;

#[cfg(test)]
pub mod scripted_llm;

pub use error::LlmError;
pub use gemini_llm::GeminiLLM;
pub use stateless_llm_interface::*;
