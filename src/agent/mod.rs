pub mod chat_session;
pub mod stateless_llm;
pub mod stateless_llm_factory;

pub use chat_session::ChatSession;
pub use stateless_llm_factory::StatelessLLMFactory;
