pub mod coach;
pub mod main;
pub mod stateless_llm;
pub mod system;
pub mod utils;

pub use coach::{CoachConfig, CoachSettings};
pub use main::Config;
pub use stateless_llm::{GenerationConfig, LlmConfig};
pub use system::SystemConfig;
