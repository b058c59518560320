use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Per-coach overrides. Anything left unset falls back to the built-in
/// prompt and the model from `llm_config`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoachSettings {
    #[serde(rename = "prompt_file")]
    #[serde(default)]
    pub prompt_file: Option<PathBuf>,

    #[serde(default)]
    pub model: Option<String>,
}

/// Coaching endpoints configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoachConfig {
    #[serde(default)]
    pub spanish: CoachSettings,

    #[serde(default)]
    pub english: CoachSettings,

    /// Replays the system prompt as the first user turn of every chat.
    #[serde(rename = "seed_prompt_history")]
    #[serde(default = "default_true")]
    pub seed_prompt_history: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            spanish: CoachSettings::default(),
            english: CoachSettings::default(),
            seed_prompt_history: default_true(),
        }
    }
}
