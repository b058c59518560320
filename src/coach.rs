use std::fmt;
use std::sync::Arc;
use anyhow::Result;
use tracing::info;

use crate::agent::stateless_llm::{ChatTurn, StatelessLLMInterface};
use crate::agent::{ChatSession, StatelessLLMFactory};
use crate::config_manager::utils::load_text_file;
use crate::config_manager::{CoachSettings, Config, GenerationConfig};

const SPANISH_LEARNER_PROMPT: &str = include_str!("prompts/spanish_learner.txt");
const ENGLISH_LEARNER_PROMPT: &str = include_str!("prompts/english_learner.txt");

/// Which coach a request is addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoachMode {
    Spanish,
    English,
}

impl CoachMode {
    pub const ALL: [CoachMode; 2] = [CoachMode::Spanish, CoachMode::English];

    pub fn route(self) -> &'static str {
        match self {
            CoachMode::Spanish => "/spanishHelp",
            CoachMode::English => "/englishHelp",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CoachMode::Spanish => "spanish",
            CoachMode::English => "english",
        }
    }

    pub fn default_prompt(self) -> &'static str {
        match self {
            CoachMode::Spanish => SPANISH_LEARNER_PROMPT,
            CoachMode::English => ENGLISH_LEARNER_PROMPT,
        }
    }

    fn settings(self, config: &Config) -> &CoachSettings {
        match self {
            CoachMode::Spanish => &config.coach_config.spanish,
            CoachMode::English => &config.coach_config.english,
        }
    }
}

impl fmt::Display for CoachMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A coaching mode bound to its prompt and model. Immutable after startup.
#[derive(Clone)]
pub struct Coach {
    pub mode: CoachMode,
    system_prompt: Arc<str>,
    llm: Arc<dyn StatelessLLMInterface>,
    generation: GenerationConfig,
    seed_prompt_history: bool,
}

impl Coach {
    pub fn new(
        mode: CoachMode,
        system_prompt: impl Into<Arc<str>>,
        llm: Arc<dyn StatelessLLMInterface>,
        generation: GenerationConfig,
        seed_prompt_history: bool,
    ) -> Self {
        Self {
            mode,
            system_prompt: system_prompt.into(),
            llm,
            generation,
            seed_prompt_history,
        }
    }

    pub fn from_config(mode: CoachMode, config: &Config) -> Result<Self> {
        let settings = mode.settings(config);

        let system_prompt: Arc<str> = match &settings.prompt_file {
            Some(path) => {
                let prompt = load_text_file(path)?;
                if prompt.trim().is_empty() {
                    anyhow::bail!("Prompt file for {} coach is empty: {}", mode, path.display());
                }
                info!("Loaded {} coach prompt from {}", mode, path.display());
                Arc::from(prompt.trim_end())
            }
            None => Arc::from(mode.default_prompt().trim_end()),
        };

        let mut llm_config = config.llm_config.clone();
        if let Some(model) = &settings.model {
            llm_config.model = model.clone();
        }
        let llm = StatelessLLMFactory::create_llm(&llm_config)?;

        Ok(Self::new(
            mode,
            system_prompt,
            llm,
            config.llm_config.generation,
            config.coach_config.seed_prompt_history,
        ))
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    /// Open a fresh chat. When seeding is on, the system prompt is replayed
    /// as the first user turn as well.
    pub fn open_session(&self) -> ChatSession {
        let history = if self.seed_prompt_history {
            vec![ChatTurn::user(self.system_prompt.to_string())]
        } else {
            Vec::new()
        };

        ChatSession::new(self.llm.clone(), self.system_prompt.clone(), self.generation)
            .with_history(history)
    }
}

/// Both coaches, built once at startup
#[derive(Clone)]
pub struct Coaches {
    spanish: Coach,
    english: Coach,
}

impl Coaches {
    pub fn new(spanish: Coach, english: Coach) -> Self {
        Self { spanish, english }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let coaches = Self::new(
            Coach::from_config(CoachMode::Spanish, config)?,
            Coach::from_config(CoachMode::English, config)?,
        );

        for mode in CoachMode::ALL {
            let coach = coaches.get(mode);
            info!(
                "{} coach ready on {}: model={}, prompt={} chars",
                mode,
                mode.route(),
                coach.model(),
                coach.system_prompt().chars().count()
            );
        }

        Ok(coaches)
    }

    pub fn get(&self, mode: CoachMode) -> &Coach {
        match mode {
            CoachMode::Spanish => &self.spanish,
            CoachMode::English => &self.english,
        }
    }
}

/// Wrap the learner's text in double quotes before sending it upstream.
pub fn quote_message(text: &str) -> String {
    format!("\"{}\"", text)
}
