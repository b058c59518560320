use std::sync::Arc;

use crate::coach::Coaches;
use crate::config_manager::Config;

/// Read-only state shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub coaches: Arc<Coaches>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let coaches = Coaches::from_config(&config)?;
        Ok(Self::from_parts(config, coaches))
    }

    pub fn from_parts(config: Config, coaches: Coaches) -> Self {
        Self {
            config: Arc::new(config),
            coaches: Arc::new(coaches),
        }
    }
}
