// Application state module
// Shared, read-mostly state handed to every connection

use super::types::Config;
use crate::script::ScriptGenerator;

/// Application state
pub struct AppState {
    pub config: Config,
    pub generator: ScriptGenerator,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            generator: ScriptGenerator::new(config),
        }
    }
}
