// Configuration module entry point
// Manages application configuration and shared runtime state

mod state;
mod types;

use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{Config, HealthConfig, ScriptDefaults, TemplatesConfig};

/// Default config file base name, resolved in the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config";

impl Config {
    /// Load configuration from `config.toml` (or any format the `config` crate
    /// recognizes) in the working directory, plus `JELLY_*` environment variables
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from specified file path (extension optional)
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = Self::builder(config_path)?
            .add_source(
                config::Environment::with_prefix("JELLY")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let cfg: Self = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Builder with built-in defaults and the optional config file
    fn builder(
        config_path: &str,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("performance.write_timeout", 30)?
            .set_default("http.server_name", "jelly-scripts")?
            .set_default("http.max_body_size", 1_048_576) // 1MB
    }

    /// Reject configurations that would break script rendering invariants
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if let Some((name, _)) = self
            .defaults
            .entries()
            .into_iter()
            .find(|(_, value)| value.is_empty())
        {
            return Err(config::ConfigError::Message(format!(
                "defaults.{name} must not be empty"
            )));
        }

        if self.server.workers == Some(0) {
            return Err(config::ConfigError::Message(
                "server.workers must be at least 1".to_string(),
            ));
        }

        if self.templates.dir.is_empty() {
            return Err(config::ConfigError::Message(
                "templates.dir must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }
}
