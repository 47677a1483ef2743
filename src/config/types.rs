// Configuration types module
// Defines all configuration-related data structures

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
    #[serde(default)]
    pub routes: RoutesConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
    #[serde(default)]
    pub scripts: ScriptsConfig,
    #[serde(default)]
    pub defaults: ScriptDefaults,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    #[serde(default = "default_access_log_format")]
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    #[serde(default)]
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    #[serde(default)]
    pub error_log_file: Option<String>,
}

#[allow(clippy::missing_const_for_fn)]
fn default_access_log_format() -> String {
    "combined".to_string()
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
}

/// HTTP configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    pub server_name: String,
    pub max_body_size: u64,
}

/// Routes configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct RoutesConfig {
    /// Health check configuration
    #[serde(default)]
    pub health: HealthConfig,
}

/// Health check configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HealthConfig {
    /// Enable health check endpoints
    #[serde(default = "default_health_enabled")]
    pub enabled: bool,
    /// Liveness probe path (default: /healthz)
    #[serde(default = "default_healthz_path")]
    pub liveness_path: String,
    /// Readiness probe path (default: /readyz)
    #[serde(default = "default_readyz_path")]
    pub readiness_path: String,
}

#[allow(clippy::missing_const_for_fn)]
fn default_health_enabled() -> bool {
    true
}

#[allow(clippy::missing_const_for_fn)]
fn default_healthz_path() -> String {
    "/healthz".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_readyz_path() -> String {
    "/readyz".to_string()
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: default_health_enabled(),
            liveness_path: default_healthz_path(),
            readiness_path: default_readyz_path(),
        }
    }
}

/// Template lookup configuration
///
/// A template for OS type `linux` lives at `{dir}/{prefix}linux{suffix}`.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct TemplatesConfig {
    pub dir: String,
    pub prefix: String,
    pub suffix: String,
    /// Keep parsed templates in memory after the first successful load
    pub cache: bool,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            dir: "templates".to_string(),
            prefix: "jelly-bash-".to_string(),
            suffix: ".sh".to_string(),
            cache: true,
        }
    }
}

/// Script generation behavior
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct ScriptsConfig {
    /// Reject unparseable JSON bodies with 400 instead of falling back to defaults
    pub strict_json: bool,
}

/// Default values for every overridable script field.
///
/// `CreatedAt` has no entry here: it is stamped per request.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ScriptDefaults {
    pub project_name: String,
    pub user_name: String,
    pub container_name: String,
    pub network: String,
    pub dns: String,
    pub puid: String,
    pub pgid: String,
    pub tz: String,
    pub port: String,
    pub volume: String,
    pub host_ip: String,
}

impl Default for ScriptDefaults {
    fn default() -> Self {
        Self {
            project_name: "Nexus Creator Vault".to_string(),
            user_name: "Administrator".to_string(),
            container_name: "nexus-creator-vault".to_string(),
            network: "Inner-Athena".to_string(),
            dns: "10.20.0.20".to_string(),
            puid: "1050".to_string(),
            pgid: "1050".to_string(),
            tz: "America/Colorado".to_string(),
            port: "1050".to_string(),
            volume: "creator-vault000".to_string(),
            host_ip: "10.20.0.1".to_string(),
        }
    }
}

impl ScriptDefaults {
    /// Field names paired with their values, in record order
    pub fn entries(&self) -> [(&'static str, &str); 11] {
        [
            ("project_name", self.project_name.as_str()),
            ("user_name", self.user_name.as_str()),
            ("container_name", self.container_name.as_str()),
            ("network", self.network.as_str()),
            ("dns", self.dns.as_str()),
            ("puid", self.puid.as_str()),
            ("pgid", self.pgid.as_str()),
            ("tz", self.tz.as_str()),
            ("port", self.port.as_str()),
            ("volume", self.volume.as_str()),
            ("host_ip", self.host_ip.as_str()),
        ]
    }
}
