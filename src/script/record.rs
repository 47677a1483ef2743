//! Script record module
//!
//! The record is the rendering context of every script template. Field names
//! as seen by templates are `ProjectName`, `CreatedAt`, `UserName`,
//! `ContainerName`, `Network`, `DNS`, `PUID`, `PGID`, `TZ`, `Port`, `Volume`
//! and `HostIP`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ScriptError;
use crate::config::ScriptDefaults;

/// RFC 1123 date-time, always in UTC
pub const CREATED_AT_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %Z";

/// Current time formatted for `CreatedAt`
pub fn created_at_now() -> String {
    Utc::now().format(CREATED_AT_FORMAT).to_string()
}

/// Values substituted into a script template
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptRecord {
    #[serde(rename = "ProjectName")]
    pub project_name: String,
    #[serde(rename = "CreatedAt")]
    pub created_at: String,
    #[serde(rename = "UserName")]
    pub user_name: String,
    #[serde(rename = "ContainerName")]
    pub container_name: String,
    #[serde(rename = "Network")]
    pub network: String,
    #[serde(rename = "DNS")]
    pub dns: String,
    #[serde(rename = "PUID")]
    pub puid: String,
    #[serde(rename = "PGID")]
    pub pgid: String,
    #[serde(rename = "TZ")]
    pub tz: String,
    #[serde(rename = "Port")]
    pub port: String,
    #[serde(rename = "Volume")]
    pub volume: String,
    #[serde(rename = "HostIP")]
    pub host_ip: String,
}

impl ScriptRecord {
    pub fn from_defaults(defaults: &ScriptDefaults, created_at: String) -> Self {
        Self {
            project_name: defaults.project_name.clone(),
            created_at,
            user_name: defaults.user_name.clone(),
            container_name: defaults.container_name.clone(),
            network: defaults.network.clone(),
            dns: defaults.dns.clone(),
            puid: defaults.puid.clone(),
            pgid: defaults.pgid.clone(),
            tz: defaults.tz.clone(),
            port: defaults.port.clone(),
            volume: defaults.volume.clone(),
            host_ip: defaults.host_ip.clone(),
        }
    }

    /// Replace every field for which `overrides` carries a non-empty value.
    /// `CreatedAt` is not overridable.
    pub fn apply(&mut self, overrides: RecordOverrides) {
        override_field(&mut self.project_name, overrides.project_name);
        override_field(&mut self.user_name, overrides.user_name);
        override_field(&mut self.container_name, overrides.container_name);
        override_field(&mut self.network, overrides.network);
        override_field(&mut self.dns, overrides.dns);
        override_field(&mut self.puid, overrides.puid);
        override_field(&mut self.pgid, overrides.pgid);
        override_field(&mut self.tz, overrides.tz);
        override_field(&mut self.port, overrides.port);
        override_field(&mut self.volume, overrides.volume);
        override_field(&mut self.host_ip, overrides.host_ip);
    }
}

fn override_field(field: &mut String, value: Option<String>) {
    if let Some(value) = value.filter(|v| !v.is_empty()) {
        *field = value;
    }
}

/// Caller-supplied field values decoded from a JSON request body.
///
/// Keys are matched case-insensitively; they are lowercased before
/// deserialization, hence the lowercase renames. When two keys differ only in
/// case, the later one in the document wins.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
pub struct RecordOverrides {
    #[serde(rename = "projectname")]
    pub project_name: Option<String>,
    #[serde(rename = "username")]
    pub user_name: Option<String>,
    #[serde(rename = "containername")]
    pub container_name: Option<String>,
    #[serde(rename = "network")]
    pub network: Option<String>,
    #[serde(rename = "dns")]
    pub dns: Option<String>,
    #[serde(rename = "puid")]
    pub puid: Option<String>,
    #[serde(rename = "pgid")]
    pub pgid: Option<String>,
    #[serde(rename = "tz")]
    pub tz: Option<String>,
    #[serde(rename = "port")]
    pub port: Option<String>,
    #[serde(rename = "volume")]
    pub volume: Option<String>,
    #[serde(rename = "hostip")]
    pub host_ip: Option<String>,
    /// Type-checked like the other fields but never applied
    #[serde(rename = "createdat")]
    _created_at: Option<String>,
}

impl RecordOverrides {
    /// Decode the first JSON value in `body`.
    ///
    /// Anything after that value is ignored. `null` decodes to no overrides.
    pub fn from_json(body: &[u8]) -> Result<Self, ScriptError> {
        let value = serde_json::Deserializer::from_slice(body)
            .into_iter::<Value>()
            .next()
            .ok_or_else(|| ScriptError::MalformedInput("empty body".to_string()))?
            .map_err(|e| ScriptError::MalformedInput(e.to_string()))?;

        let map = match value {
            Value::Null => return Ok(Self::default()),
            Value::Object(map) => map,
            other => {
                return Err(ScriptError::MalformedInput(format!(
                    "expected a JSON object, found {}",
                    json_kind(&other)
                )))
            }
        };

        let normalized: Map<String, Value> = map
            .into_iter()
            .map(|(key, value)| (key.to_ascii_lowercase(), value))
            .collect();

        serde_json::from_value(Value::Object(normalized))
            .map_err(|e| ScriptError::MalformedInput(e.to_string()))
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
