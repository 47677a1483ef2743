//! Script generation module
//!
//! Turns an OS type plus optional JSON overrides into a rendered shell script.

mod error;
mod record;
mod store;

pub use error::ScriptError;
pub use store::TemplateStore;

use record::{created_at_now, RecordOverrides, ScriptRecord};

use crate::config::{Config, ScriptDefaults};
use crate::logger;

/// Renders scripts from the configured defaults and template directory
pub struct ScriptGenerator {
    defaults: ScriptDefaults,
    store: TemplateStore,
    strict_json: bool,
}

impl ScriptGenerator {
    pub fn new(config: &Config) -> Self {
        Self {
            defaults: config.defaults.clone(),
            store: TemplateStore::new(&config.templates),
            strict_json: config.scripts.strict_json,
        }
    }

    /// Render the script for `os_type`.
    ///
    /// `json_body` is `Some` only when the request declared a JSON body.
    pub fn generate(&self, os_type: &str, json_body: Option<&[u8]>) -> Result<String, ScriptError> {
        let name = self.store.resolve(os_type)?;

        let mut record = ScriptRecord::from_defaults(&self.defaults, created_at_now());
        if let Some(body) = json_body {
            match RecordOverrides::from_json(body) {
                Ok(overrides) => record.apply(overrides),
                Err(err) if self.strict_json => return Err(err),
                Err(err) => {
                    logger::log_warning(&format!("{err}; using defaults for /scripts/{os_type}"));
                }
            }
        }

        self.store.render(&name, &record)
    }

    pub const fn store(&self) -> &TemplateStore {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const FULL_TEMPLATE: &str = "\
PROJECT={{ ProjectName }}
CREATED={{ CreatedAt }}
USER={{ UserName }}
CONTAINER={{ ContainerName }}
NETWORK={{ Network }}
DNS={{ DNS }}
PUID={{ PUID }}
PGID={{ PGID }}
TZ={{ TZ }}
PORT={{ Port }}
VOLUME={{ Volume }}
HOSTIP={{ HostIP }}
";

    fn generator(dir: &std::path::Path, strict_json: bool) -> ScriptGenerator {
        let mut cfg = Config::load_from(&dir.join("absent").to_string_lossy()).unwrap();
        cfg.templates.dir = dir.to_string_lossy().into_owned();
        cfg.scripts.strict_json = strict_json;
        ScriptGenerator::new(&cfg)
    }

    fn linux_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("jelly-bash-linux.sh"), FULL_TEMPLATE).unwrap();
        dir
    }

    fn line<'a>(out: &'a str, key: &str) -> &'a str {
        out.lines()
            .find_map(|l| l.strip_prefix(&format!("{key}=")))
            .unwrap_or_else(|| panic!("no {key} line in {out}"))
    }

    #[test]
    fn test_defaults_rendered() {
        let dir = linux_dir();
        let out = generator(dir.path(), false).generate("linux", None).unwrap();

        assert_eq!(line(&out, "PROJECT"), "Nexus Creator Vault");
        assert_eq!(line(&out, "USER"), "Administrator");
        assert_eq!(line(&out, "CONTAINER"), "nexus-creator-vault");
        assert_eq!(line(&out, "NETWORK"), "Inner-Athena");
        assert_eq!(line(&out, "DNS"), "10.20.0.20");
        assert_eq!(line(&out, "PUID"), "1050");
        assert_eq!(line(&out, "PGID"), "1050");
        assert_eq!(line(&out, "TZ"), "America/Colorado");
        assert_eq!(line(&out, "PORT"), "1050");
        assert_eq!(line(&out, "VOLUME"), "creator-vault000");
        assert_eq!(line(&out, "HOSTIP"), "10.20.0.1");
        chrono::NaiveDateTime::parse_from_str(line(&out, "CREATED"), "%a, %d %b %Y %H:%M:%S UTC")
            .unwrap();
    }

    #[test]
    fn test_json_overrides_rendered() {
        let dir = linux_dir();
        let out = generator(dir.path(), false)
            .generate("linux", Some(br#"{"UserName":"Alice","Port":"9000"}"#))
            .unwrap();
        assert_eq!(line(&out, "USER"), "Alice");
        assert_eq!(line(&out, "PORT"), "9000");
        assert_eq!(line(&out, "PUID"), "1050");
        assert_eq!(line(&out, "HOSTIP"), "10.20.0.1");
    }

    #[test]
    fn test_created_at_from_body_ignored() {
        let dir = linux_dir();
        let out = generator(dir.path(), false)
            .generate("linux", Some(br#"{"CreatedAt":"1999"}"#))
            .unwrap();
        assert_ne!(line(&out, "CREATED"), "1999");
    }

    #[test]
    fn test_malformed_json_falls_back() {
        let dir = linux_dir();
        let out = generator(dir.path(), false)
            .generate("linux", Some(b"{oops"))
            .unwrap();
        assert_eq!(line(&out, "USER"), "Administrator");
    }

    #[test]
    fn test_malformed_json_strict() {
        let dir = linux_dir();
        let err = generator(dir.path(), true)
            .generate("linux", Some(b"{oops"))
            .unwrap_err();
        assert!(matches!(err, ScriptError::MalformedInput(_)));
        assert_eq!(err.status(), hyper::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_missing_template_wins_over_bad_json() {
        let dir = linux_dir();
        let err = generator(dir.path(), true)
            .generate("plan9", Some(b"{oops"))
            .unwrap_err();
        assert!(matches!(err, ScriptError::NotFound));
        assert_eq!(err.status(), hyper::StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_traversal_is_not_found() {
        let dir = linux_dir();
        fs::write(dir.path().join("secret"), "top secret").unwrap();
        let nested = dir.path().join("templates");
        fs::create_dir(&nested).unwrap();

        let script_gen = generator(&nested, false);
        for os in ["../secret", "..", "%2e%2e", "linux/../../secret"] {
            assert!(matches!(script_gen.generate(os, None), Err(ScriptError::NotFound)), "{os}");
        }
    }
}
