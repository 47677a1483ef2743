//! Template store module
//!
//! Resolves OS types to template files and renders them with minijinja.
//! When caching is enabled, parsed templates stay in the environment until
//! [`TemplateStore::clear`] is called; failed loads are never cached.
//!
//! Fields are referenced as `{{ UserName }}`. Go-style `{{.UserName}}` is a
//! syntax error here, so older template files must be converted.

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use minijinja::{path_loader, AutoEscape, Environment, ErrorKind, UndefinedBehavior};

use super::{ScriptError, ScriptRecord};
use crate::config::TemplatesConfig;

/// Check that an OS type is a plain identifier (ASCII letters, digits, `-`, `_`).
///
/// Anything else could step outside the template directory once joined into
/// a path, so it never reaches the filesystem.
pub fn is_valid_os_type(os_type: &str) -> bool {
    !os_type.is_empty()
        && os_type
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

pub struct TemplateStore {
    config: TemplatesConfig,
    env: RwLock<Environment<'static>>,
}

impl TemplateStore {
    pub fn new(config: &TemplatesConfig) -> Self {
        Self {
            env: RwLock::new(build_environment(&config.dir)),
            config: config.clone(),
        }
    }

    /// Template file name for an OS type, relative to the template directory
    pub fn template_name(&self, os_type: &str) -> Result<String, ScriptError> {
        if !is_valid_os_type(os_type) {
            return Err(ScriptError::NotFound);
        }
        Ok(format!(
            "{}{os_type}{}",
            self.config.prefix, self.config.suffix
        ))
    }

    /// Full path of the template for an OS type
    pub fn template_path(&self, os_type: &str) -> Result<PathBuf, ScriptError> {
        Ok(Path::new(&self.config.dir).join(self.template_name(os_type)?))
    }

    /// Resolve an OS type to its template name, failing if no file exists
    pub fn resolve(&self, os_type: &str) -> Result<String, ScriptError> {
        let path = self.template_path(os_type)?;
        if !path.is_file() {
            return Err(ScriptError::NotFound);
        }
        self.template_name(os_type)
    }

    /// Parse (or fetch from cache) and render the named template
    pub fn render(&self, name: &str, record: &ScriptRecord) -> Result<String, ScriptError> {
        if self.config.cache {
            let env = self.env.read().unwrap_or_else(PoisonError::into_inner);
            render_with(&env, name, record)
        } else {
            render_with(&build_environment(&self.config.dir), name, record)
        }
    }

    /// Drop every cached template so the next request reloads from disk
    pub fn clear(&self) {
        self.env
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear_templates();
    }

    pub const fn is_caching(&self) -> bool {
        self.config.cache
    }
}

fn build_environment(dir: &str) -> Environment<'static> {
    let mut env = Environment::new();
    env.set_loader(path_loader(dir));
    env.set_undefined_behavior(UndefinedBehavior::Strict);
    env.set_keep_trailing_newline(true);
    env.set_auto_escape_callback(|_| AutoEscape::None);
    env
}

fn render_with(
    env: &Environment<'static>,
    name: &str,
    record: &ScriptRecord,
) -> Result<String, ScriptError> {
    let template = env.get_template(name).map_err(|err| match err.kind() {
        ErrorKind::TemplateNotFound => ScriptError::NotFound,
        _ => ScriptError::Parse(err.to_string()),
    })?;

    template
        .render(record)
        .map_err(|err| ScriptError::Execution(err.to_string()))
}
