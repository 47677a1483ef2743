//! Script generation errors

use hyper::StatusCode;
use thiserror::Error;

/// Failures a script request can end in
#[derive(Debug, Error)]
pub enum ScriptError {
    /// No template exists for the requested OS type
    #[error("Template for OS type not found")]
    NotFound,

    /// The template file is not valid template syntax
    #[error("Error parsing template: {0}")]
    Parse(String),

    /// Rendering failed against the record (e.g. unknown field)
    #[error("Error executing template: {0}")]
    Execution(String),

    /// JSON body could not be decoded into overrides
    #[error("Malformed JSON body: {0}")]
    MalformedInput(String),
}

impl ScriptError {
    /// HTTP status reported to the caller
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Parse(_) | Self::Execution(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MalformedInput(_) => StatusCode::BAD_REQUEST,
        }
    }
}
