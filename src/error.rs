use crate::github::RemoteError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ActionUpdaterError {
    #[error("Invalid configuration for updater '{updater}': field '{field}' {message}")]
    Configuration {
        updater: String,
        field: String,
        message: String,
    },

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("{path}: {location} has malformed action reference '{value}' (expected owner/repo@ref)")]
    MalformedReference {
        path: String,
        location: String,
        value: String,
    },

    #[error("Unknown updater '{name}' (available: {available})")]
    UnknownUpdater { name: String, available: String },

    #[error("Invalid updater registration '{id}': {message}")]
    Registration { id: String, message: String },

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("Path validation failed: {0}")]
    PathValidation(String),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML edit error: {0}")]
    TomlEdit(#[from] toml_edit::TomlError),
}

impl ActionUpdaterError {
    /// Errors that only invalidate the file being processed; the run continues
    /// with the remaining inputs.
    pub fn is_file_scoped(&self) -> bool {
        matches!(
            self,
            ActionUpdaterError::Parse { .. }
                | ActionUpdaterError::MalformedReference { .. }
                | ActionUpdaterError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ActionUpdaterError>;
