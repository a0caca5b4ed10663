//! Error types for SheetRun

use thiserror::Error;

/// Result type alias using SheetRun Error
pub type Result<T> = std::result::Result<T, Error>;

/// SheetRun error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("Not found: {kind} {id}")]
    NotFound { kind: String, id: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid workbook {path}: {reason}")]
    InvalidWorkbook { path: String, reason: String },

    #[error("Invalid sheet selector '{0}'")]
    InvalidSelector(String),

    #[error("Action catalog could not be built: {0}")]
    CatalogBuild(String),

    #[error("Invalid state transition for sheet {sheet}: {from} -> {to}")]
    InvalidStateTransition {
        sheet: String,
        from: String,
        to: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Fatal errors abort the whole run instead of a single sheet.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::CatalogBuild(_) | Error::InvalidConfig(_) | Error::Database(_)
        )
    }
}
