//! SheetRun Common Library
//!
//! Shared types, configuration, and run history for the SheetRun engine and CLI.

pub mod config;
pub mod db;
pub mod error;
pub mod types;

pub use config::ProjectConfig;
pub use db::Database;
pub use error::{Error, Result};
pub use types::*;

use sha2::{Digest, Sha256};

/// SheetRun version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "sheetrun.toml";

/// Default configuration path
pub fn default_config_path() -> std::path::PathBuf {
    std::path::PathBuf::from(DEFAULT_CONFIG_FILE)
}

/// Hex SHA-256 of a file's content, recorded with each sheet result
pub fn content_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
