//! Error types for the engine
//!
//! Validation problems and action failures are values, not `Error`s: they end
//! up in row records and sheet markup. Only problems that stop a sheet or the
//! whole run go through `sheetrun_common::Error`.

use crate::catalog::ParamKind;
use sheetrun_common::SheetId;
use thiserror::Error;

/// Failure to turn raw cells into a typed argument list
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgError {
    #[error("expected {expected} argument(s), found {found}")]
    ArityMismatch { expected: usize, found: usize },

    #[error("argument {} '{raw}' is not a valid {expected}: {reason}", .index + 1)]
    TypeConversion {
        /// Position among the argument cells, 0-based
        index: usize,
        expected: ParamKind,
        raw: String,
        reason: String,
    },
}

/// What is wrong with a row
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    #[error("row has no action")]
    EmptyRow,

    #[error("unknown action{}", suggestion_suffix(.suggestions))]
    UnknownAction { suggestions: Vec<String> },

    #[error("{0}")]
    Argument(ArgError),

    #[error("no overload accepts these arguments ({})", describe_attempts(.attempts))]
    NoMatchingOverload { attempts: Vec<(String, ArgError)> },

    #[error("arguments match more than one overload: {}", .candidates.join(", "))]
    AmbiguousOverload { candidates: Vec<String> },

    #[error("image '{name}' not found at {path}")]
    MissingAsset { name: String, path: String },
}

fn suggestion_suffix(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean {}?)", suggestions.join(", "))
    }
}

fn describe_attempts(attempts: &[(String, ArgError)]) -> String {
    attempts
        .iter()
        .map(|(signature, err)| format!("{}: {}", signature, err))
        .collect::<Vec<_>>()
        .join("; ")
}

/// A row that failed validation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{sheet} row {row} '{action}': {kind}")]
pub struct ValidationIssue {
    pub sheet: SheetId,
    pub row: usize,
    pub action: String,
    pub kind: IssueKind,
}

impl ValidationIssue {
    /// Short text written next to the row in the sheet
    pub fn note(&self) -> String {
        self.kind.to_string()
    }
}

/// Failure reported by a UI backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("element not found: {0}")]
    NotFound(String),

    #[error("timed out after {secs}s waiting for {what}")]
    Timeout { what: String, secs: u64 },

    #[error("operation not supported by this backend: {0}")]
    Unsupported(String),

    #[error("backend error: {0}")]
    Backend(String),
}

pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// Failure raised by an action while it runs
#[derive(Error, Debug)]
pub enum ActionError {
    /// Soft failure: the action ran but the application did not behave
    #[error("{0}")]
    Failed(String),

    #[error("assertion failed: {0}")]
    Assertion(String),

    #[error("argument {index}: {reason}")]
    BadArgument { index: usize, reason: String },

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ActionResult = std::result::Result<(), ActionError>;
