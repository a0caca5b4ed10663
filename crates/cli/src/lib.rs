//! SheetRun CLI
//!
//! Command-line interface for validating and running spreadsheet test suites.

pub mod commands;
pub mod output;
