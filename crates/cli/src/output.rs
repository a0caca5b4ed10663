//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use sheetrun_common::{RowStatus, SheetStatus};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

fn table<T: TableDisplay>(items: &[T]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(T::headers());
    for item in items {
        table.add_row(item.row());
    }
    table
}

/// Render a list of items; empty lists render as nothing in table and plain form
pub fn render_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) -> String {
    match format {
        OutputFormat::Table if items.is_empty() => String::new(),
        OutputFormat::Table => table(items).to_string(),
        OutputFormat::Json => serde_json::to_string_pretty(items).unwrap_or_default(),
        OutputFormat::Yaml => serde_yaml::to_string(items).unwrap_or_default(),
        OutputFormat::Plain => items
            .iter()
            .map(|item| {
                T::headers()
                    .iter()
                    .zip(item.row())
                    .map(|(header, value)| format!("{}: {}", header, value))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .collect::<Vec<_>>()
            .join("\n---\n"),
    }
}

/// Print a list of items
pub fn print_list<T: Serialize + TableDisplay>(items: &[T], format: OutputFormat) {
    if items.is_empty() && format != OutputFormat::Json {
        println!("No items found.");
        return;
    }
    println!("{}", render_list(items, format));
}

/// Whether human-readable messages should accompany the output
pub fn is_human(format: OutputFormat) -> bool {
    matches!(format, OutputFormat::Table | OutputFormat::Plain)
}

/// Coloured label for a sheet status
pub fn sheet_status(status: SheetStatus) -> String {
    match status {
        SheetStatus::Passed => "✓ passed".green().to_string(),
        SheetStatus::Failed => "✗ failed".red().to_string(),
        SheetStatus::Invalid => "⚠ invalid".yellow().to_string(),
        SheetStatus::Stopped => "■ stopped".dimmed().to_string(),
    }
}

pub fn row_status(status: RowStatus) -> String {
    match status {
        RowStatus::Passed => "✓".green().to_string(),
        RowStatus::Failed => "✗".red().to_string(),
        RowStatus::Skipped => "-".dimmed().to_string(),
        RowStatus::Invalid => "⚠".yellow().to_string(),
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("⚠️  {}", message);
}

/// Print info message
pub fn print_info(message: &str) {
    println!("ℹ️  {}", message);
}
