//! History Commands

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use serde::Serialize;
use sheetrun_common::db::RunRow;
use sheetrun_common::{Database, ProjectConfig, SheetRecord};

use super::EXIT_OK;
use crate::output::{print_info, print_list, sheet_status, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct HistoryArgs {
    /// Show the sheet results of one run
    pub run_id: Option<String>,

    /// Number of runs to list
    #[arg(short, long, default_value = "10")]
    pub limit: usize,
}

#[derive(Serialize)]
pub struct RunDisplay {
    #[serde(flatten)]
    pub run: RunRow,
}

fn timestamp(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

impl TableDisplay for RunDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Run", "Started", "Finished", "Sheets", "Invalid", "Passed", "Failed"]
    }

    fn row(&self) -> Vec<String> {
        let run = &self.run;
        let finished = match run.finished_at {
            Some(_) if run.cancelled => "cancelled".to_string(),
            Some(t) => timestamp(t),
            None => "running".to_string(),
        };
        vec![
            run.id.clone(),
            timestamp(run.started_at),
            finished,
            run.sheets.to_string(),
            run.invalid_sheets.to_string(),
            run.rows_passed.to_string(),
            run.rows_failed.to_string(),
        ]
    }
}

#[derive(Serialize)]
pub struct SheetHistoryDisplay {
    #[serde(flatten)]
    pub record: SheetRecord,
}

impl TableDisplay for SheetHistoryDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Sheet", "Status", "Passed", "Failed", "Skipped", "Digest"]
    }

    fn row(&self) -> Vec<String> {
        let r = &self.record;
        let digest = r
            .workbook_digest
            .as_deref()
            .map(|d| d.chars().take(12).collect::<String>())
            .unwrap_or_default();
        vec![
            r.sheet.to_string(),
            sheet_status(r.status),
            r.passed.to_string(),
            r.failed.to_string(),
            r.skipped.to_string(),
            digest,
        ]
    }
}

pub fn execute(args: HistoryArgs, config: ProjectConfig, format: OutputFormat) -> Result<i32> {
    let path = config.history_db_path();
    if !path.exists() {
        print_info(&format!("No run history at {}", path.display()));
        return Ok(EXIT_OK);
    }
    let db = Database::open(&path)?;

    match args.run_id {
        Some(run_id) => {
            let sheets: Vec<SheetHistoryDisplay> = db
                .sheet_results(&run_id)?
                .into_iter()
                .map(|record| SheetHistoryDisplay { record })
                .collect();
            print_list(&sheets, format);
        }
        None => {
            let runs: Vec<RunDisplay> = db
                .list_runs(args.limit)?
                .into_iter()
                .map(|run| RunDisplay { run })
                .collect();
            print_list(&runs, format);
        }
    }
    Ok(EXIT_OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_format() {
        assert_eq!(timestamp(0), "1970-01-01 00:00:00");
    }

    #[test]
    fn test_missing_history_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ProjectConfig::default();
        config.paths.root = dir.path().to_path_buf();
        let args = HistoryArgs {
            run_id: None,
            limit: 5,
        };
        assert_eq!(execute(args, config, OutputFormat::Plain).unwrap(), EXIT_OK);
    }
}
