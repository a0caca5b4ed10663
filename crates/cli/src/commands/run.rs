//! Run Command

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use sheetrun_common::{Database, ProjectConfig, RunSummary, SheetRecord};
use sheetrun_engine::{BridgeDriver, Driver, DryRunDriver, HistorySink, JsonReport, Runner};
use std::sync::Arc;
use tracing::{info, warn};

use super::{catalog, selectors, EXIT_OK, EXIT_VALIDATION_FAILED};
use crate::output::{
    is_human, print_error, print_list, print_success, print_warning, sheet_status, OutputFormat,
    TableDisplay,
};

#[derive(Args)]
pub struct RunArgs {
    /// Sheet selectors: `workbook.yaml` or `workbook.yaml:Sheet1,Sheet2`
    pub selectors: Vec<String>,

    /// Record UI operations instead of sending them to the backend
    #[arg(long)]
    pub dry_run: bool,

    /// Do not write the JSON report
    #[arg(long)]
    pub no_report: bool,

    /// Do not store the run in the history database
    #[arg(long)]
    pub no_history: bool,
}

#[derive(Serialize)]
pub struct SheetResultDisplay {
    #[serde(flatten)]
    pub record: SheetRecord,
}

impl TableDisplay for SheetResultDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Sheet", "Status", "Rows", "Passed", "Failed", "Retried", "Skipped", "Duration"]
    }

    fn row(&self) -> Vec<String> {
        let r = &self.record;
        vec![
            r.sheet.to_string(),
            sheet_status(r.status),
            r.total_rows.to_string(),
            r.passed.to_string(),
            r.failed.to_string(),
            r.retried.to_string(),
            r.skipped.to_string(),
            format!("{:.1}s", r.duration_ms as f64 / 1000.0),
        ]
    }
}

async fn driver(config: &ProjectConfig, dry_run: bool) -> Result<Arc<dyn Driver>> {
    if dry_run {
        return Ok(Arc::new(DryRunDriver::new()));
    }
    if config.backend.command.is_none() {
        bail!("no backend configured: set backend.command in the configuration or pass --dry-run");
    }
    let bridge = BridgeDriver::spawn(&config.backend)
        .await
        .context("failed to start the UI backend")?;
    Ok(Arc::new(bridge))
}

/// Exit code of a finished run
pub fn exit_code(summary: &RunSummary) -> i32 {
    if summary.has_validation_failures() {
        EXIT_VALIDATION_FAILED
    } else {
        EXIT_OK
    }
}

pub async fn execute(args: RunArgs, config: ProjectConfig, format: OutputFormat) -> Result<i32> {
    let selectors = selectors(&args.selectors, &config)?;
    let config = Arc::new(config);
    let driver = driver(&config, args.dry_run).await?;
    info!("Using {} driver", driver.name());

    let mut runner = Runner::new(catalog()?, config.clone(), driver);
    if !args.no_report {
        runner = runner.with_sink(Box::new(JsonReport::new(config.report_path(), &config.report)));
    }
    if !args.no_history {
        let db = Database::open(config.history_db_path())?;
        runner = runner.with_sink(Box::new(HistorySink::new(db)));
    }

    let token = runner.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; stopping at the next row");
            token.cancel();
        }
    });

    let summary = runner.run(&selectors).await?;

    let sheets: Vec<SheetResultDisplay> = summary
        .sheets
        .iter()
        .cloned()
        .map(|record| SheetResultDisplay { record })
        .collect();
    print_list(&sheets, format);

    if is_human(format) {
        if summary.cancelled {
            print_warning("Run cancelled before all sheets finished");
        }
        let message = format!(
            "{} row(s) passed, {} failed",
            summary.rows_passed(),
            summary.rows_failed()
        );
        if summary.has_validation_failures() {
            print_error(&format!("{}; some sheets failed validation", message));
        } else {
            print_success(&message);
        }
        if !args.no_report {
            println!("Report: {}", config.report_path().display());
        }
    }

    Ok(exit_code(&summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetrun_engine::workbook::{Row, Sheet};
    use sheetrun_engine::Workbook;

    fn project() -> (tempfile::TempDir, ProjectConfig) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ProjectConfig::default();
        config.paths.root = dir.path().to_path_buf();
        config.timing.step_delay_ms = 0;
        (dir, config)
    }

    fn write(dir: &std::path::Path, rows: Vec<Row>) -> String {
        let path = dir.join("suite.yaml");
        let mut all = vec![Row::new(["Action"])];
        all.extend(rows);
        Workbook::new(&path, vec![Sheet::new("Main", all)]).save().unwrap();
        path.display().to_string()
    }

    #[tokio::test]
    async fn test_dry_run_writes_report() {
        let (dir, config) = project();
        let selector = write(
            dir.path(),
            vec![Row::new(["click", "NAME", "Main", "Ok"]), Row::new(["waitTime", "0"])],
        );
        let report = config.report_path();
        let args = RunArgs {
            selectors: vec![selector],
            dry_run: true,
            no_report: false,
            no_history: false,
        };

        let code = execute(args, config, OutputFormat::Json).await.unwrap();
        assert_eq!(code, EXIT_OK);
        assert!(report.exists());
        assert!(dir.path().join("reports").join("history.db").exists());
    }

    #[tokio::test]
    async fn test_invalid_sheet_sets_exit_code() {
        let (dir, config) = project();
        let selector = write(dir.path(), vec![Row::new(["clikc", "NAME", "Main", "Ok"])]);
        let args = RunArgs {
            selectors: vec![selector],
            dry_run: true,
            no_report: true,
            no_history: true,
        };

        let code = execute(args, config, OutputFormat::Json).await.unwrap();
        assert_eq!(code, EXIT_VALIDATION_FAILED);
    }

    #[tokio::test]
    async fn test_real_run_needs_a_backend() {
        let (dir, config) = project();
        let selector = write(dir.path(), vec![Row::new(["waitTime", "0"])]);
        let args = RunArgs {
            selectors: vec![selector],
            dry_run: false,
            no_report: true,
            no_history: true,
        };

        let err = execute(args, config, OutputFormat::Json).await.unwrap_err();
        assert!(err.to_string().contains("no backend configured"));
    }
}
