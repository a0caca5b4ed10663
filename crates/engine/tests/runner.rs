//! Runner behaviour over real workbook files
//!
//! Uses a small catalog of counting actions instead of the built-in UI actions
//! so each test controls exactly when an action fails.

use async_trait::async_trait;
use parking_lot::Mutex;
use sheetrun_common::{
    Database, ExecutionOutcome, FailureKind, ProjectConfig, RowRecord, RowStatus, SheetStatus,
};
use sheetrun_engine::catalog::CatalogBuilder;
use sheetrun_engine::report::MemoryLog;
use sheetrun_engine::workbook::{Row, Sheet};
use sheetrun_engine::{
    ActionCatalog, ActionContext, ActionError, ActionHandler, ActionResult, ActionSignature,
    Directive, DryRunDriver, HistorySink, JsonReport, MemorySink, ParamKind, Runner,
    SheetSelector, TypedArgs, Workbook,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Records its arguments and fails the first `fail_first` calls
#[derive(Default)]
struct Recorder {
    fail_first: usize,
    calls: Mutex<Vec<Vec<String>>>,
    cancel: Option<CancellationToken>,
}

impl Recorder {
    fn failing(fail_first: usize) -> Arc<Self> {
        Arc::new(Self {
            fail_first,
            ..Self::default()
        })
    }

    fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ActionHandler for Recorder {
    async fn call(&self, _ctx: &ActionContext, args: &TypedArgs) -> ActionResult {
        let call = {
            let mut calls = self.calls.lock();
            calls.push(args.values().iter().map(ToString::to_string).collect());
            calls.len()
        };
        if let Some(token) = &self.cancel {
            token.cancel();
        }
        if call <= self.fail_first {
            return Err(ActionError::Failed(format!("call {} failed", call)));
        }
        Ok(())
    }
}

struct Harness {
    dir: TempDir,
    click: Arc<Recorder>,
    flaky: Arc<Recorder>,
    press: Arc<Recorder>,
    halt: Arc<Recorder>,
    token: CancellationToken,
    config: ProjectConfig,
}

impl Harness {
    fn new(flaky_failures: usize, max_attempts: u32) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ProjectConfig::default();
        config.paths.root = dir.path().to_path_buf();
        config.timing.step_delay_ms = 0;
        config.retry.max_attempts = max_attempts;

        let token = CancellationToken::new();
        Self {
            dir,
            click: Recorder::failing(0),
            flaky: Recorder::failing(flaky_failures),
            press: Recorder::failing(usize::MAX),
            halt: Arc::new(Recorder {
                cancel: Some(token.clone()),
                ..Recorder::default()
            }),
            token,
            config,
        }
    }

    fn catalog(&self) -> Arc<ActionCatalog> {
        let mut builder = CatalogBuilder::new();
        builder
            .action(
                ActionSignature::shared("click", self.click.clone())
                    .param("elementName", ParamKind::Text)
                    .param("paneName", ParamKind::Text)
                    .param("timeout", ParamKind::Integer)
                    .retryable(),
            )
            .action(
                ActionSignature::shared("flaky", self.flaky.clone())
                    .param("element", ParamKind::Text)
                    .retryable(),
            )
            .action(ActionSignature::shared("press", self.press.clone()).param("keys", ParamKind::Text))
            .action(ActionSignature::shared("halt", self.halt.clone()))
            .action(ActionSignature::shared("pick", Recorder::failing(0)).param("name", ParamKind::Text))
            .action(ActionSignature::shared("pick", Recorder::failing(0)).param("count", ParamKind::Integer))
            .action(
                ActionSignature::shared("startTest", Recorder::failing(0))
                    .param("name", ParamKind::Text)
                    .directive(Directive::StartTestCase),
            )
            .action(ActionSignature::shared("stop", Recorder::failing(0)).directive(Directive::StopSheet));
        Arc::new(builder.build().unwrap())
    }

    fn runner(&self) -> (Runner, MemorySink) {
        let memory = MemorySink::new();
        let runner = Runner::new(
            self.catalog(),
            Arc::new(self.config.clone()),
            Arc::new(DryRunDriver::new()),
        )
        .with_sink(Box::new(memory.clone()))
        .with_cancellation(self.token.clone());
        (runner, memory)
    }

    fn workbook(&self, file: &str, sheets: &[(&str, &[&[&str]])]) -> PathBuf {
        write_workbook(self.dir.path(), file, sheets)
    }
}

fn write_workbook(dir: &Path, file: &str, sheets: &[(&str, &[&[&str]])]) -> PathBuf {
    let path = dir.join(file);
    let sheets = sheets
        .iter()
        .map(|(name, rows)| {
            let mut all = vec![Row::new(["Action", "Arg1", "Arg2", "Arg3"])];
            all.extend(rows.iter().map(|cells| Row::new(cells.iter().copied())));
            Sheet::new(*name, all)
        })
        .collect();
    Workbook::new(&path, sheets).save().unwrap();
    path
}

fn rows_of<'a>(log: &'a MemoryLog, sheet: &str) -> Vec<&'a RowRecord> {
    log.rows.iter().filter(|r| r.sheet.sheet == sheet).collect()
}

#[tokio::test]
async fn test_text_signature_receives_converted_arguments() {
    let harness = Harness::new(0, 3);
    let path = harness.workbook("suite.yaml", &[("Login", &[&["click", "Submit", "MainPane", "5000"]])]);
    let (mut runner, memory) = harness.runner();

    let summary = runner.run(&[SheetSelector::all(&path)]).await.unwrap();

    assert_eq!(summary.sheets[0].status, SheetStatus::Passed);
    assert_eq!(
        harness.click.calls(),
        vec![vec!["Submit".to_string(), "MainPane".to_string(), "5000".to_string()]]
    );
    let log = memory.snapshot();
    assert_eq!(log.rows[0].outcome, Some(ExecutionOutcome::Pass));

    let written = Workbook::load(&path).unwrap();
    assert_eq!(written.mark("Login", 1).unwrap().status, "PASS");
}

#[tokio::test]
async fn test_unknown_action_skips_only_its_sheet() {
    let harness = Harness::new(0, 3);
    let path = harness.workbook(
        "suite.yaml",
        &[
            ("Broken", &[&["click", "Submit", "MainPane", "5000"], &["clikc", "Submit", "MainPane", "5000"]]),
            ("Healthy", &[&["click", "Ok", "Dialog", "10"]]),
        ],
    );
    let (mut runner, memory) = harness.runner();

    let summary = runner.run(&[SheetSelector::all(&path)]).await.unwrap();

    assert_eq!(summary.sheets[0].status, SheetStatus::Invalid);
    assert_eq!(summary.sheets[1].status, SheetStatus::Passed);
    assert!(summary.has_validation_failures());
    // Only the healthy sheet reached the action
    assert_eq!(harness.click.calls(), vec![vec!["Ok".to_string(), "Dialog".to_string(), "10".to_string()]]);

    let log = memory.snapshot();
    let broken = rows_of(&log, "Broken");
    assert_eq!(broken.len(), 1);
    assert_eq!(broken[0].row, 2);
    assert_eq!(broken[0].status, RowStatus::Invalid);

    let written = Workbook::load(&path).unwrap();
    assert_eq!(written.mark("Broken", 2).unwrap().status, "INVALID");
    assert!(written.mark("Broken", 1).is_none());
}

#[tokio::test]
async fn test_flaky_action_passes_on_third_attempt() {
    let harness = Harness::new(2, 3);
    let path = harness.workbook("suite.yaml", &[("Retry", &[&["flaky", "Save"]])]);
    let (mut runner, memory) = harness.runner();

    let summary = runner.run(&[SheetSelector::all(&path)]).await.unwrap();

    let log = memory.snapshot();
    assert_eq!(
        log.rows[0].outcome,
        Some(ExecutionOutcome::Retried {
            attempts: 3,
            outcome: Box::new(ExecutionOutcome::Pass),
        })
    );
    assert_eq!(log.retries.len(), 2);
    assert_eq!(log.retries[0].attempt, 2);
    assert_eq!(log.retries[1].mark.status, "RETRY");
    assert_eq!(summary.sheets[0].status, SheetStatus::Passed);
    assert_eq!(summary.sheets[0].retried, 1);

    let mark = Workbook::load(&path).unwrap().mark("Retry", 1).cloned().unwrap();
    assert_eq!(mark.status, "PASS");
    assert_eq!(mark.attempts, Some(3));
}

#[tokio::test]
async fn test_retries_are_exhausted() {
    let harness = Harness::new(3, 3);
    let path = harness.workbook("suite.yaml", &[("Retry", &[&["flaky", "Save"]])]);
    let (mut runner, memory) = harness.runner();

    let summary = runner.run(&[SheetSelector::all(&path)]).await.unwrap();

    assert_eq!(harness.flaky.calls().len(), 3);
    let log = memory.snapshot();
    let row = &log.rows[0];
    assert_eq!(row.status, RowStatus::Failed);
    match &row.outcome {
        Some(ExecutionOutcome::Fail(cause)) => {
            assert_eq!(cause.kind, FailureKind::RetryExhausted { attempts: 3 });
            assert_eq!(cause.message, "call 3 failed");
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert_eq!(summary.sheets[0].status, SheetStatus::Failed);
}

#[tokio::test]
async fn test_failures_do_not_stop_the_sheet() {
    let harness = Harness::new(0, 3);
    let path = harness.workbook(
        "suite.yaml",
        &[("Keys", &[&["press", "ctrl+s"], &["click", "Ok", "Dialog", "1"]])],
    );
    let (mut runner, memory) = harness.runner();

    let summary = runner.run(&[SheetSelector::all(&path)]).await.unwrap();

    // Not retryable: exactly one attempt
    assert_eq!(harness.press.calls().len(), 1);
    assert!(memory.snapshot().retries.is_empty());
    assert_eq!(harness.click.calls().len(), 1);
    assert_eq!(summary.sheets[0].failed, 1);
    assert_eq!(summary.sheets[0].passed, 1);
}

#[tokio::test]
async fn test_stop_directive_skips_remaining_rows() {
    let harness = Harness::new(0, 3);
    let path = harness.workbook(
        "suite.yaml",
        &[
            (
                "Flow",
                &[
                    &["startTest", "TC-101"],
                    &["click", "Ok", "Dialog", "1"],
                    &["stop"],
                    &["click", "Cancel", "Dialog", "1"],
                ],
            ),
            ("Next", &[&["click", "Next", "Wizard", "1"]]),
        ],
    );
    let (mut runner, memory) = harness.runner();

    let summary = runner.run(&[SheetSelector::all(&path)]).await.unwrap();

    assert_eq!(summary.sheets[0].status, SheetStatus::Stopped);
    assert_eq!(summary.sheets[0].skipped, 1);
    // The stop only affects its own sheet
    assert_eq!(summary.sheets[1].status, SheetStatus::Passed);
    assert_eq!(harness.click.calls().len(), 2);

    let log = memory.snapshot();
    let flow = rows_of(&log, "Flow");
    assert_eq!(flow[3].status, RowStatus::Skipped);
    assert!(flow.iter().all(|r| r.test_case.as_deref() == Some("TC-101")));
    assert_eq!(rows_of(&log, "Next")[0].test_case, None);
}

#[tokio::test]
async fn test_cancellation_halts_at_row_boundary() {
    let harness = Harness::new(0, 3);
    let path = harness.workbook(
        "suite.yaml",
        &[
            ("First", &[&["halt"], &["click", "Ok", "Dialog", "1"]]),
            ("Second", &[&["click", "Next", "Wizard", "1"]]),
        ],
    );
    let (mut runner, memory) = harness.runner();

    let summary = runner.run(&[SheetSelector::all(&path)]).await.unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.sheets.len(), 1);
    assert_eq!(summary.sheets[0].status, SheetStatus::Stopped);
    assert!(harness.click.calls().is_empty());

    let log = memory.snapshot();
    assert_eq!(log.rows[1].status, RowStatus::Skipped);
    assert!(log.flushed.unwrap().cancelled);
}

#[tokio::test]
async fn test_missing_sheet_and_workbook_do_not_stop_the_run() {
    let harness = Harness::new(0, 3);
    let path = harness.workbook("suite.yaml", &[("Login", &[&["click", "Ok", "Dialog", "1"]])]);
    let (mut runner, _memory) = harness.runner();

    let selectors = vec![
        SheetSelector::all(harness.dir.path().join("absent.yaml")),
        SheetSelector {
            workbook: path.clone(),
            sheets: Some(vec!["Nope".to_string(), "Login".to_string()]),
        },
    ];
    let summary = runner.run(&selectors).await.unwrap();

    let statuses: Vec<_> = summary.sheets.iter().map(|s| s.status).collect();
    assert_eq!(
        statuses,
        vec![SheetStatus::Invalid, SheetStatus::Invalid, SheetStatus::Passed]
    );
    assert_eq!(harness.click.calls().len(), 1);
}

#[tokio::test]
async fn test_sheets_marked_not_to_run_are_left_out() {
    let harness = Harness::new(0, 3);
    let path = harness.dir.path().join("suite.yaml");
    let header = || Row::new(["Action", "Arg1", "Arg2", "Arg3"]);
    Workbook::new(
        &path,
        vec![
            Sheet::new("Login", vec![header(), Row::new(["click", "Ok", "Dialog", "1"])]),
            Sheet::new("Draft", vec![header(), Row::new(["click", "Later", "Dialog", "1"])]).skipped(),
        ],
    )
    .save()
    .unwrap();
    let (mut runner, memory) = harness.runner();

    let summary = runner.run(&[SheetSelector::all(&path)]).await.unwrap();

    assert_eq!(summary.sheets.len(), 1);
    assert_eq!(summary.sheets[0].sheet.sheet, "Login");
    assert_eq!(harness.click.calls(), vec![vec!["Ok".to_string(), "Dialog".to_string(), "1".to_string()]]);
    assert!(rows_of(&memory.snapshot(), "Draft").is_empty());
    assert!(Workbook::load(&path).unwrap().mark("Draft", 1).is_none());

    // Naming the sheet runs it anyway
    let named = SheetSelector {
        workbook: path.clone(),
        sheets: Some(vec!["Draft".to_string()]),
    };
    let summary = runner.run(&[named]).await.unwrap();
    assert_eq!(summary.sheets[0].status, SheetStatus::Passed);
    assert_eq!(harness.click.calls().len(), 2);
}

#[tokio::test]
async fn test_reports_and_history_are_written() {
    let harness = Harness::new(0, 3);
    let path = harness.workbook(
        "suite.yaml",
        &[("Login", &[&["click", "Ok", "Dialog", "1"], &["press", "enter"]])],
    );
    let report_path = harness.config.report_path();
    let db = Database::open_memory().unwrap();

    let mut runner = Runner::new(
        harness.catalog(),
        Arc::new(harness.config.clone()),
        Arc::new(DryRunDriver::new()),
    )
    .with_sink(Box::new(JsonReport::new(&report_path, &harness.config.report)))
    .with_sink(Box::new(HistorySink::new(db.clone())));

    let summary = runner.run(&[SheetSelector::all(&path)]).await.unwrap();

    let document = JsonReport::read(&report_path).unwrap();
    assert_eq!(document.summary.run_id, summary.run_id);
    assert_eq!(document.rows.len(), 2);
    assert_eq!(document.rows[1].status, RowStatus::Failed);
    // The dry-run driver accepts screenshots, so the failure gets a path
    assert!(document.rows[1].screenshot.is_some());

    let runs = db.list_runs(10).unwrap();
    assert_eq!(runs[0].id, summary.run_id);
    assert_eq!(runs[0].rows_failed, 1);
    assert_eq!(db.action_failures("press").unwrap(), 1);
    let digest = document.summary.sheets[0].workbook_digest.clone();
    assert!(digest.is_some());
}

#[test]
fn test_validate_marks_without_running() {
    let harness = Harness::new(0, 3);
    let path = harness.workbook(
        "suite.yaml",
        &[
            ("Ambiguous", &[&["pick", "5"]]),
            ("Short", &[&["click", "Submit", "MainPane"]]),
            ("Fine", &[&["pick", "apples"]]),
        ],
    );
    let (runner, memory) = harness.runner();

    let summary = runner.validate(&[SheetSelector::all(&path)], true);

    assert!(!summary.is_clean());
    assert_eq!(summary.issues().count(), 2);
    assert!(summary.sheets[2].is_valid());
    assert!(harness.click.calls().is_empty());
    assert!(memory.snapshot().rows.is_empty());

    let written = Workbook::load(&path).unwrap();
    assert_eq!(written.mark("Ambiguous", 1).unwrap().status, "INVALID");
    assert!(written.mark("Short", 1).unwrap().note.is_some());
    assert!(written.mark("Fine", 1).is_none());
}
