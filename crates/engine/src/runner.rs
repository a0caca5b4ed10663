//! Sheet runner
//!
//! Drives each selected sheet through `Loaded -> Validated -> Executing ->
//! Completed`. A sheet with any invalid row goes straight from `Validated` to
//! `Completed` without running a single row. Sheets run one after another and
//! a problem in one never prevents the next from running.

use crate::catalog::{ActionCatalog, Directive};
use crate::container::ExecutionContainer;
use crate::context::ActionContext;
use crate::driver::Driver;
use crate::error::ValidationIssue;
use crate::markup::Markup;
use crate::report::{Reporter, ReportSink, RetryNotice};
use crate::validate::{validate_sheet, AssetIndex, PlannedRow, SheetValidation};
use crate::workbook::{SheetSelector, Workbook};
use chrono::Utc;
use sheetrun_common::{
    Error, ExecutionOutcome, FailureCause, ProjectConfig, Result, RowRecord, RowStatus, RunSummary,
    SheetId, SheetRecord, SheetRow, SheetStatus,
};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Lifecycle of one sheet within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetPhase {
    Loaded,
    Validated,
    Executing,
    Completed,
}

impl SheetPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SheetPhase::Loaded => "loaded",
            SheetPhase::Validated => "validated",
            SheetPhase::Executing => "executing",
            SheetPhase::Completed => "completed",
        }
    }

    pub fn can_advance_to(self, next: SheetPhase) -> bool {
        matches!(
            (self, next),
            (SheetPhase::Loaded, SheetPhase::Validated)
                | (SheetPhase::Validated, SheetPhase::Executing)
                | (SheetPhase::Validated, SheetPhase::Completed)
                | (SheetPhase::Executing, SheetPhase::Completed)
        )
    }
}

impl fmt::Display for SheetPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase tracker that refuses illegal transitions
#[derive(Debug)]
pub struct SheetLifecycle {
    sheet: SheetId,
    phase: SheetPhase,
}

impl SheetLifecycle {
    pub fn new(sheet: SheetId) -> Self {
        Self {
            sheet,
            phase: SheetPhase::Loaded,
        }
    }

    pub fn phase(&self) -> SheetPhase {
        self.phase
    }

    pub fn advance(&mut self, next: SheetPhase) -> Result<()> {
        if !self.phase.can_advance_to(next) {
            return Err(Error::InvalidStateTransition {
                sheet: self.sheet.to_string(),
                from: self.phase.to_string(),
                to: next.to_string(),
            });
        }
        debug!("Sheet {}: {} -> {}", self.sheet, self.phase, next);
        self.phase = next;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Directive,
    Cancelled,
}

impl StopReason {
    fn describe(&self) -> &'static str {
        match self {
            StopReason::Directive => "sheet stopped by exceptionRecoveryStop",
            StopReason::Cancelled => "run cancelled",
        }
    }
}

/// Outcome of validating workbooks without running them
#[derive(Debug, Clone, Default)]
pub struct ValidationSummary {
    pub sheets: Vec<SheetValidation>,
    /// Workbooks or sheets that could not be checked at all
    pub failures: Vec<(String, String)>,
}

impl ValidationSummary {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.sheets.iter().all(SheetValidation::is_valid)
    }

    pub fn issues(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.sheets.iter().flat_map(|sheet| sheet.issues.iter())
    }
}

pub struct Runner {
    catalog: Arc<ActionCatalog>,
    config: Arc<ProjectConfig>,
    context: ActionContext,
    markup: Markup,
    reporter: Reporter,
    container: ExecutionContainer,
    cancel: CancellationToken,
}

impl Runner {
    pub fn new(catalog: Arc<ActionCatalog>, config: Arc<ProjectConfig>, driver: Arc<dyn Driver>) -> Self {
        Self {
            context: ActionContext::new(driver, config.clone()),
            markup: Markup::new(&config.markup),
            catalog,
            config,
            reporter: Reporter::new(),
            container: ExecutionContainer::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_sink(mut self, sink: Box<dyn ReportSink>) -> Self {
        self.reporter.add(sink);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Token that stops the run at the next row boundary when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn catalog(&self) -> &ActionCatalog {
        &self.catalog
    }

    /// Validate the selected sheets, marking invalid rows when `write_markup`
    /// is set. Nothing is executed.
    pub fn validate(&self, selectors: &[SheetSelector], write_markup: bool) -> ValidationSummary {
        let assets = AssetIndex::scan(&self.config.image_dir());
        let mut summary = ValidationSummary::default();

        for selector in selectors {
            let mut workbook = match Workbook::load(&selector.workbook) {
                Ok(workbook) => workbook,
                Err(e) => {
                    error!("Cannot load {}: {}", selector.workbook.display(), e);
                    summary
                        .failures
                        .push((selector.workbook.display().to_string(), e.to_string()));
                    continue;
                }
            };

            let (names, missing) = selector.pick(&workbook);
            for name in missing {
                let id = workbook.sheet_id(&name);
                error!("Sheet {} not found", id);
                summary.failures.push((id.to_string(), "sheet not found".to_string()));
            }

            for name in names {
                let validation = self.validate_loaded(&workbook, &name, &assets);
                if write_markup {
                    self.mark_issues(&mut workbook, &name, &validation);
                }
                summary.sheets.push(validation);
            }

            if write_markup {
                self.save_workbook(&workbook);
            }
        }

        info!(
            "Validated {} sheet(s): {} issue(s)",
            summary.sheets.len(),
            summary.issues().count()
        );
        summary
    }

    fn validate_loaded(&self, workbook: &Workbook, name: &str, assets: &AssetIndex) -> SheetValidation {
        let id = workbook.sheet_id(name);
        let rows = workbook.rows(name).unwrap_or_default();
        let mut validation = validate_sheet(&self.catalog, &id, &rows);
        validation.check_assets(assets);
        validation
    }

    /// Clear old markup and mark each invalid row with its reasons
    fn mark_issues(&self, workbook: &mut Workbook, name: &str, validation: &SheetValidation) -> Vec<(usize, String)> {
        workbook.clear_marks(name);

        let mut by_row: BTreeMap<usize, Vec<&ValidationIssue>> = BTreeMap::new();
        for issue in &validation.issues {
            by_row.entry(issue.row).or_default().push(issue);
        }

        by_row
            .into_iter()
            .map(|(row, issues)| {
                let note = issues.iter().map(|i| i.note()).collect::<Vec<_>>().join("; ");
                let mut mark = self.markup.for_issue(issues[0]);
                mark.note = Some(note.clone());
                workbook.set_mark(name, row, Some(mark));
                (row, note)
            })
            .collect()
    }

    fn save_workbook(&self, workbook: &Workbook) {
        if let Err(e) = workbook.save() {
            error!("Failed to write back {}: {}", workbook.path().display(), e);
        }
    }

    /// Run the selected sheets in order
    pub async fn run(&mut self, selectors: &[SheetSelector]) -> Result<RunSummary> {
        let mut summary = RunSummary::start();
        info!(run_id = %summary.run_id, "Starting run over {} workbook(s)", selectors.len());
        self.reporter.begin_run(&summary);

        let assets = AssetIndex::scan(&self.config.image_dir());

        'workbooks: for selector in selectors {
            if self.cancel.is_cancelled() {
                break;
            }

            let mut workbook = match Workbook::load(&selector.workbook) {
                Ok(workbook) => workbook,
                Err(e) => {
                    error!("Cannot load {}: {}", selector.workbook.display(), e);
                    let id = SheetId::new(selector.workbook.display().to_string(), "*");
                    self.record_unrunnable(&mut summary, id, e.to_string());
                    continue;
                }
            };

            let (names, missing) = selector.pick(&workbook);
            for name in missing {
                let id = workbook.sheet_id(&name);
                error!("Sheet {} not found", id);
                self.record_unrunnable(&mut summary, id, "sheet not found".to_string());
            }

            for name in names {
                if self.cancel.is_cancelled() {
                    break 'workbooks;
                }
                let record = self.run_sheet(&mut workbook, &name, &assets).await?;
                summary.sheets.push(record);
            }
        }

        summary.cancelled = self.cancel.is_cancelled();
        summary.finish();
        if summary.cancelled {
            warn!("Run {} was cancelled; flushing recorded results", summary.run_id);
        }
        self.reporter.flush(&summary)?;

        info!(
            run_id = %summary.run_id,
            sheets = summary.sheets.len(),
            passed = summary.rows_passed(),
            failed = summary.rows_failed(),
            "Run finished"
        );
        Ok(summary)
    }

    fn record_unrunnable(&mut self, summary: &mut RunSummary, sheet: SheetId, reason: String) {
        let mut record = SheetRecord::new(sheet, 0);
        record.status = SheetStatus::Invalid;
        record.issues.push(reason);
        self.reporter.record_sheet(&record);
        summary.sheets.push(record);
    }

    async fn run_sheet(&mut self, workbook: &mut Workbook, name: &str, assets: &AssetIndex) -> Result<SheetRecord> {
        let started = Instant::now();
        let id = workbook.sheet_id(name);
        let mut lifecycle = SheetLifecycle::new(id.clone());

        let validation = self.validate_loaded(workbook, name, assets);
        lifecycle.advance(SheetPhase::Validated)?;

        let mut record = SheetRecord::new(id.clone(), validation.total_rows());
        record.workbook_digest = Some(workbook.digest().to_string());

        if !validation.is_valid() {
            warn!(
                "Skipping sheet {}: {} validation issue(s)",
                id,
                validation.issues.len()
            );
            let rows = workbook.rows(name).unwrap_or_default();
            for (index, note) in self.mark_issues(workbook, name, &validation) {
                if let Some(row) = rows.iter().find(|row| row.index == index) {
                    let row_record = RowRecord::not_run(row, RowStatus::Invalid, note);
                    self.reporter.record_row(&row_record);
                }
            }
            record.issues = validation.issues.iter().map(ToString::to_string).collect();
            record.status = SheetStatus::Invalid;
            lifecycle.advance(SheetPhase::Completed)?;
            return Ok(self.complete_sheet(workbook, record, started));
        }

        lifecycle.advance(SheetPhase::Executing)?;
        workbook.clear_marks(name);
        info!("Executing sheet {} ({} rows)", id, validation.planned.len());

        let mut test_case: Option<String> = None;
        let mut halted: Option<StopReason> = None;

        for (position, planned) in validation.planned.iter().enumerate() {
            if halted.is_none() && position > 0 {
                self.pause().await;
            }
            if halted.is_none() && self.cancel.is_cancelled() {
                warn!("Cancellation requested; stopping sheet {} at row {}", id, planned.row.index);
                halted = Some(StopReason::Cancelled);
            }

            let directive = planned.invocation.signature().directive_kind();
            if directive == Some(Directive::StartTestCase) && halted.is_none() {
                test_case = planned.invocation.args().text(0).ok().map(str::to_string);
            }

            let row_record = match halted {
                Some(reason) => RowRecord::not_run(&planned.row, RowStatus::Skipped, reason.describe())
                    .with_test_case(test_case.clone()),
                None => self.execute_row(planned, test_case.clone()).await,
            };

            if directive == Some(Directive::StopSheet) && halted.is_none() {
                info!("Sheet {} stopped at row {}", id, planned.row.index);
                halted = Some(StopReason::Directive);
            }

            workbook.set_mark(name, planned.row.index, Some(self.markup.for_record(&row_record)));
            record.count(&row_record);
            self.reporter.record_row(&row_record);
        }

        record.status = if halted.is_some() {
            SheetStatus::Stopped
        } else if record.failed > 0 {
            SheetStatus::Failed
        } else {
            SheetStatus::Passed
        };
        lifecycle.advance(SheetPhase::Completed)?;
        Ok(self.complete_sheet(workbook, record, started))
    }

    fn complete_sheet(&mut self, workbook: &Workbook, mut record: SheetRecord, started: Instant) -> SheetRecord {
        self.save_workbook(workbook);
        record.duration_ms = started.elapsed().as_millis() as u64;
        self.reporter.record_sheet(&record);
        info!(
            sheet = %record.sheet,
            status = %record.status,
            passed = record.passed,
            failed = record.failed,
            skipped = record.skipped,
            "Sheet completed"
        );
        record
    }

    /// Step delay between rows; cut short by cancellation
    async fn pause(&self) {
        let delay = self.config.timing.step_delay();
        if delay.is_zero() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = self.cancel.cancelled() => {}
        }
    }

    async fn execute_row(&mut self, planned: &PlannedRow, test_case: Option<String>) -> RowRecord {
        let started = Instant::now();
        let signature = planned.invocation.signature().clone();
        let row = &planned.row;

        self.container.reset();
        self.container.bind_invocation(planned.invocation.clone());

        let max_attempts = if signature.is_retryable() {
            self.config.retry.max_attempts.max(1)
        } else {
            1
        };
        let retry_wait = self
            .context
            .find_wait()
            .min(Duration::from_secs(self.config.retry.find_wait_cap_secs));
        let retry_context = self.context.with_find_wait(retry_wait);

        debug!(sheet = %row.sheet, row = row.index, "Running {}", signature);
        let mut attempt = 1;
        let mut outcome = self.container.invoke(&self.context).await;

        while !outcome.is_pass() && attempt < max_attempts {
            let cause = outcome.cause().map(|c| c.message.clone()).unwrap_or_default();
            attempt += 1;
            warn!(
                sheet = %row.sheet,
                row = row.index,
                action = signature.name(),
                "Retrying (attempt {}/{}): {}",
                attempt,
                max_attempts,
                cause
            );
            self.reporter.record_retry(&RetryNotice {
                sheet: row.sheet.clone(),
                row: row.index,
                action: signature.name().to_string(),
                attempt,
                max_attempts,
                cause,
                mark: self.markup.retrying(attempt),
            });
            outcome = self.container.invoke(&retry_context).await;
        }

        let outcome = match outcome {
            ExecutionOutcome::Pass if attempt > 1 => ExecutionOutcome::Retried {
                attempts: attempt,
                outcome: Box::new(ExecutionOutcome::Pass),
            },
            ExecutionOutcome::Fail(cause) if attempt > 1 => {
                ExecutionOutcome::Fail(FailureCause::retry_exhausted(attempt, cause.message))
            }
            other => other,
        };

        let mut record = RowRecord::executed(row, outcome, started.elapsed().as_millis() as u64)
            .with_test_case(test_case);

        if record.status == RowStatus::Failed {
            warn!(
                sheet = %row.sheet,
                row = row.index,
                action = signature.name(),
                "Row failed: {}",
                record.cause.as_deref().unwrap_or_default()
            );
            record.screenshot = self.capture_failure(row).await;
        }
        record
    }

    /// Best-effort screenshot of a failed row
    async fn capture_failure(&self, row: &SheetRow) -> Option<String> {
        let dir = self.config.screenshot_dir();
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            warn!("Cannot create screenshot folder {}: {}", dir.display(), e);
            return None;
        }

        let file = format!(
            "{}_row{}_{}.png",
            file_safe(&row.sheet.sheet),
            row.index,
            Utc::now().format("%Y%m%d_%H%M%S")
        );
        let path = dir.join(file);
        match self.context.driver().screenshot(&path).await {
            Ok(()) => Some(path.display().to_string()),
            Err(e) => {
                debug!("No failure screenshot for {} row {}: {}", row.sheet, row.index, e);
                None
            }
        }
    }
}

fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}
