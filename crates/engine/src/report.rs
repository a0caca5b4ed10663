//! Report sinks
//!
//! The runner hands every row record, sheet record and retry event to each
//! configured sink, then flushes them once at the end of the run, including
//! runs that were cancelled.

use crate::workbook::Mark;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sheetrun_common::config::ReportConfig;
use sheetrun_common::{Database, Result, RowRecord, RunSummary, SheetId, SheetRecord};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A retry about to start. The markup is transient: the sheet only keeps the
/// final pass or fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryNotice {
    pub sheet: SheetId,
    pub row: usize,
    pub action: String,
    /// Attempt about to run, starting at 2
    pub attempt: u32,
    pub max_attempts: u32,
    /// Failure of the previous attempt
    pub cause: String,
    pub mark: Mark,
}

pub trait ReportSink: Send {
    fn name(&self) -> &str;

    fn begin_run(&mut self, summary: &RunSummary) -> Result<()> {
        let _ = summary;
        Ok(())
    }

    fn record_retry(&mut self, notice: &RetryNotice) -> Result<()> {
        let _ = notice;
        Ok(())
    }

    fn record_row(&mut self, record: &RowRecord) -> Result<()>;

    fn record_sheet(&mut self, record: &SheetRecord) -> Result<()>;

    fn flush(&mut self, summary: &RunSummary) -> Result<()>;
}

/// Fan-out over every sink.
///
/// Recording failures are logged and do not stop the run; the first flush
/// failure is returned after all sinks had their chance to flush.
#[derive(Default)]
pub struct Reporter {
    sinks: Vec<Box<dyn ReportSink>>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sink: Box<dyn ReportSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    fn each(&mut self, what: &str, mut f: impl FnMut(&mut dyn ReportSink) -> Result<()>) {
        for sink in &mut self.sinks {
            if let Err(e) = f(sink.as_mut()) {
                warn!("Report sink {} failed to record {}: {}", sink.name(), what, e);
            }
        }
    }

    pub fn begin_run(&mut self, summary: &RunSummary) {
        self.each("run start", |sink| sink.begin_run(summary));
    }

    pub fn record_retry(&mut self, notice: &RetryNotice) {
        self.each("retry", |sink| sink.record_retry(notice));
    }

    pub fn record_row(&mut self, record: &RowRecord) {
        self.each("row", |sink| sink.record_row(record));
    }

    pub fn record_sheet(&mut self, record: &SheetRecord) {
        self.each("sheet", |sink| sink.record_sheet(record));
    }

    pub fn flush(&mut self, summary: &RunSummary) -> Result<()> {
        let mut first_error = None;
        for sink in &mut self.sinks {
            if let Err(e) = sink.flush(summary) {
                warn!("Report sink {} failed to flush: {}", sink.name(), e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Content of the JSON report file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonReportDocument {
    pub title: String,
    pub name: String,
    #[serde(default)]
    pub build_no: Option<String>,
    #[serde(default)]
    pub hotfix_id: Option<String>,
    #[serde(default)]
    pub patch_info: Option<String>,
    #[serde(default)]
    pub build_by: Option<String>,
    pub generated_at: DateTime<Utc>,
    pub summary: RunSummary,
    pub rows: Vec<RowRecord>,
    pub retries: Vec<RetryNotice>,
}

/// Writes one JSON document per run.
///
/// The configured path always holds the latest run. With `archive` set, each
/// run is also kept as `<stem>-<started>-<run id prefix>.json` beside it.
pub struct JsonReport {
    path: PathBuf,
    meta: ReportConfig,
    rows: Vec<RowRecord>,
    retries: Vec<RetryNotice>,
}

impl JsonReport {
    pub fn new(path: impl Into<PathBuf>, meta: &ReportConfig) -> Self {
        Self {
            path: path.into(),
            meta: meta.clone(),
            rows: Vec::new(),
            retries: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Per-run copy of the report for this summary
    pub fn archive_path(&self, summary: &RunSummary) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "report".to_string());
        let run: String = summary.run_id.chars().take(8).collect();
        self.path.with_file_name(format!(
            "{}-{}-{}.json",
            stem,
            summary.started_at.format("%Y%m%d_%H%M%S"),
            run
        ))
    }

    pub fn read(path: &Path) -> Result<JsonReportDocument> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl ReportSink for JsonReport {
    fn name(&self) -> &str {
        "json"
    }

    fn begin_run(&mut self, _summary: &RunSummary) -> Result<()> {
        self.rows.clear();
        self.retries.clear();
        Ok(())
    }

    fn record_retry(&mut self, notice: &RetryNotice) -> Result<()> {
        self.retries.push(notice.clone());
        Ok(())
    }

    fn record_row(&mut self, record: &RowRecord) -> Result<()> {
        self.rows.push(record.clone());
        Ok(())
    }

    fn record_sheet(&mut self, _record: &SheetRecord) -> Result<()> {
        Ok(())
    }

    fn flush(&mut self, summary: &RunSummary) -> Result<()> {
        let document = JsonReportDocument {
            title: self.meta.title.clone(),
            name: self.meta.name.clone(),
            build_no: self.meta.build_no.clone(),
            hotfix_id: self.meta.hotfix_id.clone(),
            patch_info: self.meta.patch_info.clone(),
            build_by: self.meta.build_by.clone(),
            generated_at: Utc::now(),
            summary: summary.clone(),
            rows: self.rows.clone(),
            retries: self.retries.clone(),
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(&document)?;
        std::fs::write(&self.path, &content)?;
        info!("Report written to {}", self.path.display());

        if self.meta.archive {
            let archive = self.archive_path(summary);
            std::fs::write(&archive, &content)?;
            debug!("Report archived as {}", archive.display());
        }
        Ok(())
    }
}

/// Stores the run in the history database
pub struct HistorySink {
    db: Database,
    run_id: Option<String>,
}

impl HistorySink {
    pub fn new(db: Database) -> Self {
        Self { db, run_id: None }
    }

    fn run_id(&self) -> Result<&str> {
        self.run_id.as_deref().ok_or_else(|| {
            sheetrun_common::Error::Internal("history sink used before the run began".to_string())
        })
    }
}

impl ReportSink for HistorySink {
    fn name(&self) -> &str {
        "history"
    }

    fn begin_run(&mut self, summary: &RunSummary) -> Result<()> {
        self.db.begin_run(summary)?;
        self.run_id = Some(summary.run_id.clone());
        Ok(())
    }

    fn record_row(&mut self, record: &RowRecord) -> Result<()> {
        self.db.record_row(self.run_id()?, record)
    }

    fn record_sheet(&mut self, record: &SheetRecord) -> Result<()> {
        self.db.record_sheet(self.run_id()?, record)
    }

    fn flush(&mut self, summary: &RunSummary) -> Result<()> {
        self.db.finish_run(summary)
    }
}

/// Everything a [`MemorySink`] received
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    pub rows: Vec<RowRecord>,
    pub sheets: Vec<SheetRecord>,
    pub retries: Vec<RetryNotice>,
    pub flushed: Option<RunSummary>,
}

/// Keeps records in memory; the log stays readable through a shared handle
#[derive(Clone, Default)]
pub struct MemorySink {
    log: Arc<Mutex<MemoryLog>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MemoryLog {
        self.log.lock().clone()
    }
}

impl ReportSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    fn record_retry(&mut self, notice: &RetryNotice) -> Result<()> {
        self.log.lock().retries.push(notice.clone());
        Ok(())
    }

    fn record_row(&mut self, record: &RowRecord) -> Result<()> {
        self.log.lock().rows.push(record.clone());
        Ok(())
    }

    fn record_sheet(&mut self, record: &SheetRecord) -> Result<()> {
        self.log.lock().sheets.push(record.clone());
        Ok(())
    }

    fn flush(&mut self, summary: &RunSummary) -> Result<()> {
        self.log.lock().flushed = Some(summary.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetrun_common::{ExecutionOutcome, SheetRow, SheetStatus};

    fn records() -> (RowRecord, SheetRecord) {
        let sheet = SheetId::new("suite.yaml", "Login");
        let row = SheetRow::from_raw(sheet.clone(), 1, &["click", "NAME", "Main", "Ok"]);
        let record = RowRecord::executed(&row, ExecutionOutcome::Pass, 5);
        let mut sheet_record = SheetRecord::new(sheet, 1);
        sheet_record.count(&record);
        (record, sheet_record)
    }

    #[test]
    fn test_json_report_is_written_on_flush() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("report.json");
        let mut meta = ReportConfig::default();
        meta.build_no = Some("1.4.2".to_string());

        let mut report = JsonReport::new(&path, &meta);
        let (row, sheet) = records();
        report.record_row(&row).unwrap();
        report.record_sheet(&sheet).unwrap();
        assert!(!path.exists());

        let mut summary = RunSummary::start();
        summary.sheets.push(sheet);
        summary.finish();
        report.flush(&summary).unwrap();

        let document = JsonReport::read(&path).unwrap();
        assert_eq!(document.build_no.as_deref(), Some("1.4.2"));
        assert_eq!(document.rows.len(), 1);
        assert_eq!(document.summary.sheets[0].status, SheetStatus::Passed);
    }

    #[test]
    fn test_each_run_keeps_an_archived_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let mut report = JsonReport::new(&path, &ReportConfig::default());
        let (row, sheet) = records();

        let mut run_ids = Vec::new();
        for _ in 0..2 {
            let mut summary = RunSummary::start();
            report.begin_run(&summary).unwrap();
            report.record_row(&row).unwrap();
            summary.sheets.push(sheet.clone());
            summary.finish();
            report.flush(&summary).unwrap();

            let archived = JsonReport::read(&report.archive_path(&summary)).unwrap();
            assert_eq!(archived.summary.run_id, summary.run_id);
            assert_eq!(archived.rows.len(), 1);
            run_ids.push(summary.run_id);
        }

        let files = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(files, 3);
        let latest = JsonReport::read(&path).unwrap();
        assert_eq!(latest.summary.run_id, run_ids[1]);
        assert_eq!(latest.rows.len(), 1);
    }

    #[test]
    fn test_archive_can_be_turned_off() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest.json");
        let meta = ReportConfig {
            archive: false,
            ..ReportConfig::default()
        };
        let mut report = JsonReport::new(&path, &meta);
        let summary = RunSummary::start();
        assert!(report
            .archive_path(&summary)
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("latest-"));

        report.flush(&summary).unwrap();
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        assert!(path.exists());
    }

    #[test]
    fn test_history_sink_needs_begin_run() {
        let db = Database::open_memory().unwrap();
        let mut sink = HistorySink::new(db.clone());
        let (row, sheet) = records();
        assert!(sink.record_row(&row).is_err());

        let summary = RunSummary::start();
        sink.begin_run(&summary).unwrap();
        sink.record_row(&row).unwrap();
        sink.record_sheet(&sheet).unwrap();
        sink.flush(&summary).unwrap();
        assert_eq!(db.list_runs(1).unwrap()[0].rows_passed, 1);
    }

    struct Broken;

    impl ReportSink for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn record_row(&mut self, _record: &RowRecord) -> Result<()> {
            Err(sheetrun_common::Error::Internal("disk full".to_string()))
        }

        fn record_sheet(&mut self, _record: &SheetRecord) -> Result<()> {
            Ok(())
        }

        fn flush(&mut self, _summary: &RunSummary) -> Result<()> {
            Err(sheetrun_common::Error::Internal("disk full".to_string()))
        }
    }

    #[test]
    fn test_reporter_isolates_failing_sinks() {
        let memory = MemorySink::new();
        let mut reporter = Reporter::new();
        reporter.add(Box::new(Broken));
        reporter.add(Box::new(memory.clone()));

        let (row, _) = records();
        reporter.record_row(&row);
        let summary = RunSummary::start();
        assert!(reporter.flush(&summary).is_err());

        let log = memory.snapshot();
        assert_eq!(log.rows.len(), 1);
        assert!(log.flushed.is_some());
    }
}
