//! Core types for SheetRun

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of a sheet inside a workbook
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SheetId {
    pub workbook: String,
    pub sheet: String,
}

impl SheetId {
    pub fn new(workbook: impl Into<String>, sheet: impl Into<String>) -> Self {
        Self {
            workbook: workbook.into(),
            sheet: sheet.into(),
        }
    }
}

impl fmt::Display for SheetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.workbook, self.sheet)
    }
}

/// One authored step: the action name in the first cell, its arguments after it.
///
/// `index` is the row position inside the sheet; the header is row 0, so the
/// first executable row is 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetRow {
    pub sheet: SheetId,
    pub index: usize,
    pub cells: Vec<String>,
}

impl SheetRow {
    pub fn new(sheet: SheetId, index: usize, cells: Vec<String>) -> Self {
        Self { sheet, index, cells }
    }

    /// Build a row from raw spreadsheet cells. Cells are trimmed and blank
    /// cells are dropped, so authors can leave gaps between arguments.
    pub fn from_raw<S: AsRef<str>>(sheet: SheetId, index: usize, raw: &[S]) -> Self {
        let cells = raw
            .iter()
            .map(|cell| cell.as_ref().trim())
            .filter(|cell| !cell.is_empty())
            .map(str::to_string)
            .collect();
        Self::new(sheet, index, cells)
    }

    pub fn action_name(&self) -> Option<&str> {
        self.cells.first().map(String::as_str)
    }

    pub fn arguments(&self) -> &[String] {
        self.cells.get(1..).unwrap_or(&[])
    }

    pub fn is_blank(&self) -> bool {
        self.cells.is_empty()
    }
}

/// How an element is located by the UI backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LocatorType {
    Name,
    Id,
    Text,
    Value,
    PartialName,
    PartialId,
    PartialText,
    PartialValue,
    Image,
    Location,
    Ocr,
}

impl LocatorType {
    pub const ALL: [LocatorType; 11] = [
        LocatorType::Name,
        LocatorType::Id,
        LocatorType::Text,
        LocatorType::Value,
        LocatorType::PartialName,
        LocatorType::PartialId,
        LocatorType::PartialText,
        LocatorType::PartialValue,
        LocatorType::Image,
        LocatorType::Location,
        LocatorType::Ocr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LocatorType::Name => "NAME",
            LocatorType::Id => "ID",
            LocatorType::Text => "TEXT",
            LocatorType::Value => "VALUE",
            LocatorType::PartialName => "PARTIALNAME",
            LocatorType::PartialId => "PARTIALID",
            LocatorType::PartialText => "PARTIALTEXT",
            LocatorType::PartialValue => "PARTIALVALUE",
            LocatorType::Image => "IMAGE",
            LocatorType::Location => "LOCATION",
            LocatorType::Ocr => "OCR",
        }
    }
}

impl fmt::Display for LocatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocatorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        LocatorType::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == upper)
            .ok_or_else(|| format!("unknown locator type '{}'", s))
    }
}

/// Why a row ended in failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The action method reported an error
    Invocation,
    /// Every permitted attempt of a retryable action failed
    RetryExhausted { attempts: u32 },
    /// The container held no invocation
    Unbound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureCause {
    pub kind: FailureKind,
    pub message: String,
}

impl FailureCause {
    pub fn invocation(message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::Invocation,
            message: message.into(),
        }
    }

    pub fn retry_exhausted(attempts: u32, message: impl Into<String>) -> Self {
        Self {
            kind: FailureKind::RetryExhausted { attempts },
            message: message.into(),
        }
    }

    pub fn unbound() -> Self {
        Self {
            kind: FailureKind::Unbound,
            message: "no invocation bound".to_string(),
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FailureKind::RetryExhausted { attempts } => {
                write!(f, "{} (gave up after {} attempts)", self.message, attempts)
            }
            _ => f.write_str(&self.message),
        }
    }
}

/// Per-row verdict after invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Pass,
    Fail(FailureCause),
    Retried {
        attempts: u32,
        outcome: Box<ExecutionOutcome>,
    },
}

impl ExecutionOutcome {
    pub fn fail(message: impl Into<String>) -> Self {
        ExecutionOutcome::Fail(FailureCause::invocation(message))
    }

    pub fn is_pass(&self) -> bool {
        match self {
            ExecutionOutcome::Pass => true,
            ExecutionOutcome::Fail(_) => false,
            ExecutionOutcome::Retried { outcome, .. } => outcome.is_pass(),
        }
    }

    /// Number of times the action was invoked to reach this outcome
    pub fn attempts(&self) -> u32 {
        match self {
            ExecutionOutcome::Pass => 1,
            ExecutionOutcome::Fail(cause) => match cause.kind {
                FailureKind::RetryExhausted { attempts } => attempts,
                _ => 1,
            },
            ExecutionOutcome::Retried { attempts, .. } => *attempts,
        }
    }

    pub fn cause(&self) -> Option<&FailureCause> {
        match self {
            ExecutionOutcome::Pass => None,
            ExecutionOutcome::Fail(cause) => Some(cause),
            ExecutionOutcome::Retried { outcome, .. } => outcome.cause(),
        }
    }

    pub fn was_retried(&self) -> bool {
        self.attempts() > 1
    }
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionOutcome::Pass => write!(f, "pass"),
            ExecutionOutcome::Fail(cause) => write!(f, "fail: {}", cause),
            ExecutionOutcome::Retried { attempts, outcome } => {
                write!(f, "retried({}, {})", attempts, outcome)
            }
        }
    }
}

/// Final state of a row in a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowStatus {
    Passed,
    Failed,
    /// Not executed because the sheet was stopped before reaching it
    Skipped,
    /// Rejected during validation
    Invalid,
}

impl RowStatus {
    pub fn from_outcome(outcome: &ExecutionOutcome) -> Self {
        if outcome.is_pass() {
            RowStatus::Passed
        } else {
            RowStatus::Failed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RowStatus::Passed => "passed",
            RowStatus::Failed => "failed",
            RowStatus::Skipped => "skipped",
            RowStatus::Invalid => "invalid",
        }
    }
}

impl fmt::Display for RowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RowStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "passed" => Ok(RowStatus::Passed),
            "failed" => Ok(RowStatus::Failed),
            "skipped" => Ok(RowStatus::Skipped),
            "invalid" => Ok(RowStatus::Invalid),
            other => Err(format!("unknown row status '{}'", other)),
        }
    }
}

/// Report record for one row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowRecord {
    pub sheet: SheetId,
    pub row: usize,
    #[serde(default)]
    pub test_case: Option<String>,
    pub action: String,
    pub arguments: Vec<String>,
    pub status: RowStatus,
    #[serde(default)]
    pub outcome: Option<ExecutionOutcome>,
    pub attempts: u32,
    #[serde(default)]
    pub cause: Option<String>,
    pub duration_ms: u64,
    #[serde(default)]
    pub screenshot: Option<String>,
}

impl RowRecord {
    /// Record for a row that ran
    pub fn executed(row: &SheetRow, outcome: ExecutionOutcome, duration_ms: u64) -> Self {
        Self {
            sheet: row.sheet.clone(),
            row: row.index,
            test_case: None,
            action: row.action_name().unwrap_or_default().to_string(),
            arguments: row.arguments().to_vec(),
            status: RowStatus::from_outcome(&outcome),
            attempts: outcome.attempts(),
            cause: outcome.cause().map(|c| c.to_string()),
            outcome: Some(outcome),
            duration_ms,
            screenshot: None,
        }
    }

    /// Record for a row that never ran
    pub fn not_run(row: &SheetRow, status: RowStatus, reason: impl Into<String>) -> Self {
        Self {
            sheet: row.sheet.clone(),
            row: row.index,
            test_case: None,
            action: row.action_name().unwrap_or_default().to_string(),
            arguments: row.arguments().to_vec(),
            status,
            outcome: None,
            attempts: 0,
            cause: Some(reason.into()),
            duration_ms: 0,
            screenshot: None,
        }
    }

    pub fn with_test_case(mut self, test_case: Option<String>) -> Self {
        self.test_case = test_case;
        self
    }
}

/// Final state of a sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetStatus {
    /// Every executed row passed
    Passed,
    /// At least one row failed
    Failed,
    /// Validation rejected the sheet; nothing ran
    Invalid,
    /// Execution was cut short by a stop directive or cancellation
    Stopped,
}

impl SheetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SheetStatus::Passed => "passed",
            SheetStatus::Failed => "failed",
            SheetStatus::Invalid => "invalid",
            SheetStatus::Stopped => "stopped",
        }
    }
}

impl fmt::Display for SheetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SheetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "passed" => Ok(SheetStatus::Passed),
            "failed" => Ok(SheetStatus::Failed),
            "invalid" => Ok(SheetStatus::Invalid),
            "stopped" => Ok(SheetStatus::Stopped),
            other => Err(format!("unknown sheet status '{}'", other)),
        }
    }
}

/// Report record for one sheet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetRecord {
    pub sheet: SheetId,
    pub status: SheetStatus,
    pub total_rows: usize,
    pub passed: usize,
    pub failed: usize,
    pub retried: usize,
    pub skipped: usize,
    /// Validation problems, one line each
    #[serde(default)]
    pub issues: Vec<String>,
    pub duration_ms: u64,
    #[serde(default)]
    pub workbook_digest: Option<String>,
}

impl SheetRecord {
    pub fn new(sheet: SheetId, total_rows: usize) -> Self {
        Self {
            sheet,
            status: SheetStatus::Passed,
            total_rows,
            passed: 0,
            failed: 0,
            retried: 0,
            skipped: 0,
            issues: Vec::new(),
            duration_ms: 0,
            workbook_digest: None,
        }
    }

    /// Fold one row record into the counters
    pub fn count(&mut self, record: &RowRecord) {
        match record.status {
            RowStatus::Passed => self.passed += 1,
            RowStatus::Failed => self.failed += 1,
            RowStatus::Skipped => self.skipped += 1,
            RowStatus::Invalid => {}
        }
        if record.attempts > 1 {
            self.retried += 1;
        }
    }
}

/// Aggregated outcome of one invocation of the runner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
    pub sheets: Vec<SheetRecord>,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn start() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            finished_at: None,
            sheets: Vec::new(),
            cancelled: false,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn has_validation_failures(&self) -> bool {
        self.sheets
            .iter()
            .any(|sheet| sheet.status == SheetStatus::Invalid)
    }

    pub fn rows_failed(&self) -> usize {
        self.sheets.iter().map(|sheet| sheet.failed).sum()
    }

    pub fn rows_passed(&self) -> usize {
        self.sheets.iter().map(|sheet| sheet.passed).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet() -> SheetId {
        SheetId::new("suite.yaml", "Login")
    }

    #[test]
    fn test_row_from_raw_drops_blank_cells() {
        let row = SheetRow::from_raw(sheet(), 3, &[" click ", "", "NAME", "  ", "Submit"]);
        assert_eq!(row.action_name(), Some("click"));
        assert_eq!(row.arguments(), &["NAME".to_string(), "Submit".to_string()]);
        assert!(!row.is_blank());

        let blank = SheetRow::from_raw(sheet(), 4, &["", "   "]);
        assert!(blank.is_blank());
        assert!(blank.arguments().is_empty());
    }

    #[test]
    fn test_locator_type_parse_is_case_insensitive() {
        assert_eq!("image".parse::<LocatorType>().unwrap(), LocatorType::Image);
        assert_eq!("PartialName".parse::<LocatorType>().unwrap(), LocatorType::PartialName);
        assert!("xpath".parse::<LocatorType>().is_err());
    }

    #[test]
    fn test_outcome_attempts_and_verdict() {
        let retried = ExecutionOutcome::Retried {
            attempts: 3,
            outcome: Box::new(ExecutionOutcome::Pass),
        };
        assert!(retried.is_pass());
        assert_eq!(retried.attempts(), 3);

        let exhausted = ExecutionOutcome::Fail(FailureCause::retry_exhausted(2, "not found"));
        assert!(!exhausted.is_pass());
        assert_eq!(exhausted.attempts(), 2);
        assert_eq!(RowStatus::from_outcome(&exhausted), RowStatus::Failed);
    }

    #[test]
    fn test_outcome_serializes_with_verdict_tag() {
        let json = serde_json::to_value(ExecutionOutcome::fail("boom")).unwrap();
        assert_eq!(json["verdict"], "fail");
        assert_eq!(json["message"], "boom");

        let back: ExecutionOutcome = serde_json::from_value(json).unwrap();
        assert_eq!(back, ExecutionOutcome::fail("boom"));
    }

    #[test]
    fn test_sheet_record_counts_rows() {
        let row = SheetRow::from_raw(sheet(), 1, &["click", "NAME", "Ok"]);
        let mut record = SheetRecord::new(sheet(), 2);
        record.count(&RowRecord::executed(
            &row,
            ExecutionOutcome::Retried {
                attempts: 2,
                outcome: Box::new(ExecutionOutcome::Pass),
            },
            10,
        ));
        record.count(&RowRecord::not_run(&row, RowStatus::Skipped, "stopped"));
        assert_eq!(record.passed, 1);
        assert_eq!(record.retried, 1);
        assert_eq!(record.skipped, 1);
    }
}
