//! Row outcomes to sheet markup

use crate::error::ValidationIssue;
use crate::workbook::Mark;
use sheetrun_common::config::MarkupConfig;
use sheetrun_common::{RowRecord, RowStatus};

/// Maps results to the configured markup symbols
#[derive(Debug, Clone)]
pub struct Markup {
    symbols: MarkupConfig,
}

impl Markup {
    pub fn new(symbols: &MarkupConfig) -> Self {
        Self {
            symbols: symbols.clone(),
        }
    }

    /// Final markup of a row record
    pub fn for_record(&self, record: &RowRecord) -> Mark {
        let status = match record.status {
            RowStatus::Passed => &self.symbols.pass,
            RowStatus::Failed => &self.symbols.fail,
            RowStatus::Skipped => &self.symbols.skipped,
            RowStatus::Invalid => &self.symbols.invalid,
        };
        Mark {
            status: status.clone(),
            note: record.cause.clone(),
            attempts: (record.attempts > 1).then_some(record.attempts),
        }
    }

    pub fn for_issue(&self, issue: &ValidationIssue) -> Mark {
        Mark {
            status: self.symbols.invalid.clone(),
            note: Some(issue.note()),
            attempts: None,
        }
    }

    /// Markup shown while a retry is in progress
    pub fn retrying(&self, attempt: u32) -> Mark {
        Mark {
            status: self.symbols.retry.clone(),
            note: None,
            attempts: Some(attempt),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetrun_common::{ExecutionOutcome, FailureCause, SheetId, SheetRow};

    fn row() -> SheetRow {
        SheetRow::from_raw(SheetId::new("suite.yaml", "Login"), 1, &["click", "NAME", "Main", "Ok"])
    }

    #[test]
    fn test_retried_pass_keeps_attempt_count() {
        let markup = Markup::new(&MarkupConfig::default());
        let record = RowRecord::executed(
            &row(),
            ExecutionOutcome::Retried {
                attempts: 3,
                outcome: Box::new(ExecutionOutcome::Pass),
            },
            40,
        );
        let mark = markup.for_record(&record);
        assert_eq!(mark.status, "PASS");
        assert_eq!(mark.attempts, Some(3));
        assert_eq!(mark.note, None);
    }

    #[test]
    fn test_exhausted_retry_is_fail_with_cause() {
        let mut symbols = MarkupConfig::default();
        symbols.fail = "✗".to_string();
        let markup = Markup::new(&symbols);
        let record = RowRecord::executed(
            &row(),
            ExecutionOutcome::Fail(FailureCause::retry_exhausted(2, "not found")),
            40,
        );
        let mark = markup.for_record(&record);
        assert_eq!(mark.status, "✗");
        assert_eq!(mark.attempts, Some(2));
        assert!(mark.note.unwrap().contains("not found"));
    }
}
