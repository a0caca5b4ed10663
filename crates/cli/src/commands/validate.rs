//! Validate Command

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use sheetrun_common::ProjectConfig;
use sheetrun_engine::{DryRunDriver, Runner, SheetValidation, ValidationIssue, ValidationSummary};
use std::sync::Arc;

use super::{catalog, selectors, EXIT_OK, EXIT_VALIDATION_FAILED};
use crate::output::{is_human, print_error, print_list, print_success, OutputFormat, TableDisplay};

#[derive(Args)]
pub struct ValidateArgs {
    /// Sheet selectors: `workbook.yaml` or `workbook.yaml:Sheet1,Sheet2`
    pub selectors: Vec<String>,

    /// Report problems without writing markup into the workbooks
    #[arg(long)]
    pub no_markup: bool,
}

#[derive(Serialize)]
pub struct SheetDisplay {
    pub sheet: String,
    pub rows: usize,
    pub issues: usize,
}

impl From<&SheetValidation> for SheetDisplay {
    fn from(validation: &SheetValidation) -> Self {
        Self {
            sheet: validation.sheet.to_string(),
            rows: validation.total_rows(),
            issues: validation.issues.len(),
        }
    }
}

impl TableDisplay for SheetDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Sheet", "Rows", "Issues"]
    }

    fn row(&self) -> Vec<String> {
        vec![self.sheet.clone(), self.rows.to_string(), self.issues.to_string()]
    }
}

#[derive(Serialize)]
pub struct IssueDisplay {
    pub sheet: String,
    pub row: Option<usize>,
    pub action: String,
    pub problem: String,
}

impl From<&ValidationIssue> for IssueDisplay {
    fn from(issue: &ValidationIssue) -> Self {
        Self {
            sheet: issue.sheet.to_string(),
            row: Some(issue.row),
            action: issue.action.clone(),
            problem: issue.note(),
        }
    }
}

impl TableDisplay for IssueDisplay {
    fn headers() -> Vec<&'static str> {
        vec!["Sheet", "Row", "Action", "Problem"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.sheet.clone(),
            self.row.map(|r| r.to_string()).unwrap_or_else(|| "-".to_string()),
            self.action.clone(),
            self.problem.clone(),
        ]
    }
}

/// Every problem found, including unreadable workbooks and missing sheets
pub fn issue_rows(summary: &ValidationSummary) -> Vec<IssueDisplay> {
    let failures = summary.failures.iter().map(|(target, reason)| IssueDisplay {
        sheet: target.clone(),
        row: None,
        action: String::new(),
        problem: reason.clone(),
    });
    failures.chain(summary.issues().map(IssueDisplay::from)).collect()
}

pub fn execute(args: ValidateArgs, config: ProjectConfig, format: OutputFormat) -> Result<i32> {
    let selectors = selectors(&args.selectors, &config)?;
    let runner = Runner::new(catalog()?, Arc::new(config), Arc::new(DryRunDriver::new()));

    let summary = runner.validate(&selectors, !args.no_markup);
    let issues = issue_rows(&summary);

    if is_human(format) {
        let sheets: Vec<SheetDisplay> = summary.sheets.iter().map(SheetDisplay::from).collect();
        print_list(&sheets, format);
        if !issues.is_empty() {
            println!();
            print_list(&issues, format);
        }
    } else {
        print_list(&issues, format);
    }

    if summary.is_clean() {
        if is_human(format) {
            print_success(&format!("{} sheet(s) valid", summary.sheets.len()));
        }
        Ok(EXIT_OK)
    } else {
        if is_human(format) {
            print_error(&format!("{} problem(s) found", issues.len()));
        }
        Ok(EXIT_VALIDATION_FAILED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetrun_engine::workbook::{Row, Sheet};
    use sheetrun_engine::Workbook;

    #[test]
    fn test_unknown_action_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suite.yaml");
        Workbook::new(
            &path,
            vec![Sheet::new(
                "Login",
                vec![Row::new(["Action"]), Row::new(["clikc", "NAME", "Main", "Ok"])],
            )],
        )
        .save()
        .unwrap();

        let mut config = ProjectConfig::default();
        config.paths.root = dir.path().to_path_buf();
        let args = ValidateArgs {
            selectors: vec![path.display().to_string(), "absent.yaml".to_string()],
            no_markup: true,
        };

        let code = execute(args, config, OutputFormat::Json).unwrap();
        assert_eq!(code, EXIT_VALIDATION_FAILED);
        // Markup was not written
        assert!(Workbook::load(&path).unwrap().mark("Login", 1).is_none());
    }
}
