//! Row validation
//!
//! Every row of a sheet is checked before any row runs. A row is valid only
//! when exactly one overload of its action accepts its arguments; anything
//! else is an issue naming the sheet, row, action and reason. Validation never
//! stops at the first issue.

use crate::args::resolve_arguments;
use crate::catalog::ActionCatalog;
use crate::container::ResolvedInvocation;
use crate::error::{IssueKind, ValidationIssue};
use sheetrun_common::{SheetId, SheetRow};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, error};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub enum ValidationResult {
    Valid(ResolvedInvocation),
    Invalid(ValidationIssue),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid(_))
    }
}

/// Resolve one row against the catalog
pub fn validate_row(catalog: &ActionCatalog, row: &SheetRow) -> ValidationResult {
    let issue = |kind: IssueKind| {
        ValidationResult::Invalid(ValidationIssue {
            sheet: row.sheet.clone(),
            row: row.index,
            action: row.action_name().unwrap_or_default().to_string(),
            kind,
        })
    };

    let Some(name) = row.action_name() else {
        return issue(IssueKind::EmptyRow);
    };

    let overloads = catalog.overloads(name);
    if overloads.is_empty() {
        return issue(IssueKind::UnknownAction {
            suggestions: catalog.suggestions(name),
        });
    }

    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    for signature in overloads {
        match resolve_arguments(signature, row.arguments()) {
            Ok(args) => accepted.push((signature, args)),
            Err(err) => rejected.push((signature.to_string(), err)),
        }
    }

    match accepted.len() {
        0 if overloads.len() == 1 => match rejected.pop() {
            Some((_, err)) => issue(IssueKind::Argument(err)),
            None => issue(IssueKind::NoMatchingOverload { attempts: rejected }),
        },
        0 => issue(IssueKind::NoMatchingOverload { attempts: rejected }),
        1 => {
            let (signature, args) = accepted.remove(0);
            match ResolvedInvocation::new(signature.clone(), args) {
                Ok(invocation) => ValidationResult::Valid(invocation),
                Err(err) => issue(IssueKind::Argument(err)),
            }
        }
        _ => issue(IssueKind::AmbiguousOverload {
            candidates: accepted.iter().map(|(sig, _)| sig.to_string()).collect(),
        }),
    }
}

/// A validated row ready to run
#[derive(Debug, Clone)]
pub struct PlannedRow {
    pub row: SheetRow,
    pub invocation: ResolvedInvocation,
}

/// Validation of a whole sheet
#[derive(Debug, Clone)]
pub struct SheetValidation {
    pub sheet: SheetId,
    /// Valid rows in sheet order
    pub planned: Vec<PlannedRow>,
    pub issues: Vec<ValidationIssue>,
}

impl SheetValidation {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn total_rows(&self) -> usize {
        self.planned.len() + self.issues.len()
    }

    /// Add a `MissingAsset` issue for every referenced image that is absent
    pub fn check_assets(&mut self, assets: &AssetIndex) {
        let mut missing = Vec::new();
        for planned in &self.planned {
            for name in planned.invocation.image_refs() {
                if !assets.contains(name) {
                    missing.push(ValidationIssue {
                        sheet: self.sheet.clone(),
                        row: planned.row.index,
                        action: planned.invocation.signature().name().to_string(),
                        kind: IssueKind::MissingAsset {
                            name: name.to_string(),
                            path: assets.expected_path(name).display().to_string(),
                        },
                    });
                }
            }
        }
        for issue in &missing {
            error!(sheet = %issue.sheet, row = issue.row, action = %issue.action, "{}", issue.kind);
        }
        self.issues.extend(missing);
        self.issues.sort_by_key(|issue| issue.row);
    }
}

/// Validate every row of one sheet
pub fn validate_sheet(catalog: &ActionCatalog, sheet: &SheetId, rows: &[SheetRow]) -> SheetValidation {
    let mut validation = SheetValidation {
        sheet: sheet.clone(),
        planned: Vec::new(),
        issues: Vec::new(),
    };

    for row in rows.iter().filter(|row| !row.is_blank()) {
        match validate_row(catalog, row) {
            ValidationResult::Valid(invocation) => validation.planned.push(PlannedRow {
                row: row.clone(),
                invocation,
            }),
            ValidationResult::Invalid(issue) => {
                error!(
                    sheet = %issue.sheet,
                    row = issue.row,
                    action = %issue.action,
                    "{}",
                    issue.kind
                );
                validation.issues.push(issue);
            }
        }
    }

    debug!(
        "Validated {}: {} valid rows, {} issues",
        sheet,
        validation.planned.len(),
        validation.issues.len()
    );
    validation
}

/// Validate several sheets; issues in one never hide issues in another
pub fn validate_sheets<'a, I>(catalog: &ActionCatalog, sheets: I) -> Vec<SheetValidation>
where
    I: IntoIterator<Item = (&'a SheetId, &'a [SheetRow])>,
{
    sheets
        .into_iter()
        .map(|(sheet, rows)| validate_sheet(catalog, sheet, rows))
        .collect()
}

/// Image files available to IMAGE locators.
///
/// Names are matched case-insensitively, with or without the `.png`
/// extension, anywhere below the image folder.
#[derive(Debug, Clone, Default)]
pub struct AssetIndex {
    root: PathBuf,
    files: HashSet<String>,
}

impl AssetIndex {
    pub fn scan(root: &Path) -> Self {
        let files = WalkDir::new(root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                entry
                    .path()
                    .strip_prefix(root)
                    .ok()
                    .map(|rel| normalize(&rel.to_string_lossy()))
            })
            .collect::<HashSet<_>>();

        debug!("Indexed {} image assets under {}", files.len(), root.display());
        Self {
            root: root.to_path_buf(),
            files,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        let name = normalize(name);
        self.files.contains(&name) || self.files.contains(&format!("{}.png", name))
    }

    /// Where an image is expected to live
    pub fn expected_path(&self, name: &str) -> PathBuf {
        if Path::new(name).extension().is_some() {
            self.root.join(name)
        } else {
            self.root.join(format!("{}.png", name))
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn normalize(name: &str) -> String {
    name.replace('\\', "/").to_ascii_lowercase()
}
