//! Workbooks
//!
//! A workbook is a YAML document (JSON when the file ends in `.json`) holding
//! named sheets. Row 0 of a sheet is its header and is never executed:
//!
//! ```yaml
//! sheets:
//!   - name: Login
//!     rows:
//!       - [Action, Locator, Pane, Element, Value]
//!       - [launchApplication, notepad]
//!       - [write, NAME, Untitled, Text Editor, hello]
//!       - cells: [click, NAME, Main, Save]
//!         status: PASS
//! ```
//!
//! A row is either a plain list of cells or a map with `cells` plus the markup
//! keys `status`, `note` and `attempts`. Keys the engine does not know about
//! are kept as they are when the workbook is written back.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use sheetrun_common::{content_digest, Error, Result, SheetId, SheetRow};
use std::collections::{BTreeMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Markup written next to a row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mark {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RowRepr {
    Plain(Vec<Value>),
    Detailed {
        cells: Vec<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        attempts: Option<u32>,
        #[serde(flatten)]
        extra: BTreeMap<String, Value>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RowRepr", into = "RowRepr")]
pub struct Row {
    pub cells: Vec<Value>,
    pub mark: Option<Mark>,
    detailed: bool,
    extra: BTreeMap<String, Value>,
}

impl From<RowRepr> for Row {
    fn from(repr: RowRepr) -> Self {
        match repr {
            RowRepr::Plain(cells) => Row {
                cells,
                ..Row::default()
            },
            RowRepr::Detailed {
                cells,
                status,
                note,
                attempts,
                mut extra,
            } => {
                let mark = match status {
                    Some(status) => Some(Mark {
                        status,
                        note,
                        attempts,
                    }),
                    None => {
                        // markup without a status is not ours; keep it verbatim
                        if let Some(note) = note {
                            extra.insert("note".to_string(), Value::String(note));
                        }
                        if let Some(attempts) = attempts {
                            extra.insert("attempts".to_string(), Value::from(attempts));
                        }
                        None
                    }
                };
                Row {
                    cells,
                    mark,
                    detailed: true,
                    extra,
                }
            }
        }
    }
}

impl From<Row> for RowRepr {
    fn from(row: Row) -> Self {
        if !row.detailed && row.mark.is_none() && row.extra.is_empty() {
            return RowRepr::Plain(row.cells);
        }
        let (status, note, attempts) = match row.mark {
            Some(mark) => (Some(mark.status), mark.note, mark.attempts),
            None => (None, None, None),
        };
        RowRepr::Detailed {
            cells: row.cells,
            status,
            note,
            attempts,
            extra: row.extra,
        }
    }
}

impl Row {
    pub fn new<S: Into<String>>(cells: impl IntoIterator<Item = S>) -> Self {
        Self {
            cells: cells.into_iter().map(|c| Value::String(c.into())).collect(),
            ..Self::default()
        }
    }

    /// Cells as text; numbers and booleans are written as authored
    pub fn texts(&self) -> Vec<String> {
        self.cells.iter().map(cell_text).collect()
    }
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    /// Included when a selector names the whole workbook
    #[serde(default = "default_run", skip_serializing_if = "is_run")]
    pub run: bool,
    #[serde(default)]
    pub rows: Vec<Row>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, rows: Vec<Row>) -> Self {
        Self {
            name: name.into(),
            run: true,
            rows,
            extra: BTreeMap::new(),
        }
    }

    pub fn skipped(mut self) -> Self {
        self.run = false;
        self
    }
}

fn default_run() -> bool {
    true
}

fn is_run(run: &bool) -> bool {
    *run
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    sheets: Vec<Sheet>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkbookFormat {
    Yaml,
    Json,
}

impl WorkbookFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => WorkbookFormat::Json,
            _ => WorkbookFormat::Yaml,
        }
    }
}

/// A loaded workbook
#[derive(Debug, Clone)]
pub struct Workbook {
    path: PathBuf,
    format: WorkbookFormat,
    digest: String,
    document: Document,
}

impl Workbook {
    /// New in-memory workbook; nothing is written until `save`
    pub fn new(path: impl Into<PathBuf>, sheets: Vec<Sheet>) -> Self {
        let path = path.into();
        Self {
            format: WorkbookFormat::from_path(&path),
            path,
            digest: String::new(),
            document: Document {
                sheets,
                extra: BTreeMap::new(),
            },
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| invalid(path, e.to_string()))?;
        let format = WorkbookFormat::from_path(path);
        let document: Document = match format {
            WorkbookFormat::Json => serde_json::from_slice(&bytes).map_err(|e| invalid(path, e.to_string()))?,
            WorkbookFormat::Yaml => serde_yaml::from_slice(&bytes).map_err(|e| invalid(path, e.to_string()))?,
        };

        let mut seen = HashSet::new();
        for sheet in &document.sheets {
            if !seen.insert(sheet.name.as_str()) {
                return Err(invalid(path, format!("duplicate sheet name '{}'", sheet.name)));
            }
        }

        debug!("Loaded workbook {} with {} sheets", path.display(), document.sheets.len());
        Ok(Self {
            path: path.to_path_buf(),
            format,
            digest: content_digest(&bytes),
            document,
        })
    }

    /// Write the workbook back in its own format, replacing the file atomically
    pub fn save(&self) -> Result<()> {
        let content = match self.format {
            WorkbookFormat::Json => serde_json::to_string_pretty(&self.document)?,
            WorkbookFormat::Yaml => serde_yaml::to_string(&self.document)?,
        };

        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent)?;

        let mut file = tempfile::NamedTempFile::new_in(&parent)?;
        file.write_all(content.as_bytes())?;
        file.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        debug!("Wrote workbook {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// SHA-256 of the file content as loaded
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.document.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.document.sheets.iter().find(|s| s.name == name)
    }

    fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.document.sheets.iter_mut().find(|s| s.name == name)
    }

    pub fn sheet_id(&self, name: &str) -> SheetId {
        SheetId::new(self.path.display().to_string(), name)
    }

    /// Executable rows of a sheet: header and blank rows left out
    pub fn rows(&self, name: &str) -> Option<Vec<SheetRow>> {
        let sheet = self.sheet(name)?;
        let id = self.sheet_id(name);
        Some(
            sheet
                .rows
                .iter()
                .enumerate()
                .skip(1)
                .map(|(index, row)| SheetRow::from_raw(id.clone(), index, &row.texts()))
                .filter(|row| !row.is_blank())
                .collect(),
        )
    }

    /// Set or clear the markup of one row; false when the row does not exist
    pub fn set_mark(&mut self, sheet: &str, index: usize, mark: Option<Mark>) -> bool {
        match self.sheet_mut(sheet).and_then(|s| s.rows.get_mut(index)) {
            Some(row) => {
                row.mark = mark;
                true
            }
            None => false,
        }
    }

    pub fn mark(&self, sheet: &str, index: usize) -> Option<&Mark> {
        self.sheet(sheet)?.rows.get(index)?.mark.as_ref()
    }

    /// Drop the markup of every row in a sheet
    pub fn clear_marks(&mut self, sheet: &str) {
        if let Some(sheet) = self.sheet_mut(sheet) {
            for row in &mut sheet.rows {
                row.mark = None;
            }
        }
    }
}

fn invalid(path: &Path, reason: String) -> Error {
    Error::InvalidWorkbook {
        path: path.display().to_string(),
        reason,
    }
}

/// `path` or `path:Sheet1,Sheet2`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetSelector {
    pub workbook: PathBuf,
    /// `None` selects every sheet not marked `run: false`, in workbook order
    pub sheets: Option<Vec<String>>,
}

impl SheetSelector {
    pub fn all(workbook: impl Into<PathBuf>) -> Self {
        Self {
            workbook: workbook.into(),
            sheets: None,
        }
    }

    /// Selected sheet names, split into present and missing. A whole-workbook
    /// selector leaves out sheets marked `run: false`; named sheets always run.
    pub fn pick(&self, workbook: &Workbook) -> (Vec<String>, Vec<String>) {
        match &self.sheets {
            None => (
                workbook
                    .document
                    .sheets
                    .iter()
                    .filter(|s| s.run)
                    .map(|s| s.name.clone())
                    .collect(),
                Vec::new(),
            ),
            Some(names) => names
                .iter()
                .cloned()
                .partition(|name| workbook.sheet(name).is_some()),
        }
    }
}

impl FromStr for SheetSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidSelector(s.to_string()));
        }

        // A drive letter ("C:\...") is part of the path, not a sheet list
        let split = s.rsplit_once(':').filter(|(path, sheets)| {
            path.len() > 1 && !sheets.contains('/') && !sheets.contains('\\')
        });

        match split {
            None => Ok(Self::all(s)),
            Some((path, sheets)) => {
                let names: Vec<String> = sheets
                    .split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect();
                if names.is_empty() {
                    return Err(Error::InvalidSelector(s.to_string()));
                }
                Ok(Self {
                    workbook: PathBuf::from(path),
                    sheets: Some(names),
                })
            }
        }
    }
}
