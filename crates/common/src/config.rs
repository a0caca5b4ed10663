//! Project configuration
//!
//! Loaded once at startup from `sheetrun.toml` and passed by reference to the
//! runner and its collaborators. Nothing mutates it during a run.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Project configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Folder and file locations
    pub paths: PathsConfig,

    /// Symbols written back into sheets
    pub markup: MarkupConfig,

    /// Wait thresholds
    pub timing: TimingConfig,

    /// Retry policy
    pub retry: RetryConfig,

    /// Report metadata
    pub report: ReportConfig,

    /// External UI automation helper
    pub backend: BackendConfig,

    /// Application alias -> executable path
    pub apps: BTreeMap<String, String>,
}

/// Folder and file locations, relative to `root` unless absolute
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub root: PathBuf,

    /// Workbooks executed when no selector is given
    pub workbooks: Vec<PathBuf>,

    pub workbook_dir: PathBuf,
    pub report_dir: PathBuf,
    pub screenshot_dir: PathBuf,
    pub image_dir: PathBuf,
    pub log_dir: PathBuf,

    /// Run history database; defaults to `<report_dir>/history.db`
    pub history_db: Option<PathBuf>,

    /// Base folder for file actions; defaults to `root`
    pub repo_path: Option<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            workbooks: Vec::new(),
            workbook_dir: PathBuf::from("workbooks"),
            report_dir: PathBuf::from("reports"),
            screenshot_dir: PathBuf::from("screenshots"),
            image_dir: PathBuf::from("images"),
            log_dir: PathBuf::from("logs"),
            history_db: None,
            repo_path: None,
        }
    }
}

/// Markup symbols written into the status column of a sheet
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkupConfig {
    pub pass: String,
    pub fail: String,
    pub retry: String,
    pub invalid: String,
    pub skipped: String,
}

impl Default for MarkupConfig {
    fn default() -> Self {
        Self {
            pass: "PASS".to_string(),
            fail: "FAIL".to_string(),
            retry: "RETRY".to_string(),
            invalid: "INVALID".to_string(),
            skipped: "SKIPPED".to_string(),
        }
    }
}

impl MarkupConfig {
    fn symbols(&self) -> [(&'static str, &str); 5] {
        [
            ("pass", &self.pass),
            ("fail", &self.fail),
            ("retry", &self.retry),
            ("invalid", &self.invalid),
            ("skipped", &self.skipped),
        ]
    }
}

/// Wait thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// How long element lookups wait before giving up
    pub find_wait_secs: u64,

    /// Upper bound for wait actions without an explicit duration
    pub max_wait_secs: u64,

    /// Pause between executed rows
    pub step_delay_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            find_wait_secs: 10,
            max_wait_secs: 30,
            step_delay_ms: 100,
        }
    }
}

impl TimingConfig {
    pub fn find_wait(&self) -> Duration {
        Duration::from_secs(self.find_wait_secs)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_secs)
    }

    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }
}

/// Retry policy for retryable actions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one; 1 disables retrying
    pub max_attempts: u32,

    /// Element find wait used while retrying
    pub find_wait_cap_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            find_wait_cap_secs: 5,
        }
    }
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub title: String,
    pub name: String,
    pub build_no: Option<String>,
    pub hotfix_id: Option<String>,
    pub patch_info: Option<String>,
    pub build_by: Option<String>,

    /// File name of the JSON report inside the report directory
    pub json_file: String,

    /// Also keep a copy of every run's report next to the latest one
    pub archive: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: "Automation Report".to_string(),
            name: "SheetRun".to_string(),
            build_no: None,
            hotfix_id: None,
            patch_info: None,
            build_by: None,
            json_file: "report.json".to_string(),
            archive: true,
        }
    }
}

/// External helper process that performs UI operations.
///
/// The helper reads one JSON request per line on stdin and answers with one
/// JSON line on stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub command: Option<String>,
    pub args: Vec<String>,

    /// How long a single request may take before the helper is considered hung
    pub request_timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            request_timeout_secs: 120,
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl ProjectConfig {
    /// Load configuration from file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str::<Self>(&content)?
        } else {
            Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.backend.request_timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "backend.request_timeout_secs must be at least 1".to_string(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(Error::InvalidConfig(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        let symbols = self.markup.symbols();
        for (i, (name, symbol)) in symbols.iter().enumerate() {
            if symbol.trim().is_empty() {
                return Err(Error::InvalidConfig(format!("markup.{} is empty", name)));
            }
            if let Some((other, _)) = symbols[i + 1..].iter().find(|(_, s)| s == symbol) {
                return Err(Error::InvalidConfig(format!(
                    "markup.{} and markup.{} share the symbol '{}'",
                    name, other, symbol
                )));
            }
        }
        Ok(())
    }

    /// Resolve a configured path against the project root
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.paths.root.join(path)
        }
    }

    pub fn report_dir(&self) -> PathBuf {
        self.resolve(&self.paths.report_dir)
    }

    pub fn report_path(&self) -> PathBuf {
        self.report_dir().join(&self.report.json_file)
    }

    pub fn screenshot_dir(&self) -> PathBuf {
        self.resolve(&self.paths.screenshot_dir)
    }

    pub fn image_dir(&self) -> PathBuf {
        self.resolve(&self.paths.image_dir)
    }

    pub fn workbook_dir(&self) -> PathBuf {
        self.resolve(&self.paths.workbook_dir)
    }

    pub fn history_db_path(&self) -> PathBuf {
        match &self.paths.history_db {
            Some(path) => self.resolve(path),
            None => self.report_dir().join("history.db"),
        }
    }

    pub fn repo_path(&self) -> PathBuf {
        match &self.paths.repo_path {
            Some(path) => self.resolve(path),
            None => self.paths.root.clone(),
        }
    }

    /// Workbooks to run when no selector is given
    pub fn workbook_paths(&self) -> Vec<PathBuf> {
        self.paths
            .workbooks
            .iter()
            .map(|path| self.resolve(path))
            .collect()
    }

    /// Folders created by project setup
    pub fn project_folders(&self) -> Vec<PathBuf> {
        [
            &self.paths.workbook_dir,
            &self.paths.report_dir,
            &self.paths.screenshot_dir,
            &self.paths.image_dir,
            &self.paths.log_dir,
        ]
        .into_iter()
        .map(|path| self.resolve(path))
        .collect()
    }

    /// Look up an application alias; aliases are case-insensitive
    pub fn app_path(&self, alias: &str) -> Option<&str> {
        self.apps
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(alias))
            .map(|(_, path)| path.as_str())
    }
}
