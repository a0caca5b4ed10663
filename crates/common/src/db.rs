//! SQLite run history

use crate::types::{RowRecord, RowStatus, RunSummary, SheetId, SheetRecord, SheetStatus};
use crate::{Error, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Database wrapper for run history
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;

        info!("Opened history database at {:?}", path.as_ref());
        Ok(db)
    }

    /// Open in-memory database (for testing)
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,
                started_at INTEGER NOT NULL,
                finished_at INTEGER,
                cancelled INTEGER NOT NULL DEFAULT 0,
                summary TEXT NOT NULL DEFAULT '{}'
            );

            CREATE TABLE IF NOT EXISTS sheet_results (
                run_id TEXT NOT NULL REFERENCES runs(id),
                workbook TEXT NOT NULL,
                sheet TEXT NOT NULL,
                status TEXT NOT NULL,
                workbook_digest TEXT,
                record TEXT NOT NULL,
                PRIMARY KEY (run_id, workbook, sheet)
            );
            CREATE INDEX IF NOT EXISTS idx_sheet_results_sheet ON sheet_results(workbook, sheet);

            CREATE TABLE IF NOT EXISTS row_results (
                run_id TEXT NOT NULL REFERENCES runs(id),
                workbook TEXT NOT NULL,
                sheet TEXT NOT NULL,
                row_index INTEGER NOT NULL,
                action TEXT NOT NULL,
                status TEXT NOT NULL,
                attempts INTEGER NOT NULL,
                record TEXT NOT NULL,
                PRIMARY KEY (run_id, workbook, sheet, row_index)
            );
            CREATE INDEX IF NOT EXISTS idx_row_results_action ON row_results(action);
            "#,
        )?;

        debug!("History schema initialized");
        Ok(())
    }

    /// Register a run before any of its sheets are recorded
    pub fn begin_run(&self, summary: &RunSummary) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO runs (id, started_at, cancelled) VALUES (?1, ?2, 0)",
            params![summary.run_id, summary.started_at.timestamp()],
        )?;
        debug!("Registered run {}", summary.run_id);
        Ok(())
    }

    /// Store the final summary of a run
    pub fn finish_run(&self, summary: &RunSummary) -> Result<()> {
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE runs SET finished_at = ?1, cancelled = ?2, summary = ?3 WHERE id = ?4",
            params![
                summary.finished_at.map(|t| t.timestamp()),
                summary.cancelled,
                serde_json::to_string(summary)?,
                summary.run_id,
            ],
        )?;
        if updated == 0 {
            return Err(Error::NotFound {
                kind: "run".to_string(),
                id: summary.run_id.clone(),
            });
        }
        Ok(())
    }

    pub fn record_sheet(&self, run_id: &str, record: &SheetRecord) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO sheet_results (run_id, workbook, sheet, status, workbook_digest, record)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                run_id,
                record.sheet.workbook,
                record.sheet.sheet,
                record.status.as_str(),
                record.workbook_digest,
                serde_json::to_string(record)?,
            ],
        )?;
        Ok(())
    }

    pub fn record_row(&self, run_id: &str, record: &RowRecord) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO row_results (run_id, workbook, sheet, row_index, action, status, attempts, record)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                run_id,
                record.sheet.workbook,
                record.sheet.sheet,
                record.row as i64,
                record.action,
                record.status.as_str(),
                record.attempts,
                serde_json::to_string(record)?,
            ],
        )?;
        Ok(())
    }

    /// Most recent runs first
    pub fn list_runs(&self, limit: usize) -> Result<Vec<RunRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT r.id, r.started_at, r.finished_at, r.cancelled,
                    (SELECT COUNT(*) FROM sheet_results s WHERE s.run_id = r.id),
                    (SELECT COUNT(*) FROM sheet_results s WHERE s.run_id = r.id AND s.status = 'invalid'),
                    (SELECT COUNT(*) FROM row_results w WHERE w.run_id = r.id AND w.status = 'passed'),
                    (SELECT COUNT(*) FROM row_results w WHERE w.run_id = r.id AND w.status = 'failed')
             FROM runs r ORDER BY r.started_at DESC, r.rowid DESC LIMIT ?1",
        )?;

        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok(RunRow {
                id: row.get(0)?,
                started_at: row.get(1)?,
                finished_at: row.get(2)?,
                cancelled: row.get(3)?,
                sheets: row.get::<_, i64>(4)? as usize,
                invalid_sheets: row.get::<_, i64>(5)? as usize,
                rows_passed: row.get::<_, i64>(6)? as usize,
                rows_failed: row.get::<_, i64>(7)? as usize,
            })
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    /// Sheet records of one run, in recording order
    pub fn sheet_results(&self, run_id: &str) -> Result<Vec<SheetRecord>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT record FROM sheet_results WHERE run_id = ?1 ORDER BY rowid")?;
        let raw = stmt.query_map(params![run_id], |row| row.get::<_, String>(0))?;

        let mut results = Vec::new();
        for record in raw {
            results.push(serde_json::from_str(&record?)?);
        }
        Ok(results)
    }

    /// Row records of one sheet in one run, in row order
    pub fn row_results(&self, run_id: &str, sheet: &SheetId) -> Result<Vec<RowRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT record FROM row_results
             WHERE run_id = ?1 AND workbook = ?2 AND sheet = ?3 ORDER BY row_index",
        )?;
        let raw = stmt.query_map(params![run_id, sheet.workbook, sheet.sheet], |row| {
            row.get::<_, String>(0)
        })?;

        let mut results = Vec::new();
        for record in raw {
            results.push(serde_json::from_str(&record?)?);
        }
        Ok(results)
    }

    /// Status of a sheet in its most recent run
    pub fn last_sheet_status(&self, sheet: &SheetId) -> Result<Option<SheetStatus>> {
        let conn = self.conn.lock();
        let status: Option<String> = conn
            .query_row(
                "SELECT s.status FROM sheet_results s JOIN runs r ON r.id = s.run_id
                 WHERE s.workbook = ?1 AND s.sheet = ?2
                 ORDER BY r.started_at DESC, s.rowid DESC LIMIT 1",
                params![sheet.workbook, sheet.sheet],
                |row| row.get(0),
            )
            .optional()?;

        status
            .map(|s| s.parse::<SheetStatus>().map_err(Error::Internal))
            .transpose()
    }

    /// How often an action failed across all recorded runs
    pub fn action_failures(&self, action: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM row_results WHERE action = ?1 AND status = ?2",
            params![action, RowStatus::Failed.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

/// One line of run history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRow {
    pub id: String,
    pub started_at: i64,
    pub finished_at: Option<i64>,
    pub cancelled: bool,
    pub sheets: usize,
    pub invalid_sheets: usize,
    pub rows_passed: usize,
    pub rows_failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExecutionOutcome, SheetRow};

    fn sample_sheet() -> SheetId {
        SheetId::new("suite.yaml", "Login")
    }

    #[test]
    fn test_run_lifecycle() {
        let db = Database::open_memory().unwrap();
        let mut summary = RunSummary::start();
        db.begin_run(&summary).unwrap();

        let row = SheetRow::from_raw(sample_sheet(), 1, &["click", "NAME", "Submit"]);
        let failed = RowRecord::executed(&row, ExecutionOutcome::fail("not found"), 12);
        db.record_row(&summary.run_id, &failed).unwrap();

        let mut sheet = SheetRecord::new(sample_sheet(), 1);
        sheet.count(&failed);
        sheet.status = SheetStatus::Failed;
        db.record_sheet(&summary.run_id, &sheet).unwrap();

        summary.sheets.push(sheet);
        summary.finish();
        db.finish_run(&summary).unwrap();

        let runs = db.list_runs(10).unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].sheets, 1);
        assert_eq!(runs[0].rows_failed, 1);
        assert!(runs[0].finished_at.is_some());

        let rows = db.row_results(&summary.run_id, &sample_sheet()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].action, "click");

        assert_eq!(
            db.last_sheet_status(&sample_sheet()).unwrap(),
            Some(SheetStatus::Failed)
        );
        assert_eq!(db.action_failures("click").unwrap(), 1);
    }

    #[test]
    fn test_finish_unknown_run_is_not_found() {
        let db = Database::open_memory().unwrap();
        let summary = RunSummary::start();
        assert!(matches!(
            db.finish_run(&summary),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_open_on_disk_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("history.db");
        let db = Database::open(&path).unwrap();
        assert!(db.list_runs(5).unwrap().is_empty());
        assert!(path.exists());
    }
}
