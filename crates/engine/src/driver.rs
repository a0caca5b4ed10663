//! UI backends
//!
//! Actions never touch the desktop directly; they call a [`Driver`]. The
//! engine ships two: [`DryRunDriver`], which records calls and reports
//! success, and [`BridgeDriver`](crate::bridge::BridgeDriver), which forwards
//! each call to an external automation helper.

use crate::error::{DriverError, DriverResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sheetrun_common::LocatorType;
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// Element reference as authored in a row: locator, pane and element.
///
/// For IMAGE locators `scope` is the search-area image and `element` the image
/// to find inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub locator: LocatorType,
    pub scope: String,
    pub element: String,
}

impl Target {
    pub fn new(locator: LocatorType, scope: impl Into<String>, element: impl Into<String>) -> Self {
        Self {
            locator,
            scope: scope.into(),
            element: element.into(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}' in '{}'", self.locator, self.element, self.scope)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickKind {
    Left,
    Center,
    Right,
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitCondition {
    Displayed,
    Vanished,
    Enabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowOp {
    Maximize,
    Close,
    Focus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowScope {
    Window,
    Pane,
}

/// Screen capture session commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum CaptureCommand {
    Start { name: String },
    AddNote,
    Save,
    Cancel,
}

/// Operations a UI backend offers to actions.
///
/// Every method has a default that reports the operation as unsupported, so
/// a backend only implements what it can do.
#[async_trait]
pub trait Driver: Send + Sync {
    fn name(&self) -> &str;

    async fn click(&self, target: &Target, kind: ClickKind, wait: Duration) -> DriverResult<()> {
        let _ = (target, kind, wait);
        Err(DriverError::Unsupported("click".to_string()))
    }

    async fn hover(&self, target: &Target, wait: Duration) -> DriverResult<()> {
        let _ = (target, wait);
        Err(DriverError::Unsupported("hover".to_string()))
    }

    async fn write(&self, target: &Target, text: &str, wait: Duration) -> DriverResult<()> {
        let _ = (target, text, wait);
        Err(DriverError::Unsupported("write".to_string()))
    }

    async fn set_checked(&self, target: &Target, checked: bool, wait: Duration) -> DriverResult<()> {
        let _ = (target, checked, wait);
        Err(DriverError::Unsupported("set_checked".to_string()))
    }

    async fn drag(&self, target: &Target, wait: Duration) -> DriverResult<()> {
        let _ = (target, wait);
        Err(DriverError::Unsupported("drag".to_string()))
    }

    async fn drop_on(&self, target: &Target, wait: Duration) -> DriverResult<()> {
        let _ = (target, wait);
        Err(DriverError::Unsupported("drop".to_string()))
    }

    async fn exists(&self, target: &Target, wait: Duration) -> DriverResult<bool> {
        let _ = (target, wait);
        Err(DriverError::Unsupported("exists".to_string()))
    }

    async fn is_enabled(&self, target: &Target, wait: Duration) -> DriverResult<bool> {
        let _ = (target, wait);
        Err(DriverError::Unsupported("is_enabled".to_string()))
    }

    async fn element_name(&self, target: &Target, wait: Duration) -> DriverResult<String> {
        let _ = (target, wait);
        Err(DriverError::Unsupported("element_name".to_string()))
    }

    /// Poll until `condition` holds; `Ok(false)` when the timeout elapses
    async fn wait_for(
        &self,
        target: &Target,
        condition: WaitCondition,
        timeout: Duration,
    ) -> DriverResult<bool> {
        let _ = (target, condition, timeout);
        Err(DriverError::Unsupported("wait_for".to_string()))
    }

    async fn type_text(&self, text: &str) -> DriverResult<()> {
        let _ = text;
        Err(DriverError::Unsupported("type_text".to_string()))
    }

    async fn paste(&self, text: &str) -> DriverResult<()> {
        let _ = text;
        Err(DriverError::Unsupported("paste".to_string()))
    }

    /// Press keys together and release them
    async fn press_keys(&self, keys: &[String]) -> DriverResult<()> {
        let _ = keys;
        Err(DriverError::Unsupported("press_keys".to_string()))
    }

    /// Clear the focused field
    async fn clear(&self) -> DriverResult<()> {
        Err(DriverError::Unsupported("clear".to_string()))
    }

    /// Positive steps scroll down, negative up
    async fn scroll(&self, steps: i64) -> DriverResult<()> {
        let _ = steps;
        Err(DriverError::Unsupported("scroll".to_string()))
    }

    async fn window(
        &self,
        op: WindowOp,
        scope: WindowScope,
        title: &str,
        wait: Duration,
    ) -> DriverResult<()> {
        let _ = (op, scope, title, wait);
        Err(DriverError::Unsupported("window".to_string()))
    }

    /// Search from the desktop root instead of the focused application
    async fn set_root_search(&self, enabled: bool) -> DriverResult<()> {
        let _ = enabled;
        Err(DriverError::Unsupported("set_root_search".to_string()))
    }

    async fn launch(&self, program: &str) -> DriverResult<()> {
        let _ = program;
        Err(DriverError::Unsupported("launch".to_string()))
    }

    async fn close_application(&self, program: &str) -> DriverResult<()> {
        let _ = program;
        Err(DriverError::Unsupported("close_application".to_string()))
    }

    async fn open_url(&self, url: &str) -> DriverResult<()> {
        let _ = url;
        Err(DriverError::Unsupported("open_url".to_string()))
    }

    async fn capture(&self, command: &CaptureCommand) -> DriverResult<()> {
        let _ = command;
        Err(DriverError::Unsupported("capture".to_string()))
    }

    async fn screenshot(&self, path: &Path) -> DriverResult<()> {
        let _ = path;
        Err(DriverError::Unsupported("screenshot".to_string()))
    }

    /// Release any keys or buttons left pressed by a failed action
    async fn release_all(&self) -> DriverResult<()> {
        Ok(())
    }
}

/// Backend that performs nothing and records every call.
///
/// Lookups succeed, `element_name` echoes the element text and waits are met
/// immediately. Used by `run --dry-run` to check a workbook end to end.
#[derive(Default)]
pub struct DryRunDriver {
    calls: Mutex<Vec<String>>,
}

impl DryRunDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls recorded so far, oldest first
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: String) {
        tracing::debug!(call = %call, "dry run");
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl Driver for DryRunDriver {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn click(&self, target: &Target, kind: ClickKind, _wait: Duration) -> DriverResult<()> {
        self.record(format!("click {:?} {}", kind, target));
        Ok(())
    }

    async fn hover(&self, target: &Target, _wait: Duration) -> DriverResult<()> {
        self.record(format!("hover {}", target));
        Ok(())
    }

    async fn write(&self, target: &Target, text: &str, _wait: Duration) -> DriverResult<()> {
        self.record(format!("write '{}' into {}", text, target));
        Ok(())
    }

    async fn set_checked(&self, target: &Target, checked: bool, _wait: Duration) -> DriverResult<()> {
        self.record(format!("set_checked {} {}", checked, target));
        Ok(())
    }

    async fn drag(&self, target: &Target, _wait: Duration) -> DriverResult<()> {
        self.record(format!("drag {}", target));
        Ok(())
    }

    async fn drop_on(&self, target: &Target, _wait: Duration) -> DriverResult<()> {
        self.record(format!("drop {}", target));
        Ok(())
    }

    async fn exists(&self, target: &Target, _wait: Duration) -> DriverResult<bool> {
        self.record(format!("exists {}", target));
        Ok(true)
    }

    async fn is_enabled(&self, target: &Target, _wait: Duration) -> DriverResult<bool> {
        self.record(format!("is_enabled {}", target));
        Ok(true)
    }

    async fn element_name(&self, target: &Target, _wait: Duration) -> DriverResult<String> {
        self.record(format!("element_name {}", target));
        Ok(target.element.clone())
    }

    async fn wait_for(
        &self,
        target: &Target,
        condition: WaitCondition,
        _timeout: Duration,
    ) -> DriverResult<bool> {
        self.record(format!("wait_for {:?} {}", condition, target));
        Ok(true)
    }

    async fn type_text(&self, text: &str) -> DriverResult<()> {
        self.record(format!("type '{}'", text));
        Ok(())
    }

    async fn paste(&self, text: &str) -> DriverResult<()> {
        self.record(format!("paste '{}'", text));
        Ok(())
    }

    async fn press_keys(&self, keys: &[String]) -> DriverResult<()> {
        self.record(format!("press {}", keys.join("+")));
        Ok(())
    }

    async fn clear(&self) -> DriverResult<()> {
        self.record("clear".to_string());
        Ok(())
    }

    async fn scroll(&self, steps: i64) -> DriverResult<()> {
        self.record(format!("scroll {}", steps));
        Ok(())
    }

    async fn window(
        &self,
        op: WindowOp,
        scope: WindowScope,
        title: &str,
        _wait: Duration,
    ) -> DriverResult<()> {
        self.record(format!("{:?} {:?} '{}'", op, scope, title));
        Ok(())
    }

    async fn set_root_search(&self, enabled: bool) -> DriverResult<()> {
        self.record(format!("root_search {}", enabled));
        Ok(())
    }

    async fn launch(&self, program: &str) -> DriverResult<()> {
        self.record(format!("launch {}", program));
        Ok(())
    }

    async fn close_application(&self, program: &str) -> DriverResult<()> {
        self.record(format!("close {}", program));
        Ok(())
    }

    async fn open_url(&self, url: &str) -> DriverResult<()> {
        self.record(format!("open_url {}", url));
        Ok(())
    }

    async fn capture(&self, command: &CaptureCommand) -> DriverResult<()> {
        self.record(format!("capture {:?}", command));
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> DriverResult<()> {
        self.record(format!("screenshot {}", path.display()));
        Ok(())
    }
}
