//! Process bridge to an external UI automation helper
//!
//! The helper is spawned once and kept alive for the whole run. Each driver
//! call becomes one JSON line on its stdin:
//!
//! ```text
//! {"id":7,"op":"click","target":{"locator":"NAME","scope":"Main","element":"Submit"},"kind":"left","wait_ms":10000}
//! ```
//!
//! and the helper answers with one JSON line on stdout:
//!
//! ```text
//! {"id":7,"ok":true}
//! {"id":8,"ok":false,"kind":"not_found","error":"no element named Submit"}
//! {"id":9,"ok":true,"value":"Submit"}
//! ```

use crate::driver::{CaptureCommand, ClickKind, Driver, Target, WaitCondition, WindowOp, WindowScope};
use crate::error::{DriverError, DriverResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sheetrun_common::config::BackendConfig;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request<'a> {
    Ping,
    Click {
        target: &'a Target,
        kind: ClickKind,
        wait_ms: u64,
    },
    Hover {
        target: &'a Target,
        wait_ms: u64,
    },
    Write {
        target: &'a Target,
        text: &'a str,
        wait_ms: u64,
    },
    SetChecked {
        target: &'a Target,
        checked: bool,
        wait_ms: u64,
    },
    Drag {
        target: &'a Target,
        wait_ms: u64,
    },
    Drop {
        target: &'a Target,
        wait_ms: u64,
    },
    Exists {
        target: &'a Target,
        wait_ms: u64,
    },
    IsEnabled {
        target: &'a Target,
        wait_ms: u64,
    },
    ElementName {
        target: &'a Target,
        wait_ms: u64,
    },
    WaitFor {
        target: &'a Target,
        condition: WaitCondition,
        timeout_ms: u64,
    },
    TypeText {
        text: &'a str,
    },
    Paste {
        text: &'a str,
    },
    PressKeys {
        keys: &'a [String],
    },
    Clear,
    Scroll {
        steps: i64,
    },
    Window {
        action: WindowOp,
        scope: WindowScope,
        title: &'a str,
        wait_ms: u64,
    },
    SetRootSearch {
        enabled: bool,
    },
    Launch {
        program: &'a str,
    },
    CloseApplication {
        program: &'a str,
    },
    OpenUrl {
        url: &'a str,
    },
    Capture {
        capture: &'a CaptureCommand,
    },
    Screenshot {
        path: &'a Path,
    },
    ReleaseAll,
}

impl Request<'_> {
    /// Wait the helper itself may spend before answering
    fn wait(&self) -> Duration {
        let ms = match self {
            Request::Click { wait_ms, .. }
            | Request::Hover { wait_ms, .. }
            | Request::Write { wait_ms, .. }
            | Request::SetChecked { wait_ms, .. }
            | Request::Drag { wait_ms, .. }
            | Request::Drop { wait_ms, .. }
            | Request::Exists { wait_ms, .. }
            | Request::IsEnabled { wait_ms, .. }
            | Request::ElementName { wait_ms, .. }
            | Request::Window { wait_ms, .. } => *wait_ms,
            Request::WaitFor { timeout_ms, .. } => *timeout_ms,
            _ => 0,
        };
        Duration::from_millis(ms)
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    id: u64,
    #[serde(flatten)]
    request: Request<'a>,
}

#[derive(Debug, Deserialize)]
struct Response {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl Response {
    fn into_result(self, timeout: Duration) -> DriverResult<serde_json::Value> {
        if self.ok {
            return Ok(self.value);
        }
        let message = self.error.unwrap_or_else(|| "unspecified failure".to_string());
        Err(match self.kind.as_deref() {
            Some("not_found") => DriverError::NotFound(message),
            Some("timeout") => DriverError::Timeout {
                what: message,
                secs: timeout.as_secs(),
            },
            Some("unsupported") => DriverError::Unsupported(message),
            _ => DriverError::Backend(message),
        })
    }
}

struct BridgeIo {
    // Held so the helper is killed when the driver is dropped
    _child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

/// Driver that forwards every call to a helper process
pub struct BridgeDriver {
    label: String,
    io: Mutex<BridgeIo>,
    next_id: AtomicU64,
    request_timeout: Duration,
}

impl BridgeDriver {
    /// Spawn the helper and check that it answers
    pub async fn spawn(config: &BackendConfig) -> DriverResult<Self> {
        let program = config
            .command
            .as_deref()
            .ok_or_else(|| DriverError::Backend("backend.command is not set".to_string()))?;

        let mut child = Command::new(program)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DriverError::Backend(format!("failed to spawn {}: {}", program, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| DriverError::Backend("helper stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| DriverError::Backend("helper stdout unavailable".to_string()))?;

        let driver = Self {
            label: program.to_string(),
            io: Mutex::new(BridgeIo {
                _child: child,
                stdin,
                stdout: BufReader::new(stdout).lines(),
            }),
            next_id: AtomicU64::new(1),
            request_timeout: config.request_timeout(),
        };

        driver.call(Request::Ping).await?;
        info!("UI backend {} is ready", driver.label);
        Ok(driver)
    }

    /// Send one request and wait for its reply. The deadline is the request
    /// timeout plus whatever wait the request asks the helper to spend.
    async fn call(&self, request: Request<'_>) -> DriverResult<serde_json::Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let deadline = self.request_timeout.saturating_add(request.wait());
        let mut line = serde_json::to_string(&Envelope { id, request })
            .map_err(|e| DriverError::Backend(format!("cannot encode request: {}", e)))?;
        line.push('\n');

        let mut io = self.io.lock().await;
        io.stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| DriverError::Backend(format!("helper stdin closed: {}", e)))?;
        io.stdin
            .flush()
            .await
            .map_err(|e| DriverError::Backend(format!("helper stdin closed: {}", e)))?;

        loop {
            let next = tokio::time::timeout(deadline, io.stdout.next_line())
                .await
                .map_err(|_| DriverError::Timeout {
                    what: format!("backend reply to request {}", id),
                    secs: deadline.as_secs(),
                })?
                .map_err(|e| DriverError::Backend(format!("helper stdout: {}", e)))?;

            let Some(reply) = next else {
                return Err(DriverError::Backend("helper exited".to_string()));
            };

            let response: Response = match serde_json::from_str(&reply) {
                Ok(response) => response,
                Err(e) => {
                    warn!("Ignoring unparseable helper output '{}': {}", reply, e);
                    continue;
                }
            };

            if response.id != id {
                debug!("Discarding stale reply {} while waiting for {}", response.id, id);
                continue;
            }
            return response.into_result(deadline);
        }
    }

    async fn call_unit(&self, request: Request<'_>) -> DriverResult<()> {
        self.call(request).await.map(|_| ())
    }

    async fn call_bool(&self, request: Request<'_>) -> DriverResult<bool> {
        let value = self.call(request).await?;
        value
            .as_bool()
            .ok_or_else(|| DriverError::Backend(format!("expected a boolean reply, got {}", value)))
    }
}

fn ms(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

#[async_trait]
impl Driver for BridgeDriver {
    fn name(&self) -> &str {
        &self.label
    }

    async fn click(&self, target: &Target, kind: ClickKind, wait: Duration) -> DriverResult<()> {
        self.call_unit(Request::Click {
            target,
            kind,
            wait_ms: ms(wait),
        })
        .await
    }

    async fn hover(&self, target: &Target, wait: Duration) -> DriverResult<()> {
        self.call_unit(Request::Hover {
            target,
            wait_ms: ms(wait),
        })
        .await
    }

    async fn write(&self, target: &Target, text: &str, wait: Duration) -> DriverResult<()> {
        self.call_unit(Request::Write {
            target,
            text,
            wait_ms: ms(wait),
        })
        .await
    }

    async fn set_checked(&self, target: &Target, checked: bool, wait: Duration) -> DriverResult<()> {
        self.call_unit(Request::SetChecked {
            target,
            checked,
            wait_ms: ms(wait),
        })
        .await
    }

    async fn drag(&self, target: &Target, wait: Duration) -> DriverResult<()> {
        self.call_unit(Request::Drag {
            target,
            wait_ms: ms(wait),
        })
        .await
    }

    async fn drop_on(&self, target: &Target, wait: Duration) -> DriverResult<()> {
        self.call_unit(Request::Drop {
            target,
            wait_ms: ms(wait),
        })
        .await
    }

    async fn exists(&self, target: &Target, wait: Duration) -> DriverResult<bool> {
        self.call_bool(Request::Exists {
            target,
            wait_ms: ms(wait),
        })
        .await
    }

    async fn is_enabled(&self, target: &Target, wait: Duration) -> DriverResult<bool> {
        self.call_bool(Request::IsEnabled {
            target,
            wait_ms: ms(wait),
        })
        .await
    }

    async fn element_name(&self, target: &Target, wait: Duration) -> DriverResult<String> {
        let value = self
            .call(Request::ElementName {
                target,
                wait_ms: ms(wait),
            })
            .await?;
        match value {
            serde_json::Value::String(name) => Ok(name),
            other => Err(DriverError::Backend(format!(
                "expected a string reply, got {}",
                other
            ))),
        }
    }

    async fn wait_for(
        &self,
        target: &Target,
        condition: WaitCondition,
        timeout: Duration,
    ) -> DriverResult<bool> {
        self.call_bool(Request::WaitFor {
            target,
            condition,
            timeout_ms: ms(timeout),
        })
        .await
    }

    async fn type_text(&self, text: &str) -> DriverResult<()> {
        self.call_unit(Request::TypeText { text }).await
    }

    async fn paste(&self, text: &str) -> DriverResult<()> {
        self.call_unit(Request::Paste { text }).await
    }

    async fn press_keys(&self, keys: &[String]) -> DriverResult<()> {
        self.call_unit(Request::PressKeys { keys }).await
    }

    async fn clear(&self) -> DriverResult<()> {
        self.call_unit(Request::Clear).await
    }

    async fn scroll(&self, steps: i64) -> DriverResult<()> {
        self.call_unit(Request::Scroll { steps }).await
    }

    async fn window(
        &self,
        op: WindowOp,
        scope: WindowScope,
        title: &str,
        wait: Duration,
    ) -> DriverResult<()> {
        self.call_unit(Request::Window {
            action: op,
            scope,
            title,
            wait_ms: ms(wait),
        })
        .await
    }

    async fn set_root_search(&self, enabled: bool) -> DriverResult<()> {
        self.call_unit(Request::SetRootSearch { enabled }).await
    }

    async fn launch(&self, program: &str) -> DriverResult<()> {
        self.call_unit(Request::Launch { program }).await
    }

    async fn close_application(&self, program: &str) -> DriverResult<()> {
        self.call_unit(Request::CloseApplication { program }).await
    }

    async fn open_url(&self, url: &str) -> DriverResult<()> {
        self.call_unit(Request::OpenUrl { url }).await
    }

    async fn capture(&self, command: &CaptureCommand) -> DriverResult<()> {
        self.call_unit(Request::Capture { capture: command }).await
    }

    async fn screenshot(&self, path: &Path) -> DriverResult<()> {
        self.call_unit(Request::Screenshot { path }).await
    }

    async fn release_all(&self) -> DriverResult<()> {
        self.call_unit(Request::ReleaseAll).await
    }
}
