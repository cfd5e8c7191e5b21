//! Terminal-export bar source.
//!
//! Some deployments cannot query the operational database and instead lean
//! on the trading terminal's own export: an out-of-process desktop
//! application is poked (key chord, script, whatever the platform offers)
//! and some time later a delimited file appears at a known path. There is no
//! completion signal, so the wait is fixed-delay polling bounded by a
//! timeout, a known fragility, which is why it lives behind the
//! [`ExportTrigger`] trait instead of inside the orchestrator.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use market_snapshot::bar::Bar;
use market_snapshot::reader::read_snapshot;
use market_snapshot::timestamp::OffsetPolicy;
use tracing::{debug, info, warn};

use crate::source::{BarSource, SourceError};

/// Collaborator that kicks an external export and waits for its side effect.
#[async_trait]
pub trait ExportTrigger: Send + Sync {
    /// Triggers the export and waits up to `timeout` for the file to appear.
    ///
    /// Returns `Ok(true)` when the export is believed complete, `Ok(false)`
    /// when the timeout lapsed without a file.
    async fn trigger(&self, timeout: Duration) -> Result<bool, SourceError>;
}

/// Trigger that spawns a configured command (typically a desktop-automation
/// helper sending the terminal its export key chord) and polls for the
/// export file at a fixed interval.
pub struct CommandTrigger {
    command: Vec<String>,
    export_path: PathBuf,
    poll_interval: Duration,
}

impl CommandTrigger {
    /// `command` is the program plus its arguments; `export_path` is where
    /// the external application drops the file.
    pub fn new(command: Vec<String>, export_path: PathBuf, poll_interval: Duration) -> Self {
        Self {
            command,
            export_path,
            poll_interval,
        }
    }
}

#[async_trait]
impl ExportTrigger for CommandTrigger {
    async fn trigger(&self, timeout: Duration) -> Result<bool, SourceError> {
        // Drop any stale file so only a fresh export counts.
        if self.export_path.exists() {
            let _ = std::fs::remove_file(&self.export_path);
        }

        let (program, args) = self
            .command
            .split_first()
            .ok_or_else(|| SourceError::Export("empty trigger command".to_string()))?;

        let status = tokio::process::Command::new(program)
            .args(args)
            .status()
            .await
            .map_err(|e| SourceError::Export(format!("trigger command failed to start: {e}")))?;
        if !status.success() {
            return Err(SourceError::Export(format!(
                "trigger command exited with {status}"
            )));
        }

        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if self.export_path.exists() {
                return Ok(true);
            }
            debug!(path = %self.export_path.display(), "export not present yet");
            tokio::time::sleep(self.poll_interval).await;
        }
        Ok(false)
    }
}

/// Bar source reading the file produced by an [`ExportTrigger`].
pub struct ExportFileSource<T> {
    trigger: T,
    export_path: PathBuf,
    timeout: Duration,
}

impl<T: ExportTrigger> ExportFileSource<T> {
    /// Creates a source that triggers an export and reads `export_path`.
    pub fn new(trigger: T, export_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            trigger,
            export_path: export_path.into(),
            timeout,
        }
    }

    fn read_export(&self, cutoff: Option<NaiveDateTime>) -> Result<Vec<Bar>, SourceError> {
        let snapshot = read_snapshot(&self.export_path, OffsetPolicy::Strip)?
            .ok_or_else(|| missing_file(&self.export_path))?;

        let total = snapshot.len();
        let bars: Vec<Bar> = match cutoff {
            Some(cutoff) => snapshot
                .bars
                .into_iter()
                .filter(|b| b.timestamp > cutoff)
                .collect(),
            None => snapshot.bars,
        };
        info!(total, fresh = bars.len(), "read terminal export");
        Ok(bars)
    }
}

fn missing_file(path: &Path) -> SourceError {
    SourceError::Export(format!("no export file at {}", path.display()))
}

#[async_trait]
impl<T: ExportTrigger> BarSource for ExportFileSource<T> {
    async fn fetch_since(&self, cutoff: Option<NaiveDateTime>) -> Result<Vec<Bar>, SourceError> {
        if !self.trigger.trigger(self.timeout).await? {
            warn!(timeout = ?self.timeout, "export trigger timed out");
            return Err(SourceError::Export(format!(
                "export did not appear at {} within {:?}",
                self.export_path.display(),
                self.timeout
            )));
        }
        self.read_export(cutoff)
    }
}
