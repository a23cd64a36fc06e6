// src/metadata/status.rs

//! Advances the `latest_status` of recorded runs from their logs.
//!
//! Transitions:
//! - `submitted` / `created`: no log, nothing changes. Log without start
//!   marker: pid alive -> `running`, pid dead -> `error`, no pid ->
//!   `created`. Start marker: `start_time` is stored, then end marker ->
//!   `complete`, otherwise the same liveness rule.
//! - `running`: end marker -> `complete`; pid dead -> `error`; otherwise
//!   unchanged.
//! - `complete` / `error`: never touched.

use std::path::PathBuf;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::metadata::log_reader::{LogReader, LogSummary, MarkerLogReader};
use crate::metadata::{Fields, MetadataStore, RUN_TABLE};
use crate::run::setup::DEFAULT_LOG_FILE;
use crate::submit::LocalSubmitter;
use crate::types::RunStatus;

/// Liveness check for a process id.
pub trait ProcessLiveness {
    fn is_alive(&self, pid: u32) -> bool;
}

/// Checks with `kill -0 <pid>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct KillSignalCheck;

impl ProcessLiveness for KillSignalCheck {
    fn is_alive(&self, pid: u32) -> bool {
        let mut checker = LocalSubmitter::new(".");
        match checker.submit_and_wait(&format!("kill -0 {pid}")) {
            Ok(record) => record.return_code == Some(0),
            Err(e) => {
                warn!(pid, error = %e, "liveness check failed");
                false
            }
        }
    }
}

pub struct StatusChecker {
    reader: Box<dyn LogReader + Send>,
    liveness: Box<dyn ProcessLiveness + Send>,
}

impl Default for StatusChecker {
    fn default() -> Self {
        Self::new(Box::new(MarkerLogReader), Box::new(KillSignalCheck))
    }
}

impl std::fmt::Debug for StatusChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusChecker").finish_non_exhaustive()
    }
}

impl StatusChecker {
    pub fn new(reader: Box<dyn LogReader + Send>, liveness: Box<dyn ProcessLiveness + Send>) -> Self {
        Self { reader, liveness }
    }

    /// Bring one run row up to date and return its status.
    ///
    /// Unknown run ids and rows without a readable status are left alone
    /// and reported as `None`.
    pub fn refresh(&self, store: &mut dyn MetadataStore, run_id: i64) -> Result<Option<RunStatus>> {
        let Some(row) = store.get(RUN_TABLE, run_id)? else {
            warn!(run_id, "no such run row");
            return Ok(None);
        };
        let Some(current) = row
            .get("latest_status")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<RunStatus>().ok())
        else {
            warn!(run_id, "run row has no valid latest_status");
            return Ok(None);
        };

        if current.is_terminal() {
            return Ok(Some(current));
        }

        let log = log_path(&row);
        if !log.is_file() {
            return Ok(Some(current));
        }
        let summary = self.reader.parse(&log)?;

        let next = self.next_status(current, &summary);

        if summary.started && row.get("start_time").is_none_or(Value::is_null) {
            if let Some(t) = &summary.start_time {
                store.update(RUN_TABLE, run_id, "start_time", Value::String(t.clone()))?;
            }
        }
        if next == RunStatus::Complete {
            if let Some(t) = &summary.end_time {
                store.update(RUN_TABLE, run_id, "stop_time", Value::String(t.clone()))?;
            }
        }
        if next != current {
            store.update(RUN_TABLE, run_id, "latest_status", Value::String(next.to_string()))?;
            info!(run_id, from = %current, to = %next, "run status changed");
        } else {
            debug!(run_id, status = %current, "run status unchanged");
        }

        Ok(Some(next))
    }

    /// Refresh every run that is not terminal yet.
    pub fn check_all(&self, store: &mut dyn MetadataStore) -> Result<Vec<(i64, RunStatus)>> {
        let ids: Vec<i64> = store
            .rows(RUN_TABLE)?
            .into_iter()
            .filter(|(_, row)| {
                row.get("latest_status")
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse::<RunStatus>().ok())
                    .is_some_and(|s| !s.is_terminal())
            })
            .map(|(id, _)| id)
            .collect();

        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(status) = self.refresh(store, id)? {
                out.push((id, status));
            }
        }
        Ok(out)
    }

    fn next_status(&self, current: RunStatus, summary: &LogSummary) -> RunStatus {
        match current {
            RunStatus::Submitted | RunStatus::Created => {
                if summary.started && summary.ended {
                    RunStatus::Complete
                } else {
                    self.liveness(summary.pid, RunStatus::Created)
                }
            }
            RunStatus::Running => {
                if summary.ended {
                    RunStatus::Complete
                } else {
                    self.liveness(summary.pid, RunStatus::Running)
                }
            }
            terminal => terminal,
        }
    }

    /// `running` / `error` from the pid, `no_pid` when the log has none.
    fn liveness(&self, pid: Option<u32>, no_pid: RunStatus) -> RunStatus {
        match pid {
            Some(pid) if self.liveness.is_alive(pid) => RunStatus::Running,
            Some(_) => RunStatus::Error,
            None => no_pid,
        }
    }
}

fn log_path(row: &Fields) -> PathBuf {
    let destination = row
        .get("destination")
        .and_then(Value::as_str)
        .unwrap_or(".");
    let log_file = row
        .get("log_file")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_LOG_FILE);
    PathBuf::from(destination).join(log_file)
}
