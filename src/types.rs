use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Traversal state of a node in the run graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeStatus {
    /// Not yet dispatched in the current pass.
    Ready,
    /// Dispatched (or skipped as already done).
    Traversed,
    /// The node, or one of its ancestors, failed.
    Errored,
}

impl Default for NodeStatus {
    fn default() -> Self {
        NodeStatus::Ready
    }
}

/// Lifecycle status of a simulation run as recorded in the metadata store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Submitted,
    Created,
    Running,
    Complete,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Submitted => "submitted",
            RunStatus::Created => "created",
            RunStatus::Running => "running",
            RunStatus::Complete => "complete",
            RunStatus::Error => "error",
        }
    }

    /// `complete` and `error` are never left again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Complete | RunStatus::Error)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "submitted" => Ok(RunStatus::Submitted),
            "created" => Ok(RunStatus::Created),
            "running" => Ok(RunStatus::Running),
            "complete" => Ok(RunStatus::Complete),
            "error" => Ok(RunStatus::Error),
            other => Err(format!("invalid run status: {other}")),
        }
    }
}

/// Which backend executes a node's work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitterKind {
    Local,
    Pbs,
    Slurm,
}

impl Default for SubmitterKind {
    fn default() -> Self {
        SubmitterKind::Local
    }
}

impl FromStr for SubmitterKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(SubmitterKind::Local),
            "pbs" => Ok(SubmitterKind::Pbs),
            "slurm" => Ok(SubmitterKind::Slurm),
            other => Err(format!(
                "invalid submitter kind: {other} (expected \"local\", \"pbs\" or \"slurm\")"
            )),
        }
    }
}
