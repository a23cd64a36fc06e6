// src/graph/node.rs

use crate::run::setup::RunSetup;
use crate::submit::{FunctionCall, Submitter};
use crate::types::NodeStatus;

/// What a node does when dispatched.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// One simulation run.
    BatchRun(RunSetup),
    /// A Python function run as a script (pre/post processing).
    FunctionCall(FunctionCall),
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::BatchRun(_) => "batch-run",
            NodeKind::FunctionCall(_) => "function-call",
        }
    }
}

/// A unit of work in the run graph. Owns the submitter that executes it.
#[derive(Debug)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub status: NodeStatus,
    pub submitter: Submitter,
}

impl Node {
    pub fn new(name: impl Into<String>, kind: NodeKind, submitter: Submitter) -> Self {
        Self {
            name: name.into(),
            kind,
            status: NodeStatus::Ready,
            submitter,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == NodeStatus::Ready
    }
}
