// src/errors.rs

//! Crate-wide error type and result alias.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimrunnerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Cycle detected in DAG: {0}")]
    DagCycle(String),

    /// An edge `from -> to` was rejected because it would close a cycle.
    #[error("adding edge '{from}' -> '{to}' would create a cycle")]
    GraphCycle { from: String, to: String },

    #[error("{}", exhausted_message(.total_nodes))]
    GraphExhausted { total_nodes: usize },

    #[error("Submission error: {0}")]
    Submission(String),

    #[error("job '{job}' failed with return code {}", fmt_code(.return_code))]
    RuntimeFailure {
        job: String,
        return_code: Option<i32>,
    },

    #[error("timed out after {0:?} waiting for job")]
    Timeout(Duration),

    #[error("cancelled")]
    Cancelled,

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn exhausted_message(total_nodes: &usize) -> String {
    if *total_nodes == 0 {
        "the run graph is empty; add nodes before running".to_string()
    } else {
        format!(
            "all {total_nodes} nodes of the run graph have already been traversed; \
             reset the graph (or use force / restart_all) to run again"
        )
    }
}

fn fmt_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => c.to_string(),
        None => "none (job left the queue without running)".to_string(),
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SimrunnerError>;
