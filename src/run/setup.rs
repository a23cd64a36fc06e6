// src/run/setup.rs

//! Everything needed to launch one simulation run.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::metadata::Fields;
use crate::submit::ProcessorSplit;

/// Parameter section whose keys are rendered without a section prefix.
pub const GLOBAL_SECTION: &str = "global";

pub const DEFAULT_LAUNCHER: &str = "mpirun -np {processors}";
pub const DEFAULT_LOG_FILE: &str = "BOUT.log.0";

/// `section -> key -> value`.
pub type Parameters = BTreeMap<String, BTreeMap<String, Value>>;

#[derive(Debug, Clone, PartialEq)]
pub struct RunSetup {
    /// Directory with the makefile of the simulation program.
    pub project: PathBuf,
    /// Directory the run writes into.
    pub destination: PathBuf,
    pub parameters: Parameters,
    /// Launcher template; `{processors}` is substituted.
    pub launcher: String,
    pub split: ProcessorSplit,
    /// Copied into the destination before the run.
    pub input_files: Vec<PathBuf>,
    /// Continue from the output found here.
    pub restart_from: Option<PathBuf>,
    /// Name of the run log inside the destination.
    pub log_file: String,
    /// Destination of the latest submitted restart of this run.
    pub last_restart: Option<PathBuf>,
}

impl RunSetup {
    pub fn new(project: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            project: project.into(),
            destination: destination.into(),
            parameters: Parameters::new(),
            launcher: DEFAULT_LAUNCHER.to_string(),
            split: ProcessorSplit::default(),
            input_files: Vec::new(),
            restart_from: None,
            log_file: DEFAULT_LOG_FILE.to_string(),
            last_restart: None,
        }
    }

    pub fn with_parameter(
        mut self,
        section: &str,
        key: &str,
        value: impl Into<Value>,
    ) -> Self {
        self.set_parameter(section, key, value);
        self
    }

    pub fn set_parameter(&mut self, section: &str, key: &str, value: impl Into<Value>) {
        self.parameters
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }

    pub fn log_path(&self) -> PathBuf {
        self.destination.join(&self.log_file)
    }

    /// Shell command that runs `executable` from the project directory.
    pub fn command(&self, executable: &str) -> String {
        let launcher = self
            .launcher
            .replace("{processors}", &self.split.processors().to_string());
        let exec_path = self.project.join(executable);

        let mut cmd = format!(
            "{} {} -d {}",
            launcher.trim(),
            exec_path.display(),
            self.destination.display()
        );
        for arg in self.parameter_args() {
            cmd.push(' ');
            cmd.push_str(&arg);
        }
        cmd.trim_start().to_string()
    }

    /// `key=value` for the global section, `section.key=value` otherwise.
    pub fn parameter_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for (section, values) in &self.parameters {
            for (key, value) in values {
                let lhs = if section == GLOBAL_SECTION {
                    key.clone()
                } else {
                    format!("{section}.{key}")
                };
                args.push(format!("{lhs}={}", render_value(value)));
            }
        }
        args
    }

    /// Flattened parameters, the dedup key of the `parameters` table.
    pub fn parameter_fields(&self) -> Fields {
        let mut fields = Fields::new();
        for (section, values) in &self.parameters {
            for (key, value) in values {
                fields.insert(format!("{section}.{key}"), value.clone());
            }
        }
        fields
    }

    /// Create the destination and copy the input files into it.
    pub fn prepare_destination(&self) -> Result<()> {
        fs::create_dir_all(&self.destination)
            .with_context(|| format!("creating run directory {}", self.destination.display()))?;
        for input in &self.input_files {
            copy_into(input, &self.destination)?;
        }
        Ok(())
    }
}

fn render_value(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.is_empty() || text.contains(char::is_whitespace) || text.contains('\'') {
        format!("'{}'", text.replace('\'', r"'\''"))
    } else {
        text
    }
}

/// Copy `file` into `dir`, keeping its file name. Copying a file onto
/// itself is skipped.
pub(crate) fn copy_into(file: &Path, dir: &Path) -> Result<PathBuf> {
    let name = file
        .file_name()
        .with_context(|| format!("input {} has no file name", file.display()))?;
    let target = dir.join(name);
    if same_file(file, &target) {
        return Ok(target);
    }
    fs::copy(file, &target)
        .with_context(|| format!("copying {} to {}", file.display(), target.display()))?;
    debug!(from = %file.display(), to = %target.display(), "file copied");
    Ok(target)
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
