// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::errors::{Result, SimrunnerError};
use crate::submit::{ProcessorSplit, SubmitterSpec, Walltime};
use crate::types::SubmitterKind;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// wait_interval = "5s"
///
/// [submitter]
/// kind = "slurm"
/// walltime = "0-01:00:00"
///
/// [run.base]
/// project = "conduction"
/// destination = "runs/base"
/// parameters = { global = { nout = 5 }, conduction = { chi = 1.0 } }
///
/// [function.plot]
/// module = "analysis"
/// function = "plot"
/// after = ["base"]
/// ```
///
/// `[run.X]` and `[function.Y]` become graph nodes `X` and `Y`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// Default submitter for every node.
    #[serde(default)]
    pub submitter: SubmitterSection,

    #[serde(default)]
    pub run: BTreeMap<String, RunConfig>,

    #[serde(default)]
    pub function: BTreeMap<String, FunctionConfig>,
}

/// A validated configuration. Only obtainable through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub submitter: SubmitterSection,
    pub run: BTreeMap<String, RunConfig>,
    pub function: BTreeMap<String, FunctionConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            config: raw.config,
            submitter: raw.submitter,
            run: raw.run,
            function: raw.function,
        }
    }

    /// Names of all nodes, runs first.
    pub fn node_names(&self) -> impl Iterator<Item = &str> {
        self.run.keys().chain(self.function.keys()).map(|s| s.as_str())
    }

    /// `after` list of a node.
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        if let Some(run) = self.run.get(name) {
            return &run.after;
        }
        self.function
            .get(name)
            .map(|f| f.after.as_slice())
            .unwrap_or(&[])
    }

    /// Submitter spec for a node, with its override applied on top of
    /// `[submitter]`.
    pub fn submitter_spec(&self, node_override: Option<&SubmitterSection>) -> Result<SubmitterSpec> {
        match node_override {
            Some(o) => self.submitter.merged(o).to_spec(),
            None => self.submitter.to_spec(),
        }
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Pause between polls of a running wave (`"500ms"`, `"5s"`, `"1m"`).
    #[serde(default = "default_wait_interval")]
    pub wait_interval: String,

    /// JSON file holding run metadata.
    #[serde(default = "default_database")]
    pub database: String,

    #[serde(default)]
    pub restart_all: bool,

    #[serde(default)]
    pub force: bool,

    #[serde(default)]
    pub raise_errors: bool,
}

fn default_wait_interval() -> String {
    "5s".to_string()
}

fn default_database() -> String {
    "simrunner.json".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            wait_interval: default_wait_interval(),
            database: default_database(),
            restart_all: false,
            force: false,
            raise_errors: false,
        }
    }
}

impl ConfigSection {
    pub fn wait_interval(&self) -> Result<Duration> {
        parse_duration(&self.wait_interval).map_err(|e| {
            SimrunnerError::ConfigError(format!("[config].wait_interval: {e}"))
        })
    }
}

/// `[submitter]` section, also used as a per-node `submitter = { ... }`
/// override. Every field is optional so an override only names what
/// changes.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct SubmitterSection {
    #[serde(default)]
    pub kind: Option<SubmitterKind>,
    #[serde(default)]
    pub store_dir: Option<String>,
    #[serde(default)]
    pub walltime: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
    #[serde(default)]
    pub queue: Option<String>,
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(default)]
    pub processors: Option<u32>,
    #[serde(default)]
    pub nodes: Option<u32>,
    #[serde(default)]
    pub processors_per_node: Option<u32>,
}

impl SubmitterSection {
    /// `self` with every field set in `over` replaced.
    pub fn merged(&self, over: &SubmitterSection) -> SubmitterSection {
        SubmitterSection {
            kind: over.kind.or(self.kind),
            store_dir: over.store_dir.clone().or_else(|| self.store_dir.clone()),
            walltime: over.walltime.clone().or_else(|| self.walltime.clone()),
            account: over.account.clone().or_else(|| self.account.clone()),
            queue: over.queue.clone().or_else(|| self.queue.clone()),
            mail: over.mail.clone().or_else(|| self.mail.clone()),
            processors: over.processors.or(self.processors),
            nodes: over.nodes.or(self.nodes),
            processors_per_node: over.processors_per_node.or(self.processors_per_node),
        }
    }

    /// Validate into a [`SubmitterSpec`].
    ///
    /// Without `processors_per_node` the processors are spread evenly over
    /// the nodes.
    pub fn to_spec(&self) -> Result<SubmitterSpec> {
        let processors = self.processors.unwrap_or(1);
        let nodes = self.nodes.unwrap_or(1);
        let per_node = match self.processors_per_node {
            Some(p) => p,
            None if nodes > 0 => processors.div_ceil(nodes),
            None => 0,
        };
        let split = ProcessorSplit::new(processors, nodes, per_node)?;

        let walltime = self
            .walltime
            .as_deref()
            .map(str::parse::<Walltime>)
            .transpose()?;

        let defaults = SubmitterSpec::default();
        Ok(SubmitterSpec {
            kind: self.kind.unwrap_or_default(),
            split,
            store_dir: self
                .store_dir
                .as_ref()
                .map(PathBuf::from)
                .unwrap_or(defaults.store_dir),
            walltime,
            account: self.account.clone(),
            queue: self.queue.clone(),
            mail: self.mail.clone(),
        })
    }
}

/// `[run.<name>]` section: one simulation run.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Directory holding the simulation's makefile.
    pub project: String,

    /// Output directory of the run.
    pub destination: String,

    /// `section -> key -> value`; the `global` section is passed without a
    /// prefix.
    #[serde(default)]
    pub parameters: BTreeMap<String, BTreeMap<String, toml::Value>>,

    /// Launcher template, `{processors}` is substituted.
    #[serde(default)]
    pub launcher: Option<String>,

    /// Files copied into the destination before the run.
    #[serde(default)]
    pub input_files: Vec<String>,

    #[serde(default)]
    pub restart_from: Option<String>,

    /// Run log inside the destination.
    #[serde(default)]
    pub log_file: Option<String>,

    #[serde(default)]
    pub after: Vec<String>,

    #[serde(default)]
    pub submitter: Option<SubmitterSection>,
}

/// `[function.<name>]` section: a Python function run as a script.
#[derive(Debug, Clone, Deserialize)]
pub struct FunctionConfig {
    pub module: String,
    pub function: String,

    #[serde(default)]
    pub args: Vec<toml::Value>,

    #[serde(default)]
    pub kwargs: BTreeMap<String, toml::Value>,

    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Where the generated script goes.
    #[serde(default = "default_script_dir")]
    pub script_dir: String,

    #[serde(default)]
    pub after: Vec<String>,

    #[serde(default)]
    pub submitter: Option<SubmitterSection>,
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_script_dir() -> String {
    "scripts".to_string()
}

/// Parse `"500ms"`, `"3s"`, `"2m"`, `"1h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}
