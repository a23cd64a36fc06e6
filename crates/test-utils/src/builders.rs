#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;

use simrunner::config::{
    ConfigFile, ConfigSection, FunctionConfig, RawConfigFile, RunConfig, SubmitterSection,
};
use simrunner::graph::{NodeKind, RunGraph};
use simrunner::run::RunSetup;
use simrunner::submit::{FunctionCall, LocalSubmitter, Submitter};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                submitter: SubmitterSection::default(),
                run: BTreeMap::new(),
                function: BTreeMap::new(),
            },
        }
    }

    pub fn with_run(mut self, name: &str, run: RunConfig) -> Self {
        self.config.run.insert(name.to_string(), run);
        self
    }

    pub fn with_function(mut self, name: &str, function: FunctionConfig) -> Self {
        self.config.function.insert(name.to_string(), function);
        self
    }

    pub fn with_submitter(mut self, submitter: SubmitterSection) -> Self {
        self.config.submitter = submitter;
        self
    }

    pub fn with_wait_interval(mut self, interval: &str) -> Self {
        self.config.config.wait_interval = interval.to_string();
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `RunConfig`.
pub struct RunConfigBuilder {
    run: RunConfig,
}

impl RunConfigBuilder {
    pub fn new(project: &str, destination: &str) -> Self {
        Self {
            run: RunConfig {
                project: project.to_string(),
                destination: destination.to_string(),
                parameters: BTreeMap::new(),
                launcher: None,
                input_files: vec![],
                restart_from: None,
                log_file: None,
                after: vec![],
                submitter: None,
            },
        }
    }

    pub fn param(mut self, section: &str, key: &str, value: impl Into<toml::Value>) -> Self {
        self.run
            .parameters
            .entry(section.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
        self
    }

    pub fn launcher(mut self, launcher: &str) -> Self {
        self.run.launcher = Some(launcher.to_string());
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.run.after.push(dep.to_string());
        self
    }

    pub fn submitter(mut self, submitter: SubmitterSection) -> Self {
        self.run.submitter = Some(submitter);
        self
    }

    pub fn build(self) -> RunConfig {
        self.run
    }
}

/// Builder for `FunctionConfig`.
pub struct FunctionConfigBuilder {
    function: FunctionConfig,
}

impl FunctionConfigBuilder {
    pub fn new(module: &str, function: &str) -> Self {
        Self {
            function: FunctionConfig {
                module: module.to_string(),
                function: function.to_string(),
                args: vec![],
                kwargs: BTreeMap::new(),
                interpreter: "python3".to_string(),
                script_dir: "scripts".to_string(),
                after: vec![],
                submitter: None,
            },
        }
    }

    pub fn arg(mut self, value: impl Into<toml::Value>) -> Self {
        self.function.args.push(value.into());
        self
    }

    pub fn kwarg(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.function.kwargs.insert(key.to_string(), value.into());
        self
    }

    pub fn script_dir(mut self, dir: &str) -> Self {
        self.function.script_dir = dir.to_string();
        self
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.function.after.push(dep.to_string());
        self
    }

    pub fn build(self) -> FunctionConfig {
        self.function
    }
}

/// Add a node that is never dispatched; enough for pure graph tests.
pub fn add_plain_node(graph: &mut RunGraph, name: &str) {
    let call = FunctionCall::new("noop", "noop", ".");
    graph.add_node(
        name,
        NodeKind::FunctionCall(call),
        Submitter::Local(LocalSubmitter::new(".")),
    );
}

/// Graph with one plain node per name and an edge for every `(from, to)`.
pub fn graph_with_edges(names: &[&str], edges: &[(&str, &str)]) -> RunGraph {
    let mut graph = RunGraph::new();
    for name in names {
        add_plain_node(&mut graph, name);
    }
    for (from, to) in edges {
        graph.add_edge(from, to).expect("edge should be accepted");
    }
    graph
}

/// A batch run of `project` into `destination` with no launcher, run by a
/// local submitter.
pub fn add_local_run(graph: &mut RunGraph, name: &str, project: &Path, destination: &Path) {
    let mut setup = RunSetup::new(project, destination);
    setup.launcher = String::new();
    graph.add_node(
        name,
        NodeKind::BatchRun(setup),
        Submitter::Local(LocalSubmitter::new(".")),
    );
}

/// Same as [`add_local_run`] with extra `global` parameters.
pub fn add_local_run_with(
    graph: &mut RunGraph,
    name: &str,
    project: &Path,
    destination: &Path,
    params: &[(&str, &str)],
) {
    let mut setup = RunSetup::new(project, destination);
    for (key, value) in params {
        setup.set_parameter("global", key, *value);
    }
    setup.launcher = String::new();
    graph.add_node(
        name,
        NodeKind::BatchRun(setup),
        Submitter::Local(LocalSubmitter::new(".")),
    );
}
