// src/graph/from_config.rs

//! Building a [`RunGraph`] from a validated [`ConfigFile`].

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, FunctionConfig, RunConfig};
use crate::errors::Result;
use crate::graph::node::NodeKind;
use crate::graph::run_graph::RunGraph;
use crate::run::setup::RunSetup;
use crate::submit::script::json_from_toml;
use crate::submit::{FunctionCall, SubmitterSpec};

impl RunGraph {
    /// One node per `[run.X]` and `[function.Y]`, with an edge from every
    /// `after` entry to its node.
    ///
    /// Relative paths in the config are resolved against the current
    /// directory; job scripts run from the queue's working directory.
    pub fn from_config(cfg: &ConfigFile) -> Result<RunGraph> {
        let cwd = std::env::current_dir()?;
        let mut graph = RunGraph::new();

        for (name, run) in &cfg.run {
            let spec = resolved_spec(cfg.submitter_spec(run.submitter.as_ref())?, &cwd);
            let setup = run_setup(run, &spec, &cwd);
            let submitter = spec.build(name, &cwd);
            graph.add_node(name.clone(), NodeKind::BatchRun(setup), submitter);
        }

        for (name, func) in &cfg.function {
            let spec = resolved_spec(cfg.submitter_spec(func.submitter.as_ref())?, &cwd);
            let call = function_call(func, &cwd);
            let submitter = spec.build(name, &call.script_dir);
            graph.add_node(name.clone(), NodeKind::FunctionCall(call), submitter);
        }

        for name in cfg.node_names() {
            let deps = cfg.dependencies_of(name);
            if !deps.is_empty() {
                debug!(node = %name, deps = ?deps, "wiring dependencies");
                graph.add_waiting_for(name, deps)?;
            }
        }

        Ok(graph)
    }
}

fn run_setup(run: &RunConfig, spec: &SubmitterSpec, cwd: &Path) -> RunSetup {
    let mut setup = RunSetup::new(absolute(cwd, &run.project), absolute(cwd, &run.destination));
    for (section, values) in &run.parameters {
        for (key, value) in values {
            setup.set_parameter(section, key, json_from_toml(value));
        }
    }
    if let Some(launcher) = &run.launcher {
        setup.launcher = launcher.clone();
    }
    if let Some(log_file) = &run.log_file {
        setup.log_file = log_file.clone();
    }
    setup.split = spec.split;
    setup.input_files = run.input_files.iter().map(|f| absolute(cwd, f)).collect();
    setup.restart_from = run.restart_from.as_ref().map(|dir| absolute(cwd, dir));
    setup
}

fn resolved_spec(mut spec: SubmitterSpec, cwd: &Path) -> SubmitterSpec {
    spec.store_dir = absolute(cwd, &spec.store_dir);
    spec
}

fn absolute(cwd: &Path, path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

fn function_call(func: &FunctionConfig, cwd: &Path) -> FunctionCall {
    let mut call = FunctionCall::new(&func.module, &func.function, absolute(cwd, &func.script_dir))
        .with_args(func.args.iter().map(json_from_toml).collect())
        .with_kwargs(
            func.kwargs
                .iter()
                .map(|(k, v)| (k.clone(), json_from_toml(v)))
                .collect(),
        )
        .with_search_path(cwd);
    call.interpreter = func.interpreter.clone();
    call
}
