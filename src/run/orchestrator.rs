// src/run/orchestrator.rs

//! Wave-by-wave execution of a run graph.
//!
//! Each step takes the next wave from the graph, dispatches every node of
//! it through the node's own submitter, then polls the whole wave until
//! every job is terminal. Failures are recorded as graph status changes; the
//! failed node's dependents are never dispatched.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::build::Build;
use crate::errors::{Result, SimrunnerError};
use crate::graph::names::NameAllocator;
use crate::graph::node::NodeKind;
use crate::graph::run_graph::RunGraph;
use crate::metadata::{MetadataRecorder, MetadataStore, RUN_TABLE, StatusChecker};
use crate::run::restart::prepare_restart;
use crate::submit::CancelToken;
use crate::types::{NodeStatus, RunStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Restart every batch run from its previous output.
    pub restart_all: bool,
    /// Resubmit even when an identical run is already recorded.
    pub force: bool,
    /// Stop at the first failure instead of only skipping its dependents.
    pub raise_errors: bool,
    /// Pause between polls of an in-flight wave.
    pub wait_interval: Duration,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            restart_all: false,
            force: false,
            raise_errors: false,
            wait_interval: Duration::from_secs(5),
        }
    }
}

/// What happened to each node during one `run`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Finished with return code 0.
    pub completed: Vec<String>,
    /// Batch runs already recorded; nothing was submitted.
    pub skipped: Vec<String>,
    /// Failed, or never dispatched because something upstream failed.
    pub errored: Vec<String>,
}

enum Dispatched {
    Submitted { run_id: Option<i64> },
    Skipped,
}

struct InFlight {
    name: String,
    run_id: Option<i64>,
}

pub struct Orchestrator {
    graph: RunGraph,
    store: Box<dyn MetadataStore + Send>,
    build: Box<dyn Build + Send>,
    recorder: MetadataRecorder,
    status: StatusChecker,
    names: NameAllocator,
    cancel: CancelToken,
}

impl Orchestrator {
    pub fn new(
        graph: RunGraph,
        store: Box<dyn MetadataStore + Send>,
        build: Box<dyn Build + Send>,
    ) -> Self {
        Self {
            graph,
            store,
            build,
            recorder: MetadataRecorder::default(),
            status: StatusChecker::default(),
            names: NameAllocator::new(),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_recorder(mut self, recorder: MetadataRecorder) -> Self {
        self.recorder = recorder;
        self
    }

    pub fn with_status_checker(mut self, status: StatusChecker) -> Self {
        self.status = status;
        self
    }

    pub fn with_names(mut self, names: NameAllocator) -> Self {
        self.names = names;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops the monitor loop at its next tick. Jobs already
    /// submitted keep running.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn graph(&self) -> &RunGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut RunGraph {
        &mut self.graph
    }

    pub fn store(&self) -> &dyn MetadataStore {
        self.store.as_ref()
    }

    /// Make every node Ready again and forget previous submissions.
    pub fn reset(&mut self) {
        self.graph.reset();
        for node in self.graph.nodes_mut() {
            node.submitter.reset();
        }
    }

    /// Execute every Ready node, wave by wave.
    pub fn run(&mut self, opts: RunOptions) -> Result<RunReport> {
        if opts.force || opts.restart_all {
            self.reset();
        }
        if self.graph.len() == 0 {
            return Err(SimrunnerError::GraphExhausted {
                total_nodes: self.graph.total_nodes(),
            });
        }

        let mut report = RunReport::default();
        let mut wave_no = 0usize;

        loop {
            if self.cancel.is_cancelled() {
                return Err(SimrunnerError::Cancelled);
            }

            let wave = self.graph.next_wave();
            if wave.is_empty() {
                break;
            }
            info!(wave = wave_no, nodes = ?wave, "dispatching wave");

            let mut in_flight = Vec::with_capacity(wave.len());
            for name in wave {
                match self.dispatch(&name, &opts) {
                    Ok(Dispatched::Submitted { run_id }) => in_flight.push(InFlight { name, run_id }),
                    Ok(Dispatched::Skipped) => report.skipped.push(name),
                    Err(e) => {
                        error!(node = %name, error = %e, "dispatch failed");
                        self.mark_failed(&name, &mut report)?;
                        if opts.raise_errors {
                            return Err(e);
                        }
                    }
                }
            }

            self.monitor(in_flight, &opts, &mut report)?;
            wave_no += 1;
        }

        info!(
            completed = report.completed.len(),
            skipped = report.skipped.len(),
            errored = report.errored.len(),
            "run graph finished"
        );
        Ok(report)
    }

    fn dispatch(&mut self, name: &str, opts: &RunOptions) -> Result<Dispatched> {
        let node = self
            .graph
            .node_mut(name)
            .ok_or_else(|| SimrunnerError::NodeNotFound(name.to_string()))?;

        match &node.kind {
            NodeKind::FunctionCall(call) => {
                let script = call.write_script(name)?;
                let command = call.command(&script);
                let handle = node.submitter.submit(&command)?;
                debug!(node = %name, handle = %handle, "function call submitted");
                Ok(Dispatched::Submitted { run_id: None })
            }
            NodeKind::BatchRun(setup) => {
                // restart_all continues the chain from the newest restart
                // directory this node ran in.
                let source = match (&setup.last_restart, &setup.restart_from, opts.restart_all) {
                    (Some(latest), _, true) if latest.is_dir() => Some(latest.clone()),
                    (_, Some(src), _) => Some(src.clone()),
                    (_, None, true) if setup.destination.is_dir() => {
                        Some(setup.destination.clone())
                    }
                    (_, None, true) => {
                        warn!(node = %name, "nothing to restart from; starting fresh");
                        None
                    }
                    (_, None, false) => None,
                };

                let (effective, restart) = match source {
                    Some(src) => (prepare_restart(setup, &src, &mut self.names)?, true),
                    None => (setup.clone(), false),
                };

                let captured = self.recorder.capture_new_data_from_run(
                    self.store.as_mut(),
                    &effective,
                    restart,
                    opts.force,
                )?;
                if captured.existing && !opts.force {
                    info!(node = %name, run_id = captured.run_id, "run already recorded; skipping");
                    return Ok(Dispatched::Skipped);
                }

                let submitted = self
                    .build
                    .ensure_built(&effective.project)
                    .and_then(|exec| {
                        if !restart {
                            effective.prepare_destination()?;
                        }
                        Ok(effective.command(&exec))
                    })
                    .and_then(|command| node.submitter.submit(&command));

                match submitted {
                    Ok(handle) => {
                        info!(
                            node = %name,
                            backend = node.submitter.backend_name(),
                            handle = %handle,
                            run_id = captured.run_id,
                            destination = %effective.destination.display(),
                            "run submitted"
                        );
                        if restart {
                            if let NodeKind::BatchRun(setup) = &mut node.kind {
                                setup.last_restart = Some(effective.destination.clone());
                            }
                        }
                        Ok(Dispatched::Submitted {
                            run_id: Some(captured.run_id),
                        })
                    }
                    Err(e) => {
                        self.store.update(
                            RUN_TABLE,
                            captured.run_id,
                            "latest_status",
                            Value::String(RunStatus::Error.to_string()),
                        )?;
                        Err(e)
                    }
                }
            }
        }
    }

    fn monitor(
        &mut self,
        mut pending: Vec<InFlight>,
        opts: &RunOptions,
        report: &mut RunReport,
    ) -> Result<()> {
        while !pending.is_empty() {
            if self.cancel.is_cancelled() {
                return Err(SimrunnerError::Cancelled);
            }

            let mut still_running = Vec::with_capacity(pending.len());
            for job in pending {
                let node = self
                    .graph
                    .node_mut(&job.name)
                    .ok_or_else(|| SimrunnerError::NodeNotFound(job.name.clone()))?;

                let done = node.submitter.completed()?;
                if let Some(run_id) = job.run_id {
                    if let Err(e) = self.status.refresh(self.store.as_mut(), run_id) {
                        warn!(node = %job.name, run_id, error = %e, "status refresh failed");
                    }
                }
                if !done {
                    still_running.push(job);
                    continue;
                }

                if node.submitter.errored()? {
                    let return_code = node.submitter.return_code();
                    self.mark_failed(&job.name, report)?;
                    if opts.raise_errors {
                        return Err(SimrunnerError::RuntimeFailure {
                            job: job.name,
                            return_code,
                        });
                    }
                } else {
                    debug!(node = %job.name, "node completed");
                    report.completed.push(job.name);
                }
            }

            pending = still_running;
            if !pending.is_empty() {
                std::thread::sleep(opts.wait_interval);
            }
        }
        Ok(())
    }

    fn mark_failed(&mut self, name: &str, report: &mut RunReport) -> Result<()> {
        let affected = self.graph.get_waiting_for_tuple(name)?;
        self.graph
            .change_status_and_dependencies(name, NodeStatus::Errored)?;
        if affected.len() > 1 {
            warn!(node = %name, skipped = ?&affected[1..], "dependents will not run");
        }
        for node in affected {
            if !report.errored.contains(&node) {
                report.errored.push(node);
            }
        }
        Ok(())
    }
}
