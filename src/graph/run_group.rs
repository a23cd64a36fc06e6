// src/graph/run_group.rs

//! A simulation run plus its pre- and post-processing function calls.
//!
//! Node names:
//! - `run_<group>` for the run itself,
//! - `pre_processor_<group>_<i>` (the run waits for these),
//! - `post_processor_<group>_<i>` (these wait for the run).

use tracing::debug;

use crate::errors::Result;
use crate::graph::names::NameAllocator;
use crate::graph::node::NodeKind;
use crate::graph::run_graph::RunGraph;
use crate::run::setup::RunSetup;
use crate::submit::{FunctionCall, LocalSubmitter, Submitter};

pub struct RunGroup<'g> {
    graph: &'g mut RunGraph,
    name: String,
    run_node: String,
    pre: Vec<String>,
    post: Vec<String>,
}

impl<'g> RunGroup<'g> {
    /// Add the run node of a new group to `graph`.
    pub fn new(
        graph: &'g mut RunGraph,
        names: &mut NameAllocator,
        requested: Option<&str>,
        setup: RunSetup,
        submitter: Submitter,
    ) -> Self {
        let name = names.group_name(requested);
        let run_node = format!("run_{name}");
        graph.add_node(run_node.clone(), NodeKind::BatchRun(setup), submitter);
        debug!(group = %name, node = %run_node, "run group created");
        Self {
            graph,
            name,
            run_node,
            pre: Vec::new(),
            post: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn run_node(&self) -> &str {
        &self.run_node
    }

    pub fn pre_processors(&self) -> &[String] {
        &self.pre
    }

    pub fn post_processors(&self) -> &[String] {
        &self.post
    }

    /// A function the run waits for. Runs locally unless a submitter is given.
    pub fn add_pre_processor(
        &mut self,
        call: FunctionCall,
        submitter: Option<Submitter>,
    ) -> Result<String> {
        let node = format!("pre_processor_{}_{}", self.name, self.pre.len());
        let submitter = submitter.unwrap_or_else(|| local_for(&call));
        self.graph
            .add_node(node.clone(), NodeKind::FunctionCall(call), submitter);
        self.graph.add_edge(&node, &self.run_node)?;
        self.pre.push(node.clone());
        Ok(node)
    }

    /// A function that waits for the run.
    pub fn add_post_processor(
        &mut self,
        call: FunctionCall,
        submitter: Option<Submitter>,
    ) -> Result<String> {
        let node = format!("post_processor_{}_{}", self.name, self.post.len());
        let submitter = submitter.unwrap_or_else(|| local_for(&call));
        self.graph
            .add_node(node.clone(), NodeKind::FunctionCall(call), submitter);
        self.graph.add_edge(&self.run_node, &node)?;
        self.post.push(node.clone());
        Ok(node)
    }

    /// Make the whole group wait for `deps` (nodes outside the group).
    pub fn add_waiting_for<I, S>(&mut self, deps: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let deps: Vec<String> = deps.into_iter().map(|d| d.as_ref().to_string()).collect();
        // The run already waits for its pre-processors.
        let entry_points = if self.pre.is_empty() {
            vec![self.run_node.clone()]
        } else {
            self.pre.clone()
        };
        for node in &entry_points {
            self.graph.add_waiting_for(node, &deps)?;
        }
        Ok(())
    }
}

fn local_for(call: &FunctionCall) -> Submitter {
    Submitter::Local(LocalSubmitter::new(&call.script_dir))
}
