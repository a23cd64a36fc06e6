// src/graph/run_graph.rs

//! The run graph: an always-acyclic DAG of work units.
//!
//! Edge `u -> v` means "v waits for u". Nodes are never removed, so
//! `NodeIndex` order is insertion order and waves come out deterministic.

use std::collections::HashMap;

use petgraph::Direction;
use petgraph::algo::has_path_connecting;
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use tracing::{debug, warn};

use crate::errors::{Result, SimrunnerError};
use crate::graph::node::{Node, NodeKind};
use crate::submit::Submitter;
use crate::types::NodeStatus;

#[derive(Debug, Default)]
pub struct RunGraph {
    graph: DiGraph<Node, ()>,
    index: HashMap<String, NodeIndex>,
}

impl RunGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a Ready node. Re-adding a name replaces its payload and keeps
    /// its edges.
    pub fn add_node(&mut self, name: impl Into<String>, kind: NodeKind, submitter: Submitter) {
        let name = name.into();
        if let Some(&idx) = self.index.get(&name) {
            warn!(node = %name, "node already in run graph; overwriting its payload");
            let node = &mut self.graph[idx];
            node.kind = kind;
            node.submitter = submitter;
            node.status = NodeStatus::Ready;
            return;
        }

        let idx = self.graph.add_node(Node::new(name.clone(), kind, submitter));
        debug!(node = %name, "node added to run graph");
        self.index.insert(name, idx);
    }

    /// Add `from -> to` ("`to` waits for `from`").
    ///
    /// Self-edges and edges that would close a cycle are rejected and leave
    /// the graph unchanged. Adding an existing edge is a no-op.
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<()> {
        let u = self.idx(from)?;
        let v = self.idx(to)?;

        if u == v || has_path_connecting(&self.graph, v, u, None) {
            return Err(SimrunnerError::GraphCycle {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        self.graph.update_edge(u, v, ());
        Ok(())
    }

    /// Make `dependent` wait for every node in `deps`.
    ///
    /// Stops at the first rejected edge; edges added before it stay.
    pub fn add_waiting_for<I, S>(&mut self, dependent: &str, deps: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for dep in deps {
            self.add_edge(dep.as_ref(), dependent)?;
        }
        Ok(())
    }

    /// `name` followed by everything downstream of it, in DFS preorder.
    pub fn get_waiting_for_tuple(&self, name: &str) -> Result<Vec<String>> {
        let start = self.idx(name)?;
        let mut out = Vec::new();
        let mut dfs = Dfs::new(&self.graph, start);
        while let Some(idx) = dfs.next(&self.graph) {
            out.push(self.graph[idx].name.clone());
        }
        Ok(out)
    }

    /// Set `status` on `name` and on every node downstream of it.
    pub fn change_status_and_dependencies(&mut self, name: &str, status: NodeStatus) -> Result<()> {
        let start = self.idx(name)?;
        let mut dfs = Dfs::new(&self.graph, start);
        while let Some(idx) = dfs.next(&self.graph) {
            self.graph[idx].status = status;
        }
        debug!(node = %name, ?status, "status propagated downstream");
        Ok(())
    }

    /// Ready nodes with no Ready predecessor, in insertion order. They are
    /// marked Traversed before being returned.
    pub fn next_wave(&mut self) -> Vec<String> {
        let wave: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&idx| self.graph[idx].is_ready())
            .filter(|&idx| {
                !self
                    .graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .any(|p| self.graph[p].is_ready())
            })
            .collect();

        wave.into_iter()
            .map(|idx| {
                let node = &mut self.graph[idx];
                node.status = NodeStatus::Traversed;
                node.name.clone()
            })
            .collect()
    }

    /// Number of Ready nodes.
    pub fn len(&self) -> usize {
        self.graph.node_weights().filter(|n| n.is_ready()).count()
    }

    pub fn total_nodes(&self) -> usize {
        self.graph.node_count()
    }

    /// True when the graph has no nodes at all.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Every node back to Ready; topology unchanged.
    pub fn reset(&mut self) {
        for node in self.graph.node_weights_mut() {
            node.status = NodeStatus::Ready;
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.index.get(name).map(|&idx| &self.graph[idx])
    }

    pub fn node_mut(&mut self, name: &str) -> Option<&mut Node> {
        let idx = *self.index.get(name)?;
        Some(&mut self.graph[idx])
    }

    pub fn status_of(&self, name: &str) -> Option<NodeStatus> {
        self.node(name).map(|n| n.status)
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.graph.node_weights()
    }

    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.graph.node_weights_mut()
    }

    /// Nodes `name` waits for.
    pub fn predecessors(&self, name: &str) -> Vec<String> {
        self.neighbours(name, Direction::Incoming)
    }

    /// Nodes waiting for `name`.
    pub fn successors(&self, name: &str) -> Vec<String> {
        self.neighbours(name, Direction::Outgoing)
    }

    /// Graphviz rendering with node names as labels.
    pub fn to_dot(&self) -> String {
        let names = self.graph.map(|_, n| n.name.clone(), |_, _| "");
        format!("{}", Dot::with_config(&names, &[Config::EdgeNoLabel]))
    }

    fn neighbours(&self, name: &str, dir: Direction) -> Vec<String> {
        let Some(&idx) = self.index.get(name) else {
            return Vec::new();
        };
        let mut out: Vec<(NodeIndex, String)> = self
            .graph
            .neighbors_directed(idx, dir)
            .map(|n| (n, self.graph[n].name.clone()))
            .collect();
        out.sort_by_key(|(n, _)| *n);
        out.into_iter().map(|(_, name)| name).collect()
    }

    fn idx(&self, name: &str) -> Result<NodeIndex> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| SimrunnerError::NodeNotFound(name.to_string()))
    }
}
