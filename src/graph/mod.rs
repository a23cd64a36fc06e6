// src/graph/mod.rs

//! The run graph and the helpers that populate it.

pub mod from_config;
pub mod names;
pub mod node;
pub mod run_graph;
pub mod run_group;

pub use names::NameAllocator;
pub use node::{Node, NodeKind};
pub use run_graph::RunGraph;
pub use run_group::RunGroup;
