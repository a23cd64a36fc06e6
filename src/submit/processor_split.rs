// src/submit/processor_split.rs

use crate::errors::{Result, SimrunnerError};

/// How many processors a job needs and how they are laid out over nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorSplit {
    processors: u32,
    nodes: u32,
    processors_per_node: u32,
}

impl ProcessorSplit {
    /// Validated constructor.
    ///
    /// Every count must be positive and the node layout must be able to host
    /// all requested processors.
    pub fn new(processors: u32, nodes: u32, processors_per_node: u32) -> Result<Self> {
        if processors == 0 || nodes == 0 || processors_per_node == 0 {
            return Err(SimrunnerError::ConfigError(format!(
                "processor split must be positive (processors={processors}, nodes={nodes}, \
                 processors_per_node={processors_per_node})"
            )));
        }
        if nodes * processors_per_node < processors {
            return Err(SimrunnerError::ConfigError(format!(
                "processors ({processors}) exceeds nodes ({nodes}) * processors_per_node \
                 ({processors_per_node})"
            )));
        }
        Ok(Self {
            processors,
            nodes,
            processors_per_node,
        })
    }

    pub fn processors(&self) -> u32 {
        self.processors
    }

    pub fn nodes(&self) -> u32 {
        self.nodes
    }

    pub fn processors_per_node(&self) -> u32 {
        self.processors_per_node
    }
}

impl Default for ProcessorSplit {
    fn default() -> Self {
        Self {
            processors: 1,
            nodes: 1,
            processors_per_node: 1,
        }
    }
}
