// src/submit/factory.rs

use std::path::{Path, PathBuf};

use crate::submit::cluster::{ClusterOptions, ClusterSubmitter};
use crate::submit::local::LocalSubmitter;
use crate::submit::processor_split::ProcessorSplit;
use crate::submit::walltime::Walltime;
use crate::submit::Submitter;
use crate::types::SubmitterKind;

/// Validated description of a submitter, used to stamp out one per node.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitterSpec {
    pub kind: SubmitterKind,
    pub split: ProcessorSplit,
    /// Cluster job scripts and output go here.
    pub store_dir: PathBuf,
    pub walltime: Option<Walltime>,
    pub account: Option<String>,
    pub queue: Option<String>,
    pub mail: Option<String>,
}

impl Default for SubmitterSpec {
    fn default() -> Self {
        Self {
            kind: SubmitterKind::Local,
            split: ProcessorSplit::default(),
            store_dir: PathBuf::from("jobs"),
            walltime: None,
            account: None,
            queue: None,
            mail: None,
        }
    }
}

impl SubmitterSpec {
    pub fn local() -> Self {
        Self::default()
    }

    /// Build a fresh submitter for `job_name`.
    ///
    /// Local commands run from `run_dir`.
    pub fn build(&self, job_name: &str, run_dir: &Path) -> Submitter {
        match self.kind {
            SubmitterKind::Local => {
                Submitter::Local(LocalSubmitter::new(run_dir).with_split(self.split))
            }
            SubmitterKind::Pbs => Submitter::Pbs(ClusterSubmitter::new(self.cluster_options(job_name))),
            SubmitterKind::Slurm => {
                Submitter::Slurm(ClusterSubmitter::new(self.cluster_options(job_name)))
            }
        }
    }

    fn cluster_options(&self, job_name: &str) -> ClusterOptions {
        ClusterOptions {
            job_name: job_name.to_string(),
            store_dir: self.store_dir.clone(),
            split: self.split,
            walltime: self.walltime,
            account: self.account.clone(),
            queue: self.queue.clone(),
            mail: self.mail.clone(),
        }
    }
}
