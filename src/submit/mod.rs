// src/submit/mod.rs

//! Backend-agnostic job submission.
//!
//! `Submitter` is a closed set of backends; callers switch on it through the
//! methods below and never see the concrete type unless they ask for it.

pub mod cluster;
pub mod factory;
pub mod local;
pub mod pbs;
pub mod processor_split;
pub mod record;
pub mod script;
pub mod slurm;
pub mod wait;
pub mod walltime;

use std::time::Duration;

use tracing::debug;

use crate::errors::{Result, SimrunnerError};

pub use cluster::{AccountingState, BackendDialect, ClusterOptions, ClusterSubmitter, JobSpec};
pub use factory::SubmitterSpec;
pub use local::LocalSubmitter;
pub use pbs::PbsDialect;
pub use processor_split::ProcessorSplit;
pub use record::SubmissionRecord;
pub use script::FunctionCall;
pub use slurm::SlurmDialect;
pub use wait::{CancelToken, WaitOptions};
pub use walltime::Walltime;

#[derive(Debug)]
pub enum Submitter {
    Local(LocalSubmitter),
    Pbs(ClusterSubmitter<PbsDialect>),
    Slurm(ClusterSubmitter<SlurmDialect>),
}

macro_rules! dispatch {
    ($self:expr, $s:ident => $body:expr) => {
        match $self {
            Submitter::Local($s) => $body,
            Submitter::Pbs($s) => $body,
            Submitter::Slurm($s) => $body,
        }
    };
}

impl Submitter {
    pub fn backend_name(&self) -> &'static str {
        match self {
            Submitter::Local(_) => "local",
            Submitter::Pbs(_) => "pbs",
            Submitter::Slurm(_) => "slurm",
        }
    }

    pub fn is_cluster(&self) -> bool {
        !matches!(self, Submitter::Local(_))
    }

    /// Start `command` and return the job handle (pid or queue job id).
    pub fn submit(&mut self, command: &str) -> Result<String> {
        dispatch!(self, s => s.submit(command))
    }

    /// Process id of a local job.
    pub fn pid(&self) -> Option<u32> {
        match self {
            Submitter::Local(s) => s.pid(),
            _ => None,
        }
    }

    pub fn job_id(&self) -> Option<&str> {
        dispatch!(self, s => s.job_id())
    }

    pub fn processor_split(&self) -> ProcessorSplit {
        dispatch!(self, s => s.processor_split())
    }

    pub fn record(&self) -> &SubmissionRecord {
        dispatch!(self, s => s.record())
    }

    /// Non-blocking poll; the terminal state is remembered.
    pub fn completed(&mut self) -> Result<bool> {
        dispatch!(self, s => s.completed())
    }

    pub fn errored(&mut self) -> Result<bool> {
        dispatch!(self, s => s.errored())
    }

    pub fn return_code(&self) -> Option<i32> {
        dispatch!(self, s => s.return_code())
    }

    pub fn std_out(&self) -> Option<&str> {
        dispatch!(self, s => s.std_out())
    }

    pub fn std_err(&self) -> Option<&str> {
        dispatch!(self, s => s.std_err())
    }

    pub fn kill(&mut self) -> Result<()> {
        dispatch!(self, s => s.kill())
    }

    pub fn reset(&mut self) {
        dispatch!(self, s => s.reset())
    }

    /// Register queue-level dependencies. Only cluster backends can do this,
    /// and only before `submit`.
    pub fn add_waiting_for<I, S>(&mut self, handles: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match self {
            Submitter::Local(_) => Err(SimrunnerError::Submission(
                "local submitter cannot wait for other jobs".to_string(),
            )),
            Submitter::Pbs(s) => s.add_waiting_for(handles),
            Submitter::Slurm(s) => s.add_waiting_for(handles),
        }
    }

    /// Polling cadence used by [`wait_until_completed`](Self::wait_until_completed).
    pub fn default_wait_options(&self) -> WaitOptions {
        match self {
            Submitter::Local(_) => WaitOptions::new(Duration::from_millis(100)),
            _ => WaitOptions::new(Duration::from_secs(5)),
        }
    }

    /// Block until the job is terminal.
    pub fn wait_until_completed(&mut self, raise_on_error: bool) -> Result<()> {
        let opts = self.default_wait_options();
        self.wait_until_completed_with(raise_on_error, &opts)
    }

    /// Block until the job is terminal, bounded by `opts`.
    pub fn wait_until_completed_with(
        &mut self,
        raise_on_error: bool,
        opts: &WaitOptions,
    ) -> Result<()> {
        if self.job_id().is_none() {
            debug!(backend = self.backend_name(), "nothing submitted; not waiting");
            return Ok(());
        }
        wait::poll_until(opts, || self.completed())?;
        if raise_on_error {
            self.raise_error()?;
        }
        Ok(())
    }

    /// Turn a recorded failure into `RuntimeFailure`.
    pub fn raise_error(&mut self) -> Result<()> {
        if self.errored()? {
            let job = self.job_id().unwrap_or("<unsubmitted>").to_string();
            return Err(SimrunnerError::RuntimeFailure {
                job,
                return_code: self.return_code(),
            });
        }
        Ok(())
    }
}
