// src/submit/cluster.rs

//! Batch-queue submission shared by every queue system.
//!
//! `ClusterSubmitter<D>` owns the job lifecycle (script file, submit,
//! accounting poll, cancel); the `BackendDialect` only knows the queue's
//! vocabulary.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, error, info, warn};

use crate::errors::{Result, SimrunnerError};
use crate::submit::local::LocalSubmitter;
use crate::submit::processor_split::ProcessorSplit;
use crate::submit::record::SubmissionRecord;
use crate::submit::walltime::Walltime;

/// What the accounting command says about a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountingState {
    /// Queued, running, or not visible yet.
    Pending,
    /// Finished with the given exit code.
    Exited(i32),
    /// Left the queue without running.
    Dequeued,
}

/// Everything a dialect needs to render job directives.
#[derive(Debug, Clone, Copy)]
pub struct JobSpec<'a> {
    pub job_name: &'a str,
    pub split: ProcessorSplit,
    pub walltime: Option<&'a Walltime>,
    pub account: Option<&'a str>,
    pub queue: Option<&'a str>,
    pub mail: Option<&'a str>,
    /// `<store_dir>/<job_name>`; the dialect appends `.log` / `.err`.
    pub log_base: &'a Path,
    pub waiting_for: &'a [String],
}

/// Queue-system specific vocabulary.
pub trait BackendDialect: fmt::Debug + Clone + Default + Send {
    fn name(&self) -> &'static str;

    /// Program that takes the script path as its only argument.
    fn submit_program(&self) -> &'static str;

    /// `#PBS` / `#SBATCH` lines, without trailing newlines.
    fn directives(&self, job: &JobSpec<'_>) -> Vec<String>;

    /// Line that moves the job into its submission directory.
    fn workdir_line(&self) -> &'static str;

    fn parse_job_id(&self, submit_stdout: &str) -> Option<String>;

    fn accounting_command(&self, job_id: &str) -> String;

    fn parse_accounting(&self, output: &str) -> AccountingState;

    fn cancel_command(&self, job_id: &str) -> String;
}

/// Per-job settings for a cluster submitter.
#[derive(Debug, Clone)]
pub struct ClusterOptions {
    pub job_name: String,
    /// Where the job script and the `.log` / `.err` files go.
    pub store_dir: PathBuf,
    pub split: ProcessorSplit,
    pub walltime: Option<Walltime>,
    pub account: Option<String>,
    pub queue: Option<String>,
    pub mail: Option<String>,
}

impl ClusterOptions {
    pub fn new(job_name: impl Into<String>, store_dir: impl Into<PathBuf>) -> Self {
        Self {
            job_name: job_name.into(),
            store_dir: store_dir.into(),
            split: ProcessorSplit::default(),
            walltime: None,
            account: None,
            queue: None,
            mail: None,
        }
    }
}

#[derive(Debug)]
pub struct ClusterSubmitter<D: BackendDialect> {
    dialect: D,
    opts: ClusterOptions,
    waiting_for: Vec<String>,
    record: SubmissionRecord,
    failure_logged: bool,
}

impl<D: BackendDialect> ClusterSubmitter<D> {
    pub fn new(opts: ClusterOptions) -> Self {
        Self::with_dialect(D::default(), opts)
    }

    pub fn with_dialect(dialect: D, opts: ClusterOptions) -> Self {
        Self {
            dialect,
            opts,
            waiting_for: Vec::new(),
            record: SubmissionRecord::default(),
            failure_logged: false,
        }
    }

    pub fn options(&self) -> &ClusterOptions {
        &self.opts
    }

    pub fn processor_split(&self) -> ProcessorSplit {
        self.opts.split
    }

    pub fn record(&self) -> &SubmissionRecord {
        &self.record
    }

    pub fn job_id(&self) -> Option<&str> {
        self.record.job_id.as_deref()
    }

    pub fn waiting_for(&self) -> &[String] {
        &self.waiting_for
    }

    pub fn script_path(&self) -> PathBuf {
        self.opts.store_dir.join(format!("{}.sh", self.opts.job_name))
    }

    fn log_base(&self) -> PathBuf {
        self.opts.store_dir.join(&self.opts.job_name)
    }

    /// Make this job start only after every handle in `handles` finished
    /// successfully. Only allowed before `submit`.
    pub fn add_waiting_for<I, S>(&mut self, handles: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self.record.job_id.is_some() {
            return Err(SimrunnerError::Submission(format!(
                "job '{}' is already submitted; dependencies must be added before submit",
                self.opts.job_name
            )));
        }
        for handle in handles {
            let handle = handle.as_ref().to_string();
            if !self.waiting_for.contains(&handle) {
                self.waiting_for.push(handle);
            }
        }
        Ok(())
    }

    /// Full job script for `command`.
    pub fn job_script(&self, command: &str) -> String {
        let log_base = self.log_base();
        let spec = JobSpec {
            job_name: &self.opts.job_name,
            split: self.opts.split,
            walltime: self.opts.walltime.as_ref(),
            account: self.opts.account.as_deref(),
            queue: self.opts.queue.as_deref(),
            mail: self.opts.mail.as_deref(),
            log_base: &log_base,
            waiting_for: &self.waiting_for,
        };

        let mut script = String::from("#!/bin/bash\n");
        for line in self.dialect.directives(&spec) {
            script.push_str(&line);
            script.push('\n');
        }
        script.push('\n');
        script.push_str(self.dialect.workdir_line());
        script.push('\n');
        script.push_str(command);
        script.push('\n');
        script
    }

    /// Write the job script and hand it to the queue.
    pub fn submit(&mut self, command: &str) -> Result<String> {
        if self.record.job_id.is_some() && !self.record.terminal {
            return Err(SimrunnerError::Submission(format!(
                "job '{}' is already in the queue as {:?}",
                self.opts.job_name, self.record.job_id
            )));
        }

        fs::create_dir_all(&self.opts.store_dir).with_context(|| {
            format!("creating job store dir {}", self.opts.store_dir.display())
        })?;
        // The queue runs scripts from elsewhere; every path in them is absolute.
        self.opts.store_dir = fs::canonicalize(&self.opts.store_dir)?;

        let script_path = self.script_path();
        fs::write(&script_path, self.job_script(command))
            .with_context(|| format!("writing job script {}", script_path.display()))?;
        make_executable(&script_path)?;

        let submit_cmd = format!("{} {}", self.dialect.submit_program(), script_path.display());
        let mut helper = LocalSubmitter::new(&self.opts.store_dir);
        let out = helper.submit_and_wait(&submit_cmd)?;

        if out.return_code != Some(0) {
            return Err(SimrunnerError::Submission(format!(
                "{} rejected job '{}' (return code {:?}): {}",
                self.dialect.submit_program(),
                self.opts.job_name,
                out.return_code,
                out.std_err.as_deref().unwrap_or("").trim()
            )));
        }

        let stdout = out.std_out.as_deref().unwrap_or("");
        let job_id = self.dialect.parse_job_id(stdout).ok_or_else(|| {
            SimrunnerError::Submission(format!(
                "could not find a job id in {} output: {:?}",
                self.dialect.submit_program(),
                stdout
            ))
        })?;

        info!(
            backend = self.dialect.name(),
            job = %self.opts.job_name,
            job_id = %job_id,
            "job submitted"
        );

        self.record = SubmissionRecord::submitted(job_id.clone());
        self.failure_logged = false;
        Ok(job_id)
    }

    /// Ask the accounting system once.
    pub fn completed(&mut self) -> Result<bool> {
        if self.record.terminal {
            return Ok(true);
        }
        let Some(job_id) = self.record.job_id.clone() else {
            return Ok(false);
        };

        let mut helper = LocalSubmitter::new(&self.opts.store_dir);
        let out = helper.submit_and_wait(&self.dialect.accounting_command(&job_id))?;
        if out.return_code != Some(0) {
            // Accounting may not know the job yet.
            debug!(job_id = %job_id, return_code = ?out.return_code, "accounting query failed");
            return Ok(false);
        }

        let output = out.std_out.clone().unwrap_or_default();
        match self.dialect.parse_accounting(&output) {
            AccountingState::Pending => Ok(false),
            AccountingState::Exited(code) => {
                self.record.return_code = Some(code);
                self.record.terminal = true;
                self.collect_output();
                debug!(job_id = %job_id, return_code = code, "job finished");
                Ok(true)
            }
            AccountingState::Dequeued => {
                self.record.terminal = true;
                warn!(job_id = %job_id, "job left the queue without running");
                Ok(true)
            }
        }
    }

    pub fn errored(&mut self) -> Result<bool> {
        if !self.completed()? {
            return Ok(false);
        }
        let failed = self.record.failed();
        if failed && !self.failure_logged {
            self.failure_logged = true;
            error!(
                backend = self.dialect.name(),
                job = %self.opts.job_name,
                job_id = ?self.record.job_id,
                return_code = ?self.record.return_code,
                stdout = %self.record.std_out.as_deref().unwrap_or(""),
                stderr = %self.record.std_err.as_deref().unwrap_or(""),
                "job failed"
            );
        }
        Ok(failed)
    }

    pub fn return_code(&self) -> Option<i32> {
        self.record.return_code
    }

    pub fn std_out(&self) -> Option<&str> {
        self.record.std_out.as_deref()
    }

    pub fn std_err(&self) -> Option<&str> {
        self.record.std_err.as_deref()
    }

    /// Remove the job from the queue. Idempotent.
    pub fn kill(&mut self) -> Result<()> {
        if self.record.terminal {
            return Ok(());
        }
        let Some(job_id) = self.record.job_id.clone() else {
            return Ok(());
        };

        let mut helper = LocalSubmitter::new(&self.opts.store_dir);
        let out = helper.submit_and_wait(&self.dialect.cancel_command(&job_id))?;
        if out.return_code != Some(0) {
            warn!(
                job_id = %job_id,
                stderr = %out.std_err.as_deref().unwrap_or("").trim(),
                "cancel command failed"
            );
        }
        self.record.terminal = true;
        info!(job_id = %job_id, "job cancelled");
        Ok(())
    }

    pub fn reset(&mut self) {
        self.record = SubmissionRecord::default();
        self.failure_logged = false;
    }

    fn collect_output(&mut self) {
        let dir = &self.opts.store_dir;
        let name = &self.opts.job_name;
        self.record.std_out = read_if_exists(&dir.join(format!("{name}.log")));
        self.record.std_err = read_if_exists(&dir.join(format!("{name}.err")));
    }
}

fn read_if_exists(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(s) => Some(s),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "job output file not readable");
            None
        }
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
