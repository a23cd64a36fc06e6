// src/submit/local.rs

//! Immediate local execution of a shell command.
//!
//! `submit` returns as soon as the child is spawned; completion is observed
//! by polling `completed()`. Stdout and stderr are drained by two reader
//! threads into shared buffers so a chatty child never blocks on a full
//! pipe. The child leads its own process group, and `kill` signals the whole
//! group.

use std::io::Read;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing::{debug, error, info, warn};

use crate::errors::{Result, SimrunnerError};
use crate::submit::processor_split::ProcessorSplit;
use crate::submit::record::SubmissionRecord;

/// How long `finish` waits for the pipes to reach EOF after the child exits.
/// A background grandchild can hold them open indefinitely.
const READER_GRACE: Duration = Duration::from_millis(200);

/// One drained pipe: bytes read so far plus the thread reading them.
#[derive(Debug)]
struct PipeReader {
    buf: Arc<Mutex<Vec<u8>>>,
    handle: JoinHandle<()>,
}

impl PipeReader {
    fn spawn<R>(pipe: Option<R>) -> Self
    where
        R: Read + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let handle = std::thread::spawn(move || {
            let Some(mut pipe) = pipe else { return };
            let mut chunk = [0u8; 8192];
            loop {
                match pipe.read(&mut chunk) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => sink
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner())
                        .extend_from_slice(&chunk[..n]),
                }
            }
        });
        Self { buf, handle }
    }

    fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    fn snapshot(&self) -> String {
        let bytes = self.buf.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

type OutputReaders = (PipeReader, PipeReader);

#[derive(Debug)]
pub struct LocalSubmitter {
    run_dir: PathBuf,
    split: ProcessorSplit,
    child: Option<Child>,
    readers: Option<OutputReaders>,
    record: SubmissionRecord,
    failure_logged: bool,
}

impl LocalSubmitter {
    /// Submitter that runs commands from `run_dir`.
    pub fn new(run_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_dir: run_dir.into(),
            split: ProcessorSplit::default(),
            child: None,
            readers: None,
            record: SubmissionRecord::default(),
            failure_logged: false,
        }
    }

    pub fn with_split(mut self, split: ProcessorSplit) -> Self {
        self.split = split;
        self
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn processor_split(&self) -> ProcessorSplit {
        self.split
    }

    pub fn record(&self) -> &SubmissionRecord {
        &self.record
    }

    /// Spawn `sh -c <command>` and return its pid as the job handle.
    pub fn submit(&mut self, command: &str) -> Result<String> {
        if self.child.is_some() && !self.record.terminal {
            return Err(SimrunnerError::Submission(format!(
                "a command is already running (pid {:?}); reset before resubmitting",
                self.pid()
            )));
        }
        self.reset();

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.run_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .spawn()
            .map_err(|e| {
                SimrunnerError::Submission(format!(
                    "failed to spawn `{command}` in {}: {e}",
                    self.run_dir.display()
                ))
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        self.readers = Some((PipeReader::spawn(stdout), PipeReader::spawn(stderr)));

        let pid = child.id().to_string();
        info!(pid = %pid, dir = %self.run_dir.display(), cmd = %command, "local process started");

        self.record = SubmissionRecord::submitted(pid.clone());
        self.child = Some(child);
        Ok(pid)
    }

    /// Spawn `command` and block until it exits.
    ///
    /// Used for short helper commands (queue submission, accounting, make).
    pub fn submit_and_wait(&mut self, command: &str) -> Result<&SubmissionRecord> {
        self.submit(command)?;
        if let Some(child) = self.child.as_mut() {
            let status = child
                .wait()
                .with_context(|| format!("waiting for `{command}`"))?;
            self.finish(status);
        }
        Ok(&self.record)
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    pub fn job_id(&self) -> Option<&str> {
        self.record.job_id.as_deref()
    }

    /// Non-blocking poll. A never-submitted submitter is not completed.
    pub fn completed(&mut self) -> Result<bool> {
        if self.record.terminal {
            return Ok(true);
        }
        let Some(child) = self.child.as_mut() else {
            return Ok(false);
        };

        match child.try_wait().context("polling local process")? {
            Some(status) => {
                self.finish(status);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Completed with a non-zero (or missing) return code.
    pub fn errored(&mut self) -> Result<bool> {
        if !self.completed()? {
            return Ok(false);
        }
        let failed = self.record.failed();
        if failed && !self.failure_logged {
            self.failure_logged = true;
            error!(
                pid = ?self.record.job_id,
                return_code = ?self.record.return_code,
                stdout = %self.record.std_out.as_deref().unwrap_or(""),
                stderr = %self.record.std_err.as_deref().unwrap_or(""),
                "local process failed"
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

    /// Kill the running child and everything it started. Calling it again,
    /// or on a finished process, does nothing.
    pub fn kill(&mut self) -> Result<()> {
        if self.record.terminal {
            return Ok(());
        }
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };

        let pid = child.id();
        kill_group(pid);
        if let Err(e) = child.kill() {
            // InvalidInput: the process already exited on its own.
            if e.kind() != std::io::ErrorKind::InvalidInput {
                warn!(pid, error = %e, "failed to kill local process");
            }
        }
        let status = child.wait().context("reaping killed local process")?;
        info!(pid, "local process killed");
        self.finish(status);
        Ok(())
    }

    /// Forget the previous submission.
    pub fn reset(&mut self) {
        self.child = None;
        self.readers = None;
        self.record = SubmissionRecord::default();
        self.failure_logged = false;
    }

    fn finish(&mut self, status: ExitStatus) {
        // Signalled processes have no exit code.
        let code = status.code().unwrap_or(-1);

        if let Some((out, err)) = self.readers.take() {
            let deadline = Instant::now() + READER_GRACE;
            while !(out.is_finished() && err.is_finished()) && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(5));
            }
            if !(out.is_finished() && err.is_finished()) {
                debug!(pid = ?self.record.job_id, "output pipes still open; keeping what was read");
            }
            self.record.std_out = Some(out.snapshot());
            self.record.std_err = Some(err.snapshot());
        }
        self.record.return_code = Some(code);
        self.record.terminal = true;

        debug!(pid = ?self.record.job_id, return_code = code, "local process exited");
    }
}

/// SIGKILL the process group led by `pid`. Failures only mean the group is
/// already gone.
fn kill_group(pid: u32) {
    let group = format!("-{pid}");
    match Command::new("kill")
        .args(["-KILL", "--", group.as_str()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(status) if status.success() => debug!(pgid = pid, "process group killed"),
        Ok(status) => debug!(pgid = pid, ?status, "process group not signalled"),
        Err(e) => warn!(pgid = pid, error = %e, "could not run kill"),
    }
}
