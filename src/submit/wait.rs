// src/submit/wait.rs

//! Bounded, cancellable sleep-poll loops.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::trace;

use crate::errors::{Result, SimrunnerError};

/// Shared flag used to stop a wait loop from another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct WaitOptions {
    pub poll_interval: Duration,
    /// `None` waits forever.
    pub timeout: Option<Duration>,
    pub cancel: Option<CancelToken>,
}

impl WaitOptions {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            timeout: None,
            cancel: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

/// Call `done` until it returns `true`, sleeping `poll_interval` in between.
///
/// Cancellation is checked before every poll, the timeout after every poll.
pub fn poll_until<F>(opts: &WaitOptions, mut done: F) -> Result<()>
where
    F: FnMut() -> Result<bool>,
{
    let start = Instant::now();

    loop {
        if opts.cancelled() {
            return Err(SimrunnerError::Cancelled);
        }
        if done()? {
            return Ok(());
        }

        let mut nap = opts.poll_interval;
        if let Some(timeout) = opts.timeout {
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Err(SimrunnerError::Timeout(timeout));
            }
            nap = nap.min(timeout - elapsed);
        }

        trace!(?nap, "sleeping before next poll");
        std::thread::sleep(nap);
    }
}
