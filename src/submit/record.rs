// src/submit/record.rs

/// Snapshot of one submission, owned by the submitter that made it.
///
/// Created on `submit`, mutated only by polling. `return_code` stays `None`
/// until the job is terminal, and also for a job that left the queue without
/// ever running.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionRecord {
    pub job_id: Option<String>,
    pub return_code: Option<i32>,
    pub std_out: Option<String>,
    pub std_err: Option<String>,
    pub terminal: bool,
}

impl SubmissionRecord {
    pub fn submitted(job_id: impl Into<String>) -> Self {
        Self {
            job_id: Some(job_id.into()),
            ..Self::default()
        }
    }

    /// Terminal with anything other than a zero return code.
    pub fn failed(&self) -> bool {
        self.terminal && self.return_code != Some(0)
    }
}
