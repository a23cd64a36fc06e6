// src/submit/slurm.rs

use std::sync::OnceLock;

use chrono::{Duration, Local};
use regex::Regex;

use crate::submit::cluster::{AccountingState, BackendDialect, JobSpec};

#[derive(Debug, Clone, Copy, Default)]
pub struct SlurmDialect;

fn job_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Submitted batch job (\S+)").expect("valid SLURM regex"))
}

fn exit_code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(-?\d+):-?\d+\s*$").expect("valid SLURM regex"))
}

fn state_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"([A-Z_]+\+?)\s+-?\d+:-?\d+\s*$").expect("valid SLURM regex"))
}

/// States in which the job has not finished yet.
const UNFINISHED: &[&str] = &[
    "PENDING",
    "RUNNING",
    "REQUEUED",
    "RESIZING",
    "SUSPENDED",
    "CONFIGURING",
    "COMPLETING",
];

impl BackendDialect for SlurmDialect {
    fn name(&self) -> &'static str {
        "slurm"
    }

    fn submit_program(&self) -> &'static str {
        "sbatch"
    }

    fn directives(&self, job: &JobSpec<'_>) -> Vec<String> {
        let mut lines = vec![
            format!("#SBATCH --job-name={}", job.job_name),
            format!("#SBATCH --nodes={}", job.split.nodes()),
            format!("#SBATCH --tasks-per-node={}", job.split.processors_per_node()),
        ];
        if let Some(walltime) = job.walltime {
            lines.push(format!("#SBATCH --time={}", walltime.to_slurm()));
        }
        if let Some(account) = job.account {
            lines.push(format!("#SBATCH --account={account}"));
        }
        if let Some(queue) = job.queue {
            lines.push(format!("#SBATCH -p {queue}"));
        }
        lines.push(format!("#SBATCH -o {}.log", job.log_base.display()));
        lines.push(format!("#SBATCH -e {}.err", job.log_base.display()));
        if let Some(mail) = job.mail {
            lines.push("#SBATCH --mail-type=ALL".to_string());
            lines.push(format!("#SBATCH --mail-user={mail}"));
        }
        if !job.waiting_for.is_empty() {
            lines.push(format!(
                "#SBATCH --dependency=afterok:{}",
                job.waiting_for.join(":")
            ));
        }
        lines
    }

    fn workdir_line(&self) -> &'static str {
        "cd $SLURM_SUBMIT_DIR"
    }

    fn parse_job_id(&self, submit_stdout: &str) -> Option<String> {
        job_id_re()
            .captures(submit_stdout)
            .map(|caps| caps[1].to_string())
    }

    fn accounting_command(&self, job_id: &str) -> String {
        let since = (Local::now() - Duration::days(365)).format("%Y-%m-%d");
        format!("sacct --starttime {since} -j {job_id} --brief")
    }

    /// `sacct --brief` prints two header lines, then
    /// `<id> <STATE> <exit>:<signal>` for the job itself.
    fn parse_accounting(&self, output: &str) -> AccountingState {
        let Some(job_line) = output.lines().nth(2) else {
            return AccountingState::Pending;
        };

        let state = state_re()
            .captures(job_line)
            .map(|caps| caps[1].trim_end_matches('+').to_string());
        let code = exit_code_re()
            .captures(job_line)
            .and_then(|caps| caps[1].parse::<i32>().ok());

        match state.as_deref() {
            None => AccountingState::Pending,
            Some(s) if UNFINISHED.contains(&s) => AccountingState::Pending,
            Some("CANCELLED") => AccountingState::Dequeued,
            Some("COMPLETED") => AccountingState::Exited(code.unwrap_or(0)),
            // FAILED, TIMEOUT, OUT_OF_MEMORY, NODE_FAIL ... never report success.
            Some(_) => match code {
                Some(c) if c != 0 => AccountingState::Exited(c),
                _ => AccountingState::Exited(1),
            },
        }
    }

    fn cancel_command(&self, job_id: &str) -> String {
        format!("scancel {job_id}")
    }
}
