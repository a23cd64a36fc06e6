// src/submit/pbs.rs

use std::sync::OnceLock;

use regex::Regex;

use crate::submit::cluster::{AccountingState, BackendDialect, JobSpec};

#[derive(Debug, Clone, Copy, Default)]
pub struct PbsDialect;

fn exit_status_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)Exit_status=(-?\d+)").expect("valid PBS regex"))
}

impl BackendDialect for PbsDialect {
    fn name(&self) -> &'static str {
        "pbs"
    }

    fn submit_program(&self) -> &'static str {
        "qsub"
    }

    fn directives(&self, job: &JobSpec<'_>) -> Vec<String> {
        let mut lines = vec![
            format!("#PBS -N {}", job.job_name),
            format!(
                "#PBS -l nodes={}:ppn={}",
                job.split.nodes(),
                job.split.processors_per_node()
            ),
        ];
        if let Some(walltime) = job.walltime {
            lines.push(format!("#PBS -l walltime={}", walltime.to_pbs()));
        }
        if let Some(account) = job.account {
            lines.push(format!("#PBS -A {account}"));
        }
        if let Some(queue) = job.queue {
            lines.push(format!("#PBS -q {queue}"));
        }
        lines.push(format!("#PBS -o {}.log", job.log_base.display()));
        lines.push(format!("#PBS -e {}.err", job.log_base.display()));
        if let Some(mail) = job.mail {
            lines.push("#PBS -m abe".to_string());
            lines.push(format!("#PBS -M {mail}"));
        }
        if !job.waiting_for.is_empty() {
            lines.push(format!("#PBS -W depend=afterok:{}", job.waiting_for.join(":")));
        }
        lines
    }

    fn workdir_line(&self) -> &'static str {
        "cd $PBS_O_WORKDIR"
    }

    /// `qsub` prints nothing but the job id.
    fn parse_job_id(&self, submit_stdout: &str) -> Option<String> {
        let id = submit_stdout.trim();
        (!id.is_empty()).then(|| id.to_string())
    }

    fn accounting_command(&self, job_id: &str) -> String {
        format!("tracejob -n 365 {job_id}")
    }

    fn parse_accounting(&self, output: &str) -> AccountingState {
        if let Some(code) = exit_status_re()
            .captures(output)
            .and_then(|caps| caps[1].parse::<i32>().ok())
        {
            return AccountingState::Exited(code);
        }
        if output.contains("dequeuing") {
            return AccountingState::Dequeued;
        }
        AccountingState::Pending
    }

    fn cancel_command(&self, job_id: &str) -> String {
        format!("qdel {job_id}")
    }
}
