// tests/walltime_and_dialects.rs

use std::path::Path;

use simrunner::errors::SimrunnerError;
use simrunner::submit::{
    AccountingState, BackendDialect, ClusterOptions, ClusterSubmitter, JobSpec, PbsDialect,
    ProcessorSplit, SlurmDialect, Walltime,
};

#[test]
fn test_walltime_reencoding_per_dialect() {
    let wt: Walltime = "1-65:43:21".parse().unwrap();
    assert_eq!(
        (wt.days, wt.hours, wt.minutes, wt.seconds),
        (1, 65, 43, 21)
    );
    assert_eq!(wt.to_pbs(), "89:43:21");
    assert_eq!(wt.to_slurm(), "3-17:43:21");
}

#[test]
fn test_walltime_without_days() {
    let wt: Walltime = "02:30:00".parse().unwrap();
    assert_eq!(wt.days, 0);
    assert_eq!(wt.to_pbs(), "02:30:00");
    assert_eq!(wt.to_slurm(), "0-02:30:00");
    assert_eq!(wt.total_seconds(), 9000);
}

#[test]
fn test_walltime_with_huge_day_count_reencodes() {
    let wt: Walltime = "200000000-00:00:00".parse().unwrap();
    assert_eq!(wt.to_pbs(), "4800000000:00:00");
    assert_eq!(wt.to_slurm(), "200000000-00:00:00");

    let wt: Walltime = "4294967295-999:00:00".parse().unwrap();
    assert_eq!(wt.to_pbs(), "103079216079:00:00");
    assert_eq!(wt.to_slurm(), "4294967336-15:00:00");
}

#[test]
fn test_walltime_rejects_bad_input() {
    for bad in ["", "1:2:3", "10:61:00", "00:00:75", "a-01:00:00", "1-01:00"] {
        match bad.parse::<Walltime>() {
            Err(SimrunnerError::ConfigError(_)) => {}
            other => panic!("Expected ConfigError for {bad:?}, got: {:?}", other),
        }
    }
}

#[test]
fn test_processor_split_validation() {
    let split = ProcessorSplit::new(8, 2, 4).unwrap();
    assert_eq!(split.processors(), 8);
    assert_eq!(split.nodes(), 2);
    assert_eq!(split.processors_per_node(), 4);

    assert!(ProcessorSplit::new(0, 1, 1).is_err());
    assert!(ProcessorSplit::new(4, 0, 4).is_err());
    // 2 nodes * 3 per node cannot host 8 processors.
    match ProcessorSplit::new(8, 2, 3) {
        Err(SimrunnerError::ConfigError(msg)) => assert!(msg.contains('8')),
        other => panic!("Expected ConfigError, got: {:?}", other),
    }
}

fn sample_spec<'a>(walltime: &'a Walltime, deps: &'a [String]) -> JobSpec<'a> {
    JobSpec {
        job_name: "blob_run",
        split: ProcessorSplit::new(32, 2, 16).unwrap(),
        walltime: Some(walltime),
        account: Some("proj42"),
        queue: Some("short"),
        mail: Some("me@example.org"),
        log_base: Path::new("/store/blob_run"),
        waiting_for: deps,
    }
}

#[test]
fn test_pbs_directives() {
    let wt: Walltime = "1-65:43:21".parse().unwrap();
    let deps = vec!["101.server".to_string(), "102.server".to_string()];
    let lines = PbsDialect.directives(&sample_spec(&wt, &deps));

    assert_eq!(
        lines,
        vec![
            "#PBS -N blob_run",
            "#PBS -l nodes=2:ppn=16",
            "#PBS -l walltime=89:43:21",
            "#PBS -A proj42",
            "#PBS -q short",
            "#PBS -o /store/blob_run.log",
            "#PBS -e /store/blob_run.err",
            "#PBS -m abe",
            "#PBS -M me@example.org",
            "#PBS -W depend=afterok:101.server:102.server",
        ]
    );
}

#[test]
fn test_slurm_directives() {
    let wt: Walltime = "1-65:43:21".parse().unwrap();
    let deps = vec!["555".to_string()];
    let lines = SlurmDialect.directives(&sample_spec(&wt, &deps));

    assert!(lines.contains(&"#SBATCH --job-name=blob_run".to_string()));
    assert!(lines.contains(&"#SBATCH --nodes=2".to_string()));
    assert!(lines.contains(&"#SBATCH --tasks-per-node=16".to_string()));
    assert!(lines.contains(&"#SBATCH --time=3-17:43:21".to_string()));
    assert!(lines.contains(&"#SBATCH --account=proj42".to_string()));
    assert!(lines.contains(&"#SBATCH -p short".to_string()));
    assert!(lines.contains(&"#SBATCH --mail-user=me@example.org".to_string()));
    assert_eq!(lines.last().unwrap(), "#SBATCH --dependency=afterok:555");
}

#[test]
fn test_optional_directives_are_omitted() {
    let spec = JobSpec {
        job_name: "bare",
        split: ProcessorSplit::default(),
        walltime: None,
        account: None,
        queue: None,
        mail: None,
        log_base: Path::new("/tmp/bare"),
        waiting_for: &[],
    };
    let lines = SlurmDialect.directives(&spec);
    assert!(!lines.iter().any(|l| l.contains("--time")));
    assert!(!lines.iter().any(|l| l.contains("--dependency")));
    assert!(!lines.iter().any(|l| l.contains("mail")));
}

#[test]
fn test_job_id_parsing() {
    assert_eq!(
        PbsDialect.parse_job_id("  4242.pbs-server\n"),
        Some("4242.pbs-server".to_string())
    );
    assert_eq!(PbsDialect.parse_job_id("\n"), None);

    assert_eq!(
        SlurmDialect.parse_job_id("Submitted batch job 987654\n"),
        Some("987654".to_string())
    );
    assert_eq!(SlurmDialect.parse_job_id("sbatch: error: bad account"), None);
}

#[test]
fn test_pbs_accounting_states() {
    let finished = "07/13/2021 10:05:00  S    Exit_status=3 resources_used.cput=00:00:01";
    assert_eq!(PbsDialect.parse_accounting(finished), AccountingState::Exited(3));

    let dequeued = "07/13/2021 10:05:00  S    dequeuing from short, state RUNNING";
    assert_eq!(PbsDialect.parse_accounting(dequeued), AccountingState::Dequeued);

    let queued = "07/13/2021 10:00:00  S    enqueuing into short, state 1 hop 1";
    assert_eq!(PbsDialect.parse_accounting(queued), AccountingState::Pending);
}

fn sacct(line: &str) -> String {
    format!(
        "       JobID      State ExitCode \n------------ ---------- -------- \n{line}\n"
    )
}

#[test]
fn test_slurm_accounting_states() {
    assert_eq!(
        SlurmDialect.parse_accounting(&sacct("      123456  COMPLETED      0:0 ")),
        AccountingState::Exited(0)
    );
    assert_eq!(
        SlurmDialect.parse_accounting(&sacct("      123456     FAILED      2:0 ")),
        AccountingState::Exited(2)
    );
    assert_eq!(
        SlurmDialect.parse_accounting(&sacct("      123456    TIMEOUT      0:0 ")),
        AccountingState::Exited(1)
    );
    assert_eq!(
        SlurmDialect.parse_accounting(&sacct("      123456 OUT_OF_MEMORY      0:125 ")),
        AccountingState::Exited(1)
    );
    assert_eq!(
        SlurmDialect.parse_accounting(&sacct("      123456 CANCELLED+      0:0 ")),
        AccountingState::Dequeued
    );
    assert_eq!(
        SlurmDialect.parse_accounting(&sacct("      123456    RUNNING      0:0 ")),
        AccountingState::Pending
    );
    // Header only: the job is not visible yet.
    assert_eq!(
        SlurmDialect.parse_accounting("JobID State ExitCode\n----- ----- -----\n"),
        AccountingState::Pending
    );
}

#[test]
fn test_job_script_layout() {
    let mut opts = ClusterOptions::new("solve", "/jobs");
    opts.walltime = Some("00:10:00".parse().unwrap());
    let mut submitter: ClusterSubmitter<SlurmDialect> = ClusterSubmitter::new(opts);
    submitter.add_waiting_for(["11", "12", "11"]).unwrap();
    assert_eq!(submitter.waiting_for(), &["11".to_string(), "12".to_string()]);

    let script = submitter.job_script("mpirun -np 1 ./sim -d out");
    assert!(script.starts_with("#!/bin/bash\n#SBATCH --job-name=solve\n"));
    assert!(script.contains("#SBATCH --time=0-00:10:00\n"));
    assert!(script.contains("#SBATCH --dependency=afterok:11:12\n"));
    assert!(script.ends_with("\ncd $SLURM_SUBMIT_DIR\nmpirun -np 1 ./sim -d out\n"));
    assert_eq!(submitter.script_path(), Path::new("/jobs/solve.sh"));
}
