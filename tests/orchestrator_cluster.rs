// tests/orchestrator_cluster.rs
//
// Runs a config-built graph of batch runs through the PBS submitter, with a
// stand-in `qsub` that executes each job script from the job store the way a
// queue would. PATH and the working directory are process-wide, so this file
// holds a single test.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;

use serde_json::Value;
use simrunner::config::SubmitterSection;
use simrunner::graph::RunGraph;
use simrunner::metadata::{InMemoryStore, MetadataStore, RUN_TABLE};
use simrunner::run::{Orchestrator, RunOptions};
use simrunner::types::SubmitterKind;
use simrunner_test_utils::builders::{ConfigFileBuilder, RunConfigBuilder};
use simrunner_test_utils::fakes::ScriptedBuild;
use simrunner_test_utils::init_tracing;
use tempfile::TempDir;

fn write_tool(bin: &Path, name: &str, body: &str) {
    let path = bin.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
}

/// `qsub` runs the script at once from its own working directory and keeps
/// the exit status for `tracejob`. Scripts mentioning `dequeue=1` are dropped
/// from the queue instead.
fn install_queue(bin: &Path) {
    let b = bin.display();
    write_tool(
        bin,
        "qsub",
        &format!(
            r#"n=$(cat {b}/counter 2>/dev/null || echo 0)
n=$((n + 1))
echo $n > {b}/counter
id="$n.fake"
if grep -q 'dequeue=1' "$1"; then
  echo "S dequeuing from batch" > "{b}/state.$id"
else
  PBS_O_WORKDIR="$PWD" sh "$1" > /dev/null 2>&1
  echo "S Exit_status=$? resources_used.cput=1" > "{b}/state.$id"
fi
echo "$id""#
        ),
    );
    write_tool(
        bin,
        "tracejob",
        &format!("[ -f {b}/state.$3 ] || exit 1\ncat {b}/state.$3"),
    );
    write_tool(bin, "qdel", "exit 0");
}

fn latest_status(store: &dyn MetadataStore, name: &str) -> Value {
    let rows = store.rows(RUN_TABLE).unwrap();
    let (_, row) = rows
        .iter()
        .find(|(_, row)| row["name"] == Value::from(name))
        .unwrap_or_else(|| panic!("no run row named {name}"));
    row["latest_status"].clone()
}

#[test]
fn test_batch_runs_through_pbs_queue_with_relative_paths() {
    init_tracing();
    let tmp = TempDir::new().unwrap();
    let root = fs::canonicalize(tmp.path()).unwrap();
    let bin = root.join("bin");
    fs::create_dir_all(&bin).unwrap();
    install_queue(&bin);

    let path = std::env::var("PATH").unwrap_or_default();
    // SAFETY: this is the only test in this binary.
    unsafe { std::env::set_var("PATH", format!("{}:{}", bin.display(), path)) };
    std::env::set_current_dir(&root).unwrap();

    let base_done = root.join("runs/base/done").display().to_string();
    let cfg = ConfigFileBuilder::new()
        .with_submitter(SubmitterSection {
            kind: Some(SubmitterKind::Pbs),
            store_dir: Some("jobs".to_string()),
            ..SubmitterSection::default()
        })
        .with_wait_interval("50ms")
        .with_run(
            "base",
            RunConfigBuilder::new("proj", "runs/base")
                .launcher("")
                .param("global", "nout", 5i64)
                .build(),
        )
        .with_run(
            "post",
            RunConfigBuilder::new("proj", "runs/post")
                .launcher("")
                .param("global", "check_base", base_done.as_str())
                .after("base")
                .build(),
        )
        .with_run(
            "broken",
            RunConfigBuilder::new("proj", "runs/broken")
                .launcher("")
                .param("global", "fail", 1i64)
                .build(),
        )
        .with_run(
            "broken_child",
            RunConfigBuilder::new("proj", "runs/broken_child")
                .launcher("")
                .after("broken")
                .build(),
        )
        .with_run(
            "dropped",
            RunConfigBuilder::new("proj", "runs/dropped")
                .launcher("")
                .param("global", "dequeue", 1i64)
                .build(),
        )
        .with_run(
            "dropped_child",
            RunConfigBuilder::new("proj", "runs/dropped_child")
                .launcher("")
                .after("dropped")
                .build(),
        )
        .build();

    let graph = RunGraph::from_config(&cfg).unwrap();
    let build = ScriptedBuild::new(root.join("trace"));
    let mut orch = Orchestrator::new(graph, Box::new(InMemoryStore::new()), Box::new(build.clone()));
    let report = orch
        .run(RunOptions {
            wait_interval: Duration::from_millis(50),
            ..RunOptions::default()
        })
        .unwrap();

    let mut completed = report.completed.clone();
    completed.sort();
    assert_eq!(completed, vec!["base", "post"], "report: {:?}", report);
    let mut errored = report.errored.clone();
    errored.sort();
    assert_eq!(errored, vec!["broken", "broken_child", "dropped", "dropped_child"]);

    // The queue ran the scripts from the job store, yet the runs landed
    // under the config's directory.
    assert!(root.join("runs/base/done").is_file());
    assert!(root.join("runs/post/done").is_file());
    assert!(!root.join("jobs/runs").exists());
    let script = fs::read_to_string(root.join("jobs/base.sh")).unwrap();
    assert!(script.contains("#PBS -N base\n"));
    assert!(script.contains(&format!(
        "cd $PBS_O_WORKDIR\n{} -d {} nout=5\n",
        root.join("proj/sim.sh").display(),
        root.join("runs/base").display()
    )));

    let broken = orch.graph().node("broken").unwrap();
    assert_eq!(broken.submitter.return_code(), Some(1));
    let dropped = orch.graph().node("dropped").unwrap();
    assert!(dropped.submitter.record().terminal);
    assert_eq!(dropped.submitter.return_code(), None);

    let trace = build.trace_lines();
    assert!(!trace.iter().any(|l| l.ends_with("_child")));

    let store = orch.store();
    assert_eq!(latest_status(store, "base"), Value::from("complete"));
    assert_eq!(latest_status(store, "post"), Value::from("complete"));
    assert_eq!(latest_status(store, "broken"), Value::from("error"));
    assert_eq!(latest_status(store, "dropped"), Value::from("submitted"));
    assert_eq!(store.count(RUN_TABLE).unwrap(), 4);
}
