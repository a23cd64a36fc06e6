// tests/names_and_restart.rs

use std::fs;

use simrunner::graph::{NameAllocator, RunGraph, RunGroup};
use simrunner::run::{RunSetup, prepare_restart};
use simrunner::submit::{FunctionCall, LocalSubmitter, Submitter};
use simrunner_test_utils::builders::add_plain_node;
use simrunner_test_utils::init_tracing;
use tempfile::TempDir;

#[test]
fn test_group_names_count_up_and_avoid_clashes() {
    init_tracing();
    let mut names = NameAllocator::new();

    assert_eq!(names.group_name(None), "0");
    assert_eq!(names.group_name(Some("1")), "1");
    // "1" is taken, the counter skips it.
    assert_eq!(names.group_name(None), "2");

    assert_eq!(names.group_name(Some("blob")), "blob");
    assert_eq!(names.group_name(Some("blob")), "blob_1");
    assert_eq!(names.group_name(Some("blob")), "blob_2");
}

#[test]
fn test_allocators_do_not_share_state() {
    let mut a = NameAllocator::new();
    let mut b = NameAllocator::new();
    assert_eq!(a.group_name(None), "0");
    assert_eq!(a.group_name(None), "1");
    assert_eq!(b.group_name(None), "0");
}

#[test]
fn test_restart_dir_numbering() {
    let dir = TempDir::new().unwrap();
    let base = dir.path().join("run");
    let mut names = NameAllocator::new();

    assert_eq!(names.restart_dir(&base).unwrap(), dir.path().join("run_restart_0"));
    // Handed out but not created yet: still counted.
    assert_eq!(names.restart_dir(&base).unwrap(), dir.path().join("run_restart_1"));

    fs::create_dir_all(dir.path().join("run_restart_7")).unwrap();
    assert_eq!(names.restart_dir(&base).unwrap(), dir.path().join("run_restart_8"));

    // A restart directory restarts into the same series.
    let restarted = dir.path().join("run_restart_8");
    assert_eq!(
        names.restart_dir(&restarted).unwrap(),
        dir.path().join("run_restart_9")
    );
}

#[test]
fn test_prepare_restart_copies_restart_and_input_files() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("run");
    fs::create_dir_all(&source).unwrap();
    fs::write(source.join("BOUT.restart.0.nc"), "r0").unwrap();
    fs::write(source.join("BOUT.restart.1.nc"), "r1").unwrap();
    fs::write(source.join("BOUT.dmp.0.nc"), "dump").unwrap();
    fs::write(source.join("BOUT.inp"), "from-source").unwrap();

    let input = dir.path().join("BOUT.inp");
    fs::write(&input, "original").unwrap();

    let mut setup = RunSetup::new(dir.path().join("proj"), &source);
    setup.input_files = vec![input];
    let mut names = NameAllocator::new();

    let restarted = prepare_restart(&setup, &source, &mut names).unwrap();

    let dest = dir.path().join("run_restart_0");
    assert_eq!(restarted.destination, dest);
    assert!(dest.join("BOUT.restart.0.nc").is_file());
    assert!(dest.join("BOUT.restart.1.nc").is_file());
    assert!(!dest.join("BOUT.dmp.0.nc").exists());
    // The copy in the source directory wins over the original input.
    assert_eq!(fs::read_to_string(dest.join("BOUT.inp")).unwrap(), "from-source");
    assert_eq!(restarted.input_files, vec![dest.join("BOUT.inp")]);

    assert_eq!(restarted.parameters["global"]["restart"], serde_json::json!(1));
    assert!(restarted.restart_from.is_none());
    assert!(restarted.command("sim").contains(" restart=1"));
}

#[test]
fn test_prepare_restart_requires_existing_source() {
    let dir = TempDir::new().unwrap();
    let setup = RunSetup::new("proj", dir.path().join("run"));
    let mut names = NameAllocator::new();
    assert!(prepare_restart(&setup, &dir.path().join("missing"), &mut names).is_err());
}

#[test]
fn test_run_group_wires_pre_and_post_processors() {
    init_tracing();
    let mut graph = RunGraph::new();
    add_plain_node(&mut graph, "mesh");
    let mut names = NameAllocator::new();

    let (run_node, pre, post) = {
        let mut group = RunGroup::new(
            &mut graph,
            &mut names,
            Some("blob"),
            RunSetup::new("proj", "runs/blob"),
            Submitter::Local(LocalSubmitter::new(".")),
        );
        let pre = group
            .add_pre_processor(FunctionCall::new("prep", "make_grid", "scripts"), None)
            .unwrap();
        let post = group
            .add_post_processor(FunctionCall::new("analysis", "plot", "scripts"), None)
            .unwrap();
        group.add_waiting_for(["mesh"]).unwrap();
        (group.run_node().to_string(), pre, post)
    };

    assert_eq!(run_node, "run_blob");
    assert_eq!(pre, "pre_processor_blob_0");
    assert_eq!(post, "post_processor_blob_0");

    assert_eq!(graph.predecessors("run_blob"), vec!["pre_processor_blob_0"]);
    assert_eq!(graph.predecessors("pre_processor_blob_0"), vec!["mesh"]);
    assert_eq!(graph.successors("run_blob"), vec!["post_processor_blob_0"]);

    assert_eq!(graph.next_wave(), vec!["mesh"]);
    assert_eq!(graph.next_wave(), vec!["pre_processor_blob_0"]);
    assert_eq!(graph.next_wave(), vec!["run_blob"]);
    assert_eq!(graph.next_wave(), vec!["post_processor_blob_0"]);
}

#[test]
fn test_run_group_without_pre_processors_waits_on_run_node() {
    let mut graph = RunGraph::new();
    add_plain_node(&mut graph, "upstream");
    let mut names = NameAllocator::new();

    {
        let mut group = RunGroup::new(
            &mut graph,
            &mut names,
            None,
            RunSetup::new("proj", "runs/a"),
            Submitter::Local(LocalSubmitter::new(".")),
        );
        group.add_waiting_for(["upstream"]).unwrap();
        assert_eq!(group.name(), "0");
    }

    assert_eq!(graph.predecessors("run_0"), vec!["upstream"]);
}
