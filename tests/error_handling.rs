// tests/error_handling.rs

use std::io::Write;

use simrunner::config::{load_and_validate, parse_duration};
use simrunner::errors::SimrunnerError;
use tempfile::NamedTempFile;

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", contents).unwrap();
    file
}

#[test]
fn test_dag_cycle_returns_structured_error() {
    let file = config_file(
        r#"
[run.A]
project = "proj"
destination = "runs/a"
after = ["B"]

[function.B]
module = "analysis"
function = "plot"
after = ["A"]
"#,
    );

    let result = load_and_validate(file.path());

    match result {
        Err(SimrunnerError::DagCycle(msg)) => {
            assert!(msg.contains("cycle detected"));
            assert!(msg.contains("A") || msg.contains("B"));
        }
        Err(e) => panic!("Expected DagCycle error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_unknown_dependency_returns_config_error() {
    let file = config_file(
        r#"
[run.A]
project = "proj"
destination = "runs/a"
after = ["NonExistent"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(SimrunnerError::ConfigError(msg)) => {
            assert!(msg.contains("unknown dependency"));
            assert!(msg.contains("NonExistent"));
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_self_dependency_returns_config_error() {
    let file = config_file(
        r#"
[run.A]
project = "proj"
destination = "runs/a"
after = ["A"]
"#,
    );

    match load_and_validate(file.path()) {
        Err(SimrunnerError::ConfigError(msg)) => assert!(msg.contains("itself")),
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_name_shared_by_run_and_function_is_rejected() {
    let file = config_file(
        r#"
[run.post]
project = "proj"
destination = "runs/post"

[function.post]
module = "analysis"
function = "plot"
"#,
    );

    match load_and_validate(file.path()) {
        Err(SimrunnerError::ConfigError(msg)) => assert!(msg.contains("post")),
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_empty_config_is_rejected() {
    let file = config_file("[config]\nwait_interval = \"1s\"\n");
    match load_and_validate(file.path()) {
        Err(SimrunnerError::ConfigError(msg)) => assert!(msg.contains("at least one")),
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_bad_processor_split_is_rejected() {
    let file = config_file(
        r#"
[submitter]
kind = "slurm"
processors = 64
nodes = 2
processors_per_node = 16

[run.A]
project = "proj"
destination = "runs/a"
"#,
    );

    match load_and_validate(file.path()) {
        Err(SimrunnerError::ConfigError(msg)) => assert!(msg.contains("[submitter]")),
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_bad_node_walltime_names_the_node() {
    let file = config_file(
        r#"
[run.A]
project = "proj"
destination = "runs/a"
submitter = { kind = "pbs", walltime = "1:00" }
"#,
    );

    match load_and_validate(file.path()) {
        Err(SimrunnerError::ConfigError(msg)) => {
            assert!(msg.contains("'A'"));
            assert!(msg.contains("walltime"));
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_unknown_submitter_kind_is_a_toml_error() {
    let file = config_file(
        r#"
[submitter]
kind = "condor"

[run.A]
project = "proj"
destination = "runs/a"
"#,
    );

    match load_and_validate(file.path()) {
        Err(SimrunnerError::TomlError(_)) => {}
        Err(e) => panic!("Expected TomlError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_zero_wait_interval_is_rejected() {
    let file = config_file(
        r#"
[config]
wait_interval = "0s"

[run.A]
project = "proj"
destination = "runs/a"
"#,
    );

    match load_and_validate(file.path()) {
        Err(SimrunnerError::ConfigError(msg)) => assert!(msg.contains("wait_interval")),
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_missing_file_is_io_error() {
    match load_and_validate("/definitely/not/here/Simrunner.toml") {
        Err(SimrunnerError::IoError(_)) => {}
        Err(e) => panic!("Expected IoError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_parse_duration() {
    assert_eq!(parse_duration("500ms").unwrap().as_millis(), 500);
    assert_eq!(parse_duration("3s").unwrap().as_secs(), 3);
    assert_eq!(parse_duration("2m").unwrap().as_secs(), 120);
    assert_eq!(parse_duration("1h").unwrap().as_secs(), 3600);
    assert!(parse_duration("").is_err());
    assert!(parse_duration("10").is_err());
    assert!(parse_duration("5d").is_err());
}
