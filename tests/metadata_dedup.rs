// tests/metadata_dedup.rs

use serde_json::json;
use simrunner::metadata::{
    Fields, InMemoryStore, JsonFileStore, MetadataRecorder, MetadataStore, PARAMETERS_TABLE,
    RUN_TABLE, SPLIT_TABLE, SYSTEM_INFO_TABLE,
};
use simrunner::run::RunSetup;
use simrunner::submit::ProcessorSplit;
use simrunner_test_utils::init_tracing;
use tempfile::TempDir;

fn recorder() -> MetadataRecorder {
    MetadataRecorder::new(Fields::from([
        ("os".to_string(), json!("linux")),
        ("host".to_string(), json!("node01")),
    ]))
}

fn setup() -> RunSetup {
    RunSetup::new("projects/conduction", "runs/base")
        .with_parameter("global", "nout", 5)
        .with_parameter("conduction", "chi", 1.5)
}

#[test]
fn test_identical_run_is_recorded_once_unless_forced() {
    init_tracing();
    let mut store = InMemoryStore::new();
    let rec = recorder();

    let first = rec
        .capture_new_data_from_run(&mut store, &setup(), false, false)
        .unwrap();
    assert!(!first.existing);

    let second = rec
        .capture_new_data_from_run(&mut store, &setup(), false, false)
        .unwrap();
    assert!(second.existing);
    assert_eq!(second.run_id, first.run_id);
    assert_eq!(store.count(RUN_TABLE).unwrap(), 1);

    let forced = rec
        .capture_new_data_from_run(&mut store, &setup(), false, true)
        .unwrap();
    assert!(forced.existing);
    assert_ne!(forced.run_id, first.run_id);
    assert_eq!(store.count(RUN_TABLE).unwrap(), 2);

    assert_eq!(store.count(SYSTEM_INFO_TABLE).unwrap(), 1);
    assert_eq!(store.count(PARAMETERS_TABLE).unwrap(), 1);
    assert_eq!(store.count(SPLIT_TABLE).unwrap(), 1);
}

#[test]
fn test_changed_parameters_make_a_new_run() {
    let mut store = InMemoryStore::new();
    let rec = recorder();

    rec.capture_new_data_from_run(&mut store, &setup(), false, false)
        .unwrap();
    let changed = setup().with_parameter("conduction", "chi", 3.0);
    let captured = rec
        .capture_new_data_from_run(&mut store, &changed, false, false)
        .unwrap();

    assert!(!captured.existing);
    assert_eq!(store.count(RUN_TABLE).unwrap(), 2);
    assert_eq!(store.count(PARAMETERS_TABLE).unwrap(), 2);
}

#[test]
fn test_parameter_subset_is_not_reused() {
    let mut store = InMemoryStore::new();
    let rec = recorder();

    rec.capture_new_data_from_run(&mut store, &setup(), false, false)
        .unwrap();
    let fewer = RunSetup::new("projects/conduction", "runs/base").with_parameter("global", "nout", 5);
    let captured = rec
        .capture_new_data_from_run(&mut store, &fewer, false, false)
        .unwrap();

    assert!(!captured.existing);
    assert_eq!(store.count(PARAMETERS_TABLE).unwrap(), 2);
}

#[test]
fn test_split_and_restart_are_part_of_the_key() {
    let mut store = InMemoryStore::new();
    let rec = recorder();

    rec.capture_new_data_from_run(&mut store, &setup(), false, false)
        .unwrap();

    let mut wide = setup();
    wide.split = ProcessorSplit::new(4, 1, 4).unwrap();
    assert!(
        !rec.capture_new_data_from_run(&mut store, &wide, false, false)
            .unwrap()
            .existing
    );

    let restarted = rec
        .capture_new_data_from_run(&mut store, &setup(), true, false)
        .unwrap();
    assert!(!restarted.existing);

    let (_, params) = store
        .rows(PARAMETERS_TABLE)
        .unwrap()
        .into_iter()
        .find(|(_, row)| row.contains_key("global.restart"))
        .expect("restart parameters row");
    assert_eq!(params["global.restart"], json!(1));
    assert_eq!(store.count(SPLIT_TABLE).unwrap(), 2);
}

#[test]
fn test_run_row_contents() {
    let mut store = InMemoryStore::new();
    let captured = recorder()
        .capture_new_data_from_run(&mut store, &setup(), false, false)
        .unwrap();

    let row = store.get(RUN_TABLE, captured.run_id).unwrap().unwrap();
    assert_eq!(row["name"], json!("base"));
    assert_eq!(row["destination"], json!("runs/base"));
    assert_eq!(row["log_file"], json!("BOUT.log.0"));
    assert_eq!(row["latest_status"], json!("submitted"));
    assert!(row["submitted_time"].as_str().is_some());
}

#[test]
fn test_json_store_persists_across_reopen() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("meta").join("simrunner.json");

    {
        let mut store = JsonFileStore::open(&path).unwrap();
        recorder()
            .capture_new_data_from_run(&mut store, &setup(), false, false)
            .unwrap();
    }
    assert!(path.is_file());

    let mut store = JsonFileStore::open(&path).unwrap();
    assert_eq!(store.count(RUN_TABLE).unwrap(), 1);
    let again = recorder()
        .capture_new_data_from_run(&mut store, &setup(), false, false)
        .unwrap();
    assert!(again.existing);
    assert_eq!(store.count(RUN_TABLE).unwrap(), 1);

    store.update(RUN_TABLE, again.run_id, "latest_status", json!("complete")).unwrap();
    let reopened = JsonFileStore::open(&path).unwrap();
    let row = reopened.get(RUN_TABLE, again.run_id).unwrap().unwrap();
    assert_eq!(row["latest_status"], json!("complete"));
}

#[test]
fn test_update_of_missing_row_fails() {
    let mut store = InMemoryStore::new();
    assert!(store.update(RUN_TABLE, 7, "latest_status", json!("error")).is_err());
}
