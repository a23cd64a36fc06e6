// tests/config_graph.rs

use std::io::Write;
use std::time::Duration;

use simrunner::config::{SubmitterSection, load_and_validate};
use simrunner::graph::{NodeKind, RunGraph};
use simrunner::submit::Submitter;
use simrunner::types::SubmitterKind;
use simrunner_test_utils::builders::{ConfigFileBuilder, FunctionConfigBuilder, RunConfigBuilder};
use simrunner_test_utils::init_tracing;
use tempfile::NamedTempFile;

#[test]
fn test_full_config_parses() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[config]
wait_interval = "250ms"
database = "meta/runs.json"
raise_errors = true

[submitter]
kind = "slurm"
walltime = "0-01:00:00"
account = "proj42"
processors = 8
nodes = 2

[run.base]
project = "conduction"
destination = "runs/base"
parameters = {{ global = {{ nout = 5, tag = "first run" }}, conduction = {{ chi = 1.5 }} }}
input_files = ["BOUT.inp"]

[run.local_check]
project = "conduction"
destination = "runs/check"
submitter = {{ kind = "local", processors = 1, nodes = 1 }}
after = ["base"]

[function.plot]
module = "analysis"
function = "plot"
args = ["runs/base"]
kwargs = {{ dpi = 150 }}
after = ["base"]
"#
    )
    .unwrap();

    let cfg = load_and_validate(file.path()).unwrap();
    assert_eq!(cfg.config.wait_interval().unwrap(), Duration::from_millis(250));
    assert_eq!(cfg.config.database, "meta/runs.json");
    assert!(cfg.config.raise_errors);
    assert_eq!(cfg.node_names().collect::<Vec<_>>(), vec!["base", "local_check", "plot"]);
    assert_eq!(cfg.dependencies_of("plot"), &["base".to_string()]);

    let base = cfg.submitter_spec(None).unwrap();
    assert_eq!(base.kind, SubmitterKind::Slurm);
    assert_eq!(base.split.processors_per_node(), 4);
    assert_eq!(base.walltime.unwrap().to_slurm(), "0-01:00:00");

    let local = cfg
        .submitter_spec(cfg.run["local_check"].submitter.as_ref())
        .unwrap();
    assert_eq!(local.kind, SubmitterKind::Local);
    assert_eq!(local.split.processors(), 1);
    // Unset fields fall back to [submitter].
    assert_eq!(local.account.as_deref(), Some("proj42"));
}

#[test]
fn test_submitter_merge_prefers_override() {
    let base = SubmitterSection {
        kind: Some(SubmitterKind::Pbs),
        queue: Some("long".to_string()),
        processors: Some(16),
        ..SubmitterSection::default()
    };
    let over = SubmitterSection {
        queue: Some("short".to_string()),
        ..SubmitterSection::default()
    };

    let merged = base.merged(&over);
    assert_eq!(merged.kind, Some(SubmitterKind::Pbs));
    assert_eq!(merged.queue.as_deref(), Some("short"));
    assert_eq!(merged.processors, Some(16));
}

#[test]
fn test_graph_from_config() {
    init_tracing();
    let cfg = ConfigFileBuilder::new()
        .with_submitter(SubmitterSection {
            kind: Some(SubmitterKind::Pbs),
            ..SubmitterSection::default()
        })
        .with_run(
            "base",
            RunConfigBuilder::new("conduction", "runs/base")
                .param("global", "nout", 5i64)
                .param("conduction", "chi", 1.5)
                .launcher("srun")
                .build(),
        )
        .with_run(
            "second",
            RunConfigBuilder::new("conduction", "runs/second")
                .after("base")
                .submitter(SubmitterSection {
                    kind: Some(SubmitterKind::Local),
                    ..SubmitterSection::default()
                })
                .build(),
        )
        .with_function(
            "plot",
            FunctionConfigBuilder::new("analysis", "plot")
                .arg("runs/base")
                .kwarg("dpi", 150i64)
                .after("base")
                .after("second")
                .build(),
        )
        .build();

    let mut graph = RunGraph::from_config(&cfg).unwrap();
    assert_eq!(graph.total_nodes(), 3);
    assert_eq!(graph.predecessors("plot"), vec!["base", "second"]);

    let base = graph.node("base").unwrap();
    match &base.submitter {
        Submitter::Pbs(pbs) => assert_eq!(
            pbs.options().store_dir,
            std::env::current_dir().unwrap().join("jobs")
        ),
        other => panic!("Expected Pbs submitter, got: {:?}", other),
    }
    match &base.kind {
        NodeKind::BatchRun(setup) => {
            let cwd = std::env::current_dir().unwrap();
            assert_eq!(setup.project, cwd.join("conduction"));
            assert_eq!(setup.destination, cwd.join("runs/base"));
            assert_eq!(
                setup.command("conduction"),
                format!(
                    "srun {} -d {} conduction.chi=1.5 nout=5",
                    cwd.join("conduction/conduction").display(),
                    cwd.join("runs/base").display()
                )
            );
        }
        other => panic!("Expected BatchRun, got: {:?}", other),
    }

    let second = graph.node("second").unwrap();
    match &second.submitter {
        Submitter::Local(local) => {
            assert_eq!(local.run_dir(), std::env::current_dir().unwrap().as_path())
        }
        other => panic!("Expected Local submitter, got: {:?}", other),
    }

    match &graph.node("plot").unwrap().kind {
        NodeKind::FunctionCall(call) => {
            assert_eq!(call.module, "analysis");
            assert_eq!(call.args, vec![serde_json::json!("runs/base")]);
            assert_eq!(call.kwargs["dpi"], serde_json::json!(150));
            assert!(!call.search_paths.is_empty());
            assert!(call.script_dir.is_absolute());
        }
        other => panic!("Expected FunctionCall, got: {:?}", other),
    }

    assert_eq!(graph.next_wave(), vec!["base"]);
    assert_eq!(graph.next_wave(), vec!["second"]);
    assert_eq!(graph.next_wave(), vec!["plot"]);
}
