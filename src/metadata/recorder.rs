// src/metadata/recorder.rs

use chrono::Local;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::errors::Result;
use crate::metadata::{
    Fields, MetadataStore, PARAMETERS_TABLE, RUN_TABLE, SPLIT_TABLE, SYSTEM_INFO_TABLE,
};
use crate::run::setup::{GLOBAL_SECTION, RunSetup};
use crate::types::RunStatus;

/// Outcome of recording a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapturedRun {
    /// The row this dispatch refers to: the existing one when nothing was
    /// inserted, the new one otherwise.
    pub run_id: i64,
    /// An identical run was already recorded before this call.
    pub existing: bool,
}

/// Writes run rows, deduplicating everything they reference.
#[derive(Debug, Clone)]
pub struct MetadataRecorder {
    system_info: Fields,
}

impl Default for MetadataRecorder {
    fn default() -> Self {
        Self::new(current_system_info())
    }
}

impl MetadataRecorder {
    pub fn new(system_info: Fields) -> Self {
        Self { system_info }
    }

    /// Record `setup` as a submitted run.
    ///
    /// A new run row is inserted when `force` is set or no identical run
    /// (same name, parameters, split and system) exists.
    pub fn capture_new_data_from_run(
        &self,
        store: &mut dyn MetadataStore,
        setup: &RunSetup,
        restart: bool,
        force: bool,
    ) -> Result<CapturedRun> {
        let mut parameters = setup.parameter_fields();
        if restart {
            parameters.insert(format!("{GLOBAL_SECTION}.restart"), json!(1));
        }
        let parameters_id = store.find_or_insert(PARAMETERS_TABLE, parameters)?;

        let split = Fields::from([
            ("number_of_processors".to_string(), json!(setup.split.processors())),
            ("number_of_nodes".to_string(), json!(setup.split.nodes())),
            (
                "processors_per_node".to_string(),
                json!(setup.split.processors_per_node()),
            ),
        ]);
        let split_id = store.find_or_insert(SPLIT_TABLE, split)?;
        let system_info_id = store.find_or_insert(SYSTEM_INFO_TABLE, self.system_info.clone())?;

        let name = setup
            .destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| setup.destination.display().to_string());

        let mut run = Fields::from([
            ("name".to_string(), Value::String(name.clone())),
            ("parameters_id".to_string(), json!(parameters_id)),
            ("split_id".to_string(), json!(split_id)),
            ("system_info_id".to_string(), json!(system_info_id)),
        ]);

        let existing = store.find(RUN_TABLE, &run)?;
        if let Some(run_id) = existing {
            if !force {
                debug!(run = %name, run_id, "identical run already recorded");
                return Ok(CapturedRun {
                    run_id,
                    existing: true,
                });
            }
        }

        run.insert(
            "destination".to_string(),
            Value::String(setup.destination.display().to_string()),
        );
        run.insert("log_file".to_string(), Value::String(setup.log_file.clone()));
        run.insert(
            "latest_status".to_string(),
            Value::String(RunStatus::Submitted.to_string()),
        );
        run.insert(
            "submitted_time".to_string(),
            Value::String(Local::now().to_rfc3339()),
        );
        let run_id = store.insert(RUN_TABLE, run)?;
        info!(run = %name, run_id, forced = force, "run recorded");

        Ok(CapturedRun {
            run_id,
            existing: existing.is_some(),
        })
    }
}

/// Description of the machine the runs are launched from.
pub fn current_system_info() -> Fields {
    let host = std::env::var("HOSTNAME").unwrap_or_default();
    Fields::from([
        ("os".to_string(), json!(std::env::consts::OS)),
        ("family".to_string(), json!(std::env::consts::FAMILY)),
        ("arch".to_string(), json!(std::env::consts::ARCH)),
        ("host".to_string(), json!(host)),
    ])
}
