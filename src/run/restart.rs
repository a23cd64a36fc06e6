// src/run/restart.rs

//! Restart directories: `<base>_restart_<n>` seeded from a previous run.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::Context;
use regex::Regex;
use tracing::{info, warn};

use crate::errors::{Result, SimrunnerError};
use crate::graph::names::NameAllocator;
use crate::run::setup::{GLOBAL_SECTION, RunSetup, copy_into};

fn restart_file_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.restart\.").expect("valid restart file regex"))
}

/// Derive the setup of a run that continues from `source`.
///
/// The new destination is the next free restart directory of the current
/// destination. It is created and filled with the restart files found in
/// `source` plus the input files (taken from `source` when present there).
/// The returned setup has `global.restart = 1` and no `restart_from`.
pub fn prepare_restart(
    setup: &RunSetup,
    source: &Path,
    names: &mut NameAllocator,
) -> Result<RunSetup> {
    if !source.is_dir() {
        return Err(SimrunnerError::ConfigError(format!(
            "restart source {} is not a directory",
            source.display()
        )));
    }

    let destination = names.restart_dir(&setup.destination)?;
    fs::create_dir_all(&destination)
        .with_context(|| format!("creating restart directory {}", destination.display()))?;

    let mut copied = 0usize;
    for entry in fs::read_dir(source)? {
        let path = entry?.path();
        let is_restart_file = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| restart_file_re().is_match(n));
        if path.is_file() && is_restart_file {
            copy_into(&path, &destination)?;
            copied += 1;
        }
    }
    if copied == 0 {
        warn!(source = %source.display(), "no restart files found");
    }

    let mut inputs = Vec::with_capacity(setup.input_files.len());
    for input in &setup.input_files {
        let from_source = input.file_name().map(|name| source.join(name));
        let copied_input = match from_source {
            Some(candidate) if candidate.is_file() => copy_into(&candidate, &destination)?,
            _ => copy_into(input, &destination)?,
        };
        inputs.push(copied_input);
    }

    let mut restarted = setup.clone();
    restarted.destination = destination;
    restarted.input_files = inputs;
    restarted.restart_from = None;
    restarted.set_parameter(GLOBAL_SECTION, "restart", 1);

    info!(
        source = %source.display(),
        destination = %restarted.destination.display(),
        restart_files = copied,
        "restart directory prepared"
    );
    Ok(restarted)
}
