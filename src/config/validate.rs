// src/config/validate.rs

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, SimrunnerError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::SimrunnerError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_nodes(cfg)?;
    validate_global_config(cfg)?;
    ensure_unique_names(cfg)?;
    validate_submitters(cfg)?;
    validate_dependencies(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_nodes(cfg: &RawConfigFile) -> Result<()> {
    if cfg.run.is_empty() && cfg.function.is_empty() {
        return Err(SimrunnerError::ConfigError(
            "config must contain at least one [run.<name>] or [function.<name>] section"
                .to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    let interval = cfg.config.wait_interval()?;
    if interval.is_zero() {
        return Err(SimrunnerError::ConfigError(
            "[config].wait_interval must be > 0".to_string(),
        ));
    }
    if cfg.config.database.trim().is_empty() {
        return Err(SimrunnerError::ConfigError(
            "[config].database must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn ensure_unique_names(cfg: &RawConfigFile) -> Result<()> {
    if let Some(name) = cfg.run.keys().find(|name| cfg.function.contains_key(*name)) {
        return Err(SimrunnerError::ConfigError(format!(
            "'{}' is defined both as [run.{}] and [function.{}]",
            name, name, name
        )));
    }
    Ok(())
}

fn validate_submitters(cfg: &RawConfigFile) -> Result<()> {
    cfg.submitter.to_spec().map_err(|e| {
        SimrunnerError::ConfigError(format!("[submitter]: {e}"))
    })?;

    let overrides = cfg
        .run
        .iter()
        .map(|(n, r)| (n, r.submitter.as_ref()))
        .chain(cfg.function.iter().map(|(n, f)| (n, f.submitter.as_ref())));
    for (name, over) in overrides {
        if let Some(over) = over {
            cfg.submitter.merged(over).to_spec().map_err(|e| {
                SimrunnerError::ConfigError(format!("submitter of '{}': {}", name, e))
            })?;
        }
    }
    Ok(())
}

fn validate_dependencies(cfg: &RawConfigFile) -> Result<()> {
    let deps = cfg
        .run
        .iter()
        .map(|(n, r)| (n, &r.after))
        .chain(cfg.function.iter().map(|(n, f)| (n, &f.after)));

    for (name, after) in deps {
        for dep in after {
            if dep == name {
                return Err(SimrunnerError::ConfigError(format!(
                    "node '{}' cannot depend on itself in `after`",
                    name
                )));
            }
            if !cfg.run.contains_key(dep) && !cfg.function.contains_key(dep) {
                return Err(SimrunnerError::ConfigError(format!(
                    "node '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dep -> node, as in the run graph.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.run.keys().chain(cfg.function.keys()) {
        graph.add_node(name.as_str());
    }

    let deps = cfg
        .run
        .iter()
        .map(|(n, r)| (n, &r.after))
        .chain(cfg.function.iter().map(|(n, f)| (n, &f.after)));
    for (name, after) in deps {
        for dep in after {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(SimrunnerError::DagCycle(format!(
                "cycle detected in run graph involving node '{}'",
                node
            )))
        }
    }
}
