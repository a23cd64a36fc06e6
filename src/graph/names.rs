// src/graph/names.rs

//! Name allocation for run groups and restart directories.
//!
//! One allocator is owned by whoever builds the graph; there is no global
//! counter.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use crate::errors::{Result, SimrunnerError};

fn restart_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.*)_restart_(\d+)$").expect("valid restart regex"))
}

#[derive(Debug, Default)]
pub struct NameAllocator {
    counter: u64,
    taken: HashSet<String>,
    restarts: HashMap<PathBuf, u64>,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out a unique group name.
    ///
    /// Without a request the names are `"0"`, `"1"`, ... . A requested name
    /// that is already taken becomes `<name>_<n>`, with `n` one past the
    /// highest suffix handed out so far.
    pub fn group_name(&mut self, requested: Option<&str>) -> String {
        let name = match requested {
            None => loop {
                let candidate = self.counter.to_string();
                self.counter += 1;
                if !self.taken.contains(&candidate) {
                    break candidate;
                }
            },
            Some(req) if !self.taken.contains(req) => req.to_string(),
            Some(req) => {
                let prefix = format!("{req}_");
                let next = self
                    .taken
                    .iter()
                    .filter_map(|t| t.strip_prefix(&prefix))
                    .filter_map(|suffix| suffix.parse::<u64>().ok())
                    .max()
                    .map_or(1, |max| max + 1);
                let renamed = format!("{req}_{next}");
                warn!(requested = %req, name = %renamed, "group name already taken; renaming");
                renamed
            }
        };
        self.taken.insert(name.clone());
        name
    }

    /// Next free `<base>_restart_<n>` directory for `dir`.
    ///
    /// Any existing `_restart_<n>` suffix on `dir` is stripped first. `n`
    /// is one past the highest suffix on disk or handed out before, or 0.
    /// The directory is not created.
    pub fn restart_dir(&mut self, dir: &Path) -> Result<PathBuf> {
        let file_name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                SimrunnerError::ConfigError(format!(
                    "cannot derive a restart directory from {}",
                    dir.display()
                ))
            })?;
        let base_name = match restart_suffix_re().captures(file_name) {
            Some(caps) => caps[1].to_string(),
            None => file_name.to_string(),
        };
        let parent = match dir.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let base = parent.join(&base_name);

        let on_disk = highest_suffix_on_disk(&parent, &base_name)?;
        let handed_out = self.restarts.get(&base).copied();
        let next = match on_disk.max(handed_out) {
            Some(max) => max + 1,
            None => 0,
        };

        self.restarts.insert(base, next);
        Ok(parent.join(format!("{base_name}_restart_{next}")))
    }
}

fn highest_suffix_on_disk(parent: &Path, base_name: &str) -> Result<Option<u64>> {
    if !parent.is_dir() {
        return Ok(None);
    }
    let mut highest = None;
    for entry in fs::read_dir(parent)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(caps) = restart_suffix_re().captures(name) {
            if &caps[1] == base_name {
                if let Ok(n) = caps[2].parse::<u64>() {
                    highest = highest.max(Some(n));
                }
            }
        }
    }
    Ok(highest)
}
