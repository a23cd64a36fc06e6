// src/build/mod.rs

//! Making sure the simulation program is compiled before a run.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, anyhow};
use regex::Regex;
use tracing::{debug, info};

use crate::errors::{Result, SimrunnerError};
use crate::submit::LocalSubmitter;

/// Makefile names `make` looks for, in its own order.
pub const MAKEFILE_NAMES: &[&str] = &["GNUmakefile", "Makefile", "makefile"];

pub trait Build {
    /// Build `project` if needed and return the executable's file name
    /// (relative to `project`).
    fn ensure_built(&mut self, project: &Path) -> Result<String>;
}

/// Builds with `make`, reading the executable name from the makefile.
#[derive(Debug, Clone, Default)]
pub struct MakeBuild {
    /// Run `make clean` before `make` even when the executable exists.
    pub force: bool,
    /// Projects already built by this instance.
    built: HashSet<PathBuf>,
}

fn variable_re(name: &str) -> Result<Regex> {
    Regex::new(&format!(r"(?m)^\s*{name}\s*:?=\s*(\S+)"))
        .map_err(|e| SimrunnerError::Other(anyhow!("bad makefile pattern for {name}: {e}")))
}

fn source_ext_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.(c|cc|cpp|cxx)$").expect("valid source regex"))
}

impl MakeBuild {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forced() -> Self {
        Self {
            force: true,
            built: HashSet::new(),
        }
    }

    /// First makefile found in `project`.
    pub fn find_makefile(project: &Path) -> Result<PathBuf> {
        MAKEFILE_NAMES
            .iter()
            .map(|name| project.join(name))
            .find(|p| p.is_file())
            .ok_or_else(|| {
                SimrunnerError::ConfigError(format!(
                    "no makefile ({}) in {}",
                    MAKEFILE_NAMES.join(", "),
                    project.display()
                ))
            })
    }

    /// `TARGET = name`, or else `SOURCEC = name.cxx` without its extension.
    pub fn executable_name(makefile: &Path) -> Result<String> {
        let contents = fs::read_to_string(makefile)
            .with_context(|| format!("reading makefile {}", makefile.display()))?;

        if let Some(caps) = variable_re("TARGET")?.captures(&contents) {
            return Ok(caps[1].to_string());
        }
        if let Some(caps) = variable_re("SOURCEC")?.captures(&contents) {
            let source = &caps[1];
            return Ok(source_ext_re().replace(source, "").into_owned());
        }

        Err(SimrunnerError::ConfigError(format!(
            "makefile {} defines neither TARGET nor SOURCEC",
            makefile.display()
        )))
    }

    fn make(&self, project: &Path, makefile: &Path, target: Option<&str>) -> Result<()> {
        let file_name = makefile
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let command = match target {
            Some(t) => format!("make -f {file_name} {t}"),
            None => format!("make -f {file_name}"),
        };

        info!(project = %project.display(), cmd = %command, "running make");
        let mut runner = LocalSubmitter::new(project);
        let out = runner.submit_and_wait(&command)?;
        if out.return_code != Some(0) {
            return Err(SimrunnerError::Other(anyhow!(
                "`{command}` failed in {} (return code {:?}): {}",
                project.display(),
                out.return_code,
                out.std_err.as_deref().unwrap_or("").trim()
            )));
        }
        Ok(())
    }
}

impl Build for MakeBuild {
    fn ensure_built(&mut self, project: &Path) -> Result<String> {
        let makefile = Self::find_makefile(project)?;
        let exec = Self::executable_name(&makefile)?;

        let exec_path = project.join(&exec);
        let fresh = self.built.contains(project);
        if exec_path.is_file() && (!self.force || fresh) {
            debug!(exec = %exec_path.display(), "executable present; skipping make");
            return Ok(exec);
        }

        if self.force {
            self.make(project, &makefile, Some("clean"))?;
        }
        self.make(project, &makefile, None)?;

        if !exec_path.is_file() {
            return Err(SimrunnerError::Other(anyhow!(
                "make finished but {} was not produced",
                exec_path.display()
            )));
        }
        self.built.insert(project.to_path_buf());
        Ok(exec)
    }
}
