#![allow(dead_code)]

use std::collections::HashSet;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use simrunner::build::Build;
use simrunner::errors::Result;
use simrunner::metadata::{LogReader, LogSummary, ProcessLiveness};

/// File name of the executable written by [`ScriptedBuild`].
pub const SIM_EXECUTABLE: &str = "sim.sh";

/// A `Build` that writes a small shell "simulation" instead of running make.
///
/// The executable understands `-d <dest>` plus these parameters:
/// - `fail=1`: exit 1 after writing the start marker,
/// - `sleep=<secs>`: sleep before finishing,
/// - `check_<x>=<path>`: exit 2 unless `<path>` exists.
///
/// On success it writes a full marker log (`pid`, start, finish) to
/// `<dest>/BOUT.log.0` and touches `<dest>/done`. Every invocation appends
/// its destination to the trace file.
#[derive(Clone)]
pub struct ScriptedBuild {
    trace: PathBuf,
    builds: Arc<Mutex<Vec<PathBuf>>>,
}

impl ScriptedBuild {
    pub fn new(trace: impl Into<PathBuf>) -> Self {
        Self {
            trace: trace.into(),
            builds: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Projects `ensure_built` was called for, in call order.
    pub fn builds(&self) -> Vec<PathBuf> {
        self.builds.lock().unwrap().clone()
    }

    /// Destinations in the order the executable ran.
    pub fn trace_lines(&self) -> Vec<String> {
        fs::read_to_string(&self.trace)
            .unwrap_or_default()
            .lines()
            .map(|l| l.to_string())
            .collect()
    }

    fn script(&self) -> String {
        format!(
            r#"#!/bin/sh
dest=""
fail=0
sleep_for=0
checks=""
while [ $# -gt 0 ]; do
  case "$1" in
    -d) dest="$2"; shift 2 ;;
    fail=*) fail="${{1#fail=}}"; shift ;;
    sleep=*) sleep_for="${{1#sleep=}}"; shift ;;
    check_*=*) checks="$checks ${{1#*=}}"; shift ;;
    *) shift ;;
  esac
done
for c in $checks; do
  [ -e "$c" ] || exit 2
done
mkdir -p "$dest"
echo "$dest" >> "{trace}"
echo "pid: $$" > "$dest/BOUT.log.0"
echo "Run started at : Tue Jul 13 10:00:00 2021" >> "$dest/BOUT.log.0"
if [ "$fail" = "1" ]; then
  exit 1
fi
sleep "$sleep_for"
echo "Run finished at : Tue Jul 13 10:05:00 2021" >> "$dest/BOUT.log.0"
touch "$dest/done"
"#,
            trace = self.trace.display()
        )
    }
}

impl Build for ScriptedBuild {
    fn ensure_built(&mut self, project: &Path) -> Result<String> {
        fs::create_dir_all(project)?;
        let exec = project.join(SIM_EXECUTABLE);
        fs::write(&exec, self.script())?;
        fs::set_permissions(&exec, fs::Permissions::from_mode(0o755))?;
        self.builds.lock().unwrap().push(project.to_path_buf());
        Ok(SIM_EXECUTABLE.to_string())
    }
}

/// `ProcessLiveness` answering from a fixed set of live pids.
#[derive(Debug, Clone, Default)]
pub struct FakeLiveness {
    alive: HashSet<u32>,
}

impl FakeLiveness {
    pub fn with_alive(pids: &[u32]) -> Self {
        Self {
            alive: pids.iter().copied().collect(),
        }
    }
}

impl ProcessLiveness for FakeLiveness {
    fn is_alive(&self, pid: u32) -> bool {
        self.alive.contains(&pid)
    }
}

/// `LogReader` returning whatever summary the test last set.
#[derive(Debug, Clone, Default)]
pub struct FakeLogReader {
    summary: Arc<Mutex<LogSummary>>,
}

impl FakeLogReader {
    pub fn new(summary: LogSummary) -> Self {
        Self {
            summary: Arc::new(Mutex::new(summary)),
        }
    }

    pub fn set(&self, summary: LogSummary) {
        *self.summary.lock().unwrap() = summary;
    }
}

impl LogReader for FakeLogReader {
    fn parse(&self, _path: &Path) -> Result<LogSummary> {
        Ok(self.summary.lock().unwrap().clone())
    }
}
