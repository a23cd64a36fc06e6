// src/submit/script.rs

//! Python invocation scripts for function-call nodes.
//!
//! Arguments travel as JSON text decoded inside the script, so any value
//! that has a JSON form reaches the function unchanged.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::Value;
use tracing::{info, warn};

use crate::errors::Result;

/// A Python function to call with fixed arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    /// Dotted module path, e.g. `analysis.plots`.
    pub module: String,
    pub function: String,
    pub args: Vec<Value>,
    pub kwargs: BTreeMap<String, Value>,
    pub interpreter: String,
    /// Where invocation scripts are written.
    pub script_dir: PathBuf,
    /// Prepended to `sys.path` so `module` can be imported.
    pub search_paths: Vec<PathBuf>,
}

impl FunctionCall {
    pub fn new(
        module: impl Into<String>,
        function: impl Into<String>,
        script_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            module: module.into(),
            function: function.into(),
            args: Vec::new(),
            kwargs: BTreeMap::new(),
            interpreter: "python3".to_string(),
            script_dir: script_dir.into(),
            search_paths: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = args;
        self
    }

    pub fn with_kwargs(mut self, kwargs: BTreeMap<String, Value>) -> Self {
        self.kwargs = kwargs;
        self
    }

    pub fn with_search_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.search_paths.push(path.into());
        self
    }

    /// Source text of the invocation script.
    pub fn render(&self) -> Result<String> {
        let args_json = serde_json::to_string(&self.args)?;
        let kwargs_json = serde_json::to_string(&self.kwargs)?;

        let mut script = String::from("#!/usr/bin/env python3\nimport json\nimport sys\n");
        for path in self.search_paths.iter().rev() {
            let literal = serde_json::to_string(&path.display().to_string())?;
            script.push_str(&format!("sys.path.insert(0, {literal})\n"));
        }
        script.push_str(&format!("from {} import {}\n", self.module, self.function));
        script.push_str(&format!(
            "{}(*json.loads({}), **json.loads({}))\n",
            self.function,
            serde_json::to_string(&args_json)?,
            serde_json::to_string(&kwargs_json)?,
        ));
        Ok(script)
    }

    /// Write `<script_dir>/<name>.py` and return its absolute path.
    pub fn write_script(&self, name: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.script_dir)
            .with_context(|| format!("creating script dir {}", self.script_dir.display()))?;
        let path = self.script_dir.join(format!("{name}.py"));
        fs::write(&path, self.render()?)
            .with_context(|| format!("writing python script {}", path.display()))?;
        let path = fs::canonicalize(&path)?;
        info!(path = %path.display(), function = %self.function, "python script written");
        Ok(path)
    }

    /// Shell command that runs a script written by [`write_script`](Self::write_script).
    pub fn command(&self, script: &Path) -> String {
        format!("{} {}", self.interpreter, script.display())
    }
}

/// Convert a TOML value into JSON.
///
/// Values with no JSON form (datetimes, non-finite floats) become their
/// text representation, with a warning.
pub fn json_from_toml(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Integer(i) => Value::from(*i),
        toml::Value::Float(f) => match serde_json::Number::from_f64(*f) {
            Some(n) => Value::Number(n),
            None => {
                warn!(value = %f, "float has no JSON form; passing it as a string");
                Value::String(f.to_string())
            }
        },
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(dt) => {
            warn!(value = %dt, "datetime has no JSON form; passing it as a string");
            Value::String(dt.to_string())
        }
        toml::Value::Array(items) => Value::Array(items.iter().map(json_from_toml).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .iter()
                .map(|(k, v)| (k.clone(), json_from_toml(v)))
                .collect(),
        ),
    }
}
