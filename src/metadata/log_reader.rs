// src/metadata/log_reader.rs

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::Context;
use chrono::NaiveDateTime;
use regex::Regex;

use crate::errors::Result;

/// What a run log says about the run so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSummary {
    pub started: bool,
    pub start_time: Option<String>,
    pub ended: bool,
    pub end_time: Option<String>,
    pub pid: Option<u32>,
}

pub trait LogReader {
    fn parse(&self, path: &Path) -> Result<LogSummary>;
}

/// Reads the start / finish / pid marker lines written by the simulation.
///
/// ```text
/// pid: 4242
/// Run started at  : Tue Jul 13 10:00:00 2021
/// Run finished at  : Tue Jul 13 10:05:00 2021
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkerLogReader;

fn started_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^Run started at\s*:\s*(.*?)\s*$").expect("valid log regex"))
}

fn finished_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^Run finished at\s*:\s*(.*?)\s*$").expect("valid log regex")
    })
}

fn pid_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^pid:\s*(\d+)\s*$").expect("valid log regex"))
}

impl MarkerLogReader {
    pub fn parse_str(&self, contents: &str) -> LogSummary {
        let start_time = started_re()
            .captures(contents)
            .map(|caps| normalise_time(&caps[1]));
        let end_time = finished_re()
            .captures(contents)
            .map(|caps| normalise_time(&caps[1]));
        let pid = pid_re()
            .captures(contents)
            .and_then(|caps| caps[1].parse::<u32>().ok());

        LogSummary {
            started: start_time.is_some(),
            start_time,
            ended: end_time.is_some(),
            end_time,
            pid,
        }
    }
}

impl LogReader for MarkerLogReader {
    fn parse(&self, path: &Path) -> Result<LogSummary> {
        let bytes = fs::read(path).with_context(|| format!("reading run log {}", path.display()))?;
        Ok(self.parse_str(&String::from_utf8_lossy(&bytes)))
    }
}

/// `Tue Jul 13 10:00:00 2021` becomes `2021-07-13T10:00:00`; anything else
/// is kept as written.
fn normalise_time(raw: &str) -> String {
    let squashed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    match NaiveDateTime::parse_from_str(&squashed, "%a %b %d %H:%M:%S %Y") {
        Ok(t) => t.format("%Y-%m-%dT%H:%M:%S").to_string(),
        Err(_) => raw.to_string(),
    }
}
