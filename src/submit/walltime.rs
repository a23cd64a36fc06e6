// src/submit/walltime.rs

//! Batch-queue walltime parsing and re-encoding.
//!
//! Input may be `HH:MM:SS` or `D-HH:MM:SS`, with hours allowed to exceed 23.
//! PBS wants everything folded into hours (`89:43:21`), SLURM wants days
//! split out with hours below 24 (`3-17:43:21`).

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::errors::{Result, SimrunnerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Walltime {
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
}

fn with_days_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d+)-(\d{1,3}):(\d{2}):(\d{2})$").expect("valid walltime regex")
    })
}

fn without_days_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+):(\d{2}):(\d{2})$").expect("valid walltime regex"))
}

impl Walltime {
    pub fn new(days: u32, hours: u32, minutes: u32, seconds: u32) -> Result<Self> {
        if minutes > 59 || seconds > 59 {
            return Err(SimrunnerError::ConfigError(format!(
                "walltime minutes and seconds must be below 60 (got {minutes:02}:{seconds:02})"
            )));
        }
        Ok(Self {
            days,
            hours,
            minutes,
            seconds,
        })
    }

    pub fn total_seconds(&self) -> u64 {
        let hours = u64::from(self.days) * 24 + u64::from(self.hours);
        hours * 3600 + u64::from(self.minutes) * 60 + u64::from(self.seconds)
    }

    /// `H:MM:SS` with every day folded into the hour count.
    pub fn to_pbs(&self) -> String {
        let hours = u64::from(self.days) * 24 + u64::from(self.hours);
        format!("{:02}:{:02}:{:02}", hours, self.minutes, self.seconds)
    }

    /// `D-HH:MM:SS` with the hour count kept below 24.
    pub fn to_slurm(&self) -> String {
        let days = u64::from(self.days) + u64::from(self.hours / 24);
        let hours = self.hours % 24;
        format!("{}-{:02}:{:02}:{:02}", days, hours, self.minutes, self.seconds)
    }
}

impl FromStr for Walltime {
    type Err = SimrunnerError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let num = |m: &str| -> Result<u32> {
            m.parse::<u32>().map_err(|e| {
                SimrunnerError::ConfigError(format!("invalid walltime component '{m}': {e}"))
            })
        };

        if let Some(caps) = with_days_re().captures(s) {
            return Walltime::new(num(&caps[1])?, num(&caps[2])?, num(&caps[3])?, num(&caps[4])?);
        }
        if let Some(caps) = without_days_re().captures(s) {
            return Walltime::new(0, num(&caps[1])?, num(&caps[2])?, num(&caps[3])?);
        }

        Err(SimrunnerError::ConfigError(format!(
            "invalid walltime '{s}'; expected HH:MM:SS or D-HH:MM:SS"
        )))
    }
}

impl fmt::Display for Walltime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{:02}:{:02}:{:02}",
            self.days, self.hours, self.minutes, self.seconds
        )
    }
}
