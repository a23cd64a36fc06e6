// src/metadata/mod.rs

//! Run bookkeeping.
//!
//! Responsibilities:
//! - A small table store keyed by integer ids (`MetadataStore`).
//! - Recording a run with deduplicated parameter/split/system rows
//!   (`recorder.rs`).
//! - Reading run logs (`log_reader.rs`) and advancing run status
//!   (`status.rs`).

pub mod json_store;
pub mod log_reader;
pub mod memory;
pub mod recorder;
pub mod status;

use std::collections::BTreeMap;

use serde_json::Value;

use crate::errors::Result;

pub use json_store::JsonFileStore;
pub use log_reader::{LogReader, LogSummary, MarkerLogReader};
pub use memory::InMemoryStore;
pub use recorder::{CapturedRun, MetadataRecorder};
pub use status::{KillSignalCheck, ProcessLiveness, StatusChecker};

/// One row: column name to value.
pub type Fields = BTreeMap<String, Value>;

pub const RUN_TABLE: &str = "run";
pub const PARAMETERS_TABLE: &str = "parameters";
pub const SPLIT_TABLE: &str = "split";
pub const SYSTEM_INFO_TABLE: &str = "system_info";

/// Table storage with find-or-insert semantics.
///
/// Ids are positive and unique per table.
pub trait MetadataStore {
    /// Id of the first row whose values equal every field in `fields`.
    fn find(&self, table: &str, fields: &Fields) -> Result<Option<i64>>;

    fn insert(&mut self, table: &str, fields: Fields) -> Result<i64>;

    fn get(&self, table: &str, id: i64) -> Result<Option<Fields>>;

    fn update(&mut self, table: &str, id: i64, field: &str, value: Value) -> Result<()>;

    /// All rows of `table` in id order.
    fn rows(&self, table: &str) -> Result<Vec<(i64, Fields)>>;

    fn count(&self, table: &str) -> Result<usize> {
        Ok(self.rows(table)?.len())
    }

    /// Id of a row equal to `fields` (no extra columns), inserting it if
    /// there is none.
    fn find_or_insert(&mut self, table: &str, fields: Fields) -> Result<i64> {
        let exact = self
            .rows(table)?
            .into_iter()
            .find(|(_, row)| *row == fields)
            .map(|(id, _)| id);
        match exact {
            Some(id) => Ok(id),
            None => self.insert(table, fields),
        }
    }
}
