// src/metadata/memory.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Result, SimrunnerError};
use crate::metadata::{Fields, MetadataStore};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct Table {
    next_id: i64,
    rows: BTreeMap<i64, Fields>,
}

/// All tables, serialisable as one JSON document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct Database {
    #[serde(default)]
    tables: BTreeMap<String, Table>,
}

impl Database {
    pub(crate) fn find(&self, table: &str, fields: &Fields) -> Option<i64> {
        let table = self.tables.get(table)?;
        table
            .rows
            .iter()
            .find(|(_, row)| fields.iter().all(|(k, v)| row.get(k) == Some(v)))
            .map(|(id, _)| *id)
    }

    pub(crate) fn insert(&mut self, table: &str, fields: Fields) -> i64 {
        let table = self.tables.entry(table.to_string()).or_default();
        table.next_id += 1;
        let id = table.next_id;
        table.rows.insert(id, fields);
        id
    }

    pub(crate) fn get(&self, table: &str, id: i64) -> Option<Fields> {
        self.tables.get(table)?.rows.get(&id).cloned()
    }

    pub(crate) fn update(&mut self, table: &str, id: i64, field: &str, value: Value) -> Result<()> {
        let row = self
            .tables
            .get_mut(table)
            .and_then(|t| t.rows.get_mut(&id))
            .ok_or_else(|| {
                SimrunnerError::Other(anyhow::anyhow!("no row {id} in table '{table}'"))
            })?;
        row.insert(field.to_string(), value);
        Ok(())
    }

    pub(crate) fn rows(&self, table: &str) -> Vec<(i64, Fields)> {
        self.tables
            .get(table)
            .map(|t| t.rows.iter().map(|(id, row)| (*id, row.clone())).collect())
            .unwrap_or_default()
    }
}

/// Store that lives only as long as the process.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    db: Database,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetadataStore for InMemoryStore {
    fn find(&self, table: &str, fields: &Fields) -> Result<Option<i64>> {
        Ok(self.db.find(table, fields))
    }

    fn insert(&mut self, table: &str, fields: Fields) -> Result<i64> {
        Ok(self.db.insert(table, fields))
    }

    fn get(&self, table: &str, id: i64) -> Result<Option<Fields>> {
        Ok(self.db.get(table, id))
    }

    fn update(&mut self, table: &str, id: i64, field: &str, value: Value) -> Result<()> {
        self.db.update(table, id, field, value)
    }

    fn rows(&self, table: &str) -> Result<Vec<(i64, Fields)>> {
        Ok(self.db.rows(table))
    }
}
