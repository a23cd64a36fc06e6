// src/metadata/json_store.rs

//! Store persisted as one pretty-printed JSON file.
//!
//! The whole document is rewritten after every mutation. Single writer only.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::metadata::memory::Database;
use crate::metadata::{Fields, MetadataStore};

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    db: Database,
}

impl JsonFileStore {
    /// Open `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let db = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("reading metadata file {}", path.display()))?;
            if contents.trim().is_empty() {
                Database::default()
            } else {
                serde_json::from_str(&contents)?
            }
        } else {
            Database::default()
        };
        debug!(path = %path.display(), "metadata store opened");
        Ok(Self { path, db })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.db)?;
        fs::write(&self.path, json)
            .with_context(|| format!("writing metadata file {}", self.path.display()))?;
        Ok(())
    }
}

impl MetadataStore for JsonFileStore {
    fn find(&self, table: &str, fields: &Fields) -> Result<Option<i64>> {
        Ok(self.db.find(table, fields))
    }

    fn insert(&mut self, table: &str, fields: Fields) -> Result<i64> {
        let id = self.db.insert(table, fields);
        self.save()?;
        Ok(id)
    }

    fn get(&self, table: &str, id: i64) -> Result<Option<Fields>> {
        Ok(self.db.get(table, id))
    }

    fn update(&mut self, table: &str, id: i64, field: &str, value: Value) -> Result<()> {
        self.db.update(table, id, field, value)?;
        self.save()
    }

    fn rows(&self, table: &str) -> Result<Vec<(i64, Fields)>> {
        Ok(self.db.rows(table))
    }
}
