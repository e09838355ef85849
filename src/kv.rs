//! Key-value persistence underneath the entity store.
//!
//! Each key holds one whole JSON document (a collection or the settings
//! object). Writes replace the document; there is no merge and no per-record
//! storage. `FileStore` keeps one `<key>.json` file per key in a data
//! directory, `MemoryStore` backs tests.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::ALL_KEYS;
use crate::error::Result;

/// Whole-document key-value storage.
pub trait KvStore {
    /// Read a document. Missing or unreadable documents read as `None`.
    fn get(&self, key: &str) -> Option<Value>;

    /// Replace a document.
    fn set(&mut self, key: &str, value: &Value) -> Result<()>;

    /// Remove a document if present.
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: BTreeMap<String, Value>,
    /// Number of `set` calls served, for asserting that rejected edits never write.
    pub writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Peek at the raw document without going through typed accessors.
    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.docs.get(key)
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.docs.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &Value) -> Result<()> {
        self.docs.insert(key.to_string(), value.clone());
        self.writes += 1;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.docs.remove(key);
        Ok(())
    }
}

/// Directory-backed store with one pretty-printed JSON file per key.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) a data directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(FileStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Copy every existing collection file into `backup/<timestamp>/`.
    ///
    /// Returns the backup directory, or `None` when there was nothing to copy.
    pub fn backup(&self) -> Result<Option<PathBuf>> {
        let existing: Vec<(&str, PathBuf)> = ALL_KEYS
            .iter()
            .map(|k| (*k, self.path_for(k)))
            .filter(|(_, p)| p.exists())
            .collect();
        if existing.is_empty() {
            return Ok(None);
        }

        let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
        let backup_dir = self.dir.join("backup").join(timestamp.to_string());
        fs::create_dir_all(&backup_dir)?;
        for (key, path) in existing {
            fs::copy(&path, backup_dir.join(format!("{key}.json")))?;
        }
        Ok(Some(backup_dir))
    }
}

impl KvStore for FileStore {
    fn get(&self, key: &str) -> Option<Value> {
        let path = self.path_for(key);
        let mut buf = String::new();
        match File::open(&path).and_then(|mut f| f.read_to_string(&mut buf)) {
            Ok(_) => match serde_json::from_str(&buf) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(key, error = %e, "unparsable document, reading as empty");
                    None
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!(key, error = %e, "unreadable document, reading as empty");
                None
            }
        }
    }

    fn set(&mut self, key: &str, value: &Value) -> Result<()> {
        // Atomic-ish write via temp + rename.
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let mut f = File::create(&tmp)?;
        let data = serde_json::to_string_pretty(value)?;
        f.write_all(data.as_bytes())?;
        f.flush()?;
        fs::rename(tmp, &path)?;
        debug!(key, bytes = data.len(), "document written");
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
