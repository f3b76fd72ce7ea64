//! Persistent key-value store for request acknowledgements
//!
//! The host framework owns the real store; it is injected through
//! [`KeyValueStore`]. [`FileStore`] keeps the entries in a JSON document
//! on disk, [`MemoryStore`] keeps them in a map.

use crate::error::{IntegrationError, Result};
use aws_integration_config::IntegrationConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

const STORE_VERSION: u32 = 1;
const BACKUP_SUFFIX: &str = "backup";

/// Process-wide key-value store scoped by string keys
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Remove a key; removing a missing key is not an error
    fn unset(&mut self, key: &str) -> Result<()>;
}

/// Map-backed store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn unset(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// On-disk layout of a [`FileStore`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreDocument {
    /// Document format version
    pub version: u32,

    /// Last modified timestamp
    pub updated_at: DateTime<Utc>,

    /// Stored entries
    pub entries: BTreeMap<String, String>,
}

impl Default for StoreDocument {
    fn default() -> Self {
        Self {
            version: STORE_VERSION,
            updated_at: Utc::now(),
            entries: BTreeMap::new(),
        }
    }
}

/// JSON-file-backed store.
///
/// Writes are buffered until [`FileStore::flush`]; a dirty store is also
/// flushed on drop.
pub struct FileStore {
    path: PathBuf,
    document: StoreDocument,
    dirty: bool,
}

impl FileStore {
    /// Open the store at `path`, starting empty if the file does not exist
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let document = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let document: StoreDocument = serde_json::from_str(&content)?;
            if document.version > STORE_VERSION {
                return Err(IntegrationError::StateVersion {
                    found: document.version,
                    supported: STORE_VERSION,
                });
            }
            tracing::debug!(
                "Loaded {} store entries from {}",
                document.entries.len(),
                path.display()
            );
            document
        } else {
            tracing::debug!("Store file {} not found, starting empty", path.display());
            StoreDocument::default()
        };

        Ok(Self {
            path,
            document,
            dirty: false,
        })
    }

    /// Open the store at the location named by the configuration
    pub fn from_config(config: &IntegrationConfig) -> Result<Self> {
        Self::open(config.state_file_path()?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".");
        name.push(BACKUP_SUFFIX);
        PathBuf::from(name)
    }

    /// Write pending changes to disk, keeping the previous file as a backup
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        if self.path.exists() {
            let backup = self.backup_path();
            if backup.exists() {
                fs::remove_file(&backup)?;
            }
            fs::rename(&self.path, &backup)?;
        }

        self.document.updated_at = Utc::now();
        let content = serde_json::to_string_pretty(&self.document)?;
        fs::write(&self.path, content)?;
        self.dirty = false;

        tracing::debug!(
            "Saved {} store entries to {}",
            self.document.entries.len(),
            self.path.display()
        );
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.document.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let previous = self
            .document
            .entries
            .insert(key.to_string(), value.to_string());
        if previous.as_deref() != Some(value) {
            self.dirty = true;
        }
        Ok(())
    }

    fn unset(&mut self, key: &str) -> Result<()> {
        if self.document.entries.remove(key).is_some() {
            self.dirty = true;
        }
        Ok(())
    }
}

impl Drop for FileStore {
    fn drop(&mut self) {
        if self.dirty {
            if let Err(e) = self.flush() {
                tracing::warn!("Failed to flush store {}: {}", self.path.display(), e);
            }
        }
    }
}
