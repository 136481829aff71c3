//! Cache persistence providers.
//!
//! The engine keeps the mailbox tree in memory; a [`CacheStore`] makes parts
//! of it durable across restarts. The store is addressed by [`TreePath`] and
//! knows nothing about IMAP:
//!
//! - child listings under [`TreePath::Root`] / [`TreePath::Mailbox`]
//! - synchronized message lists under [`TreePath::MessageList`]
//! - downloaded body parts under [`TreePath::Part`]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::tree::{MailboxInfo, MessageList, TreePath};
use crate::{Error, Result};

/// One persisted value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CacheEntry {
    /// Child mailboxes of a mailbox or of the root.
    Children(Vec<MailboxInfo>),
    /// A message list snapshot, including its UIDVALIDITY.
    Messages(MessageList),
    /// Raw bytes of a body part.
    Part(Vec<u8>),
}

/// Durable storage for cache entries.
pub trait CacheStore: Send {
    /// Reads an entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn get(&self, path: &TreePath) -> Result<Option<CacheEntry>>;

    /// Writes an entry, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn put(&mut self, path: &TreePath, entry: CacheEntry) -> Result<()>;

    /// Removes the entry at `path` and every entry below it.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn remove(&mut self, path: &TreePath) -> Result<()>;
}

/// Volatile store; the default when no cache file is configured.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<TreePath, CacheEntry>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, path: &TreePath) -> Result<Option<CacheEntry>> {
        Ok(self.entries.get(path).cloned())
    }

    fn put(&mut self, path: &TreePath, entry: CacheEntry) -> Result<()> {
        self.entries.insert(path.clone(), entry);
        Ok(())
    }

    fn remove(&mut self, path: &TreePath) -> Result<()> {
        self.entries.retain(|p, _| !p.starts_with(path));
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    path: TreePath,
    entry: CacheEntry,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    saved_at: DateTime<Utc>,
    entries: Vec<StoredEntry>,
}

/// JSON file store. Every write rewrites the file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    memory: MemoryStore,
    saved_at: Option<DateTime<Utc>>,
}

impl JsonFileStore {
    /// Default cache file location (`<cache dir>/mailtree/cache.json`).
    ///
    /// # Errors
    ///
    /// Returns an error if the platform has no cache directory.
    pub fn default_path() -> Result<PathBuf> {
        dirs::cache_dir()
            .map(|dir| dir.join("mailtree").join("cache.json"))
            .ok_or_else(|| Error::Config("no cache directory on this platform".to_string()))
    }

    /// Opens the store at `path`, loading existing entries.
    ///
    /// A missing file yields an empty store. An unreadable file is an error; a
    /// file that is not valid JSON is discarded with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut store = Self {
            path,
            memory: MemoryStore::new(),
            saved_at: None,
        };

        let text = match std::fs::read_to_string(&store.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(store),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str::<CacheFile>(&text) {
            Ok(file) => {
                store.saved_at = Some(file.saved_at);
                for StoredEntry { path, entry } in file.entries {
                    store.memory.entries.insert(path, entry);
                }
                debug!(path = %store.path.display(), entries = store.memory.len(), "loaded cache");
            }
            Err(e) => warn!(path = %store.path.display(), "discarding corrupt cache: {e}"),
        }
        Ok(store)
    }

    /// Location of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// When the file was last written.
    #[must_use]
    pub const fn saved_at(&self) -> Option<DateTime<Utc>> {
        self.saved_at
    }

    fn save(&mut self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let saved_at = Utc::now();
        let file = CacheFile {
            saved_at,
            entries: self
                .memory
                .entries
                .iter()
                .map(|(path, entry)| StoredEntry {
                    path: path.clone(),
                    entry: entry.clone(),
                })
                .collect(),
        };
        std::fs::write(&self.path, serde_json::to_vec(&file)?)?;
        self.saved_at = Some(saved_at);
        Ok(())
    }
}

impl CacheStore for JsonFileStore {
    fn get(&self, path: &TreePath) -> Result<Option<CacheEntry>> {
        self.memory.get(path)
    }

    fn put(&mut self, path: &TreePath, entry: CacheEntry) -> Result<()> {
        self.memory.put(path, entry)?;
        self.save()
    }

    fn remove(&mut self, path: &TreePath) -> Result<()> {
        self.memory.remove(path)?;
        self.save()
    }
}
