//! Embedded key-value database
//!
//! A thin trait over the embedded store so the agent can run without
//! persistence when no database path is configured.

use std::path::Path;
use std::sync::Arc;

use crate::error::Result;

#[cfg(test)]
#[path = "database_test.rs"]
mod tests;

/// Key-value pairs handed to `write_batch`
pub type KvPairs = Vec<(Vec<u8>, Vec<u8>)>;

/// Durable key -> bytes store shared by every operator
///
/// Writes are isolated per scope by the [`crate::ScopedPersister`]
/// key prefix; the database itself is shared-read.
pub trait Database: Send + Sync {
    /// Read a single key
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Read every key-value pair under a prefix
    fn scan_prefix(&self, prefix: &[u8]) -> Result<KvPairs>;

    /// Write a set of key-value pairs atomically
    fn write_batch(&self, pairs: KvPairs) -> Result<()>;

    /// Flush buffered writes to durable storage
    fn sync(&self) -> Result<()>;

    /// Flush and release the store
    fn close(&self) -> Result<()>;
}

/// Open the offset database at `path`
///
/// `None` (or an empty path) selects the in-memory stub: the agent runs,
/// but sources start from scratch on every boot. The parent directory is
/// created if absent.
pub fn open_database(path: Option<&Path>) -> Result<Arc<dyn Database>> {
    let path = match path {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => {
            tracing::info!("no database path configured, offsets will not be persisted");
            return Ok(Arc::new(StubDatabase::new()));
        }
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db = sled::open(path)?;
    tracing::info!(path = %path.display(), "opened offset database");
    Ok(Arc::new(SledDatabase { db }))
}

/// Sled-backed database
pub struct SledDatabase {
    db: sled::Db,
}

impl SledDatabase {
    /// Open a sled database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            db: sled::open(path)?,
        })
    }
}

impl Database for SledDatabase {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.db.get(key)?.map(|v| v.to_vec()))
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<KvPairs> {
        let mut pairs = Vec::new();
        for item in self.db.scan_prefix(prefix) {
            let (k, v) = item?;
            pairs.push((k.to_vec(), v.to_vec()));
        }
        Ok(pairs)
    }

    fn write_batch(&self, pairs: KvPairs) -> Result<()> {
        let mut batch = sled::Batch::default();
        for (k, v) in pairs {
            batch.insert(k, v);
        }
        self.db.apply_batch(batch)?;
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

/// In-memory stand-in used when no database path is configured
///
/// Every operation succeeds; nothing survives the process.
pub struct StubDatabase {
    map: parking_lot::Mutex<std::collections::BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl StubDatabase {
    pub fn new() -> Self {
        Self {
            map: parking_lot::Mutex::new(std::collections::BTreeMap::new()),
        }
    }
}

impl Default for StubDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl Database for StubDatabase {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.map.lock().get(key).cloned())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<KvPairs> {
        Ok(self
            .map
            .lock()
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn write_batch(&self, pairs: KvPairs) -> Result<()> {
        let mut map = self.map.lock();
        for (k, v) in pairs {
            map.insert(k, v);
        }
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
