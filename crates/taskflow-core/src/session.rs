use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// The key-value persistence substrate. The engine only needs get/set/
/// remove keyed by string; implementations are swappable so tests can
/// run against memory.
pub trait SessionStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()>;
    fn remove(&mut self, key: &str) -> anyhow::Result<()>;
}

/// File-backed store: one file per key under a data directory, written
/// atomically through a temp file.
#[derive(Debug)]
pub struct DirStore {
    pub data_dir: PathBuf,
}

impl DirStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        info!(data_dir = %data_dir.display(), "opened session store");
        Ok(Self { data_dir })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{key}.json"))
    }
}

impl SessionStore for DirStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.key_path(key);
        if !path.exists() {
            debug!(key, "no stored value");
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        debug!(key, bytes = raw.len(), "read stored value");
        Ok(Some(raw))
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.key_path(key);
        debug!(key, bytes = value.len(), file = %path.display(), "writing value atomically");

        let mut temp = NamedTempFile::new_in(&self.data_dir)?;
        temp.write_all(value.as_bytes())?;
        temp.flush()?;
        temp.persist(&path)
            .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        let path = self.key_path(key);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("failed removing {}", path.display()))?;
            debug!(key, "removed stored value");
        }
        Ok(())
    }
}

/// In-memory store for tests and embedding. `fail_writes` simulates a
/// full or unavailable substrate.
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: HashMap<String, String>,
    pub fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.map.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        if self.fail_writes {
            return Err(anyhow!("session store unavailable"));
        }
        self.map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> anyhow::Result<()> {
        self.map.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::{DirStore, MemoryStore, SessionStore};

    #[test]
    fn dir_store_roundtrip_and_remove() {
        let temp = tempdir().expect("tempdir");
        let mut store = DirStore::open(temp.path()).expect("open store");

        assert!(store.get("missing").expect("get").is_none());

        store.set("k", "payload").expect("set");
        assert_eq!(store.get("k").expect("get").as_deref(), Some("payload"));

        store.set("k", "replaced").expect("overwrite");
        assert_eq!(store.get("k").expect("get").as_deref(), Some("replaced"));

        store.remove("k").expect("remove");
        assert!(store.get("k").expect("get").is_none());
        // Removing an absent key is not an error.
        store.remove("k").expect("remove twice");
    }

    #[test]
    fn memory_store_can_simulate_write_failure() {
        let mut store = MemoryStore::new();
        store.set("k", "v").expect("set");

        store.fail_writes = true;
        assert!(store.set("k", "v2").is_err());
        assert_eq!(store.get("k").expect("get").as_deref(), Some("v"));
    }
}
