use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use kvm_utils::fs::{ensure_dir_exists, write_atomic};
use tracing::{debug, warn};

use crate::{
    constants::{BLOBS_DIR, REGISTRY_FILE},
    error::KvmError,
    store::{BlobStore, Digest},
    KvmResult,
};

/// On-disk layout of a cache root.
#[derive(Debug, Clone)]
pub struct CacheLayout {
    root: PathBuf,
}

impl CacheLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn registry_file(&self) -> PathBuf {
        self.root.join(REGISTRY_FILE)
    }

    pub fn blobs_dir(&self) -> PathBuf {
        self.root.join(BLOBS_DIR)
    }

    pub fn blob_store(&self) -> BlobStore {
        BlobStore::new(self.blobs_dir())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutOutcome {
    Inserted(Digest),
    /// The key was already registered; the existing digest is kept.
    Exists(Digest),
}

impl PutOutcome {
    pub fn digest(&self) -> &Digest {
        match self {
            PutOutcome::Inserted(digest) | PutOutcome::Exists(digest) => digest,
        }
    }

    pub fn is_inserted(&self) -> bool {
        matches!(self, PutOutcome::Inserted(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub digest: Digest,
    pub blob_path: PathBuf,
}

/// Maps logical cache keys (requested version tokens) to blobs in a [`BlobStore`].
///
/// The map is persisted as a single JSON object and rewritten after every mutation. The first
/// write for a key wins.
pub struct Registry<'s> {
    store: &'s BlobStore,
    path: PathBuf,
    entries: BTreeMap<String, Digest>,
}

impl<'s> Registry<'s> {
    /// Loads the registry file at `path`. A missing file opens an empty registry.
    ///
    /// # Errors
    ///
    /// [`KvmError::Registry`] if the file exists but is not a valid registry.
    pub fn open(path: impl Into<PathBuf>, store: &'s BlobStore) -> KvmResult<Self> {
        let path = path.into();

        let entries = match fs::read(&path) {
            Ok(content) => {
                serde_json::from_slice(&content).map_err(|err| {
                    KvmError::Registry {
                        path: path.clone(),
                        source: err,
                    }
                })?
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                return Err(KvmError::IoError {
                    action: format!("reading registry {}", path.display()),
                    source: err,
                })
            }
        };

        debug!("Opened registry {} ({} entries)", path.display(), entries.len());
        Ok(Self {
            store,
            path,
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn store(&self) -> &BlobStore {
        self.store
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rewrites the registry file from the in-memory map.
    pub fn flush(&self) -> KvmResult<()> {
        self.persist(&self.entries)
    }

    fn persist(&self, entries: &BTreeMap<String, Digest>) -> KvmResult<()> {
        if let Some(parent) = self.path.parent() {
            ensure_dir_exists(parent)?;
        }
        let content = serde_json::to_vec_pretty(entries)?;
        write_atomic(&self.path, &content)?;
        Ok(())
    }

    /// Stores `content` under `key` unless the key is already registered.
    ///
    /// The in-memory map only changes once the registry file has been rewritten.
    pub fn put(&mut self, key: &str, content: &[u8]) -> KvmResult<PutOutcome> {
        if let Some(existing) = self.entries.get(key) {
            warn!(
                "Cache key '{}' already maps to {}; keeping existing entry",
                key, existing
            );
            return Ok(PutOutcome::Exists(existing.clone()));
        }

        let digest = self.store.put(content)?;
        let mut entries = self.entries.clone();
        entries.insert(key.to_string(), digest.clone());
        self.persist(&entries)?;
        self.entries = entries;
        debug!("Registered '{}' -> {}", key, digest);

        Ok(PutOutcome::Inserted(digest))
    }

    /// Returns the digest registered for `key` without touching the blob store.
    pub fn digest(&self, key: &str) -> Option<&Digest> {
        self.entries.get(key)
    }

    /// Looks up `key`.
    ///
    /// # Errors
    ///
    /// [`KvmError::InconsistentCache`] if the key is registered but its blob is gone.
    pub fn get(&self, key: &str) -> KvmResult<Option<CacheEntry>> {
        let Some(digest) = self.entries.get(key) else {
            return Ok(None);
        };

        let blob_path = self.store.get(digest).ok_or_else(|| {
            KvmError::InconsistentCache {
                key: key.to_string(),
                digest: digest.to_string(),
            }
        })?;

        Ok(Some(CacheEntry {
            key: key.to_string(),
            digest: digest.clone(),
            blob_path,
        }))
    }

    /// Returns `key=digest` lines ordered by key.
    pub fn list(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|(key, digest)| format!("{key}={digest}"))
            .collect()
    }

    /// Removes every blob, then empties and flushes the map. Returns the number of removed keys.
    pub fn clear(&mut self) -> KvmResult<usize> {
        self.store.clear()?;
        let removed = self.entries.len();
        self.entries.clear();
        self.flush()?;
        debug!("Cleared {} registry entries", removed);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_put_then_get_returns_content() {
        let dir = tempdir().unwrap();
        let layout = CacheLayout::new(dir.path());
        let store = layout.blob_store();
        let mut registry = Registry::open(layout.registry_file(), &store).unwrap();

        let outcome = registry.put("v1.29.0", b"kubectl-v1.29.0").unwrap();
        assert!(outcome.is_inserted());

        let entry = registry.get("v1.29.0").unwrap().unwrap();
        assert_eq!(entry.digest, *outcome.digest());
        assert_eq!(fs::read(entry.blob_path).unwrap(), b"kubectl-v1.29.0");
        assert_eq!(
            entry.digest.as_str(),
            "aa059f6c88be158a286110cf99b733914980c4febc6c7236f3c1a4d39bfd5d24"
        );
    }

    #[test]
    fn test_first_write_wins() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path().join("blobs"));
        let mut registry = Registry::open(dir.path().join("registry.json"), &store).unwrap();

        let first = registry.put("v1.29", b"first").unwrap();
        let second = registry.put("v1.29", b"second").unwrap();

        assert_eq!(second, PutOutcome::Exists(first.digest().clone()));
        let entry = registry.get("v1.29").unwrap().unwrap();
        assert_eq!(fs::read(entry.blob_path).unwrap(), b"first");
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_get_missing_key() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path().join("blobs"));
        let registry = Registry::open(dir.path().join("registry.json"), &store).unwrap();
        assert!(registry.get("v1.0.0").unwrap().is_none());
    }

    #[test]
    fn test_persists_across_open() {
        let dir = tempdir().unwrap();
        let layout = CacheLayout::new(dir.path());
        let store = layout.blob_store();

        {
            let mut registry = Registry::open(layout.registry_file(), &store).unwrap();
            registry.put("v1.30.1", b"one").unwrap();
            registry.put("latest", b"two").unwrap();
        }

        let registry = Registry::open(layout.registry_file(), &store).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.list(),
            vec![
                format!("latest={}", Digest::of(b"two")),
                format!("v1.30.1={}", Digest::of(b"one")),
            ]
        );
    }

    #[test]
    fn test_missing_blob_is_inconsistent() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path().join("blobs"));
        let mut registry = Registry::open(dir.path().join("registry.json"), &store).unwrap();

        let digest = registry.put("v1.29.0", b"bytes").unwrap().digest().clone();
        fs::remove_file(store.path_for(&digest)).unwrap();

        assert!(matches!(
            registry.get("v1.29.0"),
            Err(KvmError::InconsistentCache { .. })
        ));
    }

    #[test]
    fn test_digest_ignores_missing_blob() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path().join("blobs"));
        let mut registry = Registry::open(dir.path().join("registry.json"), &store).unwrap();

        let digest = registry.put("v1.29.0", b"bytes").unwrap().digest().clone();
        fs::remove_file(store.path_for(&digest)).unwrap();

        assert_eq!(registry.digest("v1.29.0"), Some(&digest));
        assert_eq!(registry.digest("v1.28.0"), None);
    }

    #[test]
    fn test_failed_put_leaves_map_unchanged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registry.json");
        let store = BlobStore::new(dir.path().join("blobs"));
        let mut registry = Registry::open(&path, &store).unwrap();

        fs::create_dir(&path).unwrap();
        fs::write(path.join("inner"), "x").unwrap();

        assert!(registry.put("v1.29.0", b"bytes").is_err());
        assert!(registry.is_empty());
        assert_eq!(registry.digest("v1.29.0"), None);
    }

    #[test]
    fn test_unparsable_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registry.json");
        fs::write(&path, "{ not json").unwrap();
        let store = BlobStore::new(dir.path().join("blobs"));

        assert!(matches!(
            Registry::open(&path, &store),
            Err(KvmError::Registry { .. })
        ));
    }

    #[test]
    fn test_invalid_digest_in_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registry.json");
        fs::write(&path, r#"{"v1.29.0": "abc"}"#).unwrap();
        let store = BlobStore::new(dir.path().join("blobs"));

        assert!(Registry::open(&path, &store).is_err());
    }

    #[test]
    fn test_clear_empties_store_and_map() {
        let dir = tempdir().unwrap();
        let layout = CacheLayout::new(dir.path());
        let store = layout.blob_store();
        let mut registry = Registry::open(layout.registry_file(), &store).unwrap();
        registry.put("a", b"a").unwrap();
        registry.put("b", b"b").unwrap();

        assert_eq!(registry.clear().unwrap(), 2);
        assert!(registry.is_empty());
        assert!(store.list().unwrap().is_empty());

        let reopened = Registry::open(layout.registry_file(), &store).unwrap();
        assert!(reopened.is_empty());
    }
}
