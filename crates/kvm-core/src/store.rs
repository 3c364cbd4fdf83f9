use std::{
    collections::BTreeSet,
    fmt, fs, io,
    path::{Path, PathBuf},
    str::FromStr,
};

use kvm_utils::{
    fs::{ensure_dir_exists, safe_remove, write_atomic},
    hash::{checksum_bytes, verify_checksum},
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    constants::DIGEST_LEN,
    error::{ErrorContext, KvmError},
    KvmResult,
};

/// Lowercase hex SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Digest(String);

impl Digest {
    /// Computes the digest of `content`.
    pub fn of(content: &[u8]) -> Self {
        Self(checksum_bytes(content))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn is_valid(value: &str) -> bool {
        value.len() == DIGEST_LEN
            && value
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Digest {
    type Error = KvmError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if Self::is_valid(&value) {
            Ok(Self(value))
        } else {
            Err(KvmError::InvalidDigest(value))
        }
    }
}

impl FromStr for Digest {
    type Err = KvmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.to_string())
    }
}

impl From<Digest> for String {
    fn from(digest: Digest) -> Self {
        digest.0
    }
}

/// Directory of blobs, each stored in a file named by the SHA-256 of its content.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Creates a store rooted at `root`. The directory is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, digest: &Digest) -> PathBuf {
        self.root.join(digest.as_str())
    }

    /// Stores `content` and returns its digest.
    ///
    /// Content that is already present is not rewritten. New blobs go through a temporary
    /// sibling and a rename, so a digest-named file is always complete.
    pub fn put(&self, content: &[u8]) -> KvmResult<Digest> {
        let digest = Digest::of(content);
        let path = self.path_for(&digest);

        if path.is_file() {
            debug!("Blob {} already stored", digest);
            return Ok(digest);
        }

        ensure_dir_exists(&self.root)?;
        write_atomic(&path, content)?;
        debug!("Stored blob {} ({} bytes)", digest, content.len());

        Ok(digest)
    }

    /// Returns the path of the blob, or `None` if it is not stored.
    pub fn get(&self, digest: &Digest) -> Option<PathBuf> {
        let path = self.path_for(digest);
        path.is_file().then_some(path)
    }

    /// Re-hashes a stored blob and compares it with its name. A missing blob is `Ok(None)`.
    pub fn verify(&self, digest: &Digest) -> KvmResult<Option<bool>> {
        match self.get(digest) {
            Some(path) => Ok(Some(verify_checksum(path, digest.as_str())?)),
            None => Ok(None),
        }
    }

    /// Lists the digests of all stored blobs. Files not named by a digest are ignored.
    pub fn list(&self) -> KvmResult<BTreeSet<Digest>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(err) => {
                return Err(KvmError::IoError {
                    action: format!("listing blobs in {}", self.root.display()),
                    source: err,
                })
            }
        };

        let mut digests = BTreeSet::new();
        for entry in entries {
            let entry = entry.with_context(|| {
                format!("reading entry in {}", self.root.display())
            })?;
            if !entry.path().is_file() {
                continue;
            }
            if let Some(digest) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<Digest>().ok())
            {
                digests.insert(digest);
            }
        }

        Ok(digests)
    }

    /// Removes every stored blob and returns how many were removed.
    ///
    /// Not atomic: a failure part way leaves the remaining blobs in place.
    pub fn clear(&self) -> KvmResult<usize> {
        let digests = self.list()?;
        for digest in &digests {
            safe_remove(self.path_for(digest))?;
        }
        debug!("Removed {} blobs from {}", digests.len(), self.root.display());
        Ok(digests.len())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    const HELLO_DIGEST: &str = "a948904f2f0f479b8f8197694b30184b0d2ed1c1cd2a1ec0fb85d299a192a447";

    #[test]
    fn test_digest_of_is_deterministic() {
        assert_eq!(Digest::of(b"hello world\n").as_str(), HELLO_DIGEST);
        assert_eq!(Digest::of(b"hello world\n"), Digest::of(b"hello world\n"));
    }

    #[test]
    fn test_digest_validation() {
        assert!(HELLO_DIGEST.parse::<Digest>().is_ok());
        assert!(matches!(
            HELLO_DIGEST.to_uppercase().parse::<Digest>(),
            Err(KvmError::InvalidDigest(_))
        ));
        assert!("abc".parse::<Digest>().is_err());
        assert!("z".repeat(64).parse::<Digest>().is_err());
    }

    #[test]
    fn test_digest_serde() {
        let digest: Digest = serde_json::from_str(&format!("\"{HELLO_DIGEST}\"")).unwrap();
        assert_eq!(digest.as_str(), HELLO_DIGEST);
        assert!(serde_json::from_str::<Digest>("\"not-a-digest\"").is_err());
    }

    #[test]
    fn test_put_twice_stores_one_file() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path().join("blobs"));

        let first = store.put(b"hello world\n").unwrap();
        let second = store.put(b"hello world\n").unwrap();

        assert_eq!(first, second);
        assert_eq!(first.as_str(), HELLO_DIGEST);
        assert_eq!(fs::read_dir(store.root()).unwrap().count(), 1);
    }

    #[test]
    fn test_get() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let digest = store.put(b"kubectl").unwrap();

        let path = store.get(&digest).unwrap();
        assert_eq!(fs::read(path).unwrap(), b"kubectl");
        assert!(store.get(&Digest::of(b"other")).is_none());
    }

    #[test]
    fn test_verify_detects_corruption() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let good = store.put(b"good").unwrap();
        let bad = store.put(b"bad").unwrap();
        fs::write(store.path_for(&bad), b"flipped").unwrap();

        assert_eq!(store.verify(&good).unwrap(), Some(true));
        assert_eq!(store.verify(&bad).unwrap(), Some(false));
        assert_eq!(store.verify(&Digest::of(b"absent")).unwrap(), None);
    }

    #[test]
    fn test_list_ignores_foreign_files() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let a = store.put(b"a").unwrap();
        let b = store.put(b"b").unwrap();

        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        fs::write(dir.path().join(format!("{}.part", Digest::of(b"c"))), b"c").unwrap();
        fs::create_dir(dir.path().join(Digest::of(b"d").as_str())).unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed, BTreeSet::from([a, b]));
    }

    #[test]
    fn test_list_missing_root_is_empty() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path().join("absent"));
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_clear_removes_only_blobs() {
        let dir = tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        store.put(b"a").unwrap();
        store.put(b"b").unwrap();
        fs::write(dir.path().join("keep.txt"), b"x").unwrap();

        assert_eq!(store.clear().unwrap(), 2);
        assert!(store.list().unwrap().is_empty());
        assert!(dir.path().join("keep.txt").exists());
    }
}
