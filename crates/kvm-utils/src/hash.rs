use std::{
    fs::File,
    io::{self, Read},
    path::Path,
};

use sha2::{Digest as _, Sha256};

use crate::error::{HashError, HashResult};

/// Incremental SHA-256 hasher for content that arrives in chunks.
///
/// # Example
///
/// ```
/// use kvm_utils::hash::Checksum;
///
/// let mut hasher = Checksum::new();
/// hasher.update(b"hello ");
/// hasher.update(b"world\n");
/// assert_eq!(hasher.finalize(), kvm_utils::hash::checksum_bytes(b"hello world\n"));
/// ```
#[derive(Default, Clone)]
pub struct Checksum {
    hasher: Sha256,
}

impl Checksum {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Consumes the hasher and returns the lowercase hex digest.
    pub fn finalize(self) -> String {
        format!("{:x}", self.hasher.finalize())
    }
}

/// Calculates the SHA-256 checksum of an in-memory buffer as lowercase hex.
pub fn checksum_bytes(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

/// Calculates the checksum of a file.
///
/// The file is streamed through the hasher rather than loaded whole.
///
/// # Errors
///
/// * [`HashError::Read`] if the file cannot be read.
///
/// # Example
///
/// ```no_run
/// use kvm_utils::error::HashResult;
/// use kvm_utils::hash::calculate_checksum;
///
/// fn main() -> HashResult<()> {
///     let checksum = calculate_checksum("/path/to/kubectl")?;
///     println!("Checksum is {}", checksum);
///     Ok(())
/// }
/// ```
pub fn calculate_checksum<P: AsRef<Path>>(file_path: P) -> HashResult<String> {
    let file_path = file_path.as_ref();
    let read_failed = |source: io::Error| {
        HashError::Read {
            path: file_path.to_path_buf(),
            source,
        }
    };

    let mut file = File::open(file_path).map_err(read_failed)?;
    let mut hasher = Checksum::new();
    let mut buffer = [0u8; 8192];

    loop {
        let n = file.read(&mut buffer).map_err(read_failed)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hasher.finalize())
}

/// Verifies the checksum of a file against an expected value.
///
/// The comparison is case-insensitive.
///
/// # Errors
///
/// * [`HashError::Read`] if the file cannot be read.
pub fn verify_checksum<P: AsRef<Path>>(file_path: P, expected: &str) -> HashResult<bool> {
    let actual = calculate_checksum(file_path)?;
    Ok(actual.eq_ignore_ascii_case(expected))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    const HELLO_SHA256: &str = "a948904f2f0f479b8f8197694b30184b0d2ed1c1cd2a1ec0fb85d299a192a447";

    #[test]
    fn test_checksum_bytes() {
        assert_eq!(checksum_bytes(b"hello world\n"), HELLO_SHA256);
    }

    #[test]
    fn test_checksum_bytes_empty() {
        assert_eq!(
            checksum_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_incremental_matches_oneshot() {
        let mut hasher = Checksum::new();
        for chunk in b"hello world\n".chunks(3) {
            hasher.update(chunk);
        }
        assert_eq!(hasher.finalize(), HELLO_SHA256);
    }

    #[test]
    fn test_calculate_checksum() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"hello world\n").unwrap();

        let checksum = calculate_checksum(file.path()).unwrap();
        assert_eq!(checksum, HELLO_SHA256);
    }

    #[test]
    fn test_verify_checksum_case_insensitive() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"hello world\n").unwrap();

        assert!(verify_checksum(file.path(), &HELLO_SHA256.to_uppercase()).unwrap());
        assert!(!verify_checksum(file.path(), "invalid-checksum").unwrap());
    }

    #[test]
    fn test_calculate_checksum_file_not_found() {
        let result = calculate_checksum("/path/to/nonexistent/file");
        assert!(result.is_err());
    }

    #[test]
    fn test_calculate_checksum_on_directory() {
        let dir = tempfile::tempdir().unwrap();
        let result = calculate_checksum(dir.path());
        assert!(result.is_err());
    }
}
