//! Error types for kvm-core.

use std::path::PathBuf;

use kvm_config::error::ConfigError;
use kvm_dl::error::DownloadError;
use kvm_utils::error::{FileSystemError, HashError, PathError};
use miette::Diagnostic;
use thiserror::Error;

/// Core error type for version resolution, caching and fetching.
#[derive(Error, Diagnostic, Debug)]
pub enum KvmError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid version '{input}'")]
    #[diagnostic(
        code(kvm::version_format),
        help("Use vMAJOR.MINOR.PATCH (e.g. v1.30.1) or vMAJOR.MINOR (e.g. v1.30)")
    )]
    VersionFormat { input: String },

    #[error("Release {version} not found")]
    #[diagnostic(
        code(kvm::not_found),
        help("Run `kvm list` to see the available releases")
    )]
    NotFound { version: String },

    #[error("Malformed release index from {url}: {reason}")]
    #[diagnostic(
        code(kvm::protocol),
        help("Check `index_url` and `index_tag_field` in your configuration")
    )]
    Protocol { url: String, reason: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Transport(#[from] DownloadError),

    #[error("Checksum mismatch for {url}: expected {expected}, got {actual}")]
    #[diagnostic(
        code(kvm::integrity),
        help("The download may be corrupted or tampered with. Try again later")
    )]
    Integrity {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("Error while {action}")]
    #[diagnostic(code(kvm::io), help("Check file permissions and disk space"))]
    IoError {
        action: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache entry '{key}' points to missing blob {digest}")]
    #[diagnostic(
        code(kvm::inconsistent_cache),
        help("Run `kvm cache clear` to reset the cache")
    )]
    InconsistentCache { key: String, digest: String },

    #[error("Invalid SHA-256 digest '{0}'")]
    #[diagnostic(
        code(kvm::invalid_digest),
        help("A digest is 64 lowercase hexadecimal characters")
    )]
    InvalidDigest(String),

    #[error("Unsupported platform: {os}/{arch}")]
    #[diagnostic(
        code(kvm::unsupported_platform),
        help("Pass --os (darwin, linux, windows) and --arch (amd64, arm64) explicitly")
    )]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Failed to parse cache registry {}", path.display())]
    #[diagnostic(
        code(kvm::registry),
        help("Run `kvm cache clear` to reset the cache")
    )]
    Registry {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(kvm::fs))]
    FileSystemError(#[from] FileSystemError),

    #[error(transparent)]
    #[diagnostic(code(kvm::hash))]
    HashError(#[from] HashError),

    #[error(transparent)]
    #[diagnostic(code(kvm::path), help("Check the configured paths"))]
    PathError(#[from] PathError),

    #[error(transparent)]
    #[diagnostic(code(kvm::json))]
    JsonError(#[from] serde_json::Error),
}

pub trait ErrorContext<T> {
    fn with_context<C>(self, context: C) -> std::result::Result<T, KvmError>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> std::result::Result<T, KvmError>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            KvmError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}
