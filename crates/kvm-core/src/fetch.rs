use std::{
    fmt, fs,
    io::{self, Write},
    path::{Path, PathBuf},
    rc::Rc,
};

use kvm_config::config::{Config, DEFAULT_ARTIFACT_URL_TEMPLATE, DEFAULT_CHECKSUM_URL_TEMPLATE};
use kvm_dl::{download::Download, http::HttpFetch, types::Progress};
use kvm_utils::{
    fs::{ensure_dir_exists, make_executable, partial_path, write_atomic},
    hash::Checksum,
};
use tracing::debug;

use crate::{
    constants::LATEST_TOKEN,
    error::{ErrorContext, KvmError},
    index::ReleaseIndex,
    registry::Registry,
    release::ReleaseSpec,
    store::Digest,
    KvmResult,
};

/// URL templates for the artifact and its published checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointTemplates {
    pub artifact_url: String,
    pub checksum_url: String,
}

impl Default for EndpointTemplates {
    fn default() -> Self {
        Self {
            artifact_url: DEFAULT_ARTIFACT_URL_TEMPLATE.to_string(),
            checksum_url: DEFAULT_CHECKSUM_URL_TEMPLATE.to_string(),
        }
    }
}

impl From<&Config> for EndpointTemplates {
    fn from(config: &Config) -> Self {
        Self {
            artifact_url: config.artifact_url_template().to_string(),
            checksum_url: config.checksum_url_template().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
    Resolving,
    ChecksumFetch,
    CacheLookup,
    CacheHitCopy,
    DownloadVerifyStore,
    PermissionFix,
    Done,
}

impl fmt::Display for FetchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FetchStage::Resolving => "resolving",
            FetchStage::ChecksumFetch => "fetching checksum",
            FetchStage::CacheLookup => "checking cache",
            FetchStage::CacheHitCopy => "copying from cache",
            FetchStage::DownloadVerifyStore => "downloading",
            FetchStage::PermissionFix => "setting permissions",
            FetchStage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchReport {
    pub release: ReleaseSpec,
    /// Registry key the artifact was looked up and stored under.
    pub key: String,
    pub digest: Digest,
    pub cache_hit: bool,
    pub path: PathBuf,
}

/// Returns the registry key for a requested token.
///
/// Explicit tokens are used verbatim. `latest` keys by the resolved version, since the pointer
/// moves over time and first-write-wins would otherwise pin it.
pub fn cache_key(token: Option<&str>, release: &ReleaseSpec) -> String {
    match token.map(str::trim) {
        Some(t) if !t.eq_ignore_ascii_case(LATEST_TOKEN) => t.to_string(),
        _ => release.version.to_string(),
    }
}

/// Parses a checksum file body: the first whitespace-separated field, lowercased.
pub fn parse_checksum(body: &str) -> KvmResult<Digest> {
    let field = body
        .split_whitespace()
        .next()
        .ok_or_else(|| KvmError::InvalidDigest(body.trim().to_string()))?;
    field.to_lowercase().parse()
}

/// Buffers streamed bytes while hashing them.
#[derive(Default)]
struct HashingWriter {
    buffer: Vec<u8>,
    hasher: Checksum,
}

impl HashingWriter {
    fn finish(self) -> (Vec<u8>, String) {
        (self.buffer, self.hasher.finalize())
    }
}

impl Write for HashingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.hasher.update(buf);
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Resolves a version token and places the verified artifact at a destination path.
///
/// Artifacts are served from the registry when the cached digest matches the published
/// checksum. Otherwise they are downloaded, verified, stored and then written out.
pub struct FetchPipeline<'a, 's, H> {
    index: &'a ReleaseIndex<H>,
    registry: &'a mut Registry<'s>,
    templates: EndpointTemplates,
    on_stage: Option<Box<dyn Fn(FetchStage) + 'a>>,
    on_progress: Option<Rc<dyn Fn(Progress)>>,
}

impl<'a, 's, H: HttpFetch> FetchPipeline<'a, 's, H> {
    pub fn new(
        index: &'a ReleaseIndex<H>,
        registry: &'a mut Registry<'s>,
        templates: EndpointTemplates,
    ) -> Self {
        Self {
            index,
            registry,
            templates,
            on_stage: None,
            on_progress: None,
        }
    }

    /// Registers a callback invoked on every stage transition.
    pub fn on_stage<F>(mut self, callback: F) -> Self
    where
        F: Fn(FetchStage) + 'a,
    {
        self.on_stage = Some(Box::new(callback));
        self
    }

    /// Registers a callback receiving artifact download progress.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(Progress) + 'static,
    {
        self.on_progress = Some(Rc::new(callback));
        self
    }

    /// Runs the pipeline for `token` and writes the artifact to `dest`.
    ///
    /// # Errors
    ///
    /// Any resolution, transport, cache or I/O error. A checksum mismatch is
    /// [`KvmError::Integrity`] and leaves both `dest` and the cache untouched.
    pub fn fetch(&mut self, token: Option<&str>, dest: &Path) -> KvmResult<FetchReport> {
        self.enter(FetchStage::Resolving);
        let release = self.index.resolve(token)?;
        let key = cache_key(token, &release);

        self.enter(FetchStage::ChecksumFetch);
        let checksum_url = release.render(&self.templates.checksum_url);
        let expected = parse_checksum(&self.index.http().fetch_text(&checksum_url)?)?;
        debug!("Expected digest for {}: {}", release, expected);

        self.enter(FetchStage::CacheLookup);
        let cached = match self.registry.digest(&key) {
            Some(digest) if *digest == expected => self.registry.get(&key)?,
            Some(digest) => {
                debug!(
                    "Cached digest {} for '{}' does not match published checksum",
                    digest, key
                );
                None
            }
            None => None,
        };

        let cache_hit = if let Some(entry) = cached {
            self.enter(FetchStage::CacheHitCopy);
            copy_blob(&entry.blob_path, dest)?;
            true
        } else {
            self.enter(FetchStage::DownloadVerifyStore);
            let bytes = self.download_verified(&release, &expected)?;
            self.registry.put(&key, &bytes)?;
            write_destination(dest, &bytes)?;
            false
        };

        self.enter(FetchStage::PermissionFix);
        make_executable(dest)?;

        self.enter(FetchStage::Done);
        Ok(FetchReport {
            release,
            key,
            digest: expected,
            cache_hit,
            path: dest.to_path_buf(),
        })
    }

    fn download_verified(&self, release: &ReleaseSpec, expected: &Digest) -> KvmResult<Vec<u8>> {
        let url = release.render(&self.templates.artifact_url);
        let mut download = Download::new(&url);
        if let Some(cb) = &self.on_progress {
            let cb = Rc::clone(cb);
            download = download.progress(move |event| cb(event));
        }

        let mut sink = HashingWriter::default();
        download.execute(self.index.http(), &mut sink)?;
        let (bytes, actual) = sink.finish();

        if actual != expected.as_str() {
            return Err(KvmError::Integrity {
                url,
                expected: expected.to_string(),
                actual,
            });
        }

        Ok(bytes)
    }

    fn enter(&self, stage: FetchStage) {
        debug!("Fetch stage: {}", stage);
        if let Some(cb) = &self.on_stage {
            cb(stage);
        }
    }
}

fn ensure_parent(dest: &Path) -> KvmResult<()> {
    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir_exists(parent)?;
    }
    Ok(())
}

fn write_destination(dest: &Path, bytes: &[u8]) -> KvmResult<()> {
    ensure_parent(dest)?;
    write_atomic(dest, bytes)?;
    Ok(())
}

fn copy_blob(blob: &Path, dest: &Path) -> KvmResult<()> {
    ensure_parent(dest)?;
    let partial = partial_path(dest);
    fs::copy(blob, &partial)
        .with_context(|| format!("copying {} to {}", blob.display(), partial.display()))?;
    fs::rename(&partial, dest)
        .with_context(|| format!("moving {} to {}", partial.display(), dest.display()))?;
    Ok(())
}
