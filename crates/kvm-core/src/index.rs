use kvm_config::config::{
    Config, DEFAULT_INDEX_TAG_FIELD, DEFAULT_INDEX_URL, DEFAULT_LATEST_URL,
};
use kvm_dl::http::HttpFetch;
use serde_json::Value;
use tracing::debug;

use crate::{
    constants::LATEST_TOKEN,
    error::KvmError,
    release::{Platform, ReleaseSpec},
    version::{is_minor_only, normalize},
    KvmResult,
};

/// Endpoints of the remote release index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    /// Plain-text endpoint holding the latest stable version.
    pub latest_url: String,
    /// JSON endpoint listing published releases.
    pub index_url: String,
    /// Field of each release record that carries the version tag.
    pub tag_field: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            latest_url: DEFAULT_LATEST_URL.to_string(),
            index_url: DEFAULT_INDEX_URL.to_string(),
            tag_field: DEFAULT_INDEX_TAG_FIELD.to_string(),
        }
    }
}

impl From<&Config> for IndexConfig {
    fn from(config: &Config) -> Self {
        Self {
            latest_url: config.latest_url().to_string(),
            index_url: config.index_url().to_string(),
            tag_field: config.index_tag_field().to_string(),
        }
    }
}

/// Result of interpreting a single release record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Release(ReleaseSpec),
    /// The record is well-formed but its tag is not a stable release version.
    Skipped { tag: String },
}

/// Resolves version tokens against the remote release index.
///
/// Every query hits the network; nothing is cached between calls.
pub struct ReleaseIndex<H> {
    http: H,
    config: IndexConfig,
    platform: Platform,
}

impl<H: HttpFetch> ReleaseIndex<H> {
    pub fn new(http: H, config: IndexConfig, platform: Platform) -> Self {
        Self {
            http,
            config,
            platform,
        }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn http(&self) -> &H {
        &self.http
    }

    /// Fetches the latest stable release from the latest pointer endpoint.
    pub fn latest(&self) -> KvmResult<ReleaseSpec> {
        let body = self.http.fetch_text(&self.config.latest_url)?;
        let token = body.trim().to_lowercase();
        debug!("Latest pointer resolved to '{}'", token);

        ReleaseSpec::new(&token, self.platform)
    }

    /// Lists every stable release in the index, newest first and without duplicates.
    ///
    /// # Errors
    ///
    /// [`KvmError::Protocol`] if the body is not a JSON array of records carrying the tag field.
    pub fn list(&self) -> KvmResult<Vec<ReleaseSpec>> {
        let url = &self.config.index_url;
        let body = self.http.fetch_text(url)?;

        let value: Value =
            serde_json::from_str(&body).map_err(|err| self.protocol(format!("invalid JSON: {err}")))?;
        let records = value
            .as_array()
            .ok_or_else(|| self.protocol("expected a JSON array of releases".to_string()))?;

        let mut releases = Vec::with_capacity(records.len());
        for record in records {
            match self.parse_record(record)? {
                RecordOutcome::Release(spec) => releases.push(spec),
                RecordOutcome::Skipped {
                    tag,
                } => debug!("Skipping non-release tag '{}'", tag),
            }
        }

        releases.sort_by(|a, b| b.version.cmp(&a.version));
        releases.dedup_by_key(|spec| spec.version);

        debug!("Release index lists {} releases", releases.len());
        Ok(releases)
    }

    /// Looks up a release by token.
    ///
    /// A minor-only token (`v1.29`) resolves to the newest patch of that minor. Anything else must
    /// match a listed release exactly.
    pub fn get(&self, token: &str) -> KvmResult<ReleaseSpec> {
        let wanted = normalize(token)?;
        let releases = self.list()?;

        let found = if is_minor_only(token) {
            releases.into_iter().find(|spec| spec.version.same_minor(&wanted))
        } else {
            releases.into_iter().find(|spec| spec.version == wanted)
        };

        found.ok_or_else(|| {
            KvmError::NotFound {
                version: token.trim().to_string(),
            }
        })
    }

    /// Resolves `None` or `"latest"` through [`ReleaseIndex::latest`] and anything else through
    /// [`ReleaseIndex::get`].
    pub fn resolve(&self, token: Option<&str>) -> KvmResult<ReleaseSpec> {
        match token.map(str::trim) {
            None => self.latest(),
            Some(t) if t.eq_ignore_ascii_case(LATEST_TOKEN) => self.latest(),
            Some(t) => self.get(t),
        }
    }

    fn parse_record(&self, record: &Value) -> KvmResult<RecordOutcome> {
        let field = &self.config.tag_field;
        let object = record
            .as_object()
            .ok_or_else(|| self.protocol("release record is not an object".to_string()))?;
        let tag = object
            .get(field)
            .ok_or_else(|| self.protocol(format!("release record is missing '{field}'")))?
            .as_str()
            .ok_or_else(|| self.protocol(format!("release field '{field}' is not a string")))?;

        Ok(match ReleaseSpec::new(tag, self.platform) {
            Ok(spec) => RecordOutcome::Release(spec),
            Err(_) => {
                RecordOutcome::Skipped {
                    tag: tag.to_string(),
                }
            }
        })
    }

    fn protocol(&self, reason: String) -> KvmError {
        KvmError::Protocol {
            url: self.config.index_url.clone(),
            reason,
        }
    }
}
