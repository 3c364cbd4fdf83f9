use std::{
    fs,
    path::PathBuf,
    sync::{LazyLock, RwLock},
    time::Duration,
};

use documented::{Documented, DocumentedFields};
use kvm_utils::{
    fs::{ensure_dir_exists, write_atomic},
    path::{resolve_path, xdg_cache_home, xdg_config_home},
    time::parse_timeout,
};
use serde::{Deserialize, Serialize};
use toml_edit::DocumentMut;
use tracing::{debug, info};
use url::Url;

use crate::{
    annotations::annotate_toml_table,
    error::{ConfigError, Result},
};

pub const DEFAULT_LATEST_URL: &str = "https://cdn.dl.k8s.io/release/stable.txt";
pub const DEFAULT_INDEX_URL: &str =
    "https://api.github.com/repos/kubernetes/kubernetes/releases?per_page=100";
pub const DEFAULT_INDEX_TAG_FIELD: &str = "tag_name";
pub const DEFAULT_ARTIFACT_URL_TEMPLATE: &str =
    "https://cdn.dl.k8s.io/release/{version}/bin/{os}/{arch}/kubectl";
pub const DEFAULT_CHECKSUM_URL_TEMPLATE: &str =
    "https://cdn.dl.k8s.io/release/{version}/bin/{os}/{arch}/kubectl.sha256";
pub const DEFAULT_OUTPUT_PATH: &str = "./kubectl";
pub const DEFAULT_HTTP_TIMEOUT: &str = "60s";

/// kvm configuration
#[derive(Clone, Debug, Deserialize, Serialize, Documented, DocumentedFields)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Root of the download cache. Holds `registry.json` and the `blobs/` directory.
    /// Default: $XDG_CACHE_HOME/kvm
    pub cache_path: Option<String>,

    /// Where `kvm download` writes the binary when no `--output` is given.
    /// Default: ./kubectl
    pub output_path: Option<String>,

    /// HTTP request timeout, e.g. "30s", "2m" or "1m30s".
    /// Default: 60s
    pub http_timeout: Option<String>,

    /// Endpoint returning the latest stable version as plain text.
    pub latest_url: Option<String>,

    /// Endpoint returning the JSON array of published releases.
    pub index_url: Option<String>,

    /// Field of each release record holding the version tag.
    /// Default: tag_name
    pub index_tag_field: Option<String>,

    /// Download URL of the binary. Supports `{version}`, `{os}` and `{arch}`.
    pub artifact_url_template: Option<String>,

    /// URL of the published SHA-256 checksum. Supports `{version}`, `{os}` and `{arch}`.
    pub checksum_url_template: Option<String>,
}

pub static CONFIG: LazyLock<RwLock<Option<Config>>> = LazyLock::new(|| RwLock::new(None));

pub static CONFIG_PATH: LazyLock<RwLock<PathBuf>> = LazyLock::new(|| {
    RwLock::new(match std::env::var("KVM_CONFIG") {
        Ok(path_str) => PathBuf::from(path_str),
        Err(_) => xdg_config_home().join("kvm").join("config.toml"),
    })
});

/// Loads the configuration file into the global [`CONFIG`].
pub fn init() -> Result<()> {
    let config = Config::new()?;
    let mut global_config = CONFIG.write().unwrap_or_else(|p| p.into_inner());
    *global_config = Some(config);
    Ok(())
}

/// Returns the global configuration, falling back to defaults when [`init`] was never called.
pub fn get_config() -> Config {
    let mut config_guard = CONFIG.write().unwrap_or_else(|p| p.into_inner());
    config_guard
        .get_or_insert_with(Config::default_config)
        .clone()
}

pub fn config_path() -> PathBuf {
    CONFIG_PATH
        .read()
        .unwrap_or_else(|p| p.into_inner())
        .to_path_buf()
}

/// Points subsequent [`init`] and [`generate_default_config`] calls at another file.
pub fn set_config_path(path: PathBuf) {
    let mut config_path = CONFIG_PATH.write().unwrap_or_else(|p| p.into_inner());
    *config_path = path;
}

impl Config {
    pub fn default_config() -> Self {
        Self {
            cache_path: Some(format!("{}/kvm", xdg_cache_home().display())),
            output_path: Some(DEFAULT_OUTPUT_PATH.to_string()),
            http_timeout: Some(DEFAULT_HTTP_TIMEOUT.to_string()),
            latest_url: Some(DEFAULT_LATEST_URL.to_string()),
            index_url: Some(DEFAULT_INDEX_URL.to_string()),
            index_tag_field: Some(DEFAULT_INDEX_TAG_FIELD.to_string()),
            artifact_url_template: Some(DEFAULT_ARTIFACT_URL_TEMPLATE.to_string()),
            checksum_url_template: Some(DEFAULT_CHECKSUM_URL_TEMPLATE.to_string()),
        }
    }

    /// Creates a new configuration by loading it from the configuration file.
    /// If the configuration file is not found, it uses the default configuration.
    pub fn new() -> Result<Self> {
        if std::env::var("KVM_STEALTH").is_ok() {
            return Ok(Self::default_config());
        }

        let config_path = config_path();

        let mut config = match fs::read_to_string(&config_path) {
            Ok(content) => {
                debug!("Loading configuration from {}", config_path.display());
                toml::from_str(&content)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default_config(),
            Err(err) => return Err(ConfigError::IoError(err)),
        };

        config.resolve()?;

        Ok(config)
    }

    /// Fills unset fields with defaults and validates endpoints, templates and the timeout.
    pub fn resolve(&mut self) -> Result<()> {
        self.output_path
            .get_or_insert_with(|| DEFAULT_OUTPUT_PATH.to_string());
        self.http_timeout
            .get_or_insert_with(|| DEFAULT_HTTP_TIMEOUT.to_string());
        self.latest_url
            .get_or_insert_with(|| DEFAULT_LATEST_URL.to_string());
        self.index_url
            .get_or_insert_with(|| DEFAULT_INDEX_URL.to_string());
        self.index_tag_field
            .get_or_insert_with(|| DEFAULT_INDEX_TAG_FIELD.to_string());
        self.artifact_url_template
            .get_or_insert_with(|| DEFAULT_ARTIFACT_URL_TEMPLATE.to_string());
        self.checksum_url_template
            .get_or_insert_with(|| DEFAULT_CHECKSUM_URL_TEMPLATE.to_string());

        self.get_http_timeout()?;

        if self.index_tag_field().trim().is_empty() {
            return Err(ConfigError::EmptyTagField);
        }

        validate_url("latest_url", self.latest_url())?;
        validate_url("index_url", self.index_url())?;
        validate_template("artifact_url_template", self.artifact_url_template())?;
        validate_template("checksum_url_template", self.checksum_url_template())?;

        Ok(())
    }

    pub fn get_cache_path(&self) -> Result<PathBuf> {
        if let Ok(env_path) = std::env::var("KVM_CACHE") {
            return Ok(resolve_path(&env_path)?);
        }
        if let Some(cache_path) = &self.cache_path {
            return Ok(resolve_path(cache_path)?);
        }
        Ok(xdg_cache_home().join("kvm"))
    }

    pub fn get_output_path(&self) -> Result<PathBuf> {
        let output_path = self.output_path.as_deref().unwrap_or(DEFAULT_OUTPUT_PATH);
        Ok(resolve_path(output_path)?)
    }

    pub fn get_http_timeout(&self) -> Result<Duration> {
        let value = self.http_timeout.as_deref().unwrap_or(DEFAULT_HTTP_TIMEOUT);
        parse_timeout(value).ok_or_else(|| ConfigError::InvalidTimeout(value.to_string()))
    }

    pub fn latest_url(&self) -> &str {
        self.latest_url.as_deref().unwrap_or(DEFAULT_LATEST_URL)
    }

    pub fn index_url(&self) -> &str {
        self.index_url.as_deref().unwrap_or(DEFAULT_INDEX_URL)
    }

    pub fn index_tag_field(&self) -> &str {
        self.index_tag_field
            .as_deref()
            .unwrap_or(DEFAULT_INDEX_TAG_FIELD)
    }

    pub fn artifact_url_template(&self) -> &str {
        self.artifact_url_template
            .as_deref()
            .unwrap_or(DEFAULT_ARTIFACT_URL_TEMPLATE)
    }

    pub fn checksum_url_template(&self) -> &str {
        self.checksum_url_template
            .as_deref()
            .unwrap_or(DEFAULT_CHECKSUM_URL_TEMPLATE)
    }

    pub fn to_annotated_document(&self) -> Result<DocumentMut> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut doc = toml_string.parse::<DocumentMut>()?;

        annotate_toml_table::<Config>(doc.as_table_mut(), true)?;

        Ok(doc)
    }
}

fn validate_url(field: &'static str, url: &str) -> Result<()> {
    Url::parse(url).map(|_| ()).map_err(|_| {
        ConfigError::InvalidUrl {
            field,
            url: url.to_string(),
        }
    })
}

fn validate_template(field: &'static str, template: &str) -> Result<()> {
    let invalid = || {
        ConfigError::InvalidTemplate {
            field,
            template: template.to_string(),
        }
    };

    if !template.contains("{version}") {
        return Err(invalid());
    }

    let sample = template
        .replace("{version}", "v1.0.0")
        .replace("{os}", "linux")
        .replace("{arch}", "amd64");
    Url::parse(&sample).map(|_| ()).map_err(|_| invalid())
}

/// Writes an annotated default configuration to the current config path.
pub fn generate_default_config() -> Result<()> {
    let config_path = config_path();

    if config_path.exists() {
        return Err(ConfigError::ConfigAlreadyExists);
    }

    let def_config = Config::default_config();
    let annotated_doc = def_config.to_annotated_document()?;

    if let Some(parent) = config_path.parent() {
        ensure_dir_exists(parent)?;
    }
    write_atomic(&config_path, annotated_doc.to_string().as_bytes())?;
    info!(
        "Default configuration file generated with documentation at: {}",
        config_path.display()
    );
    Ok(())
}
