use kvm_utils::error::{FileSystemError, PathError};
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("TOML serialization error: {0}")]
    #[diagnostic(
        code(kvm_config::toml_serialize),
        help("Check your configuration structure for invalid values")
    )]
    TomlSerError(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    #[diagnostic(
        code(kvm_config::toml_deserialize),
        help("Check your config.toml syntax and structure")
    )]
    TomlDeError(#[from] toml::de::Error),

    #[error("Configuration file already exists")]
    #[diagnostic(
        code(kvm_config::already_exists),
        help("Remove the existing config file or use a different location")
    )]
    ConfigAlreadyExists,

    #[error("Invalid URL template for `{field}`: {template}")]
    #[diagnostic(
        code(kvm_config::invalid_template),
        help("Templates must contain the `{{version}}` placeholder and may use `{{os}}` and `{{arch}}`")
    )]
    InvalidTemplate { field: &'static str, template: String },

    #[error("Invalid URL for `{field}`: {url}")]
    #[diagnostic(
        code(kvm_config::invalid_url),
        help("Ensure the URL is absolute, e.g. https://cdn.dl.k8s.io/release/stable.txt")
    )]
    InvalidUrl { field: &'static str, url: String },

    #[error("Invalid HTTP timeout: {0}")]
    #[diagnostic(
        code(kvm_config::invalid_timeout),
        help("Use a non-zero duration such as `30s`, `2m` or `1m30s`")
    )]
    InvalidTimeout(String),

    #[error("Release index tag field must not be empty")]
    #[diagnostic(code(kvm_config::empty_tag_field))]
    EmptyTagField,

    #[error("IO error: {0}")]
    #[diagnostic(code(kvm_config::io))]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(code(kvm_config::path))]
    Path(#[from] PathError),

    #[error(transparent)]
    #[diagnostic(code(kvm_config::fs))]
    FileSystem(#[from] FileSystemError),

    #[error("Failed to parse TOML: {0}")]
    #[diagnostic(code(kvm_config::toml))]
    Toml(#[from] toml_edit::TomlError),

    #[error("Encountered unexpected TOML item: {0}")]
    #[diagnostic(code(kvm_config::unexpected_toml_item))]
    UnexpectedTomlItem(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
