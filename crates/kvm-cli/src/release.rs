use kvm_config::config::Config;
use kvm_core::{
    error::KvmError,
    release::{Platform, ReleaseSpec},
    version::{is_minor_only, normalize},
    KvmResult,
};
use nu_ansi_term::Color::{Cyan, Green};
use tracing::info;

use crate::utils::{release_index, Colored};

fn print_release(spec: &ReleaseSpec) {
    info!(
        "{} {}",
        Colored(Green, spec.version),
        Colored(Cyan, spec.platform())
    );
}

pub fn show_latest(config: &Config, platform: Platform) -> KvmResult<()> {
    let spec = release_index(config, platform).latest()?;
    print_release(&spec);
    Ok(())
}

pub fn resolve_token(config: &Config, platform: Platform, token: &str) -> KvmResult<()> {
    let spec = release_index(config, platform).resolve(Some(token))?;
    print_release(&spec);
    Ok(())
}

/// Keeps the releases of `minor` (when given) and truncates to `limit`.
fn select_releases(
    releases: Vec<ReleaseSpec>,
    minor: Option<&str>,
    limit: Option<usize>,
) -> KvmResult<Vec<ReleaseSpec>> {
    let series = match minor {
        Some(token) if is_minor_only(token) => Some(normalize(token)?),
        Some(token) => {
            return Err(KvmError::VersionFormat {
                input: token.to_string(),
            })
        }
        None => None,
    };

    Ok(releases
        .into_iter()
        .filter(|spec| series.map_or(true, |s| spec.version.same_minor(&s)))
        .take(limit.unwrap_or(usize::MAX))
        .collect())
}

pub fn list_releases(
    config: &Config,
    platform: Platform,
    minor: Option<String>,
    limit: Option<usize>,
) -> KvmResult<()> {
    let releases = release_index(config, platform).list()?;
    let releases = select_releases(releases, minor.as_deref(), limit)?;

    if releases.is_empty() {
        info!("No releases found");
        return Ok(());
    }

    for spec in &releases {
        info!("{}", Colored(Green, spec.version));
    }

    Ok(())
}
