use std::{
    fmt::Display,
    sync::{LazyLock, RwLock},
};

use kvm_config::config::Config;
use kvm_core::{
    error::KvmError,
    index::{IndexConfig, ReleaseIndex},
    release::{Arch, Os, Platform},
    KvmResult,
};
use kvm_dl::http::Http;
use nu_ansi_term::Color;

pub static COLOR: LazyLock<RwLock<bool>> = LazyLock::new(|| RwLock::new(true));
pub static PROGRESS: LazyLock<RwLock<bool>> = LazyLock::new(|| RwLock::new(true));

pub fn progress_enabled() -> bool {
    *PROGRESS.read().unwrap_or_else(|p| p.into_inner())
}

pub struct Colored<T: Display>(pub Color, pub T);

impl<T: Display> Display for Colored<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let color = COLOR.read().unwrap_or_else(|p| p.into_inner());
        if *color {
            write!(f, "{}", self.0.prefix())?;
            self.1.fmt(f)?;
            write!(f, "{}", self.0.suffix())
        } else {
            self.1.fmt(f)
        }
    }
}

/// Detects the host platform and applies `--os` / `--arch` overrides.
pub fn target_platform(os: Option<&str>, arch: Option<&str>) -> KvmResult<Platform> {
    let unsupported = || {
        KvmError::UnsupportedPlatform {
            os: os.unwrap_or(std::env::consts::OS).to_string(),
            arch: arch.unwrap_or(std::env::consts::ARCH).to_string(),
        }
    };

    let os = match os {
        Some(value) => value.parse::<Os>().map_err(|_| unsupported())?,
        None => Platform::detect()?.os,
    };
    let arch = match arch {
        Some(value) => value.parse::<Arch>().map_err(|_| unsupported())?,
        None => Platform::detect()?.arch,
    };

    Ok(Platform::new(os, arch))
}

pub fn release_index(config: &Config, platform: Platform) -> ReleaseIndex<Http> {
    ReleaseIndex::new(Http::new(), IndexConfig::from(config), platform)
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    fn test_target_platform_overrides() {
        let platform = target_platform(Some("darwin"), Some("aarch64")).unwrap();
        assert_eq!(platform, Platform::new(Os::Darwin, Arch::Arm64));
    }

    #[test]
    fn test_target_platform_rejects_unknown() {
        assert!(matches!(
            target_platform(Some("plan9"), Some("amd64")),
            Err(KvmError::UnsupportedPlatform { .. })
        ));
    }

    #[test]
    #[serial]
    fn test_colored_plain_when_disabled() {
        *COLOR.write().unwrap() = false;
        assert_eq!(Colored(Color::Green, "v1.30.1").to_string(), "v1.30.1");
        *COLOR.write().unwrap() = true;
    }
}
