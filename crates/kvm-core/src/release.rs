use std::{fmt, str::FromStr};

use crate::{
    error::KvmError,
    version::{normalize, CanonicalVersion},
    KvmResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    Darwin,
    Linux,
    Windows,
}

impl Os {
    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Darwin => "darwin",
            Os::Linux => "linux",
            Os::Windows => "windows",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Os {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "darwin" | "macos" => Ok(Os::Darwin),
            "linux" => Ok(Os::Linux),
            "windows" => Ok(Os::Windows),
            other => Err(format!("unsupported os '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    Amd64,
    Arm64,
}

impl Arch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::Amd64 => "amd64",
            Arch::Arm64 => "arm64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Arch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "amd64" | "x86_64" => Ok(Arch::Amd64),
            "arm64" | "aarch64" => Ok(Arch::Arm64),
            other => Err(format!("unsupported arch '{other}'")),
        }
    }
}

/// Target `(os, arch)` pair a release is resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

impl Platform {
    pub fn new(os: Os, arch: Arch) -> Self {
        Self {
            os,
            arch,
        }
    }

    /// Detects the platform this binary was built for.
    pub fn detect() -> KvmResult<Self> {
        Self::from_parts(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Maps Rust-style `(os, arch)` names onto a supported platform.
    ///
    /// # Errors
    ///
    /// [`KvmError::UnsupportedPlatform`] if either component has no published binary.
    pub fn from_parts(os: &str, arch: &str) -> KvmResult<Self> {
        let unsupported = || {
            KvmError::UnsupportedPlatform {
                os: os.to_string(),
                arch: arch.to_string(),
            }
        };

        let os_value = os.parse::<Os>().map_err(|_| unsupported())?;
        let arch_value = arch.parse::<Arch>().map_err(|_| unsupported())?;
        Ok(Self::new(os_value, arch_value))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

/// A concrete, downloadable release of the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReleaseSpec {
    pub version: CanonicalVersion,
    pub os: Os,
    pub arch: Arch,
}

impl ReleaseSpec {
    /// Normalizes `version` and pairs it with `platform`.
    pub fn new(version: &str, platform: Platform) -> KvmResult<Self> {
        Ok(Self::from_version(normalize(version)?, platform))
    }

    pub fn from_version(version: CanonicalVersion, platform: Platform) -> Self {
        Self {
            version,
            os: platform.os,
            arch: platform.arch,
        }
    }

    pub fn platform(&self) -> Platform {
        Platform::new(self.os, self.arch)
    }

    /// Substitutes `{version}`, `{os}` and `{arch}` in a URL template.
    ///
    /// # Example
    ///
    /// ```
    /// use kvm_core::release::{Arch, Os, Platform, ReleaseSpec};
    ///
    /// let spec = ReleaseSpec::new("1.30.1", Platform::new(Os::Linux, Arch::Amd64)).unwrap();
    /// assert_eq!(
    ///     spec.render("https://cdn.dl.k8s.io/release/{version}/bin/{os}/{arch}/kubectl"),
    ///     "https://cdn.dl.k8s.io/release/v1.30.1/bin/linux/amd64/kubectl"
    /// );
    /// ```
    pub fn render(&self, template: &str) -> String {
        template
            .replace("{version}", &self.version.to_string())
            .replace("{os}", self.os.as_str())
            .replace("{arch}", self.arch.as_str())
    }
}

impl fmt::Display for ReleaseSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}/{})", self.version, self.os, self.arch)
    }
}
