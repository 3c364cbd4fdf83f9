use std::{fmt, str::FromStr, sync::LazyLock};

use regex::Regex;

use crate::{error::KvmError, KvmResult};

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^v(\d+)\.(\d+)\.(\d+)$").expect("unable to compile version regex")
});
static MINOR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^v?(\d+)\.(\d+)$").expect("unable to compile minor version regex")
});

/// A release version in `vMAJOR.MINOR.PATCH` form.
///
/// Ordering is numeric per component, so `v1.10.0 > v1.9.9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CanonicalVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl CanonicalVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Returns true when both versions share the same `MAJOR.MINOR`.
    pub fn same_minor(&self, other: &Self) -> bool {
        self.major == other.major && self.minor == other.minor
    }
}

impl fmt::Display for CanonicalVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for CanonicalVersion {
    type Err = KvmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize(s)
    }
}

/// Returns true if `input` names a minor series (`1.29` or `v1.29`) rather than a release.
pub fn is_minor_only(input: &str) -> bool {
    MINOR_RE.is_match(input.trim())
}

/// Normalizes a free-form version token into a [`CanonicalVersion`].
///
/// A missing `v` prefix is added and a minor-only token gets a `.0` patch.
///
/// # Errors
///
/// [`KvmError::VersionFormat`] if the token is not `[v]MAJOR.MINOR[.PATCH]`.
///
/// # Example
///
/// ```
/// use kvm_core::version::normalize;
///
/// assert_eq!(normalize("1.29").unwrap().to_string(), "v1.29.0");
/// assert_eq!(normalize("v1.30.1").unwrap().to_string(), "v1.30.1");
/// assert!(normalize("latest").is_err());
/// ```
pub fn normalize(input: &str) -> KvmResult<CanonicalVersion> {
    let token = input.trim();
    let invalid = || {
        KvmError::VersionFormat {
            input: input.to_string(),
        }
    };

    let mut candidate = if token.starts_with('v') {
        token.to_string()
    } else {
        format!("v{token}")
    };
    if MINOR_RE.is_match(&candidate) {
        candidate.push_str(".0");
    }

    let caps = VERSION_RE.captures(&candidate).ok_or_else(invalid)?;
    let component = |idx: usize| caps[idx].parse::<u64>().map_err(|_| invalid());

    Ok(CanonicalVersion::new(
        component(1)?,
        component(2)?,
        component(3)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_full_version() {
        assert_eq!(normalize("v1.29.3").unwrap(), CanonicalVersion::new(1, 29, 3));
        assert_eq!(normalize("1.29.3").unwrap(), CanonicalVersion::new(1, 29, 3));
        assert_eq!(normalize("  v1.29.3\n").unwrap(), CanonicalVersion::new(1, 29, 3));
    }

    #[test]
    fn test_normalize_minor_appends_patch() {
        assert_eq!(normalize("1.29").unwrap().to_string(), "v1.29.0");
        assert_eq!(normalize("v1.29").unwrap().to_string(), "v1.29.0");
    }

    #[test]
    fn test_normalize_idempotent() {
        for input in ["v1.0.0", "v1.29.3", "v2.10.15"] {
            let once = normalize(input).unwrap();
            let twice = normalize(&once.to_string()).unwrap();
            assert_eq!(once, twice);
            assert_eq!(once.to_string(), input);
        }
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        for input in [
            "",
            "v",
            "latest",
            "garbage",
            "v1",
            "1.2.3.4",
            "v1.2.3-rc.1",
            "vv1.2.3",
            "V1.2.3",
        ] {
            assert!(
                matches!(normalize(input), Err(KvmError::VersionFormat { .. })),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn test_normalize_overflow_is_format_error() {
        let result = normalize("v99999999999999999999999.0.0");
        assert!(matches!(result, Err(KvmError::VersionFormat { .. })));
    }

    #[test]
    fn test_is_minor_only() {
        assert!(is_minor_only("1.29"));
        assert!(is_minor_only("v1.29"));
        assert!(!is_minor_only("v1.29.0"));
        assert!(!is_minor_only("latest"));
    }

    #[test]
    fn test_numeric_ordering() {
        let a = normalize("v1.10.0").unwrap();
        let b = normalize("v1.9.9").unwrap();
        assert!(a > b);
    }

    #[test]
    fn test_leading_zeros_canonicalized() {
        assert_eq!(normalize("v1.029.03").unwrap().to_string(), "v1.29.3");
    }

    #[test]
    fn test_same_minor() {
        let a = normalize("v1.29.3").unwrap();
        assert!(a.same_minor(&normalize("v1.29").unwrap()));
        assert!(!a.same_minor(&normalize("v1.28.3").unwrap()));
    }
}
