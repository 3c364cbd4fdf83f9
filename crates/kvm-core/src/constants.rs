//! Constants used throughout kvm-core.

/// Name of the registry file under the cache root.
pub const REGISTRY_FILE: &str = "registry.json";

/// Directory under the cache root holding content-addressed blobs.
pub const BLOBS_DIR: &str = "blobs";

/// Logical token that resolves through the latest pointer endpoint.
pub const LATEST_TOKEN: &str = "latest";

/// Length of a hex-encoded SHA-256 digest.
pub const DIGEST_LEN: usize = 64;
