//! Fixed paths and names used by the image layout
//!
//! These describe the target image rather than the host and are not exposed
//! through TOML configuration.

/// Base image used when neither the CLI nor the config names one
pub const DEFAULT_BASE_IMAGE: &str = "ubuntu:22.04";

/// OS package manager index cache removed by cache-clear steps
pub const PACKAGE_CACHE_DIR: &str = "/var/lib/apt/lists";

/// Project directory inside the image
pub const PROJECT_DIR: &str = "/workspace";

/// Debug log directory
pub const LOGS_DIR: &str = "/var/log/envbake";

/// Manifest file name written next to the build context by default
pub const MANIFEST_FILE: &str = "envbake-manifest.json";
