#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Error types for envbake
//!
//! This crate provides the provisioning error taxonomy. Step-level errors
//! always carry the name of the step that raised them, and the umbrella
//! [`ProvisioningError`] is the only error the executor returns.

use std::borrow::Cow;

use thiserror::Error;

pub mod config;
pub mod filesystem;
pub mod ordering;
pub mod resolution;
pub mod step;
pub mod version;

pub use config::ConfigError;
pub use filesystem::FilesystemError;
pub use ordering::OrderingViolationError;
pub use resolution::PackageResolutionError;
pub use step::StepError;
pub use version::VersionError;

/// Umbrella error for everything a provisioning run can report
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ProvisioningError {
    #[error("package resolution error: {0}")]
    PackageResolution(#[from] PackageResolutionError),

    #[error("ordering violation: {0}")]
    OrderingViolation(#[from] OrderingViolationError),

    #[error("filesystem error: {0}")]
    Filesystem(#[from] FilesystemError),

    #[error("step error: {0}")]
    Step(#[from] StepError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("version error: {0}")]
    Version(#[from] VersionError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("build cancelled")]
    Cancelled,

    #[error("step `{step}`: {source}")]
    InStep {
        step: String,
        source: Box<ProvisioningError>,
    },

    #[error("I/O error: {message}")]
    Io {
        #[cfg_attr(feature = "serde", serde(with = "io_kind_as_str"))]
        kind: std::io::ErrorKind,
        message: String,
        #[cfg_attr(feature = "serde", serde(with = "opt_path_buf"))]
        path: Option<std::path::PathBuf>,
    },
}

impl ProvisioningError {
    /// Create an internal error with a message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an Io error with an associated path
    pub fn io_with_path(err: &std::io::Error, path: impl Into<std::path::PathBuf>) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
            path: Some(path.into()),
        }
    }

    /// Attribute this error to `step` unless it already names one
    #[must_use]
    pub fn in_step(self, step: &str) -> Self {
        if self.failing_step().is_some() || matches!(self, Self::Cancelled) {
            return self;
        }
        Self::InStep {
            step: step.to_string(),
            source: Box::new(self),
        }
    }

    /// Name of the step that raised this error, when it came from a step
    #[must_use]
    pub fn failing_step(&self) -> Option<&str> {
        match self {
            Self::PackageResolution(err) => Some(err.step()),
            Self::OrderingViolation(err) => Some(err.step()),
            Self::Filesystem(err) => Some(err.step()),
            Self::Step(err) => Some(err.step()),
            Self::InStep { step, .. } => Some(step),
            _ => None,
        }
    }

    /// Process exit status for this error
    ///
    /// An installer's own non-zero status is propagated unchanged; every other
    /// failure maps to 1, and cancellation to 130 (terminated by SIGINT).
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::PackageResolution(err) => match err.installer_status() {
                Some(code) if code != 0 => code,
                _ => 1,
            },
            Self::InStep { source, .. } => source.exit_code(),
            Self::Cancelled => 130,
            _ => 1,
        }
    }
}

impl From<std::io::Error> for ProvisioningError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
            path: None,
        }
    }
}

impl From<semver::Error> for ProvisioningError {
    fn from(err: semver::Error) -> Self {
        Self::Version(VersionError::ParseError {
            message: err.to_string(),
        })
    }
}

impl From<serde_json::Error> for ProvisioningError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON error: {err}"))
    }
}

impl From<toml::de::Error> for ProvisioningError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(ConfigError::ParseError {
            message: err.to_string(),
        })
    }
}

/// Result type alias for envbake operations
pub type Result<T> = std::result::Result<T, ProvisioningError>;

/// Minimal interface for rendering user-facing error information
pub trait UserFacingError {
    /// Short message suitable for CLI output.
    fn user_message(&self) -> Cow<'_, str>;

    /// Optional remediation hint.
    fn user_hint(&self) -> Option<&'static str> {
        None
    }

    /// Whether retrying the same build is likely to succeed.
    fn is_retryable(&self) -> bool {
        false
    }

    /// Stable error code for structured reporting.
    fn user_code(&self) -> Option<&'static str> {
        None
    }
}

impl UserFacingError for ProvisioningError {
    fn user_message(&self) -> Cow<'_, str> {
        match self {
            Self::PackageResolution(err) => err.user_message(),
            Self::OrderingViolation(err) => err.user_message(),
            Self::Filesystem(err) => err.user_message(),
            Self::Step(err) => err.user_message(),
            Self::InStep { step, source } => {
                Cow::Owned(format!("step `{step}`: {}", source.user_message()))
            }
            Self::Io { message, .. } => Cow::Owned(message.clone()),
            _ => Cow::Owned(self.to_string()),
        }
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::PackageResolution(err) => err.user_hint(),
            Self::OrderingViolation(err) => err.user_hint(),
            Self::Filesystem(err) => err.user_hint(),
            Self::Step(err) => err.user_hint(),
            Self::Config(err) => err.user_hint(),
            Self::Version(err) => err.user_hint(),
            Self::InStep { source, .. } => source.user_hint(),
            Self::Cancelled => Some("The partial image was discarded; rerun the build."),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::PackageResolution(err) => err.is_retryable(),
            Self::InStep { source, .. } => source.is_retryable(),
            Self::Io { .. } => true,
            _ => false,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        match self {
            Self::PackageResolution(err) => err.user_code(),
            Self::OrderingViolation(err) => err.user_code(),
            Self::Filesystem(err) => err.user_code(),
            Self::Step(err) => err.user_code(),
            Self::Config(err) => err.user_code(),
            Self::Version(err) => err.user_code(),
            Self::InStep { source, .. } => source.user_code(),
            Self::Internal(_) => Some("error.internal"),
            Self::Cancelled => Some("error.cancelled"),
            Self::Io { .. } => Some("error.io"),
        }
    }
}

// Serde helper modules for optional path and io::ErrorKind as string
#[cfg(feature = "serde")]
mod io_kind_as_str {
    use serde::{Deserialize, Deserializer, Serializer};
    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S>(kind: &std::io::ErrorKind, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_str(&format!("{kind:?}"))
    }
    pub fn deserialize<'de, D>(deserializer: D) -> Result<std::io::ErrorKind, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(match s.as_str() {
            "NotFound" => std::io::ErrorKind::NotFound,
            "PermissionDenied" => std::io::ErrorKind::PermissionDenied,
            "AlreadyExists" => std::io::ErrorKind::AlreadyExists,
            "InvalidInput" => std::io::ErrorKind::InvalidInput,
            "InvalidData" => std::io::ErrorKind::InvalidData,
            "TimedOut" => std::io::ErrorKind::TimedOut,
            "Interrupted" => std::io::ErrorKind::Interrupted,
            "Unsupported" => std::io::ErrorKind::Unsupported,
            "UnexpectedEof" => std::io::ErrorKind::UnexpectedEof,
            _ => std::io::ErrorKind::Other,
        })
    }
}

#[cfg(feature = "serde")]
mod opt_path_buf {
    use serde::{Deserialize, Deserializer, Serializer};
    #[allow(clippy::ref_option)]
    pub fn serialize<S>(path: &Option<std::path::PathBuf>, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match path {
            Some(pb) => s.serialize_some(&pb.display().to_string()),
            None => s.serialize_none(),
        }
    }
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<std::path::PathBuf>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt = Option::<String>::deserialize(deserializer)?;
        Ok(opt.map(std::path::PathBuf::from))
    }
}
