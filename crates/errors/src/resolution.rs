//! Package resolution and installer error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

/// A declared OS or runtime package could not be located or installed.
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PackageResolutionError {
    #[error("step `{step}`: package `{package}` not found in any registered repository")]
    PackageNotFound { step: String, package: String },

    #[error("step `{step}`: repository `{repository}` is not registered")]
    RepositoryNotRegistered { step: String, repository: String },

    #[error("step `{step}`: repository `{repository}` could not be registered: {message}")]
    RepositoryUnavailable {
        step: String,
        repository: String,
        message: String,
    },

    #[error("step `{step}`: no available version of `{package}` satisfies `{constraint}`")]
    UnsatisfiableConstraint {
        step: String,
        package: String,
        constraint: String,
    },

    #[error(
        "step `{step}`: `{package}` is pinned to {pinned}; refusing implicit change to {requested}"
    )]
    PinConflict {
        step: String,
        package: String,
        pinned: String,
        requested: String,
    },

    #[error("step `{step}`: interpreter {version} is not installed")]
    InterpreterNotInstalled { step: String, version: String },

    #[error("step `{step}`: `{command}` failed{}: {message}", status_suffix(.status))]
    InstallerFailed {
        step: String,
        command: String,
        status: Option<i32>,
        message: String,
    },
}

#[allow(clippy::ref_option)]
fn status_suffix(status: &Option<i32>) -> String {
    status
        .map(|code| format!(" with exit status {code}"))
        .unwrap_or_default()
}

impl PackageResolutionError {
    /// Exit status reported by the installer, if one ran
    #[must_use]
    pub fn installer_status(&self) -> Option<i32> {
        match self {
            Self::InstallerFailed { status, .. } => *status,
            _ => None,
        }
    }

    /// Name of the step that failed
    #[must_use]
    pub fn step(&self) -> &str {
        match self {
            Self::PackageNotFound { step, .. }
            | Self::RepositoryNotRegistered { step, .. }
            | Self::RepositoryUnavailable { step, .. }
            | Self::UnsatisfiableConstraint { step, .. }
            | Self::PinConflict { step, .. }
            | Self::InterpreterNotInstalled { step, .. }
            | Self::InstallerFailed { step, .. } => step,
        }
    }
}

impl UserFacingError for PackageResolutionError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::PackageNotFound { .. } | Self::RepositoryNotRegistered { .. } => Some(
                "Register the repository that provides the package in an earlier step of the catalog.",
            ),
            Self::UnsatisfiableConstraint { .. } => {
                Some("Check the pinned version against the package index the step uses.")
            }
            Self::PinConflict { .. } => {
                Some("Mark the later step with `upgrade = true` if the change is intended.")
            }
            Self::InterpreterNotInstalled { .. } => {
                Some("Install the interpreter package before selecting it.")
            }
            Self::RepositoryUnavailable { .. } | Self::InstallerFailed { .. } => {
                Some("Inspect the installer output above and rebuild from the start.")
            }
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RepositoryUnavailable { .. } | Self::InstallerFailed { .. }
        )
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::PackageNotFound { .. } => "resolution.package_not_found",
            Self::RepositoryNotRegistered { .. } => "resolution.repository_not_registered",
            Self::RepositoryUnavailable { .. } => "resolution.repository_unavailable",
            Self::UnsatisfiableConstraint { .. } => "resolution.unsatisfiable_constraint",
            Self::PinConflict { .. } => "resolution.pin_conflict",
            Self::InterpreterNotInstalled { .. } => "resolution.interpreter_not_installed",
            Self::InstallerFailed { .. } => "resolution.installer_failed",
        };
        Some(code)
    }
}
