//! Build context and working directory error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FilesystemError {
    #[error("step `{step}`: build context is missing {path}")]
    MissingContextPath { step: String, path: String },

    #[error("step `{step}`: {path} is not present in the working directory")]
    MissingWorkdirPath { step: String, path: String },

    #[error("step `{step}`: copy {source_path} -> {destination} failed: {message}")]
    CopyFailed {
        step: String,
        source_path: String,
        destination: String,
        message: String,
    },

    #[error("step `{step}`: clearing cache {path} failed: {message}")]
    CacheClearFailed {
        step: String,
        path: String,
        message: String,
    },
}

impl FilesystemError {
    /// Name of the step that failed
    #[must_use]
    pub fn step(&self) -> &str {
        match self {
            Self::MissingContextPath { step, .. }
            | Self::MissingWorkdirPath { step, .. }
            | Self::CopyFailed { step, .. }
            | Self::CacheClearFailed { step, .. } => step,
        }
    }
}

impl UserFacingError for FilesystemError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::MissingContextPath { .. } => {
                Some("Run the build from the project root or pass --context <dir>.")
            }
            Self::MissingWorkdirPath { .. } => {
                Some("Copy the project into the working directory before installing it.")
            }
            Self::CopyFailed { .. } | Self::CacheClearFailed { .. } => {
                Some("Check permissions on the working directory and rebuild.")
            }
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::MissingContextPath { .. } => "filesystem.missing_context_path",
            Self::MissingWorkdirPath { .. } => "filesystem.missing_workdir_path",
            Self::CopyFailed { .. } => "filesystem.copy_failed",
            Self::CacheClearFailed { .. } => "filesystem.cache_clear_failed",
        };
        Some(code)
    }
}
