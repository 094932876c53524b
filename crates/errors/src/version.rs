//! Version and constraint parsing error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum VersionError {
    #[error("invalid version: {input}")]
    InvalidVersion { input: String },

    #[error("invalid version constraint: {input}")]
    InvalidConstraint { input: String },

    #[error("invalid package requirement: {input}")]
    InvalidRequirement { input: String },

    #[error("invalid interpreter version: {input}")]
    InvalidInterpreter { input: String },

    #[error("version parse error: {message}")]
    ParseError { message: String },
}

impl UserFacingError for VersionError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::InvalidVersion { .. } | Self::ParseError { .. } => {
                Some("Use dotted version strings like 2.1.0.")
            }
            Self::InvalidConstraint { .. } | Self::InvalidRequirement { .. } => Some(
                "Write requirements as `name`, `name==1.2.3` or `name>=1.0,<2.0` (also ~=, !=, <, >).",
            ),
            Self::InvalidInterpreter { .. } => Some("Interpreter versions look like 3.10."),
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::InvalidVersion { .. } => "version.invalid_version",
            Self::InvalidConstraint { .. } => "version.invalid_constraint",
            Self::InvalidRequirement { .. } => "version.invalid_requirement",
            Self::InvalidInterpreter { .. } => "version.invalid_interpreter",
            Self::ParseError { .. } => "version.parse_error",
        };
        Some(code)
    }
}
