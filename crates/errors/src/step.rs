//! Step lifecycle and declaration error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StepError {
    #[error("step `{step}` is not idempotent and cannot be re-run")]
    NotIdempotent { step: String },

    #[error("step `{step}`: invalid status transition {from} -> {to}")]
    InvalidTransition {
        step: String,
        from: String,
        to: String,
    },

    #[error("step `{step}` is malformed: {message}")]
    Malformed { step: String, message: String },
}

impl StepError {
    /// Name of the step concerned
    #[must_use]
    pub fn step(&self) -> &str {
        match self {
            Self::NotIdempotent { step }
            | Self::InvalidTransition { step, .. }
            | Self::Malformed { step, .. } => step,
        }
    }
}

impl UserFacingError for StepError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::NotIdempotent { .. } => Some("Rebuild the image from the start instead."),
            Self::Malformed { .. } => Some("Fix the step declaration in the catalog."),
            Self::InvalidTransition { .. } => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::NotIdempotent { .. } => "step.not_idempotent",
            Self::InvalidTransition { .. } => "step.invalid_transition",
            Self::Malformed { .. } => "step.malformed",
        };
        Some(code)
    }
}
