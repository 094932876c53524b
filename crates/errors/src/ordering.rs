//! Pipeline ordering error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

/// A step's prerequisite is not met by the steps declared before it.
///
/// These are catalog authoring bugs. The static pass reports them before any
/// step runs; the executor re-checks preconditions against the live state
/// and raises `PreconditionUnmet` if something slipped through.
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OrderingViolationError {
    #[error(
        "step `{step}` (#{index}) needs {requirement}, which is provided later by `{provider}` (#{provider_index})"
    )]
    ForwardReference {
        step: String,
        index: usize,
        requirement: String,
        provider: String,
        provider_index: usize,
    },

    #[error("step `{step}` (#{index}) needs {requirement}, which no earlier step provides")]
    MissingPrerequisite {
        step: String,
        index: usize,
        requirement: String,
    },

    #[error("step `{step}` (#{index}) touches OS packages after cache clear `{cache_clear}`")]
    AfterCacheClear {
        step: String,
        index: usize,
        cache_clear: String,
    },

    #[error("step name `{step}` is declared twice (#{first_index} and #{index})")]
    DuplicateStepName {
        step: String,
        first_index: usize,
        index: usize,
    },

    #[error("step `{step}`: precondition not met: {requirement}")]
    PreconditionUnmet { step: String, requirement: String },
}

impl OrderingViolationError {
    /// Name of the offending step
    #[must_use]
    pub fn step(&self) -> &str {
        match self {
            Self::ForwardReference { step, .. }
            | Self::MissingPrerequisite { step, .. }
            | Self::AfterCacheClear { step, .. }
            | Self::DuplicateStepName { step, .. }
            | Self::PreconditionUnmet { step, .. } => step,
        }
    }
}

impl UserFacingError for OrderingViolationError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::ForwardReference { .. } => {
                Some("Move the providing step above the step that needs it.")
            }
            Self::MissingPrerequisite { .. } | Self::PreconditionUnmet { .. } => {
                Some("Add the missing prerequisite step earlier in the catalog.")
            }
            Self::AfterCacheClear { .. } => {
                Some("Cache clearing must be the last OS-package step; move it to the end.")
            }
            Self::DuplicateStepName { .. } => Some("Give every step a unique name."),
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::ForwardReference { .. } => "ordering.forward_reference",
            Self::MissingPrerequisite { .. } => "ordering.missing_prerequisite",
            Self::AfterCacheClear { .. } => "ordering.after_cache_clear",
            Self::DuplicateStepName { .. } => "ordering.duplicate_step_name",
            Self::PreconditionUnmet { .. } => "ordering.precondition_unmet",
        };
        Some(code)
    }
}
