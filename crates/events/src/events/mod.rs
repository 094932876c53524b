use serde::{Deserialize, Serialize};

use crate::EventSource;
use envbake_errors::UserFacingError;

/// Structured failure information shared across domains.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Short user-facing message.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether retrying the operation might succeed.
    pub retryable: bool,
}

impl FailureContext {
    #[must_use]
    pub fn new(
        code: Option<impl Into<String>>,
        message: impl Into<String>,
        hint: Option<impl Into<String>>,
        retryable: bool,
    ) -> Self {
        Self {
            code: code.map(Into::into),
            message: message.into(),
            hint: hint.map(Into::into),
            retryable,
        }
    }

    /// Build failure context from a `UserFacingError` implementation.
    #[must_use]
    pub fn from_error<E: UserFacingError + ?Sized>(error: &E) -> Self {
        Self::new(
            error.user_code(),
            error.user_message().into_owned(),
            error.user_hint(),
            error.is_retryable(),
        )
    }
}

pub mod general;
pub mod pipeline;
pub mod state;
pub mod step;

pub use general::*;
pub use pipeline::*;
pub use state::*;
pub use step::*;

/// Top-level application event enum that aggregates all domain-specific events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// General utility events (warnings, errors, operations)
    General(GeneralEvent),

    /// Validation and run lifecycle of a whole pipeline
    Pipeline(PipelineEvent),

    /// Individual step execution
    Step(StepEvent),

    /// Environment state and manifest events
    State(StateEvent),
}

impl AppEvent {
    /// Identify the source domain for this event (used for metadata/logging).
    #[must_use]
    pub fn event_source(&self) -> EventSource {
        match self {
            Self::General(_) => EventSource::GENERAL,
            Self::Pipeline(_) => EventSource::PIPELINE,
            Self::Step(_) => EventSource::STEP,
            Self::State(_) => EventSource::STATE,
        }
    }

    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;

        match self {
            Self::General(GeneralEvent::Error { .. })
            | Self::Pipeline(PipelineEvent::ValidationFailed { .. } | PipelineEvent::Failed { .. })
            | Self::Step(StepEvent::Failed { .. }) => Level::ERROR,

            Self::General(GeneralEvent::Warning { .. })
            | Self::Pipeline(PipelineEvent::Cancelled { .. })
            | Self::Step(StepEvent::NotRun { .. })
            | Self::State(StateEvent::Discarded { .. }) => Level::WARN,

            Self::General(GeneralEvent::DebugLog { .. } | GeneralEvent::ConfigurationLoaded { .. })
            | Self::Step(StepEvent::CommandSpawned { .. })
            | Self::Pipeline(PipelineEvent::ValidationStarted { .. }) => Level::DEBUG,

            _ => Level::INFO,
        }
    }

    /// Get the log target for this event (for structured logging)
    #[must_use]
    pub fn log_target(&self) -> &'static str {
        match self {
            Self::General(_) => "envbake::events::general",
            Self::Pipeline(_) => "envbake::events::pipeline",
            Self::Step(_) => "envbake::events::step",
            Self::State(_) => "envbake::events::state",
        }
    }
}
