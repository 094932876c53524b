use serde::{Deserialize, Serialize};

use super::FailureContext;

/// Pipeline-level lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// Static ordering validation started
    ValidationStarted { pipeline: String, steps: usize },

    /// Static validation passed
    ValidationCompleted { pipeline: String, steps: usize },

    /// Static validation rejected the pipeline; no step ran
    ValidationFailed {
        pipeline: String,
        violations: usize,
        failure: FailureContext,
    },

    /// Execution of the first step is about to begin
    Started {
        pipeline: String,
        steps: usize,
        base_image: Option<String>,
    },

    /// Every step succeeded
    Completed {
        pipeline: String,
        steps_run: usize,
        duration_ms: u64,
    },

    /// Execution stopped at a failing step
    Failed {
        pipeline: String,
        step: String,
        index: usize,
        failure: FailureContext,
    },

    /// The build was interrupted and its state discarded
    Cancelled { pipeline: String },
}
