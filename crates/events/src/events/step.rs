use envbake_types::StepKind;
use serde::{Deserialize, Serialize};

use super::FailureContext;

/// Per-step execution events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepEvent {
    Started {
        index: usize,
        name: String,
        kind: StepKind,
    },

    /// An external command is being run on behalf of a step
    CommandSpawned {
        name: String,
        program: String,
        args: Vec<String>,
    },

    Succeeded {
        index: usize,
        name: String,
        duration_ms: u64,
        /// The step's effects were already present in the state
        unchanged: bool,
    },

    Failed {
        index: usize,
        name: String,
        failure: FailureContext,
    },

    /// Step was never started because an earlier step failed
    NotRun { index: usize, name: String },
}

impl StepEvent {
    /// Name of the step the event refers to
    #[must_use]
    pub fn step_name(&self) -> &str {
        match self {
            Self::Started { name, .. }
            | Self::CommandSpawned { name, .. }
            | Self::Succeeded { name, .. }
            | Self::Failed { name, .. }
            | Self::NotRun { name, .. } => name,
        }
    }
}
