//! Structured logging integration for events
//!
//! Converts domain events into tracing records with structured fields, so a
//! `--debug` log file carries the same information the terminal shows.

use envbake_events::{
    AppEvent, EventMessage, GeneralEvent, PipelineEvent, StateEvent, StepEvent,
};
use tracing::{debug, error, info, info_span, warn};

/// Log an event at its own level with structured fields
pub fn log_event_with_tracing(message: &EventMessage) {
    let meta = &message.meta;
    let step = meta.labels.get("step").map(String::as_str);
    let _span = info_span!(
        "event",
        run = meta.correlation_id.as_deref().unwrap_or("-"),
        source = meta.source.as_str()
    )
    .entered();

    match &message.event {
        AppEvent::General(event) => match event {
            GeneralEvent::Warning { message, context } => {
                warn!(
                    event_id = %meta.event_id,
                    context = ?context,
                    "{message}"
                );
            }
            GeneralEvent::Error { message, details } => {
                error!(
                    event_id = %meta.event_id,
                    details = ?details,
                    "{message}"
                );
            }
            GeneralEvent::DebugLog { message, context } => {
                debug!(
                    event_id = %meta.event_id,
                    step = ?step,
                    context = ?context,
                    "{message}"
                );
            }
            GeneralEvent::ConfigurationLoaded { source, overrides } => {
                debug!(
                    config_source = %source,
                    overrides = ?overrides,
                    "Configuration loaded"
                );
            }
        },

        AppEvent::Pipeline(event) => match event {
            PipelineEvent::ValidationStarted { pipeline, steps } => {
                debug!(pipeline = %pipeline, steps = steps, "Validation started");
            }
            PipelineEvent::ValidationCompleted { pipeline, steps } => {
                info!(pipeline = %pipeline, steps = steps, "Validation completed");
            }
            PipelineEvent::ValidationFailed {
                pipeline,
                violations,
                failure,
            } => {
                error!(
                    pipeline = %pipeline,
                    violations = violations,
                    code = ?failure.code,
                    message = %failure.message,
                    hint = ?failure.hint,
                    "Validation failed"
                );
            }
            PipelineEvent::Started {
                pipeline,
                steps,
                base_image,
            } => {
                info!(
                    pipeline = %pipeline,
                    steps = steps,
                    base_image = ?base_image,
                    "Pipeline started"
                );
            }
            PipelineEvent::Completed {
                pipeline,
                steps_run,
                duration_ms,
            } => {
                info!(
                    pipeline = %pipeline,
                    steps_run = steps_run,
                    duration_ms = duration_ms,
                    "Pipeline completed"
                );
            }
            PipelineEvent::Failed {
                pipeline,
                step,
                index,
                failure,
            } => {
                error!(
                    pipeline = %pipeline,
                    step = %step,
                    index = index,
                    retryable = failure.retryable,
                    code = ?failure.code,
                    message = %failure.message,
                    hint = ?failure.hint,
                    "Pipeline failed"
                );
            }
            PipelineEvent::Cancelled { pipeline } => {
                warn!(pipeline = %pipeline, "Pipeline cancelled");
            }
        },

        AppEvent::Step(event) => match event {
            StepEvent::Started { index, name, kind } => {
                info!(step = %name, index = index, kind = %kind, "Step started");
            }
            StepEvent::CommandSpawned {
                name,
                program,
                args,
            } => {
                debug!(step = %name, program = %program, args = ?args, "Command spawned");
            }
            StepEvent::Succeeded {
                index,
                name,
                duration_ms,
                unchanged,
            } => {
                info!(
                    step = %name,
                    index = index,
                    duration_ms = duration_ms,
                    unchanged = unchanged,
                    "Step succeeded"
                );
            }
            StepEvent::Failed {
                index,
                name,
                failure,
            } => {
                error!(
                    step = %name,
                    index = index,
                    retryable = failure.retryable,
                    code = ?failure.code,
                    message = %failure.message,
                    hint = ?failure.hint,
                    "Step failed"
                );
            }
            StepEvent::NotRun { index, name } => {
                warn!(step = %name, index = index, "Step not run");
            }
        },

        AppEvent::State(event) => match event {
            StateEvent::Frozen {
                build_id,
                os_packages,
                runtime_packages,
                files,
            } => {
                info!(
                    build_id = %build_id,
                    os_packages = os_packages,
                    runtime_packages = runtime_packages,
                    files = files,
                    "Environment state frozen"
                );
            }
            StateEvent::ManifestWritten { build_id, path } => {
                info!(build_id = %build_id, path = %path.display(), "Manifest written");
            }
            StateEvent::Discarded { reason } => {
                warn!(reason = %reason, "Build discarded");
            }
        },
    }
}
