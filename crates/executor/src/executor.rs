//! Sequential step executor

use envbake_errors::{ProvisioningError, StepError};
use envbake_events::{
    AppEvent, EventEmitter, EventMeta, EventSender, FailureContext, PipelineEvent, StateEvent,
    StepEvent,
};
use envbake_platform::{PlatformContext, ProvisionBackend};
use envbake_types::{
    EnvironmentState, ImageManifest, Pipeline, Step, StepEffects, StepStatus, Uuid,
};
use std::time::Instant;

use crate::policy::{check_pins_held, check_preconditions};
use crate::tracker::StepTracker;
use crate::validate::validate_all;

/// Outcome of a pipeline run, successful or not
#[derive(Debug)]
pub struct RunReport {
    pub result: Result<EnvironmentState, ProvisioningError>,
    pub steps: StepTracker,
}

/// Runs pipelines against a backend, one step at a time
///
/// The executor owns the environment state for the duration of a run.
/// Every step is awaited to completion before the next starts, and the
/// first failure ends the run. Every event it emits, including those of the
/// backend, carries the executor's run id as correlation id.
pub struct Executor<B: ProvisionBackend> {
    backend: B,
    tx: Option<EventSender>,
    base_image: String,
    run_id: Uuid,
}

impl<B: ProvisionBackend> Executor<B> {
    pub fn new(backend: B, base_image: impl Into<String>) -> Self {
        Self {
            backend,
            tx: None,
            base_image: base_image.into(),
            run_id: Uuid::new_v4(),
        }
    }

    #[must_use]
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[must_use]
    pub fn base_image(&self) -> &str {
        &self.base_image
    }

    /// Correlation id stamped on this executor's events
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    fn platform_context(&self, step: Option<&str>) -> PlatformContext {
        let ctx = match step {
            Some(name) => PlatformContext::for_step(self.tx.clone(), name),
            None => PlatformContext::new(self.tx.clone()),
        };
        ctx.with_correlation_id(self.run_id.to_string())
    }

    /// Clean state for the configured base image
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot list the base image's packages.
    pub async fn initial_state(&self) -> Result<EnvironmentState, ProvisioningError> {
        let ctx = self.platform_context(None);
        let packages = self.backend.base_packages(&ctx, &self.base_image).await?;
        self.emit_debug(format!(
            "{} ships {} OS packages ({} backend)",
            self.base_image,
            packages.len(),
            self.backend.name()
        ));
        Ok(EnvironmentState::with_base_packages(packages))
    }

    /// Validate the ordering of `pipeline` without running anything
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self, pipeline: &Pipeline) -> Result<(), ProvisioningError> {
        self.emit_pipeline(PipelineEvent::ValidationStarted {
            pipeline: pipeline.name.clone(),
            steps: pipeline.len(),
        });

        let violations = validate_all(pipeline);
        match violations.first() {
            None => {
                self.emit_pipeline(PipelineEvent::ValidationCompleted {
                    pipeline: pipeline.name.clone(),
                    steps: pipeline.len(),
                });
                Ok(())
            }
            Some(first) => {
                self.emit_pipeline(PipelineEvent::ValidationFailed {
                    pipeline: pipeline.name.clone(),
                    violations: violations.len(),
                    failure: FailureContext::from_error(first),
                });
                Err(first.clone())
            }
        }
    }

    /// Validate, then run `pipeline` from a clean state
    ///
    /// # Errors
    ///
    /// Returns the ordering violation or the error of the first failing step.
    pub async fn run(&self, pipeline: &Pipeline) -> Result<EnvironmentState, ProvisioningError> {
        self.validate(pipeline)?;
        let state = self.initial_state().await?;
        self.execute(pipeline, state).await.result
    }

    /// Run `pipeline` on top of an explicit starting state
    ///
    /// # Errors
    ///
    /// Returns the ordering violation or the error of the first failing step.
    pub async fn run_from(
        &self,
        pipeline: &Pipeline,
        state: EnvironmentState,
    ) -> Result<EnvironmentState, ProvisioningError> {
        self.validate(pipeline)?;
        self.execute(pipeline, state).await.result
    }

    /// Run every step in order, halting at the first failure
    ///
    /// Performs no static validation; callers wanting it use [`Self::run`].
    pub async fn execute(&self, pipeline: &Pipeline, mut state: EnvironmentState) -> RunReport {
        let mut steps = StepTracker::new(pipeline);
        let started = Instant::now();

        self.emit_pipeline(PipelineEvent::Started {
            pipeline: pipeline.name.clone(),
            steps: pipeline.len(),
            base_image: Some(self.base_image.clone()),
        });

        for (index, step) in pipeline.iter().enumerate() {
            match self.execute_step(index, step, &state, &mut steps).await {
                Ok(effects) => state.apply(effects),
                Err(error) => {
                    self.emit_pipeline(PipelineEvent::Failed {
                        pipeline: pipeline.name.clone(),
                        step: step.name.clone(),
                        index,
                        failure: FailureContext::from_error(&error),
                    });
                    for (pending_index, name) in steps.pending() {
                        self.emit_step(StepEvent::NotRun {
                            index: pending_index,
                            name: name.to_string(),
                        });
                    }
                    return RunReport {
                        result: Err(error),
                        steps,
                    };
                }
            }
        }

        self.emit_pipeline(PipelineEvent::Completed {
            pipeline: pipeline.name.clone(),
            steps_run: steps.succeeded(),
            duration_ms: elapsed_ms(started),
        });

        RunReport {
            result: Ok(state),
            steps,
        }
    }

    async fn execute_step(
        &self,
        index: usize,
        step: &Step,
        state: &EnvironmentState,
        steps: &mut StepTracker,
    ) -> Result<StepEffects, ProvisioningError> {
        steps.transition(index, StepStatus::Running)?;
        self.emit_step(StepEvent::Started {
            index,
            name: step.name.clone(),
            kind: step.kind,
        });
        let started = Instant::now();

        match self.apply_checked(step, state).await {
            Ok(effects) => {
                steps.transition(index, StepStatus::Succeeded)?;
                self.emit_step(StepEvent::Succeeded {
                    index,
                    name: step.name.clone(),
                    duration_ms: elapsed_ms(started),
                    unchanged: effects.is_noop_for(state),
                });
                Ok(effects)
            }
            Err(error) => {
                steps.transition(index, StepStatus::Failed)?;
                self.emit_step(StepEvent::Failed {
                    index,
                    name: step.name.clone(),
                    failure: FailureContext::from_error(&error),
                });
                Err(error)
            }
        }
    }

    async fn apply_checked(
        &self,
        step: &Step,
        state: &EnvironmentState,
    ) -> Result<StepEffects, ProvisioningError> {
        // Backend I/O and internal errors carry no step name of their own
        let attribute = |error: ProvisioningError| error.in_step(&step.name);

        check_preconditions(step, state).map_err(attribute)?;
        let ctx = self.platform_context(Some(&step.name));
        let effects = self.backend.apply(&ctx, step, state).await.map_err(attribute)?;
        check_pins_held(step, state, &effects).map_err(attribute)?;
        Ok(effects)
    }

    /// Re-run a step against a state where it already succeeded
    ///
    /// Idempotent steps leave an equal state behind. Non-idempotent steps
    /// are refused.
    ///
    /// # Errors
    ///
    /// Returns `StepError::NotIdempotent` for a non-idempotent step, or the
    /// step's own failure.
    pub async fn reapply(
        &self,
        step: &Step,
        state: &EnvironmentState,
    ) -> Result<EnvironmentState, ProvisioningError> {
        if !step.idempotent {
            return Err(StepError::NotIdempotent {
                step: step.name.clone(),
            }
            .into());
        }

        let effects = self.apply_checked(step, state).await?;
        if !effects.is_noop_for(state) {
            tracing::warn!(step = %step.name, "idempotent step changed the state on re-run");
            self.emit_warning_with_context(
                format!("re-running `{}` changed the environment", step.name),
                "the step is declared idempotent",
            );
        }

        let mut next = state.clone();
        next.apply(effects);
        Ok(next)
    }

    /// Run `pipeline` from a clean state and freeze the result
    ///
    /// # Errors
    ///
    /// Returns an error if validation or any step fails, or the catalog
    /// cannot be fingerprinted. No manifest exists for a failed build.
    pub async fn build_image(&self, pipeline: &Pipeline) -> Result<ImageManifest, ProvisioningError> {
        let fingerprint = envbake_catalog::fingerprint(pipeline)?;
        let state = match self.run(pipeline).await {
            Ok(state) => state,
            Err(error) => {
                self.emit(AppEvent::State(StateEvent::Discarded {
                    reason: error.to_string(),
                }));
                return Err(error);
            }
        };

        let manifest = ImageManifest::freeze(&self.base_image, &pipeline.name, fingerprint, state);
        self.emit(AppEvent::State(StateEvent::Frozen {
            build_id: manifest.build_id,
            os_packages: manifest.state.os_packages.len(),
            runtime_packages: manifest.state.runtime_packages.len(),
            files: manifest.state.workdir.len(),
        }));
        Ok(manifest)
    }
}

impl<B: ProvisionBackend> EventEmitter for Executor<B> {
    fn event_sender(&self) -> Option<&EventSender> {
        self.tx.as_ref()
    }

    fn enrich_event_meta(&self, _event: &AppEvent, meta: &mut EventMeta) {
        meta.correlation_id = Some(self.run_id.to_string());
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
