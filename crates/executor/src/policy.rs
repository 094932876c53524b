//! Checks made against the live state around each step
//!
//! Preconditions run before the backend sees a step; the pin check runs on
//! the effects it reports, before they are merged.

use envbake_errors::{
    FilesystemError, OrderingViolationError, PackageResolutionError, ProvisioningError,
};
use envbake_types::{EnvironmentState, Step, StepEffects, StepKind};

/// Verify a step's inputs against the state left by the steps before it
///
/// # Errors
///
/// Returns the first unmet precondition: a missing required OS package, an
/// unregistered source repository, a runtime install without an interpreter,
/// an editable project that was never copied, or a requirement that
/// contradicts an existing pin.
pub fn check_preconditions(step: &Step, state: &EnvironmentState) -> Result<(), ProvisioningError> {
    for package in &step.requires {
        if !state.has_os_package(package) {
            return Err(OrderingViolationError::PreconditionUnmet {
                step: step.name.clone(),
                requirement: format!("OS package {package}"),
            }
            .into());
        }
    }

    match step.kind {
        StepKind::SystemPackageInstall => {
            if let Some(repository) = &step.repository {
                if !state.has_repository(repository) {
                    return Err(PackageResolutionError::RepositoryNotRegistered {
                        step: step.name.clone(),
                        repository: repository.clone(),
                    }
                    .into());
                }
            }
        }
        StepKind::RuntimePackageInstall => {
            if state.active_interpreter.is_none() {
                return Err(OrderingViolationError::PreconditionUnmet {
                    step: step.name.clone(),
                    requirement: "an interpreter selection".to_string(),
                }
                .into());
            }
            match &step.editable {
                Some(project_dir) if !state.has_path(project_dir) => {
                    return Err(FilesystemError::MissingWorkdirPath {
                        step: step.name.clone(),
                        path: project_dir.display().to_string(),
                    }
                    .into());
                }
                Some(_) => {}
                None => check_requested_pins(step, state)?,
            }
        }
        _ => {}
    }

    Ok(())
}

/// A plain install may not ask for a version other than an existing pin
fn check_requested_pins(step: &Step, state: &EnvironmentState) -> Result<(), ProvisioningError> {
    if step.upgrade {
        return Ok(());
    }
    for requirement in step.requirements()? {
        let Some(existing) = state.runtime_package(&requirement.name) else {
            continue;
        };
        if let Some(pinned) = existing.pinned() {
            if !requirement.version_spec.matches(pinned) {
                return Err(PackageResolutionError::PinConflict {
                    step: step.name.clone(),
                    package: requirement.name.clone(),
                    pinned: pinned.to_string(),
                    requested: requirement.version_spec.to_string(),
                }
                .into());
            }
        }
    }
    Ok(())
}

/// Reject effects that silently move a pinned package
///
/// Catches transitive changes the requirement strings do not show, such as
/// a later install pulling a different framework version.
///
/// # Errors
///
/// Returns `PackageResolutionError::PinConflict` naming the first pinned
/// package whose version would change.
pub fn check_pins_held(
    step: &Step,
    state: &EnvironmentState,
    effects: &StepEffects,
) -> Result<(), ProvisioningError> {
    if step.upgrade {
        return Ok(());
    }
    for package in &effects.runtime_packages {
        let Some(existing) = state.runtime_package(&package.name) else {
            continue;
        };
        if let Some(pinned) = existing.pinned() {
            if package.version.as_ref() != Some(pinned) {
                return Err(PackageResolutionError::PinConflict {
                    step: step.name.clone(),
                    package: package.name.clone(),
                    pinned: pinned.to_string(),
                    requested: package
                        .version
                        .as_ref()
                        .map_or_else(|| "an editable checkout".to_string(), ToString::to_string),
                }
                .into());
            }
        }
    }
    Ok(())
}
