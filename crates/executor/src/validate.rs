//! Static ordering pass
//!
//! Runs over the declarations alone, before any step executes. It catches
//! prerequisites declared after the step that needs them and prerequisites
//! the pipeline can never satisfy. Anything that depends on what the base
//! image or package sources contain is left to the executor.

use envbake_errors::{OrderingViolationError, ProvisioningError};
use envbake_types::{Pipeline, Step, StepKind};
use std::collections::BTreeMap;

/// Validate a pipeline, returning the first violation
///
/// # Errors
///
/// Returns the first malformed step or ordering violation in declaration
/// order.
pub fn validate(pipeline: &Pipeline) -> Result<(), ProvisioningError> {
    match validate_all(pipeline).into_iter().next() {
        Some(violation) => Err(violation),
        None => Ok(()),
    }
}

/// Every malformed step and ordering violation in the pipeline
#[must_use]
pub fn validate_all(pipeline: &Pipeline) -> Vec<ProvisioningError> {
    let mut violations = Vec::new();
    let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
    let mut cache_clear: Option<&Step> = None;

    for (index, step) in pipeline.iter().enumerate() {
        if let Some(&first_index) = seen.get(step.name.as_str()) {
            violations.push(
                OrderingViolationError::DuplicateStepName {
                    step: step.name.clone(),
                    first_index,
                    index,
                }
                .into(),
            );
        } else {
            seen.insert(&step.name, index);
        }

        if let Err(e) = step.check_shape() {
            violations.push(e.into());
            continue;
        }

        if let Some(clear) = cache_clear {
            if step.kind.touches_os_packages() {
                violations.push(
                    OrderingViolationError::AfterCacheClear {
                        step: step.name.clone(),
                        index,
                        cache_clear: clear.name.clone(),
                    }
                    .into(),
                );
            }
        }
        if step.kind == StepKind::CacheClear && cache_clear.is_none() {
            cache_clear = Some(step);
        }

        violations.extend(
            prerequisites(pipeline, index, step)
                .into_iter()
                .map(ProvisioningError::from),
        );
    }

    violations
}

/// What `step` needs from earlier steps, checked against where the
/// pipeline actually provides it
fn prerequisites(pipeline: &Pipeline, index: usize, step: &Step) -> Vec<OrderingViolationError> {
    let mut found = Vec::new();
    let mut expect = |requirement: String, provider: Option<(usize, &Step)>, required: bool| {
        match provider {
            Some((provider_index, provider)) if provider_index > index => {
                found.push(OrderingViolationError::ForwardReference {
                    step: step.name.clone(),
                    index,
                    requirement,
                    provider: provider.name.clone(),
                    provider_index,
                });
            }
            None if required => found.push(OrderingViolationError::MissingPrerequisite {
                step: step.name.clone(),
                index,
                requirement,
            }),
            _ => {}
        }
    };

    for package in &step.requires {
        expect(
            format!("OS package {package}"),
            installs_os_package(pipeline, package),
            false,
        );
    }

    match step.kind {
        StepKind::SystemPackageInstall => {
            if let Some(repository) = &step.repository {
                expect(
                    format!("repository {repository}"),
                    first(pipeline, |s| {
                        s.kind == StepKind::RepositoryRegistration
                            && s.inputs.first() == Some(repository)
                    }),
                    false,
                );
            }
        }
        StepKind::InterpreterSelection => {
            if let Ok(version) = step.interpreter() {
                let package = version.package_name();
                expect(
                    format!("OS package {package}"),
                    installs_os_package(pipeline, &package),
                    false,
                );
            }
        }
        StepKind::RuntimePackageInstall => {
            expect(
                "an interpreter selection".to_string(),
                first(pipeline, |s| s.kind == StepKind::InterpreterSelection),
                true,
            );
            if !step.is_package_manager_bootstrap() {
                expect(
                    "the package manager bootstrap".to_string(),
                    first(pipeline, Step::is_package_manager_bootstrap),
                    false,
                );
            }
            if let Some(project_dir) = &step.editable {
                expect(
                    format!("a copy of the project into {}", project_dir.display()),
                    first(pipeline, |s| {
                        s.kind == StepKind::FilesystemCopy
                            && s.destination.as_ref().is_some_and(|destination| {
                                destination == project_dir
                                    || s.inputs.iter().any(|i| destination.join(i) == *project_dir)
                            })
                    }),
                    true,
                );
            }
        }
        _ => {}
    }

    found
}

fn first<'a>(pipeline: &'a Pipeline, predicate: impl Fn(&Step) -> bool) -> Option<(usize, &'a Step)> {
    pipeline.iter().enumerate().find(|(_, s)| predicate(s))
}

fn installs_os_package<'a>(pipeline: &'a Pipeline, package: &str) -> Option<(usize, &'a Step)> {
    first(pipeline, |s| {
        s.kind == StepKind::SystemPackageInstall && s.inputs.iter().any(|p| p == package)
    })
}
