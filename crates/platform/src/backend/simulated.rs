//! In-memory backend
//!
//! Applies steps against a fixed package universe instead of a real
//! machine. Copies still read the real build context so missing sources
//! are caught, but nothing is written.

use async_trait::async_trait;
use envbake_errors::{
    FilesystemError, OrderingViolationError, PackageResolutionError, ProvisioningError as Error,
};
use envbake_types::{
    normalize_name, parse_version, EnvironmentState, InterpreterVersion, Requirement,
    RuntimePackage, Step, StepEffects, StepKind, Version,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use super::ProvisionBackend;
use crate::core::PlatformContext;
use crate::fs::{list_files, resolve_context_path, PACKAGING_MANIFESTS};

/// Index runtime packages resolve from when a step names none
pub const DEFAULT_INDEX: &str = "https://pypi.org/simple";

/// A runtime package index: normalised name to available versions
#[derive(Debug, Clone, Default)]
pub struct RuntimeIndex {
    packages: BTreeMap<String, BTreeSet<Version>>,
}

impl RuntimeIndex {
    /// Add a package with the given versions; unparseable versions are skipped
    #[must_use]
    pub fn with_package(mut self, name: &str, versions: &[&str]) -> Self {
        self.packages
            .entry(normalize_name(name))
            .or_default()
            .extend(versions.iter().filter_map(|v| parse_version(v).ok()));
        self
    }

    /// Versions published for a requirement's package, oldest first
    fn versions(&self, requirement: &Requirement) -> Option<&BTreeSet<Version>> {
        self.packages.get(&requirement.key())
    }
}

/// Everything the simulated machine can install
#[derive(Debug, Clone, Default)]
pub struct PackageUniverse {
    image_packages: BTreeSet<String>,
    base_repository: BTreeSet<String>,
    repositories: BTreeMap<String, BTreeSet<String>>,
    indexes: BTreeMap<String, RuntimeIndex>,
}

impl PackageUniverse {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Packages preinstalled in every base image
    #[must_use]
    pub fn with_image_packages(mut self, packages: &[&str]) -> Self {
        self.image_packages
            .extend(packages.iter().map(ToString::to_string));
        self
    }

    /// Packages installable without registering anything
    #[must_use]
    pub fn with_base_packages(mut self, packages: &[&str]) -> Self {
        self.base_repository
            .extend(packages.iter().map(ToString::to_string));
        self
    }

    /// A repository that becomes usable once registered
    #[must_use]
    pub fn with_repository(mut self, id: &str, packages: &[&str]) -> Self {
        self.repositories
            .entry(id.to_string())
            .or_default()
            .extend(packages.iter().map(ToString::to_string));
        self
    }

    #[must_use]
    pub fn with_index(mut self, url: &str, index: RuntimeIndex) -> Self {
        self.indexes.insert(url.trim_end_matches('/').to_string(), index);
        self
    }

    /// A stock Ubuntu universe with the deadsnakes interpreters, `PyPI` and
    /// the CPU-only framework index
    #[must_use]
    pub fn ubuntu() -> Self {
        Self::new()
            .with_image_packages(&[
                "apt", "base-files", "bash", "coreutils", "dpkg", "libc6", "tar",
            ])
            .with_base_packages(&[
                "build-essential",
                "ca-certificates",
                "curl",
                "fonts-dejavu-core",
                "fonts-liberation",
                "git",
                "libegl1",
                "libgl1-mesa-dev",
                "libgl1-mesa-glx",
                "libglew-dev",
                "libglfw3",
                "libglfw3-dev",
                "libosmesa6-dev",
                "patchelf",
                "python3",
                "python3-pip",
                "software-properties-common",
                "unzip",
                "wget",
                "xvfb",
            ])
            .with_repository(
                "ppa:deadsnakes/ppa",
                &[
                    "python3.8",
                    "python3.8-dev",
                    "python3.8-distutils",
                    "python3.10",
                    "python3.10-dev",
                    "python3.10-distutils",
                    "python3.10-venv",
                    "python3.11",
                    "python3.11-dev",
                    "python3.11-venv",
                ],
            )
            .with_index(
                DEFAULT_INDEX,
                RuntimeIndex::default()
                    .with_package("pip", &["22.0.2", "23.3.1"])
                    .with_package("setuptools", &["59.6.0", "69.0.2"])
                    .with_package("wheel", &["0.37.1", "0.42.0"])
                    .with_package("PyOpenGL", &["3.1.6", "3.1.7"])
                    .with_package("numpy", &["1.24.4", "1.26.2"])
                    .with_package("gymnasium", &["0.28.1", "0.29.1"])
                    .with_package("torch", &["2.0.1", "2.1.0", "2.1.1"]),
            )
            .with_index(
                "https://download.pytorch.org/whl/cpu",
                RuntimeIndex::default()
                    .with_package("torch", &["2.0.1", "2.1.0", "2.1.1"])
                    .with_package("torchvision", &["0.15.2", "0.16.0"]),
            )
            .with_index(
                "https://download.pytorch.org/whl/cu121",
                RuntimeIndex::default().with_package("torch", &["2.1.0", "2.1.1"]),
            )
    }

    fn os_package_available(&self, package: &str, registered: &BTreeSet<String>) -> bool {
        self.base_repository.contains(package)
            || registered
                .iter()
                .filter_map(|id| self.repositories.get(id))
                .any(|packages| packages.contains(package))
    }
}

/// Backend that applies steps to a [`PackageUniverse`]
#[derive(Debug, Clone)]
pub struct SimulatedBackend {
    universe: PackageUniverse,
    context_dir: PathBuf,
}

impl SimulatedBackend {
    #[must_use]
    pub fn new(universe: PackageUniverse, context_dir: impl Into<PathBuf>) -> Self {
        Self {
            universe,
            context_dir: context_dir.into(),
        }
    }

    /// Simulated Ubuntu machine reading copies from `context_dir`
    #[must_use]
    pub fn ubuntu(context_dir: impl Into<PathBuf>) -> Self {
        Self::new(PackageUniverse::ubuntu(), context_dir)
    }

    #[must_use]
    pub fn context_dir(&self) -> &Path {
        &self.context_dir
    }

    fn install_os_packages(
        &self,
        step: &Step,
        state: &EnvironmentState,
    ) -> Result<StepEffects, Error> {
        if let Some(repository) = &step.repository {
            if !state.has_repository(repository) {
                return Err(PackageResolutionError::RepositoryNotRegistered {
                    step: step.name.clone(),
                    repository: repository.clone(),
                }
                .into());
            }
        }

        for package in &step.inputs {
            if !self
                .universe
                .os_package_available(package, &state.repositories)
            {
                return Err(PackageResolutionError::PackageNotFound {
                    step: step.name.clone(),
                    package: package.clone(),
                }
                .into());
            }
        }

        // Only newly installed packages are downloaded into the cache
        Ok(StepEffects {
            os_packages: step.inputs.clone(),
            cached: step
                .inputs
                .iter()
                .filter(|p| !state.has_os_package(p))
                .map(|p| format!("{p}.deb"))
                .collect(),
            ..StepEffects::default()
        })
    }

    fn register_repository(
        &self,
        step: &Step,
        state: &EnvironmentState,
    ) -> Result<StepEffects, Error> {
        let repository = step.inputs.join(" ");
        if !self.universe.repositories.contains_key(&repository) {
            return Err(PackageResolutionError::RepositoryUnavailable {
                step: step.name.clone(),
                repository,
                message: "no such repository".to_string(),
            }
            .into());
        }

        let cached = if state.has_repository(&repository) {
            Vec::new()
        } else {
            vec![format!("{}_InRelease", repository.replace([':', '/'], "_"))]
        };
        Ok(StepEffects {
            cached,
            repositories: vec![repository],
            ..StepEffects::default()
        })
    }

    fn select_interpreter(step: &Step, state: &EnvironmentState) -> Result<StepEffects, Error> {
        let version = step.interpreter()?;
        if !state.installed_interpreters().contains(&version) {
            return Err(PackageResolutionError::InterpreterNotInstalled {
                step: step.name.clone(),
                version: version.to_string(),
            }
            .into());
        }

        Ok(StepEffects {
            interpreter: Some(version),
            ..StepEffects::default()
        })
    }

    fn install_runtime_packages(
        &self,
        step: &Step,
        state: &EnvironmentState,
    ) -> Result<StepEffects, Error> {
        let interpreter = active_interpreter(step, state)?;

        if let Some(project_dir) = &step.editable {
            return Self::install_editable(step, state, interpreter, project_dir);
        }

        let index_url = step
            .index_url
            .as_deref()
            .unwrap_or(DEFAULT_INDEX)
            .trim_end_matches('/');
        let index = self.universe.indexes.get(index_url).ok_or_else(|| {
            PackageResolutionError::RepositoryUnavailable {
                step: step.name.clone(),
                repository: index_url.to_string(),
                message: "package index unreachable".to_string(),
            }
        })?;

        let mut installed = Vec::new();
        for requirement in step.requirements()? {
            if let Some(existing) = state.runtime_package(&requirement.name) {
                let satisfied = existing
                    .version
                    .as_ref()
                    .is_some_and(|v| requirement.version_spec.matches(v));
                if satisfied && !step.upgrade {
                    installed.push(existing.clone());
                    continue;
                }
            }

            let versions = index.versions(&requirement).ok_or_else(|| {
                PackageResolutionError::PackageNotFound {
                    step: step.name.clone(),
                    package: requirement.name.clone(),
                }
            })?;
            let version = versions
                .iter()
                .rev()
                .find(|v| requirement.version_spec.matches(v))
                .cloned()
                .ok_or_else(|| PackageResolutionError::UnsatisfiableConstraint {
                    step: step.name.clone(),
                    package: requirement.name.clone(),
                    constraint: requirement.version_spec.to_string(),
                })?;

            installed.push(RuntimePackage {
                name: requirement.name.clone(),
                version: Some(version),
                constraint: requirement.version_spec.clone(),
                variant: step.variant(),
                editable: None,
                interpreter,
            });
        }

        Ok(StepEffects {
            runtime_packages: installed,
            ..StepEffects::default()
        })
    }

    fn install_editable(
        step: &Step,
        state: &EnvironmentState,
        interpreter: InterpreterVersion,
        project_dir: &Path,
    ) -> Result<StepEffects, Error> {
        let has_manifest = PACKAGING_MANIFESTS
            .iter()
            .any(|manifest| state.workdir.contains(&project_dir.join(manifest)));
        if !has_manifest {
            return Err(FilesystemError::MissingWorkdirPath {
                step: step.name.clone(),
                path: project_dir.join(PACKAGING_MANIFESTS[0]).display().to_string(),
            }
            .into());
        }

        let runtime_packages = step
            .inputs
            .iter()
            .map(|project| RuntimePackage {
                name: project.clone(),
                version: None,
                constraint: envbake_types::VersionSpec::default(),
                variant: None,
                editable: Some(project_dir.to_path_buf()),
                interpreter,
            })
            .collect();

        Ok(StepEffects {
            runtime_packages,
            ..StepEffects::default()
        })
    }

    async fn copy_sources(&self, step: &Step) -> Result<StepEffects, Error> {
        let destination = step.destination.clone().unwrap_or_else(|| PathBuf::from("/"));
        let mut files = Vec::new();
        for input in &step.inputs {
            let source = resolve_context_path(&step.name, &self.context_dir, input).await?;
            files.extend(
                list_files(&source)
                    .await?
                    .into_iter()
                    .map(|relative| destination.join(relative)),
            );
        }

        Ok(StepEffects {
            files,
            ..StepEffects::default()
        })
    }
}

pub(crate) fn active_interpreter(
    step: &Step,
    state: &EnvironmentState,
) -> Result<InterpreterVersion, Error> {
    state.active_interpreter.ok_or_else(|| {
        OrderingViolationError::PreconditionUnmet {
            step: step.name.clone(),
            requirement: "an interpreter selection".to_string(),
        }
        .into()
    })
}

#[async_trait]
impl ProvisionBackend for SimulatedBackend {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn base_packages(
        &self,
        _ctx: &PlatformContext,
        _base_image: &str,
    ) -> Result<Vec<String>, Error> {
        Ok(self.universe.image_packages.iter().cloned().collect())
    }

    async fn apply(
        &self,
        ctx: &PlatformContext,
        step: &Step,
        state: &EnvironmentState,
    ) -> Result<StepEffects, Error> {
        tracing::trace!(step = ctx.step(), kind = %step.kind, "simulating step");
        match step.kind {
            StepKind::SystemPackageInstall => self.install_os_packages(step, state),
            StepKind::RepositoryRegistration => self.register_repository(step, state),
            StepKind::InterpreterSelection => Self::select_interpreter(step, state),
            StepKind::RuntimePackageInstall => self.install_runtime_packages(step, state),
            StepKind::FilesystemCopy => self.copy_sources(step).await,
            StepKind::CacheClear => Ok(StepEffects {
                cache_cleared: true,
                ..StepEffects::default()
            }),
        }
    }
}
