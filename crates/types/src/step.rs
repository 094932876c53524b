//! Provisioning step definitions

use crate::version::{InterpreterVersion, Requirement};
use envbake_errors::{StepError, VersionError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Package names that make up the runtime package manager itself
pub const PACKAGE_MANAGER_PACKAGES: &[&str] = &["pip", "setuptools", "wheel"];

/// The kind of provisioning action a step performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepKind {
    SystemPackageInstall,
    RepositoryRegistration,
    InterpreterSelection,
    #[serde(rename = "language-runtime-package-install")]
    RuntimePackageInstall,
    FilesystemCopy,
    CacheClear,
}

impl StepKind {
    /// Stable kebab-case name used in catalogs and logs
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SystemPackageInstall => "system-package-install",
            Self::RepositoryRegistration => "repository-registration",
            Self::InterpreterSelection => "interpreter-selection",
            Self::RuntimePackageInstall => "language-runtime-package-install",
            Self::FilesystemCopy => "filesystem-copy",
            Self::CacheClear => "cache-clear",
        }
    }

    /// Whether the step goes through the OS package manager and its cache
    #[must_use]
    pub fn touches_os_packages(&self) -> bool {
        matches!(
            self,
            Self::SystemPackageInstall | Self::RepositoryRegistration
        )
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system-package-install" => Ok(Self::SystemPackageInstall),
            "repository-registration" => Ok(Self::RepositoryRegistration),
            "interpreter-selection" => Ok(Self::InterpreterSelection),
            "language-runtime-package-install" => Ok(Self::RuntimePackageInstall),
            "filesystem-copy" => Ok(Self::FilesystemCopy),
            "cache-clear" => Ok(Self::CacheClear),
            other => Err(format!("unknown step kind: {other}")),
        }
    }
}

fn default_idempotent() -> bool {
    true
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}

/// One atomic provisioning action
///
/// `inputs` holds the kind-specific identifiers: OS package names,
/// repository ids, an interpreter version, runtime requirements, or
/// context-relative source paths. The optional attributes refine the few
/// kinds that need more than a list of identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    pub kind: StepKind,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default = "default_idempotent")]
    pub idempotent: bool,
    /// Repository the OS packages are installed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    /// Alternate runtime package index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_url: Option<String>,
    /// Explicit upgrade of already-installed runtime packages
    #[serde(default, skip_serializing_if = "is_false")]
    pub upgrade: bool,
    /// Local project installed in editable mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editable: Option<PathBuf>,
    /// Copy target inside the image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    /// OS packages this step compiles or links against
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
}

impl Step {
    fn new(name: impl Into<String>, kind: StepKind, inputs: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            inputs,
            idempotent: true,
            repository: None,
            index_url: None,
            upgrade: false,
            editable: None,
            destination: None,
            requires: Vec::new(),
        }
    }

    /// Install OS packages
    pub fn system_install<I, S>(name: impl Into<String>, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            StepKind::SystemPackageInstall,
            packages.into_iter().map(Into::into).collect(),
        )
    }

    /// Register an additional OS package repository
    pub fn register_repository(name: impl Into<String>, repository: impl Into<String>) -> Self {
        Self::new(
            name,
            StepKind::RepositoryRegistration,
            vec![repository.into()],
        )
    }

    /// Point the active interpreter at an installed version
    pub fn select_interpreter(name: impl Into<String>, version: InterpreterVersion) -> Self {
        Self::new(
            name,
            StepKind::InterpreterSelection,
            vec![version.to_string()],
        )
    }

    /// Install runtime packages from requirement strings
    pub fn runtime_install<I, S>(name: impl Into<String>, requirements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            StepKind::RuntimePackageInstall,
            requirements.into_iter().map(Into::into).collect(),
        )
    }

    /// Install a copied local project in editable mode
    pub fn editable_install(
        name: impl Into<String>,
        project: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Self {
        let mut step = Self::new(name, StepKind::RuntimePackageInstall, vec![project.into()]);
        step.editable = Some(path.into());
        step
    }

    /// Copy context-relative paths into the image
    pub fn copy<I, S>(name: impl Into<String>, sources: I, destination: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut step = Self::new(
            name,
            StepKind::FilesystemCopy,
            sources.into_iter().map(Into::into).collect(),
        );
        step.destination = Some(destination.into());
        step
    }

    /// Remove the OS package cache
    pub fn clear_cache(name: impl Into<String>) -> Self {
        Self::new(name, StepKind::CacheClear, Vec::new())
    }

    #[must_use]
    pub fn in_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = Some(repository.into());
        self
    }

    #[must_use]
    pub fn with_index(mut self, index_url: impl Into<String>) -> Self {
        self.index_url = Some(index_url.into());
        self
    }

    #[must_use]
    pub fn upgrading(mut self) -> Self {
        self.upgrade = true;
        self
    }

    #[must_use]
    pub fn not_idempotent(mut self) -> Self {
        self.idempotent = false;
        self
    }

    #[must_use]
    pub fn requiring<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.requires.extend(packages.into_iter().map(Into::into));
        self
    }

    /// Interpreter version named by an interpreter-selection step
    ///
    /// # Errors
    ///
    /// Returns an error if the step is not a selection with exactly one
    /// parseable version input.
    pub fn interpreter(&self) -> Result<InterpreterVersion, StepError> {
        match (self.kind, self.inputs.as_slice()) {
            (StepKind::InterpreterSelection, [version]) => {
                version
                    .parse::<InterpreterVersion>()
                    .map_err(|e: VersionError| StepError::Malformed {
                        step: self.name.clone(),
                        message: e.to_string(),
                    })
            }
            _ => Err(self.malformed("interpreter selection takes exactly one version input")),
        }
    }

    /// Parsed requirements of a runtime package install
    ///
    /// # Errors
    ///
    /// Returns an error if any input is not a valid requirement.
    pub fn requirements(&self) -> Result<Vec<Requirement>, StepError> {
        self.inputs
            .iter()
            .map(|input| {
                Requirement::parse(input).map_err(|e| StepError::Malformed {
                    step: self.name.clone(),
                    message: e.to_string(),
                })
            })
            .collect()
    }

    /// Package variant implied by the index URL (`.../whl/cpu` -> `cpu`)
    #[must_use]
    pub fn variant(&self) -> Option<String> {
        self.index_url
            .as_deref()
            .and_then(|url| url.trim_end_matches('/').rsplit('/').next())
            .filter(|segment| !segment.is_empty() && !segment.contains(':'))
            .map(str::to_string)
    }

    /// Whether this step bootstraps or upgrades the runtime package manager
    #[must_use]
    pub fn is_package_manager_bootstrap(&self) -> bool {
        self.kind == StepKind::RuntimePackageInstall
            && self.upgrade
            && self.inputs.iter().any(|input| {
                Requirement::parse(input)
                    .is_ok_and(|req| PACKAGE_MANAGER_PACKAGES.contains(&req.key().as_str()))
            })
    }

    /// Check the kind-specific shape of the declaration
    ///
    /// # Errors
    ///
    /// Returns `StepError::Malformed` describing the first problem found.
    pub fn check_shape(&self) -> Result<(), StepError> {
        if self.name.trim().is_empty() {
            return Err(self.malformed("step name must not be empty"));
        }
        match self.kind {
            StepKind::SystemPackageInstall if self.inputs.is_empty() => {
                Err(self.malformed("no packages to install"))
            }
            StepKind::RepositoryRegistration if self.inputs.len() != 1 => {
                Err(self.malformed("repository registration takes exactly one repository"))
            }
            StepKind::InterpreterSelection => self.interpreter().map(|_| ()),
            StepKind::RuntimePackageInstall => {
                if self.inputs.is_empty() {
                    return Err(self.malformed("no packages to install"));
                }
                self.requirements().map(|_| ())
            }
            StepKind::FilesystemCopy if self.inputs.is_empty() || self.destination.is_none() => {
                Err(self.malformed("copy needs at least one source and a destination"))
            }
            StepKind::CacheClear if !self.inputs.is_empty() => {
                Err(self.malformed("cache clear takes no inputs"))
            }
            _ => Ok(()),
        }
    }

    fn malformed(&self, message: &str) -> StepError {
        StepError::Malformed {
            step: self.name.clone(),
            message: message.to_string(),
        }
    }
}

/// Per-step execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl StepStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    /// Valid transitions FROM this status
    ///
    /// `Failed` is terminal. `Succeeded -> Running` is the re-run of an
    /// idempotent step; the caller enforces idempotence.
    #[must_use]
    pub fn can_transition_to(&self, next: StepStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending | Self::Succeeded, Self::Running)
                | (Self::Running, Self::Succeeded | Self::Failed)
        )
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
