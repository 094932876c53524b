//! Environment state type definitions

use crate::version::{InterpreterVersion, VersionSpec};
use crate::Version;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// A runtime package recorded in the environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimePackage {
    /// Package name as requested
    pub name: String,
    /// Installed version; `None` for editable projects
    pub version: Option<Version>,
    /// Constraint the package was installed under
    #[serde(default)]
    pub constraint: VersionSpec,
    /// Build variant from the package index (`cpu`, `cu121`, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    /// Source directory for editable installs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editable: Option<PathBuf>,
    /// Interpreter the package was installed for
    pub interpreter: InterpreterVersion,
}

impl RuntimePackage {
    /// The exact version this package is pinned to, if any
    #[must_use]
    pub fn pinned(&self) -> Option<&Version> {
        self.constraint.pinned()
    }

    #[must_use]
    pub fn is_editable(&self) -> bool {
        self.editable.is_some()
    }
}

/// Effects of one successfully applied step, reported by a backend
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepEffects {
    pub os_packages: Vec<String>,
    pub repositories: Vec<String>,
    pub interpreter: Option<InterpreterVersion>,
    pub runtime_packages: Vec<RuntimePackage>,
    pub files: Vec<PathBuf>,
    pub cached: Vec<String>,
    pub cache_cleared: bool,
}

impl StepEffects {
    /// Whether applying these effects would leave a state unchanged
    #[must_use]
    pub fn is_noop_for(&self, state: &EnvironmentState) -> bool {
        let mut applied = state.clone();
        applied.apply(self.clone());
        applied == *state
    }
}

/// Cumulative effect of every executed step
///
/// All collections are ordered so two states built from the same pipeline
/// compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentState {
    pub os_packages: BTreeSet<String>,
    pub repositories: BTreeSet<String>,
    pub active_interpreter: Option<InterpreterVersion>,
    pub runtime_packages: BTreeMap<String, RuntimePackage>,
    pub workdir: BTreeSet<PathBuf>,
    pub package_cache: BTreeSet<String>,
}

impl EnvironmentState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a state with the packages a base image ships with
    pub fn with_base_packages<I, S>(packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            os_packages: packages.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Merge a step's effects into the state
    pub fn apply(&mut self, effects: StepEffects) {
        self.os_packages.extend(effects.os_packages);
        self.repositories.extend(effects.repositories);
        if let Some(interpreter) = effects.interpreter {
            self.active_interpreter = Some(interpreter);
        }
        for package in effects.runtime_packages {
            self.runtime_packages
                .insert(crate::version::normalize_name(&package.name), package);
        }
        self.workdir.extend(effects.files);
        if effects.cache_cleared {
            self.package_cache.clear();
        }
        self.package_cache.extend(effects.cached);
    }

    /// Interpreters provided by installed OS packages
    #[must_use]
    pub fn installed_interpreters(&self) -> BTreeSet<InterpreterVersion> {
        self.os_packages
            .iter()
            .filter_map(|package| InterpreterVersion::from_package_name(package))
            .collect()
    }

    #[must_use]
    pub fn has_os_package(&self, package: &str) -> bool {
        self.os_packages.contains(package)
    }

    #[must_use]
    pub fn has_repository(&self, repository: &str) -> bool {
        self.repositories.contains(repository)
    }

    /// Look up a runtime package by (unnormalised) name
    #[must_use]
    pub fn runtime_package(&self, name: &str) -> Option<&RuntimePackage> {
        self.runtime_packages
            .get(&crate::version::normalize_name(name))
    }

    /// Whether any file exists at or below `path` in the working directory
    #[must_use]
    pub fn has_path(&self, path: &std::path::Path) -> bool {
        self.workdir.iter().any(|file| file.starts_with(path))
    }
}
