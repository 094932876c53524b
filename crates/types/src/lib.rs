#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for envbake
//!
//! This crate provides the data model shared by every other crate: steps and
//! their kinds, pipelines, the environment state they mutate, version
//! constraints, and the image manifest a finished build is frozen into.

pub mod manifest;
pub mod pipeline;
pub mod state;
pub mod step;
pub mod version;

// Re-export commonly used types
pub use manifest::{ImageManifest, DEFAULT_ENTRYPOINT};
pub use pipeline::Pipeline;
pub use semver::Version;
pub use state::{EnvironmentState, RuntimePackage, StepEffects};
pub use step::{Step, StepKind, StepStatus, PACKAGE_MANAGER_PACKAGES};
pub use uuid::Uuid;
pub use version::{
    normalize_name, parse_version, InterpreterVersion, Requirement, VersionConstraint,
    VersionSpec,
};

use serde::{Deserialize, Serialize};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Plain,
    #[default]
    Tty,
    Json,
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ColorChoice {
    Always,
    #[default]
    Auto,
    Never,
}

impl clap::ValueEnum for ColorChoice {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Always, Self::Auto, Self::Never]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(match self {
            Self::Always => clap::builder::PossibleValue::new("always"),
            Self::Auto => clap::builder::PossibleValue::new("auto"),
            Self::Never => clap::builder::PossibleValue::new("never"),
        })
    }
}

/// Which backend applies steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Run the real installers on this machine
    #[default]
    System,
    /// Apply steps to an in-memory package universe
    Simulated,
}

impl clap::ValueEnum for BackendKind {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::System, Self::Simulated]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(match self {
            Self::System => clap::builder::PossibleValue::new("system"),
            Self::Simulated => clap::builder::PossibleValue::new("simulated"),
        })
    }
}
