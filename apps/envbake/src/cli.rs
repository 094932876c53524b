//! Command line interface definition

use clap::{Parser, Subcommand, ValueEnum};
use envbake_types::{BackendKind, ColorChoice};
use std::path::PathBuf;

/// envbake - Deterministic environment provisioning for research images
#[derive(Parser)]
#[command(name = "envbake")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Deterministic environment provisioning for research images")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging to /var/log/envbake/
    #[arg(long, global = true)]
    pub debug: bool,

    /// Color output control
    #[arg(long, global = true, value_enum)]
    pub color: Option<ColorChoice>,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run every catalog step and write the image manifest
    Build {
        /// Base image identifier
        #[arg(long, value_name = "ID")]
        base_image: Option<String>,

        /// Build context holding the project source
        #[arg(long, value_name = "DIR")]
        context: Option<PathBuf>,

        /// Catalog file or built-in catalog name
        #[arg(long, value_name = "PATH")]
        catalog: Option<PathBuf>,

        /// Where steps are applied
        #[arg(long, value_enum)]
        backend: Option<BackendKind>,

        /// Manifest output path
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// Check step ordering without running anything
    #[command(alias = "check")]
    Validate {
        /// Catalog file or built-in catalog name
        #[arg(long, value_name = "PATH")]
        catalog: Option<PathBuf>,
    },

    /// Show the steps a build would run
    Plan {
        /// Catalog file or built-in catalog name
        #[arg(long, value_name = "PATH")]
        catalog: Option<PathBuf>,
    },

    /// Compare two catalogs step by step
    Diff {
        /// Old catalog (file or built-in name)
        old: PathBuf,

        /// New catalog (file or built-in name)
        new: PathBuf,
    },

    /// Render a catalog as a build script or catalog file
    Export {
        /// Catalog file or built-in catalog name
        #[arg(long, value_name = "PATH")]
        catalog: Option<PathBuf>,

        /// Base image for the FROM line
        #[arg(long, value_name = "ID")]
        base_image: Option<String>,

        /// Output format
        #[arg(long, value_enum, default_value_t = ExportFormat::Dockerfile)]
        format: ExportFormat,

        /// Write to a file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

/// Formats `export` can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    Dockerfile,
    Toml,
}

impl Commands {
    /// Catalog named on the command line, if the command takes one
    pub fn catalog(&self) -> Option<&PathBuf> {
        match self {
            Self::Build { catalog, .. }
            | Self::Validate { catalog }
            | Self::Plan { catalog }
            | Self::Export { catalog, .. } => catalog.as_ref(),
            Self::Diff { .. } => None,
        }
    }
}
