#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for envbake
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/envbake/config.toml)
//! - Environment variables
//! - CLI flags

pub mod constants;

use envbake_errors::{ConfigError, ProvisioningError as Error};
use envbake_types::{BackendKind, ColorChoice, OutputFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub paths: PathConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_output_format")]
    pub default_output: OutputFormat,
    #[serde(default = "default_color_choice")]
    pub color: ColorChoice,
}

/// Build configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default = "default_base_image")]
    pub base_image: String,
    #[serde(default)]
    pub backend: BackendKind,
    /// Catalog file; the built-in catalog is used when unset
    pub catalog: Option<PathBuf>,
    /// Directory copy steps read from; the current directory when unset
    pub context_dir: Option<PathBuf>,
}

/// Path configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathConfig {
    /// Where the manifest of a finished build is written
    pub manifest_path: Option<PathBuf>,
    /// Root the system backend materializes the image filesystem under
    pub image_root: Option<PathBuf>,
    pub package_cache: Option<PathBuf>,
}

// Default implementations

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            default_output: OutputFormat::Tty,
            color: ColorChoice::Auto,
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            base_image: default_base_image(),
            backend: BackendKind::System,
            catalog: None,
            context_dir: None,
        }
    }
}

// Default value functions for serde
fn default_output_format() -> OutputFormat {
    OutputFormat::Tty
}

fn default_color_choice() -> ColorChoice {
    ColorChoice::Auto
}

fn default_base_image() -> String {
    constants::DEFAULT_BASE_IMAGE.to_string()
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join("envbake").join("config.toml"))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the file contents
    /// contain invalid TOML syntax that cannot be parsed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })
            .map_err(Into::into)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        let config_path = Self::default_path()?;

        if fs::try_exists(&config_path).await.unwrap_or(false) {
            tracing::debug!(path = %config_path.display(), "loading configuration");
            Self::load_from_file(&config_path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge with environment variables
    ///
    /// Returns the names of the variables that were applied.
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<Vec<&'static str>, Error> {
        let mut applied = Vec::new();

        if let Ok(output) = std::env::var("ENVBAKE_OUTPUT") {
            self.general.default_output = match output.as_str() {
                "plain" => OutputFormat::Plain,
                "tty" => OutputFormat::Tty,
                "json" => OutputFormat::Json,
                _ => return Err(invalid("ENVBAKE_OUTPUT", output)),
            };
            applied.push("ENVBAKE_OUTPUT");
        }

        if let Ok(color) = std::env::var("ENVBAKE_COLOR") {
            self.general.color = match color.as_str() {
                "always" => ColorChoice::Always,
                "auto" => ColorChoice::Auto,
                "never" => ColorChoice::Never,
                _ => return Err(invalid("ENVBAKE_COLOR", color)),
            };
            applied.push("ENVBAKE_COLOR");
        }

        if let Ok(backend) = std::env::var("ENVBAKE_BACKEND") {
            self.build.backend = match backend.as_str() {
                "system" => BackendKind::System,
                "simulated" => BackendKind::Simulated,
                _ => return Err(invalid("ENVBAKE_BACKEND", backend)),
            };
            applied.push("ENVBAKE_BACKEND");
        }

        if let Ok(image) = std::env::var("ENVBAKE_BASE_IMAGE") {
            if image.trim().is_empty() {
                return Err(invalid("ENVBAKE_BASE_IMAGE", image));
            }
            self.build.base_image = image;
            applied.push("ENVBAKE_BASE_IMAGE");
        }

        if let Ok(catalog) = std::env::var("ENVBAKE_CATALOG") {
            self.build.catalog = Some(PathBuf::from(catalog));
            applied.push("ENVBAKE_CATALOG");
        }

        if let Ok(context) = std::env::var("ENVBAKE_CONTEXT") {
            self.build.context_dir = Some(PathBuf::from(context));
            applied.push("ENVBAKE_CONTEXT");
        }

        Ok(applied)
    }

    /// Get the build context directory (with default)
    #[must_use]
    pub fn context_dir(&self) -> PathBuf {
        self.build
            .context_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    /// Get the manifest output path (with default)
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.paths
            .manifest_path
            .clone()
            .unwrap_or_else(|| self.context_dir().join(constants::MANIFEST_FILE))
    }

    /// Get the image filesystem root (with default)
    #[must_use]
    pub fn image_root(&self) -> PathBuf {
        self.paths
            .image_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("/"))
    }

    /// Get the OS package cache directory (with default)
    #[must_use]
    pub fn package_cache(&self) -> PathBuf {
        self.paths
            .package_cache
            .clone()
            .unwrap_or_else(|| PathBuf::from(constants::PACKAGE_CACHE_DIR))
    }
}

fn invalid(field: &str, value: String) -> Error {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value,
    }
    .into()
}
