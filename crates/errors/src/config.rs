//! Configuration and catalog file error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: String },

    #[error("invalid config: {message}")]
    Invalid { message: String },

    #[error("parse error: {message}")]
    ParseError { message: String },

    #[error("missing required field: {field}")]
    MissingField { field: String },

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("catalog not found: {path}")]
    CatalogNotFound { path: String },

    #[error("invalid catalog {path}: {message}")]
    InvalidCatalog { path: String, message: String },

    #[error("failed to serialize {what}: {error}")]
    SerializeError { what: String, error: String },
}

impl UserFacingError for ConfigError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::NotFound { .. } => {
                Some("Create the configuration file or drop the --config flag to use defaults.")
            }
            Self::MissingField { .. } => {
                Some("Add the missing configuration field noted in the error message.")
            }
            Self::InvalidValue { .. } | Self::Invalid { .. } | Self::ParseError { .. } => {
                Some("Fix the configuration value and retry the command.")
            }
            Self::CatalogNotFound { .. } => {
                Some("Pass an existing catalog file or omit --catalog to use the built-in one.")
            }
            Self::InvalidCatalog { .. } => {
                Some("Every [[steps]] entry needs a unique name, a known kind and its inputs.")
            }
            Self::SerializeError { .. } => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::NotFound { .. } => "config.not_found",
            Self::Invalid { .. } => "config.invalid",
            Self::ParseError { .. } => "config.parse_error",
            Self::MissingField { .. } => "config.missing_field",
            Self::InvalidValue { .. } => "config.invalid_value",
            Self::CatalogNotFound { .. } => "config.catalog_not_found",
            Self::InvalidCatalog { .. } => "config.invalid_catalog",
            Self::SerializeError { .. } => "config.serialize_error",
        };
        Some(code)
    }
}
