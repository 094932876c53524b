//! Catalog files: TOML with a `name`, an optional `description` and one
//! `[[steps]]` table per step

use envbake_errors::{ConfigError, ProvisioningError};
use envbake_types::Pipeline;
use std::path::Path;

/// Load a catalog from a TOML file
///
/// # Errors
///
/// Returns an error if:
/// - The file does not exist or cannot be read
/// - The TOML is invalid or a step has an unknown kind
/// - A step declaration is malformed
pub async fn load_catalog(path: &Path) -> Result<Pipeline, ProvisioningError> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::CatalogNotFound {
                path: path.display().to_string(),
            }
            .into()
        } else {
            ProvisioningError::io_with_path(&e, path)
        }
    })?;

    parse_catalog(&content, &path.display().to_string())
}

/// Parse a catalog from a string; `origin` names it in errors
///
/// # Errors
///
/// Returns `ConfigError::InvalidCatalog` if the TOML does not describe a
/// pipeline or any step is malformed.
pub fn parse_catalog(content: &str, origin: &str) -> Result<Pipeline, ProvisioningError> {
    let invalid = |message: String| ConfigError::InvalidCatalog {
        path: origin.to_string(),
        message,
    };

    let pipeline: Pipeline = toml::from_str(content).map_err(|e| invalid(e.message().to_string()))?;

    if pipeline.name.trim().is_empty() {
        return Err(invalid("catalog name cannot be empty".to_string()).into());
    }
    if pipeline.is_empty() {
        return Err(invalid("catalog declares no steps".to_string()).into());
    }
    for step in &pipeline {
        step.check_shape().map_err(|e| invalid(e.to_string()))?;
    }

    Ok(pipeline)
}

/// Render a catalog back to TOML
///
/// # Errors
///
/// Returns an error if the pipeline cannot be represented as TOML.
pub fn to_toml(pipeline: &Pipeline) -> Result<String, ProvisioningError> {
    toml::to_string(pipeline).map_err(|e| {
        ConfigError::SerializeError {
            what: format!("catalog {}", pipeline.name),
            error: e.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin;
    use envbake_types::StepKind;

    const GPU_CATALOG: &str = r#"
name = "rl-research-cu121"

[[steps]]
name = "install-interpreter"
kind = "system-package-install"
inputs = ["python3.10"]

[[steps]]
name = "select-interpreter"
kind = "interpreter-selection"
inputs = ["3.10"]

[[steps]]
name = "install-framework"
kind = "language-runtime-package-install"
inputs = ["torch==2.1.0"]
index_url = "https://download.pytorch.org/whl/cu121"
"#;

    #[test]
    fn test_parse_alternate_catalog() {
        let pipeline = parse_catalog(GPU_CATALOG, "gpu.toml").unwrap();
        assert_eq!(pipeline.name, "rl-research-cu121");
        assert_eq!(pipeline.len(), 3);
        assert_eq!(pipeline.steps[1].kind, StepKind::InterpreterSelection);
        assert!(pipeline.steps.iter().all(|s| s.idempotent));
        assert_eq!(pipeline.steps[2].variant().as_deref(), Some("cu121"));
    }

    #[test]
    fn test_unknown_kind_is_invalid_catalog() {
        let content = GPU_CATALOG.replace("interpreter-selection", "docker-run");
        let err = parse_catalog(&content, "gpu.toml").unwrap_err();
        assert!(matches!(
            err,
            ProvisioningError::Config(ConfigError::InvalidCatalog { ref path, .. }) if path == "gpu.toml"
        ));
    }

    #[test]
    fn test_malformed_step_is_invalid_catalog() {
        let content = GPU_CATALOG.replace(r#"inputs = ["3.10"]"#, r#"inputs = ["3.10", "3.11"]"#);
        assert!(parse_catalog(&content, "gpu.toml").is_err());
    }

    #[test]
    fn test_builtin_survives_toml() {
        let rendered = to_toml(&builtin()).unwrap();
        assert!(rendered.contains("[[steps]]"));
        assert_eq!(parse_catalog(&rendered, "builtin").unwrap(), builtin());
    }
}
