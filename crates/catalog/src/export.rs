//! Render a catalog as a Dockerfile-style build script

use envbake_config::constants::PACKAGE_CACHE_DIR;
use envbake_errors::ProvisioningError;
use envbake_platform::fs::copy_target;
use envbake_platform::installer_commands;
use envbake_types::{InterpreterVersion, Pipeline, StepKind, DEFAULT_ENTRYPOINT};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// One `FROM`, then a `RUN` or `COPY` block per step, in catalog order
///
/// Runtime installs are rendered against the interpreter selected by the
/// steps before them, exactly as the executor would run them.
///
/// # Errors
///
/// Returns an error if a step is malformed or a runtime install precedes
/// every interpreter selection.
pub fn render_dockerfile(pipeline: &Pipeline, base_image: &str) -> Result<String, ProvisioningError> {
    let mut out = String::new();
    let mut interpreter: Option<InterpreterVersion> = None;
    let mut workdir: Option<PathBuf> = None;

    let _ = writeln!(out, "# catalog: {}", pipeline.name);
    if let Some(description) = &pipeline.description {
        let _ = writeln!(out, "# {description}");
    }
    let _ = writeln!(out, "# fingerprint: {}", crate::fingerprint(pipeline)?);
    let _ = writeln!(out, "FROM {base_image}");

    for (index, step) in pipeline.iter().enumerate() {
        let _ = writeln!(out, "\n# {}. {} ({})", index + 1, step.name, step.kind);
        match step.kind {
            StepKind::FilesystemCopy => {
                let destination = step.destination.clone().unwrap_or_else(|| PathBuf::from("/"));
                for source in &step.inputs {
                    let _ = writeln!(
                        out,
                        "COPY {source} {}",
                        copy_target(&destination, Path::new(source)).display()
                    );
                }
                if workdir.as_ref() != Some(&destination) {
                    let _ = writeln!(out, "WORKDIR {}", destination.display());
                    workdir = Some(destination);
                }
            }
            StepKind::CacheClear => {
                let _ = writeln!(out, "RUN rm -rf {PACKAGE_CACHE_DIR}/*");
            }
            _ => {
                let commands: Vec<String> = installer_commands(step, interpreter)?
                    .iter()
                    .map(ToString::to_string)
                    .collect();
                let _ = writeln!(out, "RUN {}", commands.join(" \\\n    && "));
            }
        }
        if step.kind == StepKind::InterpreterSelection {
            interpreter = Some(step.interpreter()?);
        }
    }

    let entrypoint = serde_json::to_string(DEFAULT_ENTRYPOINT)?;
    let _ = writeln!(out, "\nCMD {entrypoint}");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin;
    use envbake_types::Step;

    #[test]
    fn test_builtin_script_shape() {
        let script = render_dockerfile(&builtin(), "ubuntu:22.04").unwrap();
        let lines: Vec<&str> = script.lines().collect();

        assert!(lines.contains(&"FROM ubuntu:22.04"));
        assert!(lines.contains(&"COPY setup.py /workspace/setup.py"));
        assert!(lines.contains(&"COPY safepo /workspace/safepo"));
        assert!(lines.contains(&"WORKDIR /workspace"));
        assert!(lines.contains(&"RUN rm -rf /var/lib/apt/lists/*"));
        assert_eq!(lines.last(), Some(&"CMD [\"/bin/bash\"]"));
        assert!(script.contains(
            "python3.10 -m pip install --no-cache-dir --index-url https://download.pytorch.org/whl/cpu torch==2.1.0"
        ));
        assert!(script.contains("add-apt-repository -y ppa:deadsnakes/ppa"));
    }

    #[test]
    fn test_nested_copy_lands_like_the_backends() {
        let pipeline =
            Pipeline::new("nested").then(Step::copy("copy-src", ["src/pkg"], "/workspace"));
        let script = render_dockerfile(&pipeline, "ubuntu:22.04").unwrap();
        assert!(script.lines().any(|line| line == "COPY src/pkg /workspace/pkg"));
    }

    #[test]
    fn test_runtime_install_before_selection() {
        let pipeline = Pipeline::new("broken").then(Step::runtime_install("numpy", ["numpy"]));
        assert!(render_dockerfile(&pipeline, "ubuntu:22.04").is_err());
    }
}
