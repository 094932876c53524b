//! Installer command lines for each step kind
//!
//! The system backend runs these; catalog export renders them as `RUN`
//! lines. Copies and cache clears are filesystem operations and have no
//! command form here.

use envbake_errors::{OrderingViolationError, StepError};
use envbake_types::{InterpreterVersion, Step, StepKind};

use crate::process::PlatformCommand;

/// Link the interpreter selection points at
pub const INTERPRETER_LINK: &str = "/usr/bin/python3";

/// Commands that perform a step, in order
///
/// Runtime package installs run through the interpreter that is active when
/// the step executes; `interpreter` must be the selection in effect.
///
/// # Errors
///
/// Returns an error if the step is malformed, or if it is a runtime install
/// and no interpreter has been selected.
pub fn installer_commands(
    step: &Step,
    interpreter: Option<InterpreterVersion>,
) -> Result<Vec<PlatformCommand>, envbake_errors::ProvisioningError> {
    step.check_shape()?;

    let commands = match step.kind {
        StepKind::SystemPackageInstall => {
            let mut install = apt_get();
            install
                .args(["install", "-y", "--no-install-recommends"])
                .args(&step.inputs);
            vec![apt_update(), install]
        }
        StepKind::RepositoryRegistration => {
            let mut add = PlatformCommand::new("add-apt-repository");
            add.arg("-y").args(&step.inputs);
            vec![add, apt_update()]
        }
        StepKind::InterpreterSelection => {
            let version = step.interpreter()?;
            let target = format!("/usr/bin/{}", version.package_name());
            let mut register = PlatformCommand::new("update-alternatives");
            register.args(["--install", INTERPRETER_LINK, "python3", &target, "1"]);
            let mut select = PlatformCommand::new("update-alternatives");
            select.args(["--set", "python3", &target]);
            vec![register, select]
        }
        StepKind::RuntimePackageInstall => {
            let interpreter = interpreter.ok_or_else(|| OrderingViolationError::PreconditionUnmet {
                step: step.name.clone(),
                requirement: "an interpreter selection".to_string(),
            })?;
            let mut commands = Vec::new();
            if step.is_package_manager_bootstrap() {
                // Distribution interpreters ship without the pip module
                commands.push(ensurepip(interpreter));
            }
            commands.push(pip_install(step, interpreter)?);
            commands
        }
        StepKind::FilesystemCopy | StepKind::CacheClear => Vec::new(),
    };

    Ok(commands)
}

/// `pip list` for the given interpreter, machine readable
#[must_use]
pub fn pip_list(interpreter: InterpreterVersion) -> PlatformCommand {
    let mut list = PlatformCommand::new(&interpreter.package_name());
    list.args(["-m", "pip", "list", "--format=json", "--disable-pip-version-check"]);
    list
}

fn ensurepip(interpreter: InterpreterVersion) -> PlatformCommand {
    let mut ensure = PlatformCommand::new(&interpreter.package_name());
    ensure.args(["-m", "ensurepip", "--upgrade"]);
    ensure
}

fn pip_install(step: &Step, interpreter: InterpreterVersion) -> Result<PlatformCommand, StepError> {
    let mut pip = PlatformCommand::new(&interpreter.package_name());
    pip.args(["-m", "pip", "install", "--no-cache-dir"]);
    if step.upgrade {
        pip.arg("--upgrade");
    }
    if let Some(index_url) = &step.index_url {
        pip.args(["--index-url", index_url]);
    }
    match &step.editable {
        Some(path) => {
            pip.arg("-e").arg(path.display().to_string());
        }
        None => {
            for requirement in step.requirements()? {
                pip.arg(requirement.to_string());
            }
        }
    }
    Ok(pip)
}

fn apt_get() -> PlatformCommand {
    let mut cmd = PlatformCommand::new("apt-get");
    cmd.env("DEBIAN_FRONTEND", "noninteractive");
    cmd
}

fn apt_update() -> PlatformCommand {
    let mut update = apt_get();
    update.arg("update");
    update
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_install_updates_first() {
        let step = Step::system_install("libs", ["libgl1-mesa-dev", "patchelf"]);
        let commands = installer_commands(&step, None).unwrap();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].get_args(), ["update"]);
        assert!(commands[1].to_string().ends_with("libgl1-mesa-dev patchelf"));
    }

    #[test]
    fn test_runtime_install_uses_active_interpreter() {
        let step = Step::runtime_install("framework", ["torch==2.1.0"])
            .with_index("https://download.pytorch.org/whl/cpu");
        let commands = installer_commands(&step, Some(InterpreterVersion::new(3, 10))).unwrap();
        assert_eq!(
            commands[0].to_string(),
            "python3.10 -m pip install --no-cache-dir --index-url https://download.pytorch.org/whl/cpu torch==2.1.0"
        );
    }

    #[test]
    fn test_bootstrap_installs_pip_before_upgrading() {
        let step = Step::runtime_install("bootstrap", ["pip", "setuptools", "wheel"]).upgrading();
        let commands = installer_commands(&step, Some(InterpreterVersion::new(3, 10))).unwrap();
        let lines: Vec<String> = commands.iter().map(ToString::to_string).collect();
        assert_eq!(
            lines,
            [
                "python3.10 -m ensurepip --upgrade",
                "python3.10 -m pip install --no-cache-dir --upgrade pip setuptools wheel",
            ]
        );

        let plain = Step::runtime_install("bindings", ["PyOpenGL==3.1.7"]);
        let commands = installer_commands(&plain, Some(InterpreterVersion::new(3, 10))).unwrap();
        assert_eq!(commands.len(), 1);
    }

    #[test]
    fn test_runtime_install_without_interpreter() {
        let step = Step::runtime_install("bindings", ["PyOpenGL==3.1.7"]);
        assert!(installer_commands(&step, None).is_err());
    }

    #[test]
    fn test_editable_install() {
        let step = Step::editable_install("project", "safepo", "/workspace");
        let commands = installer_commands(&step, Some(InterpreterVersion::new(3, 10))).unwrap();
        assert!(commands[0].to_string().ends_with("-e /workspace"));
    }

    #[test]
    fn test_fs_steps_have_no_commands() {
        let step = Step::clear_cache("clean");
        assert!(installer_commands(&step, None).unwrap().is_empty());
    }
}
