//! The built-in CPU reinforcement-learning research image

use envbake_config::constants::PROJECT_DIR;
use envbake_types::{InterpreterVersion, Pipeline, Step};

/// Name of the built-in catalog
pub const BUILTIN_CATALOG: &str = "rl-research-cpu";

/// Repository that ships the pinned interpreter
pub const INTERPRETER_REPOSITORY: &str = "ppa:deadsnakes/ppa";

/// CPU-only wheel index for the deep-learning framework
pub const FRAMEWORK_INDEX: &str = "https://download.pytorch.org/whl/cpu";

/// The default catalog
#[must_use]
pub fn builtin() -> Pipeline {
    rl_research_cpu()
}

/// CPU research stack: rendering libraries, Python 3.10, OpenGL bindings,
/// torch 2.1.0 (cpu) and the `safepo` project in editable mode
#[must_use]
pub fn rl_research_cpu() -> Pipeline {
    let interpreter = InterpreterVersion::new(3, 10);

    Pipeline::new(BUILTIN_CATALOG)
        .with_description("CPU reinforcement-learning research image")
        .then(Step::system_install(
            "install-rendering-libs",
            [
                "build-essential",
                "ca-certificates",
                "fonts-dejavu-core",
                "libegl1",
                "libgl1-mesa-dev",
                "libgl1-mesa-glx",
                "libglew-dev",
                "libglfw3",
                "libglfw3-dev",
                "libosmesa6-dev",
                "patchelf",
                "software-properties-common",
                "xvfb",
            ],
        ))
        .then(
            Step::register_repository("register-interpreter-repo", INTERPRETER_REPOSITORY)
                .requiring(["software-properties-common"]),
        )
        .then(
            Step::system_install(
                format!("install-interpreter-{interpreter}"),
                [
                    interpreter.package_name(),
                    format!("{}-dev", interpreter.package_name()),
                    format!("{}-distutils", interpreter.package_name()),
                    format!("{}-venv", interpreter.package_name()),
                ],
            )
            .in_repository(INTERPRETER_REPOSITORY),
        )
        .then(Step::select_interpreter(
            format!("select-interpreter-{interpreter}"),
            interpreter,
        ))
        .then(
            Step::runtime_install("bootstrap-package-manager", ["pip", "setuptools", "wheel"])
                .upgrading()
                .not_idempotent()
                .requiring([format!("{}-venv", interpreter.package_name())]),
        )
        .then(
            Step::runtime_install("install-opengl-bindings", ["PyOpenGL==3.1.7"])
                .requiring(["libgl1-mesa-dev"]),
        )
        .then(
            Step::runtime_install("install-framework", ["torch==2.1.0"])
                .with_index(FRAMEWORK_INDEX),
        )
        .then(Step::copy(
            "copy-project-source",
            ["setup.py", "safepo"],
            PROJECT_DIR,
        ))
        .then(Step::editable_install(
            "editable-install-project",
            "safepo",
            PROJECT_DIR,
        ))
        .then(Step::clear_cache("clear-cache"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use envbake_types::StepKind;

    #[test]
    fn test_declared_order() {
        let names: Vec<_> = builtin().iter().map(|s| s.name.clone()).collect();
        assert_eq!(
            names,
            [
                "install-rendering-libs",
                "register-interpreter-repo",
                "install-interpreter-3.10",
                "select-interpreter-3.10",
                "bootstrap-package-manager",
                "install-opengl-bindings",
                "install-framework",
                "copy-project-source",
                "editable-install-project",
                "clear-cache",
            ]
        );
    }

    #[test]
    fn test_every_step_is_well_formed() {
        for step in &builtin() {
            step.check_shape().unwrap();
        }
    }

    #[test]
    fn test_only_bootstrap_is_not_idempotent() {
        let pipeline = builtin();
        let non_idempotent: Vec<_> = pipeline.iter().filter(|s| !s.idempotent).collect();
        assert_eq!(non_idempotent.len(), 1);
        assert!(non_idempotent[0].is_package_manager_bootstrap());
    }

    #[test]
    fn test_cache_clear_is_last() {
        let pipeline = builtin();
        let (index, _) = pipeline.steps_of(StepKind::CacheClear).next().unwrap();
        assert_eq!(index, pipeline.len() - 1);
    }
}
