//! Backend that provisions the machine it runs on
//!
//! Intended to run inside the image being built (as the build tool's `RUN`
//! target). Installers are invoked through [`ProcessOperations`]; copies and
//! cache clears are done directly on the filesystem under `image_root`.

use async_trait::async_trait;
use envbake_errors::{FilesystemError, PackageResolutionError, ProvisioningError as Error};
use envbake_types::{
    normalize_name, parse_version, EnvironmentState, InterpreterVersion, RuntimePackage, Step,
    StepEffects, StepKind, VersionSpec,
};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use super::simulated::active_interpreter;
use super::ProvisionBackend;
use crate::commands::{installer_commands, pip_list};
use crate::core::PlatformContext;
use crate::fs::{self as image_fs, PACKAGING_MANIFESTS};
use crate::implementations::linux::LinuxProcessOperations;
use crate::process::{CommandOutput, PlatformCommand, ProcessOperations};

/// Where the system backend reads and writes
#[derive(Debug, Clone)]
pub struct SystemLayout {
    /// Build context copies are read from
    pub context_dir: PathBuf,
    /// Host directory that image paths are resolved under (`/` in-image)
    pub image_root: PathBuf,
    /// OS package manager cache, as an image path
    pub package_cache: PathBuf,
}

/// Backend running real installers
pub struct SystemBackend<P: ProcessOperations = LinuxProcessOperations> {
    process: P,
    layout: SystemLayout,
}

impl SystemBackend<LinuxProcessOperations> {
    #[must_use]
    pub fn new(layout: SystemLayout) -> Self {
        Self::with_process(LinuxProcessOperations::new(), layout)
    }
}

impl<P: ProcessOperations> SystemBackend<P> {
    /// Backend using a custom process implementation
    pub fn with_process(process: P, layout: SystemLayout) -> Self {
        Self { process, layout }
    }

    #[must_use]
    pub fn layout(&self) -> &SystemLayout {
        &self.layout
    }

    async fn run(&self, ctx: &PlatformContext, cmd: PlatformCommand) -> Result<CommandOutput, Error> {
        let rendered = cmd.to_string();
        let output = self.process.execute_command(ctx, cmd).await?;
        if output.success() {
            return Ok(output);
        }

        let stderr = output.stderr_lossy();
        if let Some(package) = unlocatable_package(&stderr) {
            return Err(PackageResolutionError::PackageNotFound {
                step: ctx.step().to_string(),
                package,
            }
            .into());
        }

        Err(PackageResolutionError::InstallerFailed {
            step: ctx.step().to_string(),
            command: rendered,
            status: output.status.code(),
            message: last_line(&stderr),
        }
        .into())
    }

    async fn run_installers(
        &self,
        ctx: &PlatformContext,
        step: &Step,
        interpreter: Option<InterpreterVersion>,
    ) -> Result<(), Error> {
        for cmd in installer_commands(step, interpreter)? {
            self.run(ctx, cmd).await?;
        }
        Ok(())
    }

    async fn cache_entries(&self) -> Vec<String> {
        let dir = image_fs::under_root(&self.layout.image_root, &self.layout.package_cache);
        let mut names = Vec::new();
        if let Ok(mut entries) = tokio::fs::read_dir(&dir).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        names
    }

    async fn installed_runtime_versions(
        &self,
        ctx: &PlatformContext,
        interpreter: InterpreterVersion,
    ) -> Result<BTreeMap<String, String>, Error> {
        let output = self.run(ctx, pip_list(interpreter)).await?;
        let listed: Vec<PipListEntry> = serde_json::from_slice(&output.stdout)?;
        Ok(listed
            .into_iter()
            .map(|entry| (normalize_name(&entry.name), entry.version))
            .collect())
    }

    async fn install_runtime(
        &self,
        ctx: &PlatformContext,
        step: &Step,
        state: &EnvironmentState,
    ) -> Result<StepEffects, Error> {
        let interpreter = active_interpreter(step, state)?;

        if let Some(project_dir) = &step.editable {
            let on_disk = image_fs::under_root(&self.layout.image_root, project_dir);
            let mut has_manifest = false;
            for manifest in PACKAGING_MANIFESTS {
                if tokio::fs::try_exists(on_disk.join(manifest)).await.unwrap_or(false) {
                    has_manifest = true;
                }
            }
            if !has_manifest {
                return Err(FilesystemError::MissingWorkdirPath {
                    step: step.name.clone(),
                    path: project_dir.join(PACKAGING_MANIFESTS[0]).display().to_string(),
                }
                .into());
            }
        }

        self.run_installers(ctx, step, Some(interpreter)).await?;
        let versions = self.installed_runtime_versions(ctx, interpreter).await?;

        let runtime_packages = if let Some(project_dir) = &step.editable {
            step.inputs
                .iter()
                .map(|project| RuntimePackage {
                    name: project.clone(),
                    version: None,
                    constraint: VersionSpec::default(),
                    variant: None,
                    editable: Some(project_dir.clone()),
                    interpreter,
                })
                .collect()
        } else {
            let mut packages = Vec::new();
            for requirement in step.requirements()? {
                let version = versions
                    .get(&requirement.key())
                    .map(|v| parse_version(without_local(v)))
                    .transpose()?;
                packages.push(RuntimePackage {
                    version,
                    constraint: requirement.version_spec.clone(),
                    name: requirement.name,
                    variant: step.variant(),
                    editable: None,
                    interpreter,
                });
            }
            packages
        };

        Ok(StepEffects {
            runtime_packages,
            ..StepEffects::default()
        })
    }

    async fn copy_sources(&self, step: &Step) -> Result<StepEffects, Error> {
        let destination = step.destination.clone().unwrap_or_else(|| PathBuf::from("/"));
        let mut files = Vec::new();

        for input in &step.inputs {
            let source =
                image_fs::resolve_context_path(&step.name, &self.layout.context_dir, input).await?;
            let relative_files = image_fs::list_files(&source).await?;
            let target = image_fs::under_root(
                &self.layout.image_root,
                &image_fs::copy_target(&destination, &source),
            );

            image_fs::copy_path(&source, &target)
                .await
                .map_err(|e| FilesystemError::CopyFailed {
                    step: step.name.clone(),
                    source_path: source.display().to_string(),
                    destination: target.display().to_string(),
                    message: e.to_string(),
                })?;

            files.extend(relative_files.into_iter().map(|f| destination.join(f)));
        }

        Ok(StepEffects {
            files,
            ..StepEffects::default()
        })
    }

    async fn clear_cache(&self, step: &Step) -> Result<StepEffects, Error> {
        let dir = image_fs::under_root(&self.layout.image_root, &self.layout.package_cache);
        image_fs::clear_dir(&dir)
            .await
            .map_err(|e| FilesystemError::CacheClearFailed {
                step: step.name.clone(),
                path: dir.display().to_string(),
                message: e.to_string(),
            })?;

        Ok(StepEffects {
            cache_cleared: true,
            ..StepEffects::default()
        })
    }
}

#[async_trait]
impl<P: ProcessOperations> ProvisionBackend for SystemBackend<P> {
    fn name(&self) -> &'static str {
        "system"
    }

    async fn base_packages(
        &self,
        ctx: &PlatformContext,
        base_image: &str,
    ) -> Result<Vec<String>, Error> {
        tracing::debug!(base_image, "querying installed OS packages");
        let mut query = PlatformCommand::new("dpkg-query");
        query.args(["-W", "-f=${Package}\\n"]);
        let output = self.run(ctx, query).await?;
        Ok(output
            .stdout_lossy()
            .lines()
            .map(|line| line.split(':').next().unwrap_or(line).trim().to_string())
            .filter(|line| !line.is_empty())
            .collect())
    }

    async fn apply(
        &self,
        ctx: &PlatformContext,
        step: &Step,
        state: &EnvironmentState,
    ) -> Result<StepEffects, Error> {
        match step.kind {
            StepKind::SystemPackageInstall => {
                if let Some(repository) = &step.repository {
                    if !state.has_repository(repository) {
                        return Err(PackageResolutionError::RepositoryNotRegistered {
                            step: step.name.clone(),
                            repository: repository.clone(),
                        }
                        .into());
                    }
                }
                self.run_installers(ctx, step, state.active_interpreter).await?;
                Ok(StepEffects {
                    os_packages: step.inputs.clone(),
                    cached: self.cache_entries().await,
                    ..StepEffects::default()
                })
            }
            StepKind::RepositoryRegistration => {
                self.run_installers(ctx, step, state.active_interpreter)
                    .await
                    .map_err(|e| match e {
                        Error::PackageResolution(PackageResolutionError::InstallerFailed {
                            step: failed_step,
                            message,
                            ..
                        }) => PackageResolutionError::RepositoryUnavailable {
                            step: failed_step,
                            repository: step.inputs.join(", "),
                            message,
                        }
                        .into(),
                        other => other,
                    })?;
                Ok(StepEffects {
                    repositories: step.inputs.clone(),
                    cached: self.cache_entries().await,
                    ..StepEffects::default()
                })
            }
            StepKind::InterpreterSelection => {
                let version = step.interpreter()?;
                if !state.installed_interpreters().contains(&version) {
                    return Err(PackageResolutionError::InterpreterNotInstalled {
                        step: step.name.clone(),
                        version: version.to_string(),
                    }
                    .into());
                }
                self.run_installers(ctx, step, state.active_interpreter).await?;
                Ok(StepEffects {
                    interpreter: Some(version),
                    ..StepEffects::default()
                })
            }
            StepKind::RuntimePackageInstall => self.install_runtime(ctx, step, state).await,
            StepKind::FilesystemCopy => self.copy_sources(step).await,
            StepKind::CacheClear => self.clear_cache(step).await,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PipListEntry {
    name: String,
    version: String,
}

/// Drop `+cpu`-style local labels; the variant is tracked separately
fn without_local(version: &str) -> &str {
    version.split_once('+').map_or(version, |(public, _)| public)
}

/// Package named by apt's "Unable to locate package X"
fn unlocatable_package(stderr: &str) -> Option<String> {
    stderr.lines().find_map(|line| {
        line.split_once("Unable to locate package ")
            .map(|(_, package)| package.trim().to_string())
    })
}

fn last_line(stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("installer exited without output")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records commands and answers with canned exit statuses
    #[derive(Default)]
    struct RecordingProcess {
        commands: Mutex<Vec<String>>,
        fail_with: Option<(i32, &'static str)>,
        stdout: &'static str,
    }

    #[async_trait]
    impl ProcessOperations for RecordingProcess {
        async fn execute_command(
            &self,
            _ctx: &PlatformContext,
            cmd: PlatformCommand,
        ) -> Result<CommandOutput, Error> {
            self.commands.lock().unwrap().push(cmd.to_string());
            let (code, stderr) = self.fail_with.unwrap_or((0, ""));
            Ok(CommandOutput {
                status: ExitStatus::from_raw(code << 8),
                stdout: self.stdout.as_bytes().to_vec(),
                stderr: stderr.as_bytes().to_vec(),
            })
        }
    }

    fn layout(root: &TempDir, context: &TempDir) -> SystemLayout {
        SystemLayout {
            context_dir: context.path().to_path_buf(),
            image_root: root.path().to_path_buf(),
            package_cache: PathBuf::from("/var/lib/apt/lists"),
        }
    }

    #[tokio::test]
    async fn test_installer_status_propagates() {
        let root = TempDir::new().unwrap();
        let context = TempDir::new().unwrap();
        let process = RecordingProcess {
            fail_with: Some((100, "E: Could not get lock /var/lib/dpkg/lock-frontend")),
            ..RecordingProcess::default()
        };
        let backend = SystemBackend::with_process(process, layout(&root, &context));
        let ctx = PlatformContext::for_step(None, "libs");

        let err = backend
            .apply(&ctx, &Step::system_install("libs", ["patchelf"]), &EnvironmentState::new())
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), 100);
        assert_eq!(err.failing_step(), Some("libs"));
    }

    #[tokio::test]
    async fn test_unlocatable_package_is_not_found() {
        let root = TempDir::new().unwrap();
        let context = TempDir::new().unwrap();
        let process = RecordingProcess {
            fail_with: Some((100, "E: Unable to locate package python3.10")),
            ..RecordingProcess::default()
        };
        let backend = SystemBackend::with_process(process, layout(&root, &context));
        let ctx = PlatformContext::for_step(None, "interp");

        let err = backend
            .apply(&ctx, &Step::system_install("interp", ["python3.10"]), &EnvironmentState::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::PackageResolution(PackageResolutionError::PackageNotFound { ref package, .. })
                if package == "python3.10"
        ));
    }

    #[tokio::test]
    async fn test_runtime_versions_from_pip_list() {
        let root = TempDir::new().unwrap();
        let context = TempDir::new().unwrap();
        let process = RecordingProcess {
            stdout: r#"[{"name": "torch", "version": "2.1.0+cpu"}, {"name": "pip", "version": "23.3.1"}]"#,
            ..RecordingProcess::default()
        };
        let backend = SystemBackend::with_process(process, layout(&root, &context));
        let ctx = PlatformContext::for_step(None, "framework");
        let mut state = EnvironmentState::new();
        state.active_interpreter = Some(InterpreterVersion::new(3, 10));

        let step = Step::runtime_install("framework", ["torch==2.1.0"])
            .with_index("https://download.pytorch.org/whl/cpu");
        let effects = backend.apply(&ctx, &step, &state).await.unwrap();

        let torch = &effects.runtime_packages[0];
        assert_eq!(torch.version, Some(envbake_types::Version::new(2, 1, 0)));
        assert_eq!(torch.variant.as_deref(), Some("cpu"));

        let commands = backend.process.commands.lock().unwrap();
        assert!(commands[0].starts_with("python3.10 -m pip install"));
        assert!(commands[1].contains("pip list --format=json"));
    }

    #[tokio::test]
    async fn test_post_release_pin_holds() {
        let root = TempDir::new().unwrap();
        let context = TempDir::new().unwrap();
        let process = RecordingProcess {
            stdout: r#"[{"name": "pytz", "version": "2023.3.post1"}]"#,
            ..RecordingProcess::default()
        };
        let backend = SystemBackend::with_process(process, layout(&root, &context));
        let ctx = PlatformContext::for_step(None, "tz");
        let mut state = EnvironmentState::new();
        state.active_interpreter = Some(InterpreterVersion::new(3, 10));

        let step = Step::runtime_install("tz", ["pytz==2023.3.post1"]);
        let effects = backend.apply(&ctx, &step, &state).await.unwrap();

        let pytz = &effects.runtime_packages[0];
        let installed = pytz.version.as_ref().unwrap();
        assert!(pytz.constraint.matches(installed));
        assert_eq!(installed.build.as_str(), "post.1");
    }

    #[tokio::test]
    async fn test_copy_and_cache_clear_under_root() {
        let root = TempDir::new().unwrap();
        let context = TempDir::new().unwrap();
        tokio::fs::write(context.path().join("setup.py"), "from setuptools import setup")
            .await
            .unwrap();
        let cache = root.path().join("var/lib/apt/lists");
        tokio::fs::create_dir_all(&cache).await.unwrap();
        tokio::fs::write(cache.join("archive_InRelease"), "").await.unwrap();

        let backend =
            SystemBackend::with_process(RecordingProcess::default(), layout(&root, &context));
        let ctx = PlatformContext::for_step(None, "copy");

        let effects = backend
            .apply(&ctx, &Step::copy("copy", ["setup.py"], "/workspace"), &EnvironmentState::new())
            .await
            .unwrap();
        assert_eq!(effects.files, vec![PathBuf::from("/workspace/setup.py")]);
        assert!(root.path().join("workspace/setup.py").exists());

        tokio::fs::create_dir_all(context.path().join("src/pkg")).await.unwrap();
        tokio::fs::write(context.path().join("src/pkg/mod.py"), "").await.unwrap();
        let effects = backend
            .apply(&ctx, &Step::copy("copy", ["src/pkg"], "/workspace"), &EnvironmentState::new())
            .await
            .unwrap();
        assert_eq!(effects.files, vec![PathBuf::from("/workspace/pkg/mod.py")]);
        assert!(root.path().join("workspace/pkg/mod.py").exists());

        let effects = backend
            .apply(&ctx, &Step::clear_cache("clean"), &EnvironmentState::new())
            .await
            .unwrap();
        assert!(effects.cache_cleared);
        assert!(!cache.join("archive_InRelease").exists());
    }

    #[test]
    fn test_unlocatable_package_parsing() {
        assert_eq!(
            unlocatable_package("Reading package lists...\nE: Unable to locate package libfoo\n"),
            Some("libfoo".to_string())
        );
        assert_eq!(unlocatable_package("E: something else"), None);
    }
}
