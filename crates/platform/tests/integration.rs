//! Integration tests for the platform crate

use envbake_errors::{PackageResolutionError, ProvisioningError};
use envbake_events::{channel, AppEvent, StepEvent};
use envbake_platform::{
    LinuxProcessOperations, PlatformCommand, PlatformContext, ProcessOperations,
    ProvisionBackend, SimulatedBackend,
};
use envbake_types::{EnvironmentState, InterpreterVersion, Step};
use tempfile::TempDir;

#[tokio::test]
async fn test_spawned_commands_are_reported() {
    let (tx, mut rx) = channel();
    let ctx = PlatformContext::for_step(Some(tx), "echo");
    let mut cmd = PlatformCommand::new("sh");
    cmd.args(["-c", "printf hello; exit 3"]);

    let output = LinuxProcessOperations::new()
        .execute_command(&ctx, cmd)
        .await
        .unwrap();
    assert!(!output.success());
    assert_eq!(output.status.code(), Some(3));
    assert_eq!(output.stdout_lossy(), "hello");

    let message = rx.recv().await.unwrap();
    assert_eq!(message.meta.labels.get("step").map(String::as_str), Some("echo"));
    assert!(matches!(
        message.event,
        AppEvent::Step(StepEvent::CommandSpawned { ref program, .. }) if program == "sh"
    ));
}

/// Whether `pid` is alive and not merely awaiting reaping
fn is_running(pid: &str) -> bool {
    std::fs::read_to_string(format!("/proc/{pid}/stat"))
        .is_ok_and(|stat| stat.rsplit_once(") ").is_some_and(|(_, rest)| !rest.starts_with('Z')))
}

#[tokio::test]
async fn test_dropped_command_is_killed() {
    let dir = TempDir::new().unwrap();
    let pid_file = dir.path().join("pid");
    let ctx = PlatformContext::for_step(None, "long-install");
    let mut cmd = PlatformCommand::new("sh");
    cmd.args([
        "-c".to_string(),
        format!("echo $$ > {}; exec sleep 30", pid_file.display()),
    ]);

    let ops = LinuxProcessOperations::new();
    let run = ops.execute_command(&ctx, cmd);
    let timed_out = tokio::time::timeout(std::time::Duration::from_secs(2), run).await;
    assert!(timed_out.is_err());

    let pid = std::fs::read_to_string(&pid_file).unwrap();
    let pid = pid.trim();
    let mut alive = true;
    for _ in 0..50 {
        alive = is_running(pid);
        if !alive {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    assert!(!alive, "installer {pid} outlived its cancelled build");
}

#[tokio::test]
async fn test_missing_program_is_installer_failure() {
    let ctx = PlatformContext::for_step(None, "echo");
    let err = LinuxProcessOperations::new()
        .execute_command(&ctx, PlatformCommand::new("envbake-definitely-missing"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProvisioningError::PackageResolution(PackageResolutionError::InstallerFailed {
            status: None,
            ..
        })
    ));
    assert_eq!(err.exit_code(), 1);
}

#[tokio::test]
async fn test_simulated_interpreter_chain() {
    let context = TempDir::new().unwrap();
    let backend = SimulatedBackend::ubuntu(context.path());
    let ctx = PlatformContext::new(None);
    let mut state = EnvironmentState::with_base_packages(
        backend.base_packages(&ctx, "ubuntu:22.04").await.unwrap(),
    );

    let steps = [
        Step::system_install("tooling", ["software-properties-common"]),
        Step::register_repository("repo", "ppa:deadsnakes/ppa"),
        Step::system_install("interp", ["python3.10", "python3.10-dev"])
            .in_repository("ppa:deadsnakes/ppa"),
        Step::select_interpreter("select", InterpreterVersion::new(3, 10)),
        Step::runtime_install("numpy", ["numpy>=1.24,<1.26"]),
    ];
    for step in &steps {
        let effects = backend.apply(&ctx, step, &state).await.unwrap();
        state.apply(effects);
    }

    assert_eq!(state.active_interpreter, Some(InterpreterVersion::new(3, 10)));
    let numpy = state.runtime_package("numpy").unwrap();
    assert_eq!(numpy.version.as_ref().map(ToString::to_string).as_deref(), Some("1.24.4"));
    assert!(!state.package_cache.is_empty());
}
