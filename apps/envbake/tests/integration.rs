//! Integration tests for the envbake CLI

use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Run envbake isolated from the caller's config and environment
fn envbake(config_dir: &Path, args: &[&str]) -> Output {
    envbake_with_env(config_dir, args, &[])
}

/// Like [`envbake`], with explicit environment overrides
fn envbake_with_env(config_dir: &Path, args: &[&str], env: &[(&str, &str)]) -> Output {
    let config = config_dir.join("config.toml");
    if !config.exists() {
        std::fs::write(&config, "").unwrap();
    }
    Command::new(env!("CARGO_BIN_EXE_envbake"))
        .arg("--config")
        .arg(&config)
        .args(["--color", "never"])
        .args(args)
        .env_remove("ENVBAKE_OUTPUT")
        .env_remove("ENVBAKE_COLOR")
        .env_remove("ENVBAKE_BACKEND")
        .env_remove("ENVBAKE_BASE_IMAGE")
        .env_remove("ENVBAKE_CATALOG")
        .env_remove("ENVBAKE_CONTEXT")
        .env_remove("RUST_LOG")
        .envs(env.iter().copied())
        .output()
        .expect("Failed to execute envbake")
}

/// Build context holding the project the built-in catalog copies
fn project_context() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("setup.py"), "from setuptools import setup\nsetup()\n").unwrap();
    std::fs::create_dir_all(dir.path().join("safepo")).unwrap();
    std::fs::write(dir.path().join("safepo").join("__init__.py"), "").unwrap();
    dir
}

#[test]
fn test_cli_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_envbake"))
        .arg("--version")
        .output()
        .expect("Failed to execute envbake");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("envbake"));
}

#[test]
fn test_cli_help() {
    let output = Command::new(env!("CARGO_BIN_EXE_envbake"))
        .arg("--help")
        .output()
        .expect("Failed to execute envbake");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Deterministic environment provisioning"));
    assert!(stdout.contains("build"));
    assert!(stdout.contains("validate"));
    assert!(stdout.contains("export"));
}

#[test]
fn test_cli_invalid_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_envbake"))
        .arg("invalid-command")
        .output()
        .expect("Failed to execute envbake");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unrecognized subcommand"));
}

#[test]
fn test_validate_builtin_catalog() {
    let home = TempDir::new().unwrap();
    let output = envbake(home.path(), &["--json", "validate"]);

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["valid"], true);
    assert_eq!(report["steps"], 10);
}

#[test]
fn test_output_format_from_environment() {
    let home = TempDir::new().unwrap();
    let output = envbake_with_env(home.path(), &["validate"], &[("ENVBAKE_OUTPUT", "json")]);

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["valid"], true);
}

#[test]
fn test_output_format_from_config_file() {
    let home = TempDir::new().unwrap();
    std::fs::write(
        home.path().join("config.toml"),
        "[general]\ndefault_output = \"json\"\n",
    )
    .unwrap();
    let output = envbake(home.path(), &["plan"]);

    assert!(output.status.success());
    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(plan["pipeline"]["steps"].as_array().unwrap().len(), 10);
}

#[test]
fn test_plan_lists_steps_in_order() {
    let home = TempDir::new().unwrap();
    let output = envbake(home.path(), &["--json", "plan"]);

    assert!(output.status.success());
    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let steps = plan["pipeline"]["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 10);
    assert_eq!(steps[0]["name"], "install-rendering-libs");
    assert_eq!(steps[9]["kind"], "cache-clear");
    assert_eq!(plan["fingerprint"].as_str().unwrap().len(), 64);
}

#[test]
fn test_export_dockerfile() {
    let home = TempDir::new().unwrap();
    let output = envbake(home.path(), &["export", "--base-image", "ubuntu:20.04"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("FROM ubuntu:20.04"));
    assert!(stdout.contains("add-apt-repository -y ppa:deadsnakes/ppa"));
    assert!(stdout.trim_end().ends_with("CMD [\"/bin/bash\"]"));
}

#[test]
fn test_build_with_simulated_backend() {
    let home = TempDir::new().unwrap();
    let context = project_context();
    let manifest = home.path().join("out").join("manifest.json");

    let output = envbake(
        home.path(),
        &[
            "build",
            "--backend",
            "simulated",
            "--context",
            context.path().to_str().unwrap(),
            "--output",
            manifest.to_str().unwrap(),
        ],
    );

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&manifest).unwrap()).unwrap();
    assert_eq!(written["baseImage"], "ubuntu:22.04");
    assert_eq!(written["catalog"], "rl-research-cpu");
    assert_eq!(written["state"]["active_interpreter"], "3.10");
    assert_eq!(written["state"]["runtime_packages"]["torch"]["version"], "2.1.0");
    assert_eq!(written["entrypoint"][0], "/bin/bash");
}

#[test]
fn test_build_without_repository_registration_fails() {
    let home = TempDir::new().unwrap();
    let context = project_context();

    let exported = envbake(home.path(), &["export", "--format", "toml"]);
    assert!(exported.status.success());
    let full = String::from_utf8(exported.stdout).unwrap();
    let without_repo: Vec<&str> = full
        .split("[[steps]]")
        .filter(|block| !block.contains("name = \"register-interpreter-repo\""))
        .collect();
    let catalog = home.path().join("no-repo.toml");
    std::fs::write(&catalog, without_repo.join("[[steps]]")).unwrap();

    let manifest = home.path().join("manifest.json");
    let output = envbake(
        home.path(),
        &[
            "build",
            "--backend",
            "simulated",
            "--catalog",
            catalog.to_str().unwrap(),
            "--context",
            context.path().to_str().unwrap(),
            "--output",
            manifest.to_str().unwrap(),
        ],
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("install-interpreter-3.10"));
    assert!(!manifest.exists());
}
