//! Linux process operations implementation
//!
//! Runs installers through `tokio::process` and reports every spawned command
//! as a step event.

use async_trait::async_trait;
use envbake_errors::{PackageResolutionError, ProvisioningError as Error};
use envbake_events::{EventEmitter, StepEvent};
use std::time::Instant;
use tokio::process::Command;

use crate::core::PlatformContext;
use crate::process::{CommandOutput, PlatformCommand, ProcessOperations};

/// Linux implementation of process operations
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxProcessOperations;

impl LinuxProcessOperations {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessOperations for LinuxProcessOperations {
    async fn execute_command(
        &self,
        ctx: &PlatformContext,
        cmd: PlatformCommand,
    ) -> Result<CommandOutput, Error> {
        let start = Instant::now();

        ctx.emit_step(StepEvent::CommandSpawned {
            name: ctx.step().to_string(),
            program: cmd.program().to_string(),
            args: cmd.get_args().to_vec(),
        });

        let mut command = Command::new(cmd.program());
        // A cancelled build must not leave installers running
        command.args(cmd.get_args()).kill_on_drop(true);

        if let Some(dir) = cmd.get_current_dir() {
            command.current_dir(dir);
        }

        for (key, value) in cmd.get_env_vars() {
            command.env(key, value);
        }

        let output = command
            .output()
            .await
            .map_err(|e| PackageResolutionError::InstallerFailed {
                step: ctx.step().to_string(),
                command: cmd.to_string(),
                status: None,
                message: e.to_string(),
            })?;

        tracing::debug!(
            step = ctx.step(),
            command = %cmd,
            status = ?output.status.code(),
            elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "command finished"
        );

        Ok(CommandOutput {
            status: output.status,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
