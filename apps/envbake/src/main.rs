//! envbake - Deterministic environment provisioning for research images
//!
//! This is the CLI application. It loads configuration, resolves a catalog
//! and drives the executor, rendering its events as they arrive.

mod cli;
mod display;
mod error;
mod events;
mod logging;

use crate::cli::{Cli, Commands, ExportFormat};
use crate::display::{CommandOutcome, OutputRenderer};
use crate::error::CliError;
use crate::events::EventHandler;
use clap::Parser;
use envbake_config::{constants, Config};
use envbake_errors::ProvisioningError;
use envbake_events::{
    AppEvent, EventEmitter, EventMessage, EventReceiver, EventSender, GeneralEvent,
    PipelineEvent, StateEvent,
};
use envbake_executor::{validate_all, Executor};
use envbake_platform::{ProvisionBackend, SimulatedBackend, SystemBackend, SystemLayout};
use envbake_types::{BackendKind, ColorChoice, OutputFormat, Pipeline};
use std::path::Path;
use std::process;
use tokio::select;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Parse command line arguments first to check for JSON mode
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    init_tracing(json_mode, cli.global.debug);

    if let Err(e) = run(cli).await {
        error!("Application error: {}", e);
        if !json_mode {
            eprintln!("Error: {e}");
        }
        process::exit(e.exit_code());
    }
}

/// Main application logic
async fn run(cli: Cli) -> Result<(), CliError> {
    info!("Starting envbake v{}", env!("CARGO_PKG_VERSION"));

    // Precedence: file config (or defaults), then environment, then flags
    let mut config = Config::load_or_default(cli.global.config.as_deref()).await?;
    let overrides = config.merge_env()?;
    apply_cli_config(&mut config, &cli.global, &cli.command);

    let (event_sender, event_receiver) = envbake_events::channel();
    event_sender.emit(AppEvent::General(GeneralEvent::ConfigurationLoaded {
        source: cli.global.config.as_ref().map_or_else(
            || "defaults".to_string(),
            |path| path.display().to_string(),
        ),
        overrides: overrides.iter().map(ToString::to_string).collect(),
    }));

    // `--json` wins over the configured default output format
    let output = if cli.global.json {
        OutputFormat::Json
    } else {
        config.general.default_output
    };
    let json_output = output == OutputFormat::Json;
    let color = cli.global.color.unwrap_or(match output {
        OutputFormat::Plain => ColorChoice::Never,
        OutputFormat::Tty | OutputFormat::Json => config.general.color,
    });
    let renderer = OutputRenderer::new(json_output, color);
    let colors_enabled = match color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => console::Term::stderr().features().colors_supported(),
    };
    let mut event_handler = EventHandler::new(colors_enabled, cli.global.debug, json_output);

    let outcome = execute_command_with_events(
        cli.command,
        config,
        event_sender,
        event_receiver,
        &mut event_handler,
    )
    .await?;

    renderer.render_result(&outcome)?;

    // Validation reports every violation before failing the process
    if let CommandOutcome::Validated { violations, .. } = &outcome {
        if let Some(first) = violations.first() {
            return Err(first.clone().into());
        }
    }

    info!("Command completed successfully");
    Ok(())
}

/// Execute command with concurrent event handling
///
/// Ctrl-C drops the running command. Its partial state is never frozen, so
/// an interrupted build leaves no manifest behind.
async fn execute_command_with_events(
    command: Commands,
    config: Config,
    event_sender: EventSender,
    mut event_receiver: EventReceiver,
    event_handler: &mut EventHandler,
) -> Result<CommandOutcome, CliError> {
    let label = command
        .catalog()
        .map_or_else(|| envbake_catalog::BUILTIN_CATALOG.to_string(), |p| p.display().to_string());
    let mut command_future = Box::pin(execute_command(command, config, event_sender));
    let mut interrupt = Box::pin(tokio::signal::ctrl_c());
    let mut interrupt_armed = true;

    loop {
        select! {
            result = &mut command_future => {
                while let Ok(event) = event_receiver.try_recv() {
                    event_handler.handle_event(event);
                }
                return result;
            }

            event = event_receiver.recv() => {
                if let Some(event) = event {
                    event_handler.handle_event(event);
                }
            }

            signal = &mut interrupt, if interrupt_armed => {
                interrupt_armed = false;
                if let Err(e) = signal {
                    tracing::warn!("Failed to listen for Ctrl-C: {}", e);
                    continue;
                }
                while let Ok(event) = event_receiver.try_recv() {
                    event_handler.handle_event(event);
                }
                event_handler.handle_event(EventMessage::from_event(AppEvent::Pipeline(
                    PipelineEvent::Cancelled { pipeline: label.clone() },
                )));
                event_handler.handle_event(EventMessage::from_event(AppEvent::State(
                    StateEvent::Discarded {
                        reason: "interrupted".to_string(),
                    },
                )));
                return Err(ProvisioningError::Cancelled.into());
            }
        }
    }
}

/// Execute the specified command
async fn execute_command(
    command: Commands,
    config: Config,
    tx: EventSender,
) -> Result<CommandOutcome, CliError> {
    match command {
        Commands::Build { output, .. } => {
            let pipeline = load_pipeline(&config).await?;
            let executor = Executor::new(select_backend(&config), &config.build.base_image)
                .with_event_sender(tx);

            let manifest = executor.build_image(&pipeline).await?;
            let path = output.unwrap_or_else(|| config.manifest_path());
            executor.write_manifest(&manifest, &path).await?;

            Ok(CommandOutcome::Built {
                manifest: Box::new(manifest),
                path,
            })
        }

        Commands::Validate { .. } => {
            let pipeline = load_pipeline(&config).await?;
            let violations = validate_all(&pipeline);
            Ok(CommandOutcome::Validated {
                pipeline: pipeline.name,
                steps: pipeline.steps.len(),
                violations,
            })
        }

        Commands::Plan { .. } => {
            let pipeline = load_pipeline(&config).await?;
            let fingerprint = envbake_catalog::fingerprint(&pipeline)?;
            Ok(CommandOutcome::Plan {
                pipeline,
                fingerprint,
            })
        }

        Commands::Diff { old, new } => {
            let before = envbake_catalog::resolve(Some(&old)).await?;
            let after = envbake_catalog::resolve(Some(&new)).await?;
            Ok(CommandOutcome::Diff {
                old: old.display().to_string(),
                new: new.display().to_string(),
                diff: envbake_catalog::diff(&before, &after),
            })
        }

        Commands::Export { format, output, .. } => {
            let pipeline = load_pipeline(&config).await?;
            let content = match format {
                ExportFormat::Dockerfile => {
                    envbake_catalog::render_dockerfile(&pipeline, &config.build.base_image)?
                }
                ExportFormat::Toml => envbake_catalog::to_toml(&pipeline)?,
            };
            if let Some(path) = &output {
                write_export(path, &content).await?;
            }
            Ok(CommandOutcome::Exported {
                content,
                path: output,
            })
        }
    }
}

async fn load_pipeline(config: &Config) -> Result<Pipeline, ProvisioningError> {
    envbake_catalog::resolve(config.build.catalog.as_deref()).await
}

fn select_backend(config: &Config) -> Box<dyn ProvisionBackend> {
    match config.build.backend {
        BackendKind::System => Box::new(SystemBackend::new(SystemLayout {
            context_dir: config.context_dir(),
            image_root: config.image_root(),
            package_cache: config.package_cache(),
        })),
        BackendKind::Simulated => Box::new(SimulatedBackend::ubuntu(config.context_dir())),
    }
}

async fn write_export(path: &Path, content: &str) -> Result<(), ProvisioningError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ProvisioningError::io_with_path(&e, parent))?;
    }
    tokio::fs::write(path, content)
        .await
        .map_err(|e| ProvisioningError::io_with_path(&e, path))
}

/// Initialize tracing/logging
fn init_tracing(json_mode: bool, debug_enabled_flag: bool) {
    let debug_enabled = std::env::var("RUST_LOG").is_ok() || debug_enabled_flag;

    if json_mode {
        // JSON mode: keep stdout clean, log to file only when debugging
        if debug_enabled {
            if let Some(file) = create_log_file() {
                tracing_subscriber::fmt()
                    .json()
                    .with_writer(file.1)
                    .with_env_filter(env_filter("info,envbake=debug"))
                    .init();
                return;
            }
        }
        tracing_subscriber::fmt()
            .with_writer(std::io::sink)
            .with_env_filter("off")
            .init();
    } else if debug_enabled {
        match create_log_file() {
            Some((path, file)) => {
                tracing_subscriber::fmt()
                    .json()
                    .with_writer(file)
                    .with_env_filter(env_filter("info,envbake=debug"))
                    .init();
                eprintln!("Debug logging enabled: {}", path.display());
            }
            None => {
                tracing_subscriber::fmt()
                    .with_writer(std::io::stderr)
                    .with_env_filter(env_filter("info"))
                    .init();
            }
        }
    } else {
        // Normal mode: the event handler already renders this binary's events
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter("warn,envbake=off"))
            .init();
    }
}

fn env_filter(default: &str) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default))
}

fn create_log_file() -> Option<(std::path::PathBuf, std::fs::File)> {
    let log_dir = Path::new(constants::LOGS_DIR);
    if let Err(e) = std::fs::create_dir_all(log_dir) {
        eprintln!("Warning: Failed to create log directory: {e}");
        return None;
    }

    let path = log_dir.join(format!(
        "envbake-{}.log",
        chrono::Utc::now().format("%Y%m%d-%H%M%S")
    ));
    match std::fs::File::create(&path) {
        Ok(file) => Some((path, file)),
        Err(e) => {
            eprintln!("Warning: Failed to create log file: {e}");
            None
        }
    }
}

/// Apply CLI configuration overrides (highest precedence)
fn apply_cli_config(config: &mut Config, global: &cli::GlobalArgs, command: &Commands) {
    if let Some(color) = global.color {
        config.general.color = color;
    }

    if let Some(catalog) = command.catalog() {
        config.build.catalog = Some(catalog.clone());
    }

    match command {
        Commands::Build {
            base_image,
            context,
            backend,
            ..
        } => {
            if let Some(image) = base_image {
                config.build.base_image.clone_from(image);
            }
            if let Some(context) = context {
                config.build.context_dir = Some(context.clone());
            }
            if let Some(backend) = backend {
                config.build.backend = *backend;
            }
        }
        Commands::Export {
            base_image: Some(image),
            ..
        } => {
            config.build.base_image.clone_from(image);
        }
        _ => {}
    }
}
