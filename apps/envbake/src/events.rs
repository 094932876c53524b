//! Event handling and progress display

use crate::logging::log_event_with_tracing;
use console::Style;
use envbake_events::{
    AppEvent, EventMessage, FailureContext, GeneralEvent, PipelineEvent, StateEvent, StepEvent,
};

/// Event handler for step progress and user feedback
///
/// Every event is logged through tracing. Human-readable progress goes to
/// stderr so stdout stays free for command results.
pub struct EventHandler {
    colors_enabled: bool,
    debug_enabled: bool,
    /// Suppress terminal progress entirely (JSON output)
    quiet: bool,
    /// Step count of the running pipeline, for `[i/n]` prefixes
    total_steps: usize,
}

impl EventHandler {
    pub fn new(colors_enabled: bool, debug_enabled: bool, quiet: bool) -> Self {
        Self {
            colors_enabled,
            debug_enabled,
            quiet,
            total_steps: 0,
        }
    }

    /// Handle incoming event
    pub fn handle_event(&mut self, message: EventMessage) {
        log_event_with_tracing(&message);
        if self.quiet {
            return;
        }

        match message.event {
            AppEvent::General(event) => self.handle_general(event),
            AppEvent::Pipeline(event) => self.handle_pipeline(event),
            AppEvent::Step(event) => self.handle_step(event),
            AppEvent::State(event) => self.handle_state(event),
        }
    }

    fn handle_general(&self, event: GeneralEvent) {
        match event {
            GeneralEvent::Warning { message, context } => {
                self.show_warning(&message);
                if let Some(context) = context {
                    self.show_detail(&context);
                }
            }
            GeneralEvent::Error { message, details } => {
                self.show_error(&message);
                if let Some(details) = details {
                    self.show_detail(&details);
                }
            }
            GeneralEvent::DebugLog { message, .. } => {
                if self.debug_enabled {
                    self.show_detail(&message);
                }
            }
            GeneralEvent::ConfigurationLoaded { .. } => {}
        }
    }

    fn handle_pipeline(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::ValidationFailed {
                pipeline,
                violations,
                failure,
            } => {
                self.show_error(&format!(
                    "{pipeline}: {violations} ordering violation(s), nothing was run"
                ));
                self.show_failure(&failure);
            }
            PipelineEvent::Started {
                pipeline,
                steps,
                base_image,
            } => {
                self.total_steps = steps;
                let on = base_image.map(|image| format!(" on {image}")).unwrap_or_default();
                self.show_status(&format!("Provisioning {pipeline}{on} ({steps} steps)"));
            }
            PipelineEvent::Completed {
                steps_run,
                duration_ms,
                ..
            } => {
                let style = self.style(Style::new().green().bold());
                eprintln!(
                    "{} {steps_run} steps in {}",
                    style.apply_to("Done:"),
                    format_duration(duration_ms)
                );
            }
            PipelineEvent::Failed {
                step,
                index,
                failure,
                ..
            } => {
                self.show_error(&format!("build halted at step {} ({step})", index + 1));
                self.show_failure(&failure);
            }
            PipelineEvent::Cancelled { pipeline } => {
                self.show_warning(&format!("{pipeline}: build cancelled"));
            }
            PipelineEvent::ValidationStarted { .. } | PipelineEvent::ValidationCompleted { .. } => {}
        }
    }

    fn handle_step(&self, event: StepEvent) {
        match event {
            StepEvent::Started { index, name, kind } => {
                let dim = self.style(Style::new().dim());
                eprintln!("{} {name} {}", self.progress(index), dim.apply_to(kind));
            }
            StepEvent::CommandSpawned { program, args, .. } => {
                if self.debug_enabled {
                    self.show_detail(&format!("$ {program} {}", args.join(" ")));
                }
            }
            StepEvent::Succeeded {
                name,
                duration_ms,
                unchanged,
                ..
            } => {
                let style = self.style(Style::new().green());
                let note = if unchanged { ", unchanged" } else { "" };
                eprintln!(
                    "      {} {name} ({}{note})",
                    style.apply_to("ok"),
                    format_duration(duration_ms)
                );
            }
            StepEvent::Failed { name, .. } => {
                let style = self.style(Style::new().red().bold());
                eprintln!("      {} {name}", style.apply_to("FAILED"));
            }
            StepEvent::NotRun { index, name } => {
                let dim = self.style(Style::new().dim());
                eprintln!(
                    "{} {}",
                    self.progress(index),
                    dim.apply_to(format!("{name} (not run)"))
                );
            }
        }
    }

    fn handle_state(&self, event: StateEvent) {
        match event {
            StateEvent::Frozen {
                os_packages,
                runtime_packages,
                files,
                ..
            } => {
                self.show_status(&format!(
                    "Froze environment: {os_packages} OS packages, {runtime_packages} runtime packages, {files} project files"
                ));
            }
            StateEvent::ManifestWritten { path, .. } => {
                self.show_status(&format!("Manifest written to {}", path.display()));
            }
            StateEvent::Discarded { reason } => {
                self.show_warning(&format!("No image produced: {reason}"));
            }
        }
    }

    fn progress(&self, index: usize) -> String {
        let style = self.style(Style::new().cyan());
        let width = self.total_steps.to_string().len();
        style
            .apply_to(format!("[{:>width$}/{}]", index + 1, self.total_steps))
            .to_string()
    }

    fn show_failure(&self, failure: &FailureContext) {
        self.show_detail(&failure.message);
        if let Some(hint) = &failure.hint {
            self.show_detail(&format!("hint: {hint}"));
        }
    }

    fn show_status(&self, message: &str) {
        let style = self.style(Style::new().bold());
        eprintln!("{}", style.apply_to(message));
    }

    fn show_warning(&self, message: &str) {
        let style = self.style(Style::new().yellow());
        eprintln!("{} {message}", style.apply_to("warning:"));
    }

    fn show_error(&self, message: &str) {
        let style = self.style(Style::new().red().bold());
        eprintln!("{} {message}", style.apply_to("error:"));
    }

    fn show_detail(&self, message: &str) {
        let style = self.style(Style::new().dim());
        eprintln!("       {}", style.apply_to(message));
    }

    fn style(&self, style: Style) -> Style {
        if self.colors_enabled {
            style.force_styling(true)
        } else {
            Style::new()
        }
    }
}

fn format_duration(ms: u64) -> String {
    if ms < 1_000 {
        format!("{ms}ms")
    } else if ms < 60_000 {
        #[allow(clippy::cast_precision_loss)]
        let secs = ms as f64 / 1_000.0;
        format!("{secs:.1}s")
    } else {
        format!("{}m{:02}s", ms / 60_000, (ms % 60_000) / 1_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(250), "250ms");
        assert_eq!(format_duration(1_500), "1.5s");
        assert_eq!(format_duration(125_000), "2m05s");
    }

    #[test]
    fn test_progress_prefix_pads_to_total() {
        let mut handler = EventHandler::new(false, false, false);
        handler.total_steps = 10;
        assert_eq!(handler.progress(0), "[ 1/10]");
        assert_eq!(handler.progress(9), "[10/10]");
    }
}
