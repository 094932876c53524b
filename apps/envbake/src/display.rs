//! Output rendering and formatting

use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use console::{Style, Term};
use envbake_catalog::CatalogDiff;
use envbake_errors::{ProvisioningError, UserFacingError};
use envbake_types::{ColorChoice, ImageManifest, Pipeline, Step, StepKind};
use serde_json::json;
use std::io;
use std::path::PathBuf;

/// Final result of a command, rendered once the command has finished
#[derive(Debug)]
pub enum CommandOutcome {
    /// A finished build and where its manifest was written
    Built {
        manifest: Box<ImageManifest>,
        path: PathBuf,
    },
    /// Static validation of a catalog
    Validated {
        pipeline: String,
        steps: usize,
        violations: Vec<ProvisioningError>,
    },
    /// The steps a build would run
    Plan {
        pipeline: Pipeline,
        fingerprint: String,
    },
    Diff {
        old: String,
        new: String,
        diff: CatalogDiff,
    },
    /// Rendered catalog; `path` is `None` when it went to stdout
    Exported {
        content: String,
        path: Option<PathBuf>,
    },
}

/// Output renderer for CLI results
#[derive(Clone)]
pub struct OutputRenderer {
    /// Use JSON output format
    json_output: bool,
    /// Color configuration
    color_choice: ColorChoice,
    /// Terminal instance
    term: Term,
}

impl OutputRenderer {
    /// Create new output renderer
    pub fn new(json_output: bool, color_choice: ColorChoice) -> Self {
        Self {
            json_output,
            color_choice,
            term: Term::stdout(),
        }
    }

    /// Render command outcome
    pub fn render_result(&self, outcome: &CommandOutcome) -> io::Result<()> {
        if self.json_output {
            self.render_json(outcome)
        } else {
            self.render_human(outcome)
        }
    }

    fn render_json(&self, outcome: &CommandOutcome) -> io::Result<()> {
        let value = match outcome {
            CommandOutcome::Built { manifest, path } => json!({
                "manifest": manifest,
                "path": path,
            }),
            CommandOutcome::Validated {
                pipeline,
                steps,
                violations,
            } => json!({
                "pipeline": pipeline,
                "steps": steps,
                "valid": violations.is_empty(),
                "violations": violations
                    .iter()
                    .map(|v| json!({
                        "code": v.user_code(),
                        "message": v.user_message(),
                        "hint": v.user_hint(),
                    }))
                    .collect::<Vec<_>>(),
            }),
            CommandOutcome::Plan {
                pipeline,
                fingerprint,
            } => json!({
                "pipeline": pipeline,
                "fingerprint": fingerprint,
            }),
            CommandOutcome::Diff { old, new, diff } => json!({
                "old": old,
                "new": new,
                "identical": diff.is_empty(),
                "diff": diff,
            }),
            CommandOutcome::Exported { content, path } => json!({
                "path": path,
                "content": content,
            }),
        };
        let rendered = serde_json::to_string_pretty(&value).map_err(io::Error::other)?;
        println!("{rendered}");
        Ok(())
    }

    fn render_human(&self, outcome: &CommandOutcome) -> io::Result<()> {
        match outcome {
            CommandOutcome::Built { manifest, path } => self.render_build(manifest, path),
            CommandOutcome::Validated {
                pipeline,
                steps,
                violations,
            } => self.render_validation(pipeline, *steps, violations),
            CommandOutcome::Plan {
                pipeline,
                fingerprint,
            } => self.render_plan(pipeline, fingerprint),
            CommandOutcome::Diff { old, new, diff } => self.render_diff(old, new, diff),
            CommandOutcome::Exported { content, path } => {
                match path {
                    Some(path) => {
                        let style = self.style(Style::new().green());
                        println!("{} {}", style.apply_to("Wrote"), path.display());
                    }
                    None => print!("{content}"),
                }
                Ok(())
            }
        }
    }

    fn render_build(&self, manifest: &ImageManifest, path: &std::path::Path) -> io::Result<()> {
        let ok = self.style(Style::new().green().bold());
        println!(
            "{} {} built on {}",
            ok.apply_to("Image ready:"),
            manifest.catalog,
            manifest.base_image
        );

        let mut table = self.table();
        table.set_header(vec![
            Cell::new("Runtime package").add_attribute(Attribute::Bold),
            Cell::new("Version").add_attribute(Attribute::Bold),
            Cell::new("Variant").add_attribute(Attribute::Bold),
        ]);
        for package in manifest.state.runtime_packages.values() {
            let version = match (&package.version, &package.editable) {
                (_, Some(source)) => format!("editable ({})", source.display()),
                (Some(version), None) => version.to_string(),
                (None, None) => "-".to_string(),
            };
            table.add_row(vec![
                Cell::new(&package.name),
                Cell::new(version),
                Cell::new(package.variant.as_deref().unwrap_or("-")),
            ]);
        }
        println!("{table}");

        let interpreter = manifest
            .state
            .active_interpreter
            .map_or_else(|| "none".to_string(), |v| v.to_string());
        println!("  Build id:     {}", manifest.build_id);
        println!("  Interpreter:  {interpreter}");
        println!("  OS packages:  {}", manifest.state.os_packages.len());
        println!("  Project files: {}", manifest.state.workdir.len());
        println!("  Entrypoint:   {}", manifest.entrypoint.join(" "));
        println!("  Manifest:     {}", path.display());
        Ok(())
    }

    fn render_validation(
        &self,
        pipeline: &str,
        steps: usize,
        violations: &[ProvisioningError],
    ) -> io::Result<()> {
        if violations.is_empty() {
            let ok = self.style(Style::new().green());
            println!(
                "{} {pipeline}: {steps} steps, ordering is consistent",
                ok.apply_to("[OK]")
            );
            return Ok(());
        }

        let bad = self.style(Style::new().red().bold());
        println!(
            "{} {pipeline}: {} ordering violation(s)",
            bad.apply_to("[ERROR]"),
            violations.len()
        );
        let dim = self.style(Style::new().dim());
        for violation in violations {
            println!("  - {}", violation.user_message());
            if let Some(hint) = violation.user_hint() {
                println!("    {}", dim.apply_to(hint));
            }
        }
        Ok(())
    }

    fn render_plan(&self, pipeline: &Pipeline, fingerprint: &str) -> io::Result<()> {
        let title = self.style(Style::new().bold());
        println!("{}", title.apply_to(&pipeline.name));
        if let Some(description) = &pipeline.description {
            println!("{description}");
        }

        let mut table = self.table();
        table.set_header(vec![
            Cell::new("#").add_attribute(Attribute::Bold),
            Cell::new("Step").add_attribute(Attribute::Bold),
            Cell::new("Kind").add_attribute(Attribute::Bold),
            Cell::new("Inputs").add_attribute(Attribute::Bold),
            Cell::new("Idempotent").add_attribute(Attribute::Bold),
        ]);
        for (index, step) in pipeline.iter().enumerate() {
            table.add_row(vec![
                Cell::new(index + 1),
                Cell::new(&step.name),
                self.kind_cell(step.kind),
                Cell::new(describe_inputs(step)),
                if step.idempotent {
                    Cell::new("yes")
                } else {
                    self.colored(Cell::new("no"), Color::Yellow)
                },
            ]);
        }
        println!("{table}");
        println!("Fingerprint: {fingerprint}");
        Ok(())
    }

    fn render_diff(&self, old: &str, new: &str, diff: &CatalogDiff) -> io::Result<()> {
        if diff.is_empty() {
            println!("{old} and {new} declare the same steps");
            return Ok(());
        }

        let removed = self.style(Style::new().red());
        let added = self.style(Style::new().green());
        let changed = self.style(Style::new().yellow());
        let moved = self.style(Style::new().cyan());
        println!("--- {old}");
        println!("+++ {new}");
        for line in diff.to_string().lines() {
            let styled = match line.chars().next() {
                Some('-') => removed.apply_to(line),
                Some('+') => added.apply_to(line),
                Some('~') => changed.apply_to(line),
                _ => moved.apply_to(line),
            };
            println!("{styled}");
        }
        Ok(())
    }

    fn table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        if !self.colors_enabled() {
            table.force_no_tty();
        }
        table
    }

    fn kind_cell(&self, kind: StepKind) -> Cell {
        let color = match kind {
            StepKind::SystemPackageInstall | StepKind::RepositoryRegistration => Color::Blue,
            StepKind::InterpreterSelection => Color::Magenta,
            StepKind::RuntimePackageInstall => Color::Green,
            StepKind::FilesystemCopy => Color::Cyan,
            StepKind::CacheClear => Color::DarkGrey,
        };
        self.colored(Cell::new(kind), color)
    }

    fn colored(&self, cell: Cell, color: Color) -> Cell {
        if self.colors_enabled() {
            cell.fg(color)
        } else {
            cell
        }
    }

    fn style(&self, style: Style) -> Style {
        if self.colors_enabled() {
            style.force_styling(true)
        } else {
            Style::new()
        }
    }

    /// Check if colors should be used
    fn colors_enabled(&self) -> bool {
        match self.color_choice {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => self.term.features().colors_supported(),
        }
    }
}

/// Compact summary of what a step acts on
fn describe_inputs(step: &Step) -> String {
    let mut summary = match (&step.editable, &step.destination) {
        (Some(source), _) => format!("-e {}", source.display()),
        (None, Some(destination)) => {
            format!("{} -> {}", step.inputs.join(", "), destination.display())
        }
        (None, None) if step.inputs.len() > 4 => format!(
            "{} (+{} more)",
            step.inputs[..3].join(", "),
            step.inputs.len() - 3
        ),
        (None, None) => step.inputs.join(", "),
    };
    if let Some(repository) = &step.repository {
        summary.push_str(&format!(" [from {repository}]"));
    }
    if let Some(index_url) = &step.index_url {
        summary.push_str(&format!(" [index {index_url}]"));
    }
    if step.upgrade {
        summary.push_str(" [upgrade]");
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_inputs_truncates_long_lists() {
        let step = Step::system_install("libs", ["a", "b", "c", "d", "e", "f"]);
        assert_eq!(describe_inputs(&step), "a, b, c (+3 more)");
    }

    #[test]
    fn test_describe_inputs_annotations() {
        let step = Step::runtime_install("framework", ["torch==2.1.0"])
            .with_index("https://download.pytorch.org/whl/cpu");
        assert_eq!(
            describe_inputs(&step),
            "torch==2.1.0 [index https://download.pytorch.org/whl/cpu]"
        );

        let copy = Step::copy("source", ["setup.py", "safepo"], "/workspace");
        assert_eq!(describe_inputs(&copy), "setup.py, safepo -> /workspace");
    }
}
