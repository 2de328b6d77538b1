//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::{ConvergeConfig, ValidationResult};
use crate::planner::{ApplicationDiff, ReconcileAction};
use crate::reader::ResourceView;
use crate::reconciler::ReconcilePlan;
use crate::resources::PendingResourceUpload;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Plan row for table display.
#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "Application")]
    application: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Fields")]
    fields: String,
}

/// Field change row for detailed plans.
#[derive(Tabled)]
struct DetailRow {
    #[tabled(rename = "Application")]
    application: String,
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Observed")]
    old_value: String,
    #[tabled(rename = "Desired")]
    new_value: String,
    #[tabled(rename = "Replace")]
    requires_replace: String,
}

/// Unit row for view display.
#[derive(Tabled)]
struct UnitRow {
    #[tabled(rename = "Unit")]
    unit: String,
    #[tabled(rename = "Machine")]
    machine: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats an assembled application view.
    #[must_use]
    pub fn format_view(&self, view: &ResourceView) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(view).unwrap_or_default(),
            OutputFormat::Text => Self::format_view_text(view),
        }
    }

    fn format_view_text(view: &ResourceView) -> String {
        let mut output = String::new();

        let _ = writeln!(output, "\nApplication: {}/{}\n", view.model, view.name.bold());
        let _ = writeln!(output, "   Charm: {}", view.charm);
        let _ = writeln!(output, "   Channel: {}", view.channel);
        let _ = writeln!(output, "   Base: {}", view.base);
        let _ = writeln!(output, "   Constraints: {}", view.constraints);
        let _ = writeln!(
            output,
            "   Exposed: {}",
            if view.exposed { "yes".yellow() } else { "no".normal() }
        );
        let _ = writeln!(output, "   Config keys: {}", view.config.len());

        if !view.storage.is_empty() {
            output.push_str("   Storage:\n");
            for (label, directive) in &view.storage {
                let _ = writeln!(
                    output,
                    "     {label}: {} x{} ({})",
                    directive.size, directive.count, directive.pool
                );
            }
        }

        if !view.resources.is_empty() {
            output.push_str("   Resources:\n");
            for (name, revision) in &view.resources {
                let _ = writeln!(output, "     {name}: {revision}");
            }
        }

        output.push('\n');
        if view.units.is_empty() {
            output.push_str("   No units.\n");
        } else {
            let rows: Vec<UnitRow> = view
                .units
                .iter()
                .map(|u| UnitRow {
                    unit: u.unit.clone(),
                    machine: u.machine.clone(),
                })
                .collect();
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        let _ = writeln!(
            output,
            "\nObserved at {}",
            view.observed_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        output
    }

    /// Formats a reconcile plan.
    #[must_use]
    pub fn format_plan(&self, plan: &ReconcilePlan, detailed: bool) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(plan).unwrap_or_default(),
            OutputFormat::Text => Self::format_plan_text(plan, detailed),
        }
    }

    fn format_plan_text(plan: &ReconcilePlan, detailed: bool) -> String {
        if !plan.has_changes() {
            return format!(
                "{} No changes required - model {} is converged.\n",
                "✓".green(),
                plan.model
            );
        }

        let mut output = format!("\nPlan for model {}\n\n", plan.model.bold());

        let rows: Vec<PlanRow> = plan
            .diffs
            .iter()
            .map(|d| PlanRow {
                application: d.name.clone(),
                action: Self::format_action(d.action),
                fields: Self::truncate(&Self::field_list(d), 50),
            })
            .collect();
        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        if detailed {
            let rows: Vec<DetailRow> = plan
                .diffs
                .iter()
                .flat_map(|d| {
                    d.details.iter().map(move |detail| DetailRow {
                        application: d.name.clone(),
                        field: detail.field.clone(),
                        old_value: Self::cell(detail.old_value.as_deref()),
                        new_value: Self::cell(detail.new_value.as_deref()),
                        requires_replace: if detail.requires_replace {
                            "yes".red().to_string()
                        } else {
                            String::from("no")
                        },
                    })
                })
                .collect();
            output.push('\n');
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        let _ = write!(
            output,
            "\nPlan: {} to create, {} to update, {} to replace\n",
            plan.count(ReconcileAction::Create).to_string().green(),
            plan.count(ReconcileAction::Update).to_string().yellow(),
            plan.count(ReconcileAction::Replace).to_string().red()
        );

        output
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(
        &self,
        result: &ValidationResult,
        config: &ConvergeConfig,
        show_warnings: bool,
    ) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "valid": result.is_valid(),
                    "model": config.controller.model,
                    "applications": config.application_names(),
                    "warnings": result.warnings,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = format!("{} Configuration is valid!\n", "✓".green());

                if show_warnings && !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }

                output.push_str("\nConfiguration summary:\n");
                let _ = writeln!(output, "   Controller: {}", config.controller.url);
                let _ = writeln!(output, "   Model: {}", config.controller.model);
                let _ = writeln!(output, "   Applications: {}", config.applications.len());
                output
            }
        }
    }

    /// Formats the outcome of a resource upload.
    #[must_use]
    pub fn format_upload(&self, application: &str, uploaded: &[PendingResourceUpload]) -> String {
        match self.format {
            OutputFormat::Json => {
                let names: Vec<&str> = uploaded.iter().map(|r| r.name.as_str()).collect();
                let json = serde_json::json!({
                    "status": "success",
                    "application": application,
                    "resources": names,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = format!(
                    "{} Uploaded {} resource(s) for {application}\n",
                    "✓".green(),
                    uploaded.len()
                );
                for resource in uploaded {
                    let _ = writeln!(
                        output,
                        "   - {} ({}) from {}",
                        resource.name,
                        resource.kind,
                        resource.filename.display()
                    );
                }
                output
            }
        }
    }

    /// Formats an error message.
    #[must_use]
    pub fn format_error(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": "error", "message": message });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{} {message}", "✗".red()),
        }
    }

    /// Formats an action with color.
    fn format_action(action: ReconcileAction) -> String {
        match action {
            ReconcileAction::Create => "+create".green().to_string(),
            ReconcileAction::Update => "~update".yellow().to_string(),
            ReconcileAction::Replace => "-/+replace".red().to_string(),
            ReconcileAction::NoOp => "no-op".dimmed().to_string(),
        }
    }

    fn field_list(diff: &ApplicationDiff) -> String {
        diff.details
            .iter()
            .map(|d| d.field.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn cell(value: Option<&str>) -> String {
        Self::truncate(value.unwrap_or("-"), 30)
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}
