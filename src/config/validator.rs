//! Configuration validation for application specs.
//!
//! Every check runs before the engine talks to the control plane, so a
//! malformed size or constraint never surfaces halfway through a plan.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

use crate::controlplane::{Base, Constraints, parse_size};
use crate::error::{ConfigError, ConvergeError, Result};

use super::spec::{ApplicationSpec, ControllerConfig, ConvergeConfig};

/// OCI image reference accepted as a resource value (`name:tag`).
static OCI_IMAGE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9]):[\w][\w.-]{0,127}").ok()
});

/// Validator for engine configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates an engine configuration.
    ///
    /// # Errors
    ///
    /// Returns the first error found. Duplicate application names are
    /// reported as [`ConfigError::DuplicateName`].
    pub fn validate(&self, config: &ConvergeConfig) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_controller(&config.controller, &mut result);

        if config.applications.is_empty() {
            result
                .warnings
                .push(String::from("No applications defined in configuration"));
        }

        let mut seen_names = HashSet::new();
        for (i, app) in config.applications.iter().enumerate() {
            if !seen_names.insert(app.name.as_str()) {
                return Err(ConvergeError::Config(ConfigError::DuplicateName {
                    resource_type: String::from("application"),
                    name: app.name.clone(),
                }));
            }
            Self::validate_application(app, &format!("applications[{i}]"), &mut result);
        }

        if result.errors.is_empty() {
            debug!("Configuration validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(ConvergeError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }))
        }
    }

    fn validate_controller(controller: &ControllerConfig, result: &mut ValidationResult) {
        if controller.url.is_empty() {
            result.push("controller.url", "Controller URL cannot be empty");
        } else if !controller.url.starts_with("http://") && !controller.url.starts_with("https://")
        {
            result.push(
                "controller.url",
                format!("Controller URL '{}' must be http or https", controller.url),
            );
        }

        if controller.model.is_empty() {
            result.push("controller.model", "Model name cannot be empty");
        }
    }

    /// Validates one application entry.
    fn validate_application(app: &ApplicationSpec, prefix: &str, result: &mut ValidationResult) {
        if !is_valid_name(&app.name) {
            result.push(
                format!("{prefix}.name"),
                format!(
                    "Application name '{}' is invalid. Must be lowercase alphanumeric with hyphens.",
                    app.name
                ),
            );
        }

        if app.charm.name.is_empty() {
            result.push(format!("{prefix}.charm.name"), "Charm name cannot be empty");
        }

        if let Some(base) = &app.charm.base {
            if Base::parse(base).is_none() {
                result.push(
                    format!("{prefix}.charm.base"),
                    format!("Base '{base}' must be written as name@channel"),
                );
            }
        }

        if app.units == 0 {
            result.warnings.push(format!(
                "{prefix}.units: zero units deploys the application without machines"
            ));
        }

        if let Some(constraints) = &app.constraints {
            if let Err(e) = Constraints::parse(constraints) {
                result.push(format!("{prefix}.constraints"), e.to_string());
            }
        }

        Self::validate_storage(app, prefix, result);
        Self::validate_resources(app, prefix, result);
    }

    fn validate_storage(app: &ApplicationSpec, prefix: &str, result: &mut ValidationResult) {
        let mut seen_labels = HashSet::new();

        for (i, storage) in app.storage.iter().enumerate() {
            let field = format!("{prefix}.storage[{i}]");

            if storage.label.is_empty() {
                result.push(format!("{field}.label"), "Storage label cannot be empty");
            } else if !seen_labels.insert(storage.label.as_str()) {
                result.push(
                    format!("{field}.label"),
                    format!("Duplicate storage label: {}", storage.label),
                );
            }

            if let Err(e) = parse_size(&storage.size) {
                result.push(
                    format!("{field}.size"),
                    format!("Invalid size '{}': {e}", storage.size),
                );
            }

            if storage.count == 0 {
                result.push(format!("{field}.count"), "Storage count must be at least 1");
            }
        }
    }

    fn validate_resources(app: &ApplicationSpec, prefix: &str, result: &mut ValidationResult) {
        for (name, value) in &app.resources {
            if !is_valid_resource_value(value) {
                result.push(
                    format!("{prefix}.resources.{name}"),
                    format!("value of '{name}' should be a valid revision number or image URL"),
                );
            }
        }
    }
}

/// Returns true if `value` is a positive revision or an OCI image reference.
fn is_valid_resource_value(value: &str) -> bool {
    match value.parse::<i64>() {
        Ok(revision) => revision > 0,
        Err(_) => OCI_IMAGE.as_ref().is_some_and(|re| re.is_match(value)),
    }
}

/// Validates that a name follows the naming convention.
/// Names must be lowercase alphanumeric with hyphens, starting with a letter.
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }

    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-') {
        return false;
    }

    !name.ends_with('-') && !name.contains("--")
}

impl ValidationResult {
    fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
