//! Configuration types for the convergence engine.
//!
//! This module defines the structs that map to the `appconverge.yaml` file.
//! Each application entry fully describes the desired state the engine
//! compares against what the control plane reports.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::controlplane::{Base, Constraints};
use crate::error::PlanError;
use crate::planner::{StorageSpec, UnorderedStringSet};
use crate::reader::RetryBudget;

/// The root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConvergeConfig {
    /// Control plane connection.
    pub controller: ControllerConfig,
    /// Retry budget for convergent reads.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Applications to manage.
    #[serde(default)]
    pub applications: Vec<ApplicationSpec>,
}

/// Control plane connection settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Base URL of the control plane API.
    pub url: String,
    /// Model holding the applications.
    pub model: String,
    /// Per request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Retry settings for reads that race a recent write.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryConfig {
    /// Lookups before a not-found read gives up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay after the first not-found answer, in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    /// Ceiling for the backoff delay, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Overall deadline for one read, in seconds.
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

/// Desired state of one application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApplicationSpec {
    /// Application name, unique within the model.
    pub name: String,
    /// Charm to deploy.
    pub charm: CharmSpec,
    /// Number of units.
    #[serde(default = "default_units")]
    pub units: u32,
    /// Comma separated machine placement (e.g. `"0,1"`).
    #[serde(default)]
    pub placement: Option<String>,
    /// Constraints string (e.g. `"arch=amd64 mem=4G"`).
    #[serde(default)]
    pub constraints: Option<String>,
    /// Application configuration values.
    #[serde(default)]
    pub config: BTreeMap<String, Value>,
    /// Storage directives.
    #[serde(default)]
    pub storage: Vec<StorageSpec>,
    /// Resources: a revision number or an OCI image reference per name.
    #[serde(default)]
    pub resources: BTreeMap<String, String>,
}

/// Charm selection for an application.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CharmSpec {
    /// Charm name.
    pub name: String,
    /// Channel to track.
    #[serde(default = "default_channel")]
    pub channel: String,
    /// Pinned revision.
    #[serde(default)]
    pub revision: Option<u32>,
    /// Deployment base as `name@channel` (e.g. `ubuntu@22.04`).
    #[serde(default)]
    pub base: Option<String>,
}

// Default value functions

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_max_attempts() -> u32 {
    crate::reader::DEFAULT_MAX_ATTEMPTS
}

const fn default_initial_delay_ms() -> u64 {
    1_000
}

const fn default_max_delay_ms() -> u64 {
    10_000
}

const fn default_units() -> u32 {
    1
}

fn default_channel() -> String {
    String::from("stable")
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            deadline_secs: None,
        }
    }
}

impl RetryConfig {
    /// Builds the retry budget described by this section.
    #[must_use]
    pub fn budget(&self) -> RetryBudget {
        RetryBudget::new(
            self.max_attempts,
            Duration::from_millis(self.initial_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
    }

    /// Returns the per read deadline, if configured.
    #[must_use]
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

impl ConvergeConfig {
    /// Looks up an application by name.
    #[must_use]
    pub fn application(&self, name: &str) -> Option<&ApplicationSpec> {
        self.applications.iter().find(|a| a.name == name)
    }

    /// Returns application names.
    #[must_use]
    pub fn application_names(&self) -> Vec<&str> {
        self.applications.iter().map(|a| a.name.as_str()).collect()
    }
}

impl ApplicationSpec {
    /// Parses the declared constraints. Missing constraints are empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the constraints string is malformed.
    pub fn parsed_constraints(&self) -> Result<Constraints, PlanError> {
        self.constraints
            .as_deref()
            .map_or_else(|| Ok(Constraints::default()), Constraints::parse)
    }

    /// Returns the declared placement as a set of machines.
    #[must_use]
    pub fn placement_set(&self) -> UnorderedStringSet {
        self.placement
            .as_deref()
            .map(UnorderedStringSet::parse)
            .unwrap_or_default()
    }

    /// Parses the declared base, if any.
    #[must_use]
    pub fn parsed_base(&self) -> Option<Base> {
        self.charm.base.as_deref().and_then(Base::parse)
    }
}
