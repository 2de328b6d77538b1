//! Control plane API types and data structures.
//!
//! This module defines the payloads exchanged with the control plane: the
//! model status snapshot, per-application info results, and per-application
//! config results.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use super::constraints::Constraints;

/// Prefix of application tags.
pub const APPLICATION_TAG_PREFIX: &str = "application-";

/// Error code the control plane uses for missing entities.
pub const NOT_FOUND_CODE: &str = "not found";

/// Full status snapshot of a model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Model name.
    #[serde(default)]
    pub model: String,
    /// Application status keyed by application name.
    #[serde(default)]
    pub applications: BTreeMap<String, ApplicationStatus>,
}

/// Status of one application within a snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplicationStatus {
    /// Charm URL reported by status.
    #[serde(default)]
    pub charm: String,
    /// Whether the application is exposed.
    #[serde(default)]
    pub exposed: bool,
    /// Units keyed by unit name.
    #[serde(default)]
    pub units: BTreeMap<String, UnitStatus>,
}

/// Status of one unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnitStatus {
    /// Machine hosting the unit.
    #[serde(default)]
    pub machine: String,
}

/// Structured error attached to a batch result entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Human readable message.
    pub message: String,
    /// Machine readable code.
    #[serde(default)]
    pub code: String,
}

/// One entry of an application info batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfoResult {
    /// Populated record, if the lookup succeeded.
    #[serde(default)]
    pub result: Option<ApplicationResult>,
    /// Error, if the lookup failed.
    #[serde(default)]
    pub error: Option<ApiError>,
}

/// Application record returned by the info lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplicationResult {
    /// Application tag (`application-<name>`).
    pub tag: String,
    /// Charm URL.
    pub charm: String,
    /// Deployment base.
    #[serde(default)]
    pub base: Base,
    /// Charm channel.
    #[serde(default)]
    pub channel: String,
    /// Declared constraints.
    #[serde(default)]
    pub constraints: Constraints,
    /// Whether the application is principal (not subordinate).
    #[serde(default)]
    pub principal: bool,
    /// Whether the application is exposed.
    #[serde(default)]
    pub exposed: bool,
}

/// Result of the application config lookup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigResult {
    /// Application name.
    pub application: String,
    /// Charm URL.
    #[serde(default)]
    pub charm: String,
    /// Deployment base.
    #[serde(default)]
    pub base: Base,
    /// Charm channel.
    #[serde(default)]
    pub channel: String,
    /// Declared constraints.
    #[serde(default)]
    pub constraints: Constraints,
    /// Charm level configuration values.
    #[serde(default)]
    pub charm_config: BTreeMap<String, Value>,
    /// Application level configuration values.
    #[serde(default)]
    pub application_config: BTreeMap<String, Value>,
    /// Endpoint to space bindings.
    #[serde(default)]
    pub endpoint_bindings: BTreeMap<String, String>,
    /// Storage directives keyed by label.
    #[serde(default)]
    pub storage: BTreeMap<String, StorageDirective>,
    /// Current resource revisions (or OCI image references) keyed by name.
    #[serde(default)]
    pub resources: BTreeMap<String, String>,
}

/// Storage directive as reported by the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageDirective {
    /// Human size (e.g. `10G`).
    pub size: String,
    /// Storage pool.
    #[serde(default)]
    pub pool: String,
    /// Number of instances.
    #[serde(default = "default_count")]
    pub count: u64,
}

/// Deployment base (operating system and channel).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Base {
    /// Operating system name.
    #[serde(default)]
    pub name: String,
    /// Operating system channel.
    #[serde(default)]
    pub channel: String,
}

/// A pending resource upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceUpload {
    /// Application owning the resource.
    pub application: String,
    /// Resource name.
    pub resource: String,
    /// Source filename.
    pub filename: String,
    /// Revision label, empty for a fresh upload.
    pub revision: String,
    /// Resource content.
    pub content: Vec<u8>,
}

const fn default_count() -> u64 {
    1
}

impl ApiError {
    /// Returns true if this error reports a missing entity.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.code == NOT_FOUND_CODE
    }
}

impl ApplicationResult {
    /// Returns the application name encoded in the tag.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        parse_application_tag(&self.tag)
    }
}

impl StatusSnapshot {
    /// Returns the status entry for an application.
    #[must_use]
    pub fn application(&self, name: &str) -> Option<&ApplicationStatus> {
        self.applications.get(name)
    }
}

impl Base {
    /// Parses a base written as `name@channel` (e.g. `ubuntu@22.04`).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let (name, channel) = value.split_once('@')?;
        if name.is_empty() || channel.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            channel: channel.to_string(),
        })
    }

    /// Returns true if no base is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_empty() && self.channel.is_empty()
    }
}

impl fmt::Display for Base {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return Ok(());
        }
        write!(f, "{}@{}", self.name, self.channel)
    }
}

/// Builds the tag of an application.
#[must_use]
pub fn application_tag(name: &str) -> String {
    format!("{APPLICATION_TAG_PREFIX}{name}")
}

/// Extracts the application name from a tag.
#[must_use]
pub fn parse_application_tag(tag: &str) -> Option<&str> {
    tag.strip_prefix(APPLICATION_TAG_PREFIX)
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_application_tag_round_trip() {
        let tag = application_tag("testapplication");
        assert_eq!(tag, "application-testapplication");
        assert_eq!(parse_application_tag(&tag), Some("testapplication"));
        assert_eq!(parse_application_tag("unit-testapplication-0"), None);
        assert_eq!(parse_application_tag("application-"), None);
    }

    #[test]
    fn test_base_parse() {
        let base = Base::parse("ubuntu@22.04").unwrap();
        assert_eq!(base.name, "ubuntu");
        assert_eq!(base.channel, "22.04");
        assert_eq!(base.to_string(), "ubuntu@22.04");
        assert!(Base::parse("ubuntu").is_none());
        assert!(Base::parse("@22.04").is_none());
    }

    #[test]
    fn test_info_result_deserialize_not_found() {
        let json = r#"{"error": {"message": "application \"x\" not found", "code": "not found"}}"#;
        let result: InfoResult = serde_json::from_str(json).unwrap();
        assert!(result.result.is_none());
        assert!(result.error.unwrap().is_not_found());
    }

    #[test]
    fn test_config_result_storage_defaults() {
        let json = r#"{
            "application": "app",
            "storage": {"runner": {"size": "10G"}}
        }"#;
        let config: ConfigResult = serde_json::from_str(json).unwrap();
        let runner = &config.storage["runner"];
        assert_eq!(runner.count, 1);
        assert_eq!(runner.pool, "");
    }
}
