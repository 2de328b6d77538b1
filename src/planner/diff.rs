//! Diff engine for comparing desired vs observed state.
//!
//! This module computes the difference between an application spec and the
//! view read from the control plane, and classifies it as a no-op, an
//! in-place update, or a replacement.

use serde::Serialize;
use std::collections::BTreeSet;
use tracing::debug;

use crate::config::ApplicationSpec;
use crate::error::Result;
use crate::reader::ResourceView;

use super::equivalence::{equal, order_independent_requires_replace};
use super::storage::{ReplaceDecision, StorageSpec, decide};

/// Engine for computing diffs between desired and observed states.
#[derive(Debug, Default)]
pub struct DiffEngine;

/// Action needed to converge one application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcileAction {
    /// Observed state already matches.
    NoOp,
    /// The application does not exist yet.
    Create,
    /// The application can be changed in place.
    Update,
    /// The application must be destroyed and recreated.
    Replace,
}

/// Difference for a single application.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationDiff {
    /// Application name.
    pub name: String,
    /// Aggregate action.
    pub action: ReconcileAction,
    /// Details about the difference.
    pub details: Vec<DiffDetail>,
}

/// Detail about a specific difference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffDetail {
    /// Field that differs.
    pub field: String,
    /// Observed value.
    pub old_value: Option<String>,
    /// Desired value.
    pub new_value: Option<String>,
    /// Whether this difference alone forces a replacement.
    pub requires_replace: bool,
}

impl DiffDetail {
    fn update(field: impl Into<String>, old: impl ToString, new: impl ToString) -> Self {
        Self {
            field: field.into(),
            old_value: Some(old.to_string()),
            new_value: Some(new.to_string()),
            requires_replace: false,
        }
    }

    fn forcing_replace(mut self) -> Self {
        self.requires_replace = true;
        self
    }
}

impl DiffEngine {
    /// Creates a new diff engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the diff between `desired` and the observed view.
    ///
    /// # Errors
    ///
    /// Returns an error if the desired constraints or any storage size on
    /// either side does not parse.
    pub fn compute(
        &self,
        desired: &ApplicationSpec,
        observed: Option<&ResourceView>,
    ) -> Result<ApplicationDiff> {
        let Some(view) = observed else {
            debug!("Application {} needs to be created", desired.name);
            return Ok(ApplicationDiff {
                name: desired.name.clone(),
                action: ReconcileAction::Create,
                details: vec![DiffDetail {
                    field: String::from("application"),
                    old_value: None,
                    new_value: Some(desired.name.clone()),
                    requires_replace: false,
                }],
            });
        };

        let mut details = Self::compare_charm(desired, view);
        details.extend(Self::compare_scale(desired, view));
        details.extend(Self::compare_constraints(desired, view)?);
        details.extend(Self::compare_config(desired, view));
        details.extend(Self::compare_storage(desired, view)?);
        details.extend(Self::compare_resources(desired, view));

        let action = if details.iter().any(|d| d.requires_replace) {
            ReconcileAction::Replace
        } else if details.is_empty() {
            ReconcileAction::NoOp
        } else {
            ReconcileAction::Update
        };

        debug!("Application {} diff: {action} ({} field(s))", desired.name, details.len());
        Ok(ApplicationDiff {
            name: desired.name.clone(),
            action,
            details,
        })
    }

    fn compare_charm(desired: &ApplicationSpec, view: &ResourceView) -> Vec<DiffDetail> {
        let mut details = Vec::new();
        let charm = &desired.charm;

        if charm.name != view.charm.name {
            details.push(
                DiffDetail::update("charm", &view.charm.name, &charm.name).forcing_replace(),
            );
        }

        if charm.channel != view.channel {
            details.push(DiffDetail::update("channel", &view.channel, &charm.channel));
        }

        if let Some(revision) = charm.revision {
            if view.charm.revision != Some(revision) {
                details.push(DiffDetail {
                    field: String::from("revision"),
                    old_value: view.charm.revision.map(|r| r.to_string()),
                    new_value: Some(revision.to_string()),
                    requires_replace: false,
                });
            }
        }

        if let Some(base) = desired.parsed_base() {
            if base != view.base {
                details.push(DiffDetail::update("base", &view.base, &base));
            }
        }

        details
    }

    fn compare_scale(desired: &ApplicationSpec, view: &ResourceView) -> Vec<DiffDetail> {
        let mut details = Vec::new();

        if desired.units as usize != view.unit_count() {
            details.push(DiffDetail::update("units", view.unit_count(), desired.units));
        }

        if let Some(placement) = &desired.placement {
            let current = view.placement();
            if !equal(placement, &current) {
                let detail = DiffDetail::update("placement", &current, desired.placement_set());
                details.push(if order_independent_requires_replace(placement, &current) {
                    detail.forcing_replace()
                } else {
                    detail
                });
            }
        }

        details
    }

    fn compare_constraints(
        desired: &ApplicationSpec,
        view: &ResourceView,
    ) -> Result<Vec<DiffDetail>> {
        if desired.constraints.is_none() {
            return Ok(Vec::new());
        }

        let constraints = desired.parsed_constraints()?;
        if constraints == view.constraints {
            return Ok(Vec::new());
        }

        Ok(vec![DiffDetail::update("constraints", &view.constraints, &constraints)])
    }

    /// Compares only the keys the application declares; charm defaults are not drift.
    fn compare_config(desired: &ApplicationSpec, view: &ResourceView) -> Vec<DiffDetail> {
        desired
            .config
            .iter()
            .filter(|(key, value)| view.config.get(key.as_str()) != Some(*value))
            .map(|(key, value)| DiffDetail {
                field: format!("config.{key}"),
                old_value: view.config.get(key.as_str()).map(ToString::to_string),
                new_value: Some(value.to_string()),
                requires_replace: false,
            })
            .collect()
    }

    fn compare_storage(
        desired: &ApplicationSpec,
        view: &ResourceView,
    ) -> Result<Vec<DiffDetail>> {
        let current: Vec<StorageSpec> = view
            .storage
            .iter()
            .map(|(label, directive)| StorageSpec::from_directive(label, directive))
            .collect();

        if decide(&desired.storage, &current)? == ReplaceDecision::Replace {
            return Ok(vec![
                DiffDetail::update(
                    "storage",
                    describe_storage(&current),
                    describe_storage(&desired.storage),
                )
                .forcing_replace(),
            ]);
        }

        let existing: BTreeSet<&str> = view.storage.keys().map(String::as_str).collect();
        Ok(desired
            .storage
            .iter()
            .filter(|s| !existing.contains(s.label.as_str()))
            .map(|s| DiffDetail {
                field: format!("storage.{}", s.label),
                old_value: None,
                new_value: Some(s.size.clone()),
                requires_replace: false,
            })
            .collect())
    }

    /// A new resource revision is refreshed in place.
    fn compare_resources(desired: &ApplicationSpec, view: &ResourceView) -> Vec<DiffDetail> {
        desired
            .resources
            .iter()
            .filter(|(name, value)| view.resources.get(name.as_str()) != Some(*value))
            .map(|(name, value)| DiffDetail {
                field: format!("resources.{name}"),
                old_value: view.resources.get(name.as_str()).cloned(),
                new_value: Some(value.clone()),
                requires_replace: false,
            })
            .collect()
    }
}

fn describe_storage(specs: &[StorageSpec]) -> String {
    let mut parts: Vec<String> = specs
        .iter()
        .map(|s| format!("{}={},{},{}", s.label, s.size, s.pool, s.count))
        .collect();
    parts.sort();
    parts.join(" ")
}

impl ApplicationDiff {
    /// Returns true if the application needs any action.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.action != ReconcileAction::NoOp
    }
}

impl std::fmt::Display for ReconcileAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NoOp => "no-op",
            Self::Create => "create",
            Self::Update => "update",
            Self::Replace => "replace",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for ApplicationDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.action)?;
        if !self.details.is_empty() {
            write!(f, " (")?;
            for (i, detail) in self.details.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", detail.field)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controlplane::{Base, Constraints, StorageDirective};
    use crate::error::{ConvergeError, PlanError};
    use crate::reader::{CharmRef, UnitPlacement};
    use chrono::Utc;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn desired() -> ApplicationSpec {
        serde_yaml::from_str(
            r#"
name: testapplication
charm:
  name: testcharm
  revision: 5
  base: ubuntu@22.04
units: 2
placement: "0,1"
constraints: "arch=amd64"
config:
  log-level: debug
storage:
  - {label: runner, size: 10G, pool: rootfs}
resources:
  image: "registry.example/testimage:1.2"
"#,
        )
        .unwrap()
    }

    fn view() -> ResourceView {
        ResourceView {
            model: String::from("testmodel"),
            name: String::from("testapplication"),
            tag: String::from("application-testapplication"),
            charm: CharmRef::parse("ch:amd64/jammy/testcharm-5").unwrap(),
            base: Base::parse("ubuntu@22.04").unwrap(),
            channel: String::from("stable"),
            constraints: Constraints::parse("arch=amd64").unwrap(),
            principal: true,
            exposed: false,
            units: vec![
                UnitPlacement {
                    unit: String::from("testapplication/0"),
                    machine: String::from("1"),
                },
                UnitPlacement {
                    unit: String::from("testapplication/1"),
                    machine: String::from("0"),
                },
            ],
            config: BTreeMap::from([
                (String::from("log-level"), json!("debug")),
                (String::from("port"), json!(8080)),
            ]),
            endpoint_bindings: BTreeMap::new(),
            storage: BTreeMap::from([(
                String::from("runner"),
                StorageDirective {
                    size: String::from("10240M"),
                    pool: String::from("rootfs"),
                    count: 1,
                },
            )]),
            resources: BTreeMap::from([
                (String::from("image"), String::from("registry.example/testimage:1.2")),
                (String::from("config-file"), String::from("3")),
            ]),
            observed_at: Utc::now(),
        }
    }

    fn compute(desired: &ApplicationSpec, view: &ResourceView) -> ApplicationDiff {
        DiffEngine::new().compute(desired, Some(view)).unwrap()
    }

    #[test]
    fn test_missing_application_is_create() {
        let diff = DiffEngine::new().compute(&desired(), None).unwrap();
        assert_eq!(diff.action, ReconcileAction::Create);
    }

    #[test]
    fn test_matching_view_is_noop() {
        let diff = compute(&desired(), &view());
        assert_eq!(diff.action, ReconcileAction::NoOp, "{diff}");
        assert!(!diff.has_changes());
    }

    #[test]
    fn test_channel_and_units_are_updates() {
        let mut spec = desired();
        spec.charm.channel = String::from("edge");
        spec.units = 3;
        spec.placement = None;

        let diff = compute(&spec, &view());
        assert_eq!(diff.action, ReconcileAction::Update);
        let fields: Vec<&str> = diff.details.iter().map(|d| d.field.as_str()).collect();
        assert_eq!(fields, vec!["channel", "units"]);
    }

    #[test]
    fn test_charm_name_change_is_replace() {
        let mut spec = desired();
        spec.charm.name = String::from("othercharm");
        assert_eq!(compute(&spec, &view()).action, ReconcileAction::Replace);
    }

    #[test]
    fn test_placement_growth_replaces_and_shrink_updates() {
        let mut spec = desired();
        spec.placement = Some(String::from("1, 0, 2"));
        spec.units = 2;
        assert_eq!(compute(&spec, &view()).action, ReconcileAction::Replace);

        spec.placement = Some(String::from("1"));
        assert_eq!(compute(&spec, &view()).action, ReconcileAction::Update);
    }

    #[test]
    fn test_config_only_compares_declared_keys() {
        let mut spec = desired();
        spec.config.insert(String::from("log-level"), json!("info"));

        let diff = compute(&spec, &view());
        assert_eq!(diff.action, ReconcileAction::Update);
        assert_eq!(diff.details.len(), 1);
        assert_eq!(diff.details[0].field, "config.log-level");
        assert_eq!(diff.details[0].old_value.as_deref(), Some("\"debug\""));
    }

    #[test]
    fn test_storage_resize_is_replace() {
        let mut spec = desired();
        spec.storage[0].size = String::from("20G");

        let diff = compute(&spec, &view());
        assert_eq!(diff.action, ReconcileAction::Replace);
        assert!(diff.details.iter().any(|d| d.field == "storage" && d.requires_replace));
    }

    #[test]
    fn test_storage_addition_is_update() {
        let mut spec = desired();
        spec.storage.insert(
            0,
            StorageSpec {
                label: String::from("cache"),
                size: String::from("1G"),
                pool: String::new(),
                count: 1,
            },
        );

        let diff = compute(&spec, &view());
        assert_eq!(diff.action, ReconcileAction::Update);
        assert_eq!(diff.details[0].field, "storage.cache");
    }

    #[test]
    fn test_resource_revision_change_is_update() {
        let mut spec = desired();
        spec.resources.insert(String::from("config-file"), String::from("4"));
        spec.resources.insert(String::from("extra"), String::from("1"));

        let diff = compute(&spec, &view());
        assert_eq!(diff.action, ReconcileAction::Update);
        let changed: Vec<(&str, Option<&str>)> = diff
            .details
            .iter()
            .map(|d| (d.field.as_str(), d.old_value.as_deref()))
            .collect();
        assert_eq!(
            changed,
            vec![("resources.config-file", Some("3")), ("resources.extra", None)]
        );
        assert!(diff.details.iter().all(|d| !d.requires_replace));
    }

    #[test]
    fn test_bad_observed_size_is_error() {
        let mut current = view();
        current.storage.get_mut("runner").unwrap().size = String::from("lots");

        let err = DiffEngine::new().compute(&desired(), Some(&current)).unwrap_err();
        assert!(matches!(
            err,
            ConvergeError::Plan(PlanError::InvalidStorageSize { .. })
        ));
    }
}
