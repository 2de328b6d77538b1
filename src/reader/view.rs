//! Normalised view of one remote application.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::controlplane::{Base, Constraints, StorageDirective};

/// Snapshot of one application assembled from several control plane calls.
///
/// Built fresh on every read and never cached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceView {
    /// Model the application lives in.
    pub model: String,
    /// Application name.
    pub name: String,
    /// Application tag.
    pub tag: String,
    /// Packaged software reference.
    pub charm: CharmRef,
    /// Deployment base.
    pub base: Base,
    /// Charm channel.
    pub channel: String,
    /// Declared constraints.
    pub constraints: Constraints,
    /// Whether the application is principal (not subordinate).
    pub principal: bool,
    /// Whether the application is exposed.
    pub exposed: bool,
    /// Unit to machine placement.
    pub units: Vec<UnitPlacement>,
    /// Composed configuration.
    pub config: BTreeMap<String, Value>,
    /// Endpoint to space bindings.
    pub endpoint_bindings: BTreeMap<String, String>,
    /// Storage directives keyed by label.
    pub storage: BTreeMap<String, StorageDirective>,
    /// Resource revisions keyed by resource name.
    pub resources: BTreeMap<String, String>,
    /// When the view was assembled.
    pub observed_at: DateTime<Utc>,
}

/// Placement of one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitPlacement {
    /// Unit name (e.g. `app/0`).
    pub unit: String,
    /// Machine hosting the unit.
    pub machine: String,
}

/// Parsed charm URL such as `ch:amd64/jammy/testcharm-5`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CharmRef {
    /// URL schema (`ch`, `local`, ...).
    pub source: Option<String>,
    /// Architecture path segment.
    pub architecture: Option<String>,
    /// Series path segment.
    pub series: Option<String>,
    /// Charm name.
    pub name: String,
    /// Charm revision.
    pub revision: Option<u32>,
}

impl CharmRef {
    /// Parses a charm URL. Returns `None` if no name can be found.
    #[must_use]
    pub fn parse(url: &str) -> Option<Self> {
        let (source, path) = match url.split_once(':') {
            Some((source, path)) => (Some(source.to_string()), path),
            None => (None, url),
        };

        let mut segments: Vec<&str> = path.split('/').collect();
        let last = segments.pop()?;

        let (name, revision) = match last.rsplit_once('-') {
            Some((name, rev)) => match rev.parse::<u32>() {
                Ok(revision) => (name, Some(revision)),
                Err(_) => (last, None),
            },
            None => (last, None),
        };

        if name.is_empty() {
            return None;
        }

        let (architecture, series) = match segments.as_slice() {
            [] => (None, None),
            [series] => (None, Some((*series).to_string())),
            [arch, series] => (Some((*arch).to_string()), Some((*series).to_string())),
            _ => return None,
        };

        Some(Self {
            source,
            architecture,
            series,
            name: name.to_string(),
            revision,
        })
    }
}

impl fmt::Display for CharmRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "{source}:")?;
        }
        if let Some(arch) = &self.architecture {
            write!(f, "{arch}/")?;
        }
        if let Some(series) = &self.series {
            write!(f, "{series}/")?;
        }
        write!(f, "{}", self.name)?;
        if let Some(revision) = self.revision {
            write!(f, "-{revision}")?;
        }
        Ok(())
    }
}

impl ResourceView {
    /// Returns the number of units.
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Returns the distinct machines hosting units, comma separated.
    #[must_use]
    pub fn placement(&self) -> String {
        self.units
            .iter()
            .map(|u| u.machine.as_str())
            .filter(|m| !m.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>()
            .join(",")
    }
}
