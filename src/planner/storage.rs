//! Replace decision for storage collections.
//!
//! Storage can be added to a running application but an existing directive
//! cannot be resized, moved to another pool, or removed in place. Changing
//! or dropping a label therefore forces a replacement while adding one does
//! not.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::controlplane::{StorageDirective, parse_size};
use crate::error::{Collection, PlanError, Result};

/// One storage directive keyed by label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageSpec {
    /// Storage label.
    pub label: String,
    /// Human size (e.g. `10G`).
    pub size: String,
    /// Storage pool.
    #[serde(default)]
    pub pool: String,
    /// Number of instances.
    #[serde(default = "default_count")]
    pub count: u64,
}

/// Outcome of comparing two storage collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceDecision {
    /// The change can be applied in place.
    NoReplace,
    /// The application must be replaced.
    Replace,
}

/// Storage entry with its size parsed to MiB.
#[derive(Debug)]
struct Parsed<'a> {
    size_mib: u64,
    pool: &'a str,
    count: u64,
}

const fn default_count() -> u64 {
    1
}

impl StorageSpec {
    /// Builds a spec from a directive reported by the control plane.
    #[must_use]
    pub fn from_directive(label: &str, directive: &StorageDirective) -> Self {
        Self {
            label: label.to_string(),
            size: directive.size.clone(),
            pool: directive.pool.clone(),
            count: directive.count,
        }
    }
}

fn parse_collection(
    collection: Collection,
    specs: &[StorageSpec],
) -> std::result::Result<BTreeMap<&str, Parsed<'_>>, PlanError> {
    specs
        .iter()
        .map(|spec| {
            let size_mib = parse_size(&spec.size).map_err(|e| PlanError::InvalidStorageSize {
                collection,
                label: spec.label.clone(),
                size: spec.size.clone(),
                reason: e.to_string(),
            })?;
            Ok((
                spec.label.as_str(),
                Parsed {
                    size_mib,
                    pool: spec.pool.as_str(),
                    count: spec.count,
                },
            ))
        })
        .collect()
}

/// Decides whether moving from `current` to `planned` storage needs a
/// replacement.
///
/// Every size of both collections is parsed before anything is compared.
/// Planned labels are visited in label order: the first one missing from
/// `current` settles the decision as [`ReplaceDecision::NoReplace`], the
/// first one whose size, pool, or count differs as
/// [`ReplaceDecision::Replace`]. Otherwise a label dropped from `current`
/// forces a replacement.
///
/// # Errors
///
/// Returns [`PlanError::InvalidStorageSize`] for the first size that does
/// not parse, planned entries first.
pub fn decide(
    planned: &[StorageSpec],
    current: &[StorageSpec],
) -> std::result::Result<ReplaceDecision, PlanError> {
    let planned = parse_collection(Collection::Planned, planned)?;
    let current = parse_collection(Collection::Current, current)?;

    for (label, want) in &planned {
        let Some(have) = current.get(label) else {
            debug!("Storage {label} is new, no replacement needed");
            return Ok(ReplaceDecision::NoReplace);
        };

        if want.size_mib != have.size_mib || want.pool != have.pool || want.count != have.count {
            debug!("Storage {label} changed in place, replacement needed");
            return Ok(ReplaceDecision::Replace);
        }
    }

    if let Some(label) = current.keys().find(|label| !planned.contains_key(*label)) {
        debug!("Storage {label} removed, replacement needed");
        return Ok(ReplaceDecision::Replace);
    }

    Ok(ReplaceDecision::NoReplace)
}

/// Plan callback form of [`decide`].
///
/// # Errors
///
/// Returns the parse error from [`decide`].
pub fn storage_requires_replace(planned: &[StorageSpec], current: &[StorageSpec]) -> Result<bool> {
    Ok(decide(planned, current)? == ReplaceDecision::Replace)
}
