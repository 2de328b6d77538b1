//! Structured application constraints.
//!
//! Constraints travel as a space separated `key=value` string
//! (`arch=amd64 cores=2 mem=4G`) in configuration files and as a structured
//! record on the wire.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PlanError;

use super::size::{format_size, parse_size};

/// Declared resource constraints of an application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Constraints {
    /// CPU architecture (e.g. `amd64`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
    /// Number of CPU cores.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cores: Option<u64>,
    /// Memory in MiB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mem: Option<u64>,
    /// Root disk size in MiB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_disk: Option<u64>,
    /// Provider specific instance type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    /// Virtualisation type (e.g. `virtual-machine`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virt_type: Option<String>,
}

impl Constraints {
    /// Parses a constraints string.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown keys, repeated keys, or malformed values.
    pub fn parse(value: &str) -> Result<Self, PlanError> {
        let invalid = |reason: String| PlanError::InvalidConstraints {
            value: value.to_string(),
            reason,
        };

        let mut constraints = Self::default();

        for pair in value.split_whitespace() {
            let Some((key, raw)) = pair.split_once('=') else {
                return Err(invalid(format!("malformed constraint {pair:?}")));
            };

            let seen = match key {
                "arch" => constraints.arch.replace(raw.to_string()).is_some(),
                "cores" => {
                    let cores = raw
                        .parse()
                        .map_err(|_| invalid(format!("bad cores value {raw:?}")))?;
                    constraints.cores.replace(cores).is_some()
                }
                "mem" => {
                    let mem = parse_size(raw).map_err(|e| invalid(format!("bad mem value: {e}")))?;
                    constraints.mem.replace(mem).is_some()
                }
                "root-disk" => {
                    let disk =
                        parse_size(raw).map_err(|e| invalid(format!("bad root-disk value: {e}")))?;
                    constraints.root_disk.replace(disk).is_some()
                }
                "instance-type" => constraints.instance_type.replace(raw.to_string()).is_some(),
                "virt-type" => constraints.virt_type.replace(raw.to_string()).is_some(),
                other => return Err(invalid(format!("unknown constraint {other:?}"))),
            };

            if seen {
                return Err(invalid(format!("constraint {key:?} specified more than once")));
            }
        }

        Ok(constraints)
    }

    /// Returns true if no constraint is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.arch.is_none()
            && self.cores.is_none()
            && self.mem.is_none()
            && self.root_disk.is_none()
            && self.instance_type.is_none()
            && self.virt_type.is_none()
    }

    /// Returns a copy where every unset field is taken from `fallback`.
    #[must_use]
    pub fn merged_with(&self, fallback: &Self) -> Self {
        Self {
            arch: self.arch.clone().or_else(|| fallback.arch.clone()),
            cores: self.cores.or(fallback.cores),
            mem: self.mem.or(fallback.mem),
            root_disk: self.root_disk.or(fallback.root_disk),
            instance_type: self
                .instance_type
                .clone()
                .or_else(|| fallback.instance_type.clone()),
            virt_type: self.virt_type.clone().or_else(|| fallback.virt_type.clone()),
        }
    }
}

impl FromStr for Constraints {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Constraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(arch) = &self.arch {
            parts.push(format!("arch={arch}"));
        }
        if let Some(cores) = self.cores {
            parts.push(format!("cores={cores}"));
        }
        if let Some(mem) = self.mem {
            parts.push(format!("mem={}", format_size(mem)));
        }
        if let Some(disk) = self.root_disk {
            parts.push(format!("root-disk={}", format_size(disk)));
        }
        if let Some(instance_type) = &self.instance_type {
            parts.push(format!("instance-type={instance_type}"));
        }
        if let Some(virt_type) = &self.virt_type {
            parts.push(format!("virt-type={virt_type}"));
        }
        write!(f, "{}", parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_constraints() {
        let constraints = Constraints::parse("arch=amd64 cores=2 mem=4G root-disk=20G").unwrap();
        assert_eq!(constraints.arch.as_deref(), Some("amd64"));
        assert_eq!(constraints.cores, Some(2));
        assert_eq!(constraints.mem, Some(4096));
        assert_eq!(constraints.root_disk, Some(20 * 1024));
        assert!(constraints.instance_type.is_none());
    }

    #[test]
    fn test_parse_empty_constraints() {
        let constraints = Constraints::parse("  ").unwrap();
        assert!(constraints.is_empty());
        assert_eq!(constraints.to_string(), "");
    }

    #[test]
    fn test_parse_constraints_errors() {
        assert!(Constraints::parse("arch").is_err());
        assert!(Constraints::parse("gpus=1").is_err());
        assert!(Constraints::parse("cores=two").is_err());
        assert!(Constraints::parse("mem=4X").is_err());
        assert!(Constraints::parse("arch=amd64 arch=arm64").is_err());
    }

    #[test]
    fn test_display_is_canonical() {
        let constraints: Constraints = "mem=4096M cores=2 arch=amd64".parse().unwrap();
        assert_eq!(constraints.to_string(), "arch=amd64 cores=2 mem=4G");
    }

    #[test]
    fn test_merged_with_prefers_self() {
        let primary = Constraints::parse("arch=amd64").unwrap();
        let fallback = Constraints::parse("arch=arm64 cores=4").unwrap();

        let merged = primary.merged_with(&fallback);
        assert_eq!(merged.arch.as_deref(), Some("amd64"));
        assert_eq!(merged.cores, Some(4));
    }
}
