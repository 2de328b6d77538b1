//! Control plane integration module.
//!
//! This module provides everything the engine needs from the remote control
//! plane: the capability trait, its HTTP implementation, scoped sessions,
//! wire types, constraints, and the canonical size grammar.

mod client;
mod constraints;
mod session;
mod size;
mod types;

pub use client::{ControlPlane, HttpControlPlane};
#[cfg(test)]
pub use client::MockControlPlane;
pub use constraints::Constraints;
pub use session::Session;
pub use size::{SizeError, format_size, parse_size};
pub use types::{
    APPLICATION_TAG_PREFIX, ApiError, ApplicationResult, ApplicationStatus, Base, ConfigResult,
    InfoResult, NOT_FOUND_CODE, ResourceUpload, StatusSnapshot, StorageDirective, UnitStatus,
    application_tag, parse_application_tag,
};
