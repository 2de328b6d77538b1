// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![forbid(unsafe_code)]               // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![warn(dead_code)]                   // Unused code is reported
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![warn(unused_imports)]              // Unused imports are reported
#![warn(unused_variables)]            // Unused variables are reported
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # appconverge
//!
//! Convergent reads and replace-or-update decisions for applications managed
//! by a remote, eventually consistent control plane.
//!
//! ## Overview
//!
//! A freshly created application may not be visible to the next query. This
//! crate hides that lag behind a bounded retry, then assembles one coherent
//! view out of three independent queries (info, status, config). On top of
//! that view it decides whether a desired change can be applied in place or
//! forces the application to be replaced.
//!
//! ## Architecture
//!
//! 1. **Desired State**: Defined in `appconverge.yaml`
//! 2. **Observed State**: Read through the [`reader`] with bounded retries
//! 3. **Planner**: Order-independent comparisons and the storage decision
//! 4. **Reconciler**: Produces a per-application action for the model
//!
//! ## Modules
//!
//! - [`config`]: Configuration parsing and validation
//! - [`controlplane`]: Control plane client, sessions and wire types
//! - [`reader`]: Convergent reader and view assembly
//! - [`planner`]: Set equivalence, storage decisions and diffs
//! - [`reconciler`]: Plan computation for a whole model
//! - [`resources`]: Upload of locally supplied resources
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! controller:
//!   url: https://controller.example:17070
//!   model: testmodel
//!
//! applications:
//!   - name: testapplication
//!     charm:
//!       name: testcharm
//!       channel: stable
//!     units: 1
//!     constraints: "arch=amd64 mem=4G"
//!     storage:
//!       - label: data
//!         size: 10G
//!         pool: pool1
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod controlplane;
pub mod error;
pub mod planner;
pub mod reader;
pub mod reconciler;
pub mod resources;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, ConvergeConfig};
pub use controlplane::{ControlPlane, HttpControlPlane, Session};
pub use error::{ConvergeError, Result};
pub use planner::{DiffEngine, ReconcileAction, UnorderedStringSet, decide};
pub use reader::{ApplicationReader, CallContext, ConvergentReader, ResourceView, ViewAssembler};
pub use reconciler::{ReconcilePlan, Reconciler};
pub use resources::{PendingResourceUpload, upload_pending_resources};
