//! Error types for the convergence engine.
//!
//! This module provides the error hierarchy for every stage of a read and
//! reconcile cycle: configuration, control plane calls, convergent reads,
//! local plan validation, and resource uploads.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the convergence engine.
#[derive(Debug, Error)]
pub enum ConvergeError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Control plane call errors.
    #[error("Control plane error: {0}")]
    ControlPlane(#[from] ControlPlaneError),

    /// Convergent read errors.
    #[error("Read error: {0}")]
    Read(#[from] ReadError),

    /// Local validation errors raised while planning.
    #[error("Planning error: {0}")]
    Plan(#[from] PlanError),

    /// Resource upload errors.
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },

    /// Duplicate definition.
    #[error("Duplicate {resource_type} name: {name}")]
    DuplicateName {
        /// Kind of entry (application, storage label).
        resource_type: String,
        /// The duplicated name.
        name: String,
    },
}

/// Identifies which control plane call produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteCall {
    /// Opening a model session.
    OpenSession,
    /// Full status snapshot of a model.
    Status,
    /// Per-application info lookup.
    ApplicationInfo,
    /// Per-application config lookup.
    ApplicationConfig,
    /// Resource upload.
    UploadResource,
}

/// Control plane call errors.
///
/// Every variant carries the call it came from so a user can tell which of
/// the independent lookups failed.
#[derive(Debug, Error)]
pub enum ControlPlaneError {
    /// The control plane answered with a structured error.
    #[error("{call} failed: {message} (code: {code})")]
    Remote {
        /// Call that failed.
        call: RemoteCall,
        /// Error code reported by the control plane.
        code: String,
        /// Error message reported by the control plane.
        message: String,
    },

    /// Authentication was rejected.
    #[error("{call} rejected credentials: {message}")]
    Authentication {
        /// Call that failed.
        call: RemoteCall,
        /// Description of the auth failure.
        message: String,
    },

    /// Transport failure.
    #[error("{call} network error: {message}")]
    Network {
        /// Call that failed.
        call: RemoteCall,
        /// Description of the network error.
        message: String,
    },

    /// The response could not be interpreted.
    #[error("{call} returned an invalid response: {message}")]
    InvalidResponse {
        /// Call that failed.
        call: RemoteCall,
        /// Description of the response issue.
        message: String,
    },

    /// A batch call answered with the wrong number of results.
    #[error("{call} returned {actual} results, expected {expected}")]
    UnexpectedResultCount {
        /// Call that failed.
        call: RemoteCall,
        /// Expected number of results.
        expected: usize,
        /// Number of results received.
        actual: usize,
    },
}

/// Convergent read errors.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The application stayed invisible for the whole retry budget.
    #[error("Application '{application}' not found in model '{model}' after {attempts} attempts")]
    NotFound {
        /// Model that was queried.
        model: String,
        /// Application that was requested.
        application: String,
        /// Number of lookups issued.
        attempts: u32,
    },

    /// The caller's deadline expired.
    #[error("Deadline exceeded while reading application '{application}' (attempt {attempts})")]
    DeadlineExceeded {
        /// Application that was requested.
        application: String,
        /// Lookups issued before the deadline hit.
        attempts: u32,
    },

    /// The caller cancelled the read.
    #[error("Read of application '{application}' was cancelled")]
    Cancelled {
        /// Application that was requested.
        application: String,
    },
}

/// Which side of a comparison a value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    /// The desired (planned) collection.
    Planned,
    /// The observed (current) collection.
    Current,
}

/// Local validation errors raised before any comparison.
#[derive(Debug, Error)]
pub enum PlanError {
    /// A storage size did not parse.
    #[error("Invalid storage size {size:?} for {collection} storage '{label}': {reason}")]
    InvalidStorageSize {
        /// Collection the entry belongs to.
        collection: Collection,
        /// Storage label.
        label: String,
        /// The raw size string.
        size: String,
        /// Why parsing failed.
        reason: String,
    },

    /// A constraints string did not parse.
    #[error("Invalid constraints {value:?}: {reason}")]
    InvalidConstraints {
        /// The raw constraints string.
        value: String,
        /// Why parsing failed.
        reason: String,
    },
}

/// Resource upload errors.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The resource type is not known.
    #[error("invalid type {kind} for pending resource {resource}")]
    InvalidType {
        /// Resource name.
        resource: String,
        /// The unrecognised type.
        kind: String,
    },

    /// The resource file could not be opened or read.
    #[error("unable to open resource {resource}: {source}")]
    Open {
        /// Resource name.
        resource: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The control plane rejected the upload.
    #[error("upload of resource {resource} failed: {message}")]
    Failed {
        /// Resource name.
        resource: String,
        /// Description of the failure.
        message: String,
    },
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, ConvergeError>;

impl ConvergeError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Returns true if this is an exhausted not-found read.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::Read(ReadError::NotFound { .. }))
    }

    /// Returns true if the caller's deadline or cancellation ended the call.
    #[must_use]
    pub const fn is_interrupted(&self) -> bool {
        matches!(
            self,
            Self::Read(ReadError::DeadlineExceeded { .. } | ReadError::Cancelled { .. })
        )
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl ControlPlaneError {
    /// Creates a network error.
    #[must_use]
    pub fn network(call: RemoteCall, message: impl Into<String>) -> Self {
        Self::Network {
            call,
            message: message.into(),
        }
    }

    /// Creates an invalid response error.
    #[must_use]
    pub fn invalid_response(call: RemoteCall, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            call,
            message: message.into(),
        }
    }

    /// Returns the call that produced this error.
    #[must_use]
    pub const fn call(&self) -> RemoteCall {
        match self {
            Self::Remote { call, .. }
            | Self::Authentication { call, .. }
            | Self::Network { call, .. }
            | Self::InvalidResponse { call, .. }
            | Self::UnexpectedResultCount { call, .. } => *call,
        }
    }
}

impl std::fmt::Display for RemoteCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::OpenSession => "open session",
            Self::Status => "status",
            Self::ApplicationInfo => "application info",
            Self::ApplicationConfig => "application config",
            Self::UploadResource => "resource upload",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Planned => "planned",
            Self::Current => "current",
        };
        write!(f, "{s}")
    }
}
