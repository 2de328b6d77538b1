//! Configuration module for the convergence engine.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `appconverge.yaml`
//! - Environment overrides and `.env` loading
//! - Validation of configuration values

mod parser;
mod spec;
mod validator;

pub use parser::{
    ConfigParser, DEFAULT_CONFIG_FILES, ENV_API_TOKEN, ENV_CONTROLLER_URL, ENV_MODEL,
    find_config_file,
};
pub use spec::{ApplicationSpec, CharmSpec, ControllerConfig, ConvergeConfig, RetryConfig};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
