//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check module names map to exactly one directory
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::AppConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("module name must not be empty")]
    EmptyModuleName,

    #[error("module `{0}` is listed more than once")]
    DuplicateModule(String),

    #[error("module `{0}` must be a single directory name")]
    InvalidModuleName(String),

    #[error("discovery.handler_suffix must not be empty")]
    EmptyHandlerSuffix,

    #[error("discovery.source_extension must not be empty")]
    EmptySourceExtension,

    #[error("{field} `{value}` is not a socket address")]
    InvalidAddress { field: &'static str, value: String },

    #[error("timeouts.request_secs must be greater than zero")]
    ZeroRequestTimeout,

    #[error("admin.api_key must be set when the admin API is enabled")]
    MissingAdminKey,
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut seen = HashSet::new();
    for module in &config.modules {
        if module.trim().is_empty() {
            errors.push(ValidationError::EmptyModuleName);
            continue;
        }
        if module.contains(['/', '\\']) || module == "." || module == ".." {
            errors.push(ValidationError::InvalidModuleName(module.clone()));
        }
        if !seen.insert(module.as_str()) {
            errors.push(ValidationError::DuplicateModule(module.clone()));
        }
    }

    if config.discovery.handler_suffix.is_empty() {
        errors.push(ValidationError::EmptyHandlerSuffix);
    }
    if config.discovery.source_extension.trim_start_matches('.').is_empty() {
        errors.push(ValidationError::EmptySourceExtension);
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: config.observability.metrics_address.clone(),
        });
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    if config.admin.enabled && config.admin.api_key.is_empty() {
        errors.push(ValidationError::MissingAdminKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
