//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the endpoint is an absolute http/https URL with a host
//! - Validate value ranges (depth in browse mode, log level)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientConfig → Result<(), Vec<ValidationError>>
//! - Runs after command-line overrides are applied

use std::fmt;

use http::Uri;

use crate::config::schema::{ClientConfig, Mode};
use crate::observability::logging::level_name;

/// One failed check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a fully assembled configuration.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.endpoint.is_empty() {
        errors.push(ValidationError::new("endpoint", "is required"));
    } else {
        match config.endpoint.parse::<Uri>() {
            Ok(uri) => {
                if !matches!(uri.scheme_str(), Some("http") | Some("https")) {
                    errors.push(ValidationError::new("endpoint", "scheme must be http or https"));
                }
                if uri.host().map_or(true, str::is_empty) {
                    errors.push(ValidationError::new("endpoint", "host is missing"));
                }
            }
            Err(e) => errors.push(ValidationError::new("endpoint", format!("invalid URL: {e}"))),
        }
    }

    if config.mode() == Mode::Browse && config.browse.max_depth < 1 {
        errors.push(ValidationError::new("browse.max_depth", "must be at least 1"));
    }

    if config.read.has_item() && config.browse.has_root() {
        errors.push(ValidationError::new("read", "cannot be combined with a browse root"));
    }

    if level_name(&config.observability.log_level).is_none() {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level {:?}", config.observability.log_level),
        ));
    }

    if config.auth.username.is_empty() && !config.auth.password.is_empty() {
        errors.push(ValidationError::new("auth.username", "is required when a password is set"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
