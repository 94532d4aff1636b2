//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, connection limits > 0)
//! - Check timing relationships (grace window and probe timeout fit the deadline)
//! - Detect probe name collisions
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ServiceConfig;
use crate::health::probes::{BUILTIN_PROBE_NAMES, MAX_LIMIT_MB};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a valid socket address")]
    InvalidBindAddress(String),

    #[error("observability.metrics_address '{0}' is not a valid socket address")]
    InvalidMetricsAddress(String),

    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),

    #[error("shutdown.drain_grace_ms ({grace_ms}) must be shorter than shutdown.deadline_ms ({deadline_ms})")]
    GraceExceedsDeadline { grace_ms: u64, deadline_ms: u64 },

    #[error("health.probe_timeout_ms ({timeout_ms}) must be shorter than shutdown.deadline_ms ({deadline_ms})")]
    ProbeTimeoutExceedsDeadline { timeout_ms: u64, deadline_ms: u64 },

    #[error("memory.limit_mb ({0}) exceeds the maximum of {MAX_LIMIT_MB}")]
    MemoryLimitTooLarge(u64),

    #[error("filesystem.directory must not be empty")]
    EmptyDirectory,

    #[error("integration name must not be empty")]
    EmptyIntegrationName,

    #[error("integration name '{0}' is used more than once or collides with a built-in probe")]
    DuplicateProbeName(String),
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::NotPositive("listener.max_connections"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::NotPositive("timeouts.request_secs"));
    }

    let deadline_ms = config.shutdown.deadline_ms;
    if deadline_ms == 0 {
        errors.push(ValidationError::NotPositive("shutdown.deadline_ms"));
    } else {
        if config.shutdown.drain_grace_ms >= deadline_ms {
            errors.push(ValidationError::GraceExceedsDeadline {
                grace_ms: config.shutdown.drain_grace_ms,
                deadline_ms,
            });
        }
        if config.health.probe_timeout_ms >= deadline_ms {
            errors.push(ValidationError::ProbeTimeoutExceedsDeadline {
                timeout_ms: config.health.probe_timeout_ms,
                deadline_ms,
            });
        }
    }
    if config.health.probe_timeout_ms == 0 {
        errors.push(ValidationError::NotPositive("health.probe_timeout_ms"));
    }

    if config.database.max_connections == 0 {
        errors.push(ValidationError::NotPositive("database.max_connections"));
    }
    if config.filesystem.enabled && config.filesystem.directory.as_os_str().is_empty() {
        errors.push(ValidationError::EmptyDirectory);
    }
    if config.memory.enabled {
        match config.memory.limit_mb {
            Some(0) => errors.push(ValidationError::NotPositive("memory.limit_mb")),
            Some(mb) if mb > MAX_LIMIT_MB => {
                errors.push(ValidationError::MemoryLimitTooLarge(mb))
            }
            _ => {}
        }
    }

    let mut names: HashSet<&str> = BUILTIN_PROBE_NAMES.iter().copied().collect();
    for integration in &config.integrations {
        if integration.name.trim().is_empty() {
            errors.push(ValidationError::EmptyIntegrationName);
        } else if !names.insert(integration.name.as_str()) {
            errors.push(ValidationError::DuplicateProbeName(integration.name.clone()));
        }
        if integration.timeout_ms == Some(0) {
            errors.push(ValidationError::NotPositive("integrations.timeout_ms"));
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
