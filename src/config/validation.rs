//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that exactly one way of choosing the command is configured
//! - Validate addresses and header names before the server binds
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function apart from the script dir `stat`

use std::net::SocketAddr;

use axum::http::HeaderName;

use crate::config::schema::GatewayConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("no command configured and no script directory given")]
    MissingCommand,
    #[error("a command and a script directory are mutually exclusive")]
    CommandAndScriptDir,
    #[error("script directory {0:?} is not a directory")]
    ScriptDirNotFound(String),
    #[error("invalid bind address {0:?}")]
    BindAddress(String),
    #[error("invalid metrics address {0:?}")]
    MetricsAddress(String),
    #[error("invalid remote header name {0:?}")]
    RemoteHeader(String),
    #[error("TLS requires both a certificate and a key path")]
    TlsPaths,
}

/// Check a configuration, collecting every violation.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let has_command = !config.command.name.is_empty();
    match (&config.script_dir, has_command) {
        (None, false) => errors.push(ValidationError::MissingCommand),
        (Some(_), true) => errors.push(ValidationError::CommandAndScriptDir),
        (Some(dir), false) if !dir.is_dir() => {
            errors.push(ValidationError::ScriptDirNotFound(dir.display().to_string()))
        }
        _ => {}
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if let Some(header) = &config.remote_header {
        if HeaderName::from_bytes(header.as_bytes()).is_err() {
            errors.push(ValidationError::RemoteHeader(header.clone()));
        }
    }

    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.is_empty() || tls.key_path.is_empty() {
            errors.push(ValidationError::TlsPaths);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
