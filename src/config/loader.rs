//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse a configuration from a TOML file without validating it.
///
/// The CLI layer merges flags over the result before validation runs.
pub fn read_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let config = read_config(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_minimal_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
close_ms = 250
binary = true

[command]
name = "cat"
args = ["-u"]

[env]
GREETING = "hi"
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.command.name, "cat");
        assert_eq!(config.command.args, vec!["-u".to_string()]);
        assert_eq!(config.close_ms, 250);
        assert!(config.binary);
        assert_eq!(config.env.get("GREETING").map(String::as_str), Some("hi"));
        // Untouched sections keep their defaults.
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert!(config.pass_env.contains(&"PATH".to_string()));
    }

    #[test]
    fn reports_validation_failure() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "reverse_lookup = true").unwrap();

        match load_config(file.path()) {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors, vec![ValidationError::MissingCommand]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn reports_parse_failure() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "close_ms = \"soon\"").unwrap();
        assert!(matches!(load_config(file.path()), Err(ConfigError::Parse(_))));
    }
}
