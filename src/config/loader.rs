//! Configuration loading from disk.
//!
//! Loading only deserializes. Semantic validation runs once the caller has
//! applied its overrides (see `cli.rs`).

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ApiConfig;
use crate::config::validation::ValidationError;

/// Error type for configuration loading.
#[derive(Debug, Error)]
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

/// Deserialize configuration from a TOML file.
pub fn read_config(path: &Path) -> Result<ApiConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Deserialize configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ApiConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
env = "production"

[rate_limit]
requests_per_second = 10.0
burst_size = 20
"#
        )
        .unwrap();

        let config = read_config(file.path()).unwrap();
        assert_eq!(config.env, "production");
        assert_eq!(config.rate_limit.burst_size, 20);
        assert!(config.rate_limit.enabled);
        assert_eq!(config.timeouts.shutdown_drain_secs, 5);
        assert_eq!(config.listener.bind_address, "0.0.0.0:4000");
    }

    #[test]
    fn out_of_range_values_are_left_for_validation() {
        let config = parse_config("[timeouts]\nshutdown_drain_secs = 0\n").unwrap();
        assert_eq!(config.timeouts.shutdown_drain_secs, 0);

        let errors = crate::config::validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "timeouts.shutdown_drain_secs");
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(parse_config("env = "), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = read_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
