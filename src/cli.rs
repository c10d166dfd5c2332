//! Command-line interface.
//!
//! Flags override values from the optional config file; the merged result
//! is validated once, after every override is applied.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::config::{read_config, validate_config, ApiConfig, ConfigError};
use crate::security::identity::{FOODS_READ, FOODS_WRITE};

/// Process exit code when the drain deadline passes or the server fails.
pub const EXIT_SHUTDOWN_FAILURE: u8 = 1;
/// Process exit code when configuration, storage or binding fails.
pub const EXIT_STARTUP_FAILURE: u8 = 2;

#[derive(Debug, Parser)]
#[command(name = "foods-api", version, about = "JSON API for a catalogue of foods")]
pub struct Cli {
    /// TOML configuration file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Port to listen on, keeping the configured host.
    #[arg(long)]
    pub port: Option<u16>,

    /// Environment (development|staging|production).
    #[arg(long)]
    pub env: Option<String>,

    /// SQLite database file.
    #[arg(long, global = true)]
    pub db_path: Option<String>,

    /// Rate limiter maximum requests per second.
    #[arg(long)]
    pub limiter_rps: Option<f64>,

    /// Rate limiter maximum burst.
    #[arg(long)]
    pub limiter_burst: Option<u32>,

    /// Enable rate limiter.
    #[arg(long)]
    pub limiter_enabled: Option<bool>,

    /// Emit JSON log lines instead of pretty output.
    #[arg(long, global = true)]
    pub json_logs: Option<bool>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the HTTP server (the default).
    Serve,
    /// Grant permissions to a user and print a new authentication token.
    IssueToken {
        #[arg(long)]
        user: i64,
        #[arg(long = "permission", required = true, value_parser = parse_permission)]
        permissions: Vec<String>,
        #[arg(long, default_value_t = 24)]
        ttl_hours: u64,
    },
    /// Revoke every authentication token a user holds.
    RevokeTokens {
        #[arg(long)]
        user: i64,
    },
}

/// Token lifetime for `issue-token --ttl-hours`.
pub fn token_ttl(hours: u64) -> Duration {
    Duration::from_secs(hours.saturating_mul(3600))
}

fn parse_permission(raw: &str) -> Result<String, String> {
    match raw {
        FOODS_READ | FOODS_WRITE => Ok(raw.to_string()),
        other => Err(format!(
            "unknown permission {other:?} (expected {FOODS_READ} or {FOODS_WRITE})"
        )),
    }
}

impl Cli {
    /// Load the config file (or defaults), apply flag overrides and
    /// validate the result.
    pub fn resolve_config(&self) -> Result<ApiConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => ApiConfig::default(),
        };
        self.apply_overrides(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    pub fn apply_overrides(&self, config: &mut ApiConfig) {
        if let Some(port) = self.port {
            config.listener.bind_address = match config.listener.bind_address.parse::<SocketAddr>() {
                Ok(mut addr) => {
                    addr.set_port(port);
                    addr.to_string()
                }
                Err(_) => format!("0.0.0.0:{port}"),
            };
        }
        if let Some(env) = &self.env {
            config.env = env.clone();
        }
        if let Some(path) = &self.db_path {
            config.database.path = path.clone();
        }
        if let Some(rps) = self.limiter_rps {
            config.rate_limit.requests_per_second = rps;
        }
        if let Some(burst) = self.limiter_burst {
            config.rate_limit.burst_size = burst;
        }
        if let Some(enabled) = self.limiter_enabled {
            config.rate_limit.enabled = enabled;
        }
        if let Some(json) = self.json_logs {
            config.observability.json_logs = json;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "foods-api",
            "--port",
            "8080",
            "--env",
            "staging",
            "--limiter-rps",
            "5",
            "--limiter-burst",
            "10",
            "--limiter-enabled",
            "false",
        ])
        .unwrap();
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.env, "staging");
        assert_eq!(config.rate_limit.requests_per_second, 5.0);
        assert_eq!(config.rate_limit.burst_size, 10);
        assert!(!config.rate_limit.enabled);
        assert!(cli.command.is_none());
    }

    #[test]
    fn flag_can_repair_a_file_value() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[rate_limit]\nburst_size = 0").unwrap();
        let path = file.path().to_str().unwrap();

        let unrepaired = Cli::try_parse_from(["foods-api", "--config", path]).unwrap();
        assert!(matches!(
            unrepaired.resolve_config(),
            Err(ConfigError::Validation(_))
        ));

        let repaired =
            Cli::try_parse_from(["foods-api", "--config", path, "--limiter-burst", "4"]).unwrap();
        assert_eq!(repaired.resolve_config().unwrap().rate_limit.burst_size, 4);
    }

    #[test]
    fn invalid_override_fails_validation() {
        let cli = Cli::try_parse_from(["foods-api", "--env", "moon"]).unwrap();
        assert!(matches!(cli.resolve_config(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn issue_token_requires_known_permissions() {
        let cli = Cli::try_parse_from([
            "foods-api",
            "issue-token",
            "--user",
            "3",
            "--permission",
            "foods:read",
            "--permission",
            "foods:write",
        ])
        .unwrap();
        match cli.command {
            Some(Command::IssueToken {
                user,
                permissions,
                ttl_hours,
            }) => {
                assert_eq!(user, 3);
                assert_eq!(permissions, vec!["foods:read", "foods:write"]);
                assert_eq!(ttl_hours, 24);
            }
            other => panic!("unexpected command {other:?}"),
        }

        assert!(Cli::try_parse_from([
            "foods-api",
            "issue-token",
            "--user",
            "3",
            "--permission",
            "foods:admin",
        ])
        .is_err());
    }
}
