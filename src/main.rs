//! Foods API server binary.
//!
//! # Startup Order
//! ```text
//! parse flags → load + validate config → logging → metrics (optional)
//!     → open store → bind listener → signal listener → serve
//! ```
//!
//! Exit codes: 0 clean stop, 1 shutdown failure, 2 startup failure.

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use foods_api::cli::{token_ttl, Cli, Command, EXIT_SHUTDOWN_FAILURE, EXIT_STARTUP_FAILURE};
use foods_api::config::ApiConfig;
use foods_api::data::SqliteStore;
use foods_api::lifecycle::{spawn_signal_listener, ShutdownCoordinator};
use foods_api::net;
use foods_api::observability::{init_logging, init_metrics};
use foods_api::security::identity::SCOPE_AUTHENTICATION;
use foods_api::ApiServer;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.resolve_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("foods-api: configuration error: {err}");
            return ExitCode::from(EXIT_STARTUP_FAILURE);
        }
    };

    init_logging(&config.observability.log_level, config.observability.json_logs);

    let store = match SqliteStore::open(&config.database) {
        Ok(store) => Arc::new(store),
        Err(err) => {
            tracing::error!(error = %err, path = %config.database.path, "Failed to open database");
            return ExitCode::from(EXIT_STARTUP_FAILURE);
        }
    };

    match cli.command.clone().unwrap_or(Command::Serve) {
        Command::Serve => serve(config, store).await,
        Command::IssueToken {
            user,
            permissions,
            ttl_hours,
        } => match store.issue_token(user, token_ttl(ttl_hours), permissions).await {
            Ok(token) => {
                println!("{token}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                tracing::error!(error = %err, user, "Failed to issue token");
                ExitCode::FAILURE
            }
        },
        Command::RevokeTokens { user } => {
            match store.delete_tokens_for_user(user, SCOPE_AUTHENTICATION).await {
                Ok(revoked) => {
                    tracing::info!(user, revoked, "Tokens revoked");
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    tracing::error!(error = %err, user, "Failed to revoke tokens");
                    ExitCode::FAILURE
                }
            }
        }
    }
}

async fn serve(config: ApiConfig, store: Arc<SqliteStore>) -> ExitCode {
    tracing::info!(
        env = %config.env,
        bind_address = %config.listener.bind_address,
        rate_limit_enabled = config.rate_limit.enabled,
        requests_per_second = config.rate_limit.requests_per_second,
        burst_size = config.rate_limit.burst_size,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let started = config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .map_err(|err| err.to_string())
            .and_then(|addr| init_metrics(addr).map_err(|err| err.to_string()));
        if let Err(err) = started {
            tracing::error!(
                error = %err,
                metrics_address = %config.observability.metrics_address,
                "Failed to start metrics exporter"
            );
            return ExitCode::from(EXIT_STARTUP_FAILURE);
        }
    }

    let listener = match net::bind(&config.listener).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(error = %err, "Failed to bind listener");
            return ExitCode::from(EXIT_STARTUP_FAILURE);
        }
    };

    let coordinator = ShutdownCoordinator::new(config.timeouts.shutdown_drain());
    spawn_signal_listener(coordinator.clone());

    let server = ApiServer::new(config, store, coordinator.clone());
    match server.run(listener).await {
        Ok(()) => {
            tracing::info!(cause = ?coordinator.cause(), "Stopped server");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "Shutdown failed");
            ExitCode::from(EXIT_SHUTDOWN_FAILURE)
        }
    }
}
