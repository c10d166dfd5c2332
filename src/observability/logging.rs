//! Structured logging.
//!
//! JSON lines for production, pretty output for development. `RUST_LOG`
//! overrides the configured level when set. Everything goes to stderr;
//! stdout is reserved for command output such as issued tokens.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the global subscriber.
///
/// Safe to call more than once; later calls leave the first subscriber in
/// place.
pub fn init_logging(level: &str, json_format: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("foods_api={level},tower_http={level},axum::rejection=trace").into()
    });

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false)
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init()
    };

    if installed.is_ok() {
        tracing::info!(
            level = %level,
            format = if json_format { "json" } else { "pretty" },
            "Logging initialized"
        );
    }
}
