//! Structured logging setup using the `tracing` ecosystem.
//!
//! All output goes to stdout, either human-readable or as JSON lines.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{KpError, KpResult};

/// Targets that belong to this application.
const APP_TARGETS: &[&str] = &[
    "kp_core",
    "kp_api",
    "kp_socket",
    "kp_services",
    "keep_presence",
];

/// Filter directives for a configured level.
///
/// `debug` and `trace` apply to the application's own targets only, so the
/// HTTP and WebSocket stacks stay at `info`.
fn directives(level: &str) -> String {
    let level = level.trim().to_ascii_lowercase();
    if level != "debug" && level != "trace" {
        return level;
    }

    let mut directives = String::from("info");
    for target in APP_TARGETS {
        directives.push_str(&format!(",{target}={level}"));
    }
    directives
}

/// Build the level filter. `RUST_LOG` wins over the configured level.
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directives(level)))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global tracing subscriber.
///
/// # Arguments
/// * `level` - Log level string: "trace", "debug", "info", "warn", "error"
/// * `json_output` - If true, emit one JSON object per line
pub fn init_logging(level: &str, json_output: bool) -> KpResult<()> {
    let registry = tracing_subscriber::registry().with(env_filter(level));

    let result = if json_output {
        registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stdout)
                    .json()
                    .with_target(true)
                    .with_current_span(false),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stdout)
                    .with_target(false)
                    .with_thread_ids(false)
                    .compact(),
            )
            .try_init()
    };

    result.map_err(|e| KpError::Config(format!("failed to initialize logging: {e}")))?;

    tracing::debug!("logging initialized at level={level}, json={json_output}");
    Ok(())
}

/// Initialize a minimal console-only logger for tests. Repeated calls are no-ops.
pub fn init_test_logging() {
    let _ = tracing_subscriber::registry()
        .with(env_filter("debug"))
        .with(fmt::layer().with_test_writer().compact())
        .try_init();
}
