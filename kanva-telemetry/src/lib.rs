//! # kanva-telemetry
//!
//! Logging setup shared by every Kanva crate.
//!
//! - [`init_telemetry`] installs a `tracing` subscriber with an `EnvFilter`
//!   (defaults to `info`, overridable through `RUST_LOG`).
//! - [`init_json_telemetry`] does the same with JSON-formatted output.
//! - [`redact_sensitive`] scrubs provider error text before it is logged or
//!   surfaced, so credentials and permission details never leave the process.
//!
//! ```rust,ignore
//! kanva_telemetry::init_telemetry("kanva-cli")?;
//! tracing::info!(plan.id = "p-1", "analysis started");
//! ```

mod redact;

pub use redact::{REDACTED_NOTICE, is_sensitive, redact_sensitive};

use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter directive when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info";

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The `RUST_LOG` directive (or the supplied fallback) could not be parsed.
    #[error("invalid log filter: {0}")]
    InvalidFilter(String),

    /// A global subscriber has already been installed for this process.
    #[error("telemetry already initialised: {0}")]
    AlreadyInitialised(String),
}

fn env_filter(default_directive: &str) -> Result<EnvFilter, TelemetryError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default_directive)
            .map_err(|e| TelemetryError::InvalidFilter(e.to_string())),
    }
}

/// Install a human-readable subscriber for `service_name`.
///
/// Calling this twice returns [`TelemetryError::AlreadyInitialised`] instead of
/// panicking, so tests and embedding applications can call it freely.
pub fn init_telemetry(service_name: &str) -> Result<(), TelemetryError> {
    init_with_filter(service_name, DEFAULT_FILTER, false)
}

/// Install a JSON subscriber for `service_name`.
pub fn init_json_telemetry(service_name: &str) -> Result<(), TelemetryError> {
    init_with_filter(service_name, DEFAULT_FILTER, true)
}

/// Install a subscriber using `default_directive` when `RUST_LOG` is unset.
pub fn init_with_filter(
    service_name: &str,
    default_directive: &str,
    json: bool,
) -> Result<(), TelemetryError> {
    let filter = env_filter(default_directive)?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = if json {
        registry.with(fmt::layer().json().with_target(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    result.map_err(|e| TelemetryError::AlreadyInitialised(e.to_string()))?;
    tracing::debug!(service.name = service_name, json, "telemetry initialised");
    Ok(())
}
