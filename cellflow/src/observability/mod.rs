//! Logging setup and span helpers.
//!
//! The library only emits `tracing` events; installing a subscriber is the
//! caller's choice. [`init_logging`] is a ready-made one for binaries and
//! scripts.

mod spans;

pub use spans::{run_span, stage_span, SpanTimer};

use crate::errors::CellflowError;
use serde::{Deserialize, Serialize};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_FILTER: &str = "info";

/// Output format of [`init_logging`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Installs a global subscriber filtered by `RUST_LOG`.
///
/// # Errors
///
/// Returns [`CellflowError::Logging`] if a global subscriber is already
/// installed.
pub fn init_logging(format: LogFormat) -> Result<(), CellflowError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    let result = match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer().with_target(true)).try_init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .try_init(),
    };
    result.map_err(|e| CellflowError::Logging(e.to_string()))
}
