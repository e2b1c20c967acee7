//! FallSight Common Library
//!
//! This crate provides shared types and utilities for the FallSight bridge:
//!
//! - [`event`] - Canonical event model (`Event`, `Payload`, `Origin`)
//! - [`link`] - Connection state of the bridge's transports
//! - [`frame`] - Outbound dashboard frames and their JSON encoding
//! - [`config`] - Configuration loading (JSON5 format)
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod event;
pub mod frame;
pub mod link;

// Re-export commonly used types at the crate root
pub use config::{DashboardConfig, LogFormat, LoggingConfig, load_config, parse_config};
pub use error::{Error, Result};
pub use event::{
    Environment, Event, EventKind, FallAlert, IdentifyAck, Origin, Payload, SENSOR_SENTINEL,
    SensorReading, Severity, StatusUpdate, Vector3,
};
pub use frame::{Frame, FrameContext, decode, encode};
pub use link::{Connections, LinkState};

/// Initialize tracing with the given configuration.
///
/// `RUST_LOG` takes precedence over the configured level when set.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(fmt::layer())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(fmt::layer().json())
                .with(filter)
                .try_init()
                .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))?;
        }
    }

    Ok(())
}
