//! FallSight Bridge Framework
//!
//! Common abstractions for running a bridge that relays device telemetry to
//! the dashboard.
//!
//! # Overview
//!
//! This framework provides:
//! - [`BridgeConfig`] trait for configuration loading and validation
//! - [`BridgeRunner`] for managing bridge lifecycle (startup, shutdown, signal handling)
//! - [`Shutdown`] for observing the process-wide stop signal at every suspension point
//! - [`BridgeArgs`] for common CLI argument parsing
//!
//! # Example
//!
//! ```ignore
//! use fallsight_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = Args::parse();
//!     let config = MyBridgeConfig::load_or_default(args.bridge.config.as_deref())?;
//!
//!     let mut runner = BridgeRunner::new_with_args("mybridge", config, Some(&args.bridge))?;
//!
//!     let shutdown = runner.shutdown();
//!     runner.spawn("worker", my_worker(shutdown));
//!
//!     // Run until Ctrl+C or SIGTERM
//!     runner.run().await
//! }
//! ```

mod args;
mod config;
mod error;
mod runner;
mod shutdown;

pub use args::BridgeArgs;
pub use config::{BridgeConfig, validate_dashboard};
pub use error::{BridgeError, Result};
pub use runner::{BridgeRunner, ShutdownReport, wait_for_stop_signal};
pub use shutdown::{Shutdown, ShutdownTrigger};

// Re-export commonly used types from fallsight-common
pub use fallsight_common::{DashboardConfig, LogFormat, LoggingConfig};
