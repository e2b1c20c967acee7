//! Bridge runner for lifecycle management.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

use fallsight_common::{LoggingConfig, init_tracing};

use crate::BridgeArgs;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::shutdown::{Shutdown, ShutdownTrigger};

/// Bridge runner that manages the lifecycle of the bridge.
///
/// Handles:
/// - Logging initialization
/// - Task spawning and management
/// - Graceful shutdown on Ctrl+C or SIGTERM, bounded by the configured timeout
///
/// # Example
///
/// ```ignore
/// use fallsight_bridge_framework::{BridgeConfig, BridgeRunner};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let config = MyBridgeConfig::load_or_default(None)?;
///     let mut runner = BridgeRunner::new_with_args("mybridge", config, None)?;
///
///     let shutdown = runner.shutdown();
///     runner.spawn("worker", async move {
///         // Worker logic here, racing `shutdown.triggered()`
///     });
///
///     runner.run().await?;
///     Ok(())
/// }
/// ```
pub struct BridgeRunner<C: BridgeConfig> {
    /// Bridge name for logging.
    name: String,
    /// Bridge version.
    version: String,
    /// The loaded configuration.
    config: C,
    /// Stop signal shared with every worker.
    trigger: ShutdownTrigger,
    /// Spawned tasks.
    tasks: Vec<(String, JoinHandle<()>)>,
}

/// Outcome of the bounded teardown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Workers that finished on their own.
    pub stopped: Vec<String>,
    /// Workers still running at the deadline, aborted.
    pub aborted: Vec<String>,
}

impl<C: BridgeConfig> BridgeRunner<C> {
    /// Create a runner without touching the global tracing subscriber.
    pub fn new(name: impl Into<String>, config: C) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            config,
            trigger: ShutdownTrigger::new(),
            tasks: Vec::new(),
        }
    }

    /// Create a new bridge runner, initializing logging from the config
    /// with an optional CLI log level override.
    pub fn new_with_args(
        name: impl Into<String>,
        config: C,
        args: Option<&BridgeArgs>,
    ) -> Result<Self> {
        let log_config = match args.and_then(|a| a.log_level.as_ref()) {
            Some(level) => LoggingConfig {
                level: level.clone(),
                ..config.logging().clone()
            },
            None => config.logging().clone(),
        };

        init_tracing(&log_config).map_err(|e| BridgeError::config(e.to_string()))?;

        let runner = Self::new(name, config);
        tracing::info!(bridge = %runner.name, version = %runner.version, "Starting bridge");

        Ok(runner)
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &C {
        &self.config
    }

    /// Get a new observer of the stop signal.
    pub fn shutdown(&self) -> Shutdown {
        self.trigger.subscribe()
    }

    /// Spawn a worker task.
    ///
    /// The task is expected to return once the stop signal fires; it is
    /// aborted if it is still running when the shutdown timeout expires.
    pub fn spawn<F>(&mut self, name: impl Into<String>, future: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        self.tasks.push((name.into(), handle));
    }

    /// Run the bridge until Ctrl+C or SIGTERM is received.
    pub async fn run(self) -> Result<()> {
        self.run_until(wait_for_stop_signal()).await?;
        Ok(())
    }

    /// Run the bridge until `stop` resolves, then tear down.
    ///
    /// This will:
    /// 1. Wait for `stop`
    /// 2. Raise the stop signal for every worker
    /// 3. Join workers until the shutdown timeout, aborting the rest
    pub async fn run_until<F>(self, stop: F) -> Result<ShutdownReport>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(
            bridge = %self.name,
            tasks = self.tasks.len(),
            "Bridge running. Press Ctrl+C to stop."
        );

        stop.await;

        tracing::info!(bridge = %self.name, "Received shutdown signal");
        self.trigger.trigger();

        let report = join_with_deadline(self.tasks, self.config.shutdown_timeout()).await;

        if !report.aborted.is_empty() {
            tracing::warn!(
                aborted = ?report.aborted,
                "Workers did not stop before the shutdown timeout"
            );
        }

        tracing::info!(bridge = %self.name, "Goodbye!");

        Ok(report)
    }
}

async fn join_with_deadline(
    tasks: Vec<(String, JoinHandle<()>)>,
    timeout: Duration,
) -> ShutdownReport {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut report = ShutdownReport::default();

    for (name, mut handle) in tasks {
        match tokio::time::timeout_at(deadline, &mut handle).await {
            Ok(Ok(())) => {
                tracing::debug!(worker = %name, "Worker stopped");
                report.stopped.push(name);
            }
            Ok(Err(e)) => {
                tracing::warn!(worker = %name, error = %e, "Worker ended abnormally");
                report.stopped.push(name);
            }
            Err(_) => {
                handle.abort();
                report.aborted.push(name);
            }
        }
    }

    report
}

/// Resolve on Ctrl+C, or SIGTERM on unix.
pub async fn wait_for_stop_signal() {
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => tracing::info!("Received Ctrl+C, shutting down..."),
                Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C"),
            }
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DashboardConfig;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct TestConfig {
        #[serde(default)]
        dashboard: DashboardConfig,
        #[serde(default)]
        logging: LoggingConfig,
    }

    impl BridgeConfig for TestConfig {
        fn dashboard(&self) -> &DashboardConfig {
            &self.dashboard
        }

        fn logging(&self) -> &LoggingConfig {
            &self.logging
        }

        fn shutdown_timeout(&self) -> Duration {
            Duration::from_millis(200)
        }
    }

    fn runner() -> BridgeRunner<TestConfig> {
        BridgeRunner::new("test", TestConfig::load_or_default(None).unwrap())
    }

    #[tokio::test]
    async fn test_workers_observe_stop_signal() {
        let mut runner = runner();

        let mut shutdown = runner.shutdown();
        runner.spawn("cooperative", async move {
            shutdown.triggered().await;
        });

        let report = runner.run_until(async {}).await.unwrap();
        assert_eq!(report.stopped, vec!["cooperative".to_string()]);
        assert!(report.aborted.is_empty());
    }

    #[tokio::test]
    async fn test_stuck_worker_is_aborted_at_deadline() {
        let mut runner = runner();

        runner.spawn("stuck", std::future::pending::<()>());
        let mut shutdown = runner.shutdown();
        runner.spawn("cooperative", async move {
            shutdown.triggered().await;
        });

        let started = tokio::time::Instant::now();
        let report = runner.run_until(async {}).await.unwrap();

        assert_eq!(report.aborted, vec!["stuck".to_string()]);
        assert_eq!(report.stopped, vec!["cooperative".to_string()]);
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
