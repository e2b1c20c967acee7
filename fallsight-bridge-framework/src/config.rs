//! Configuration traits and utilities.

use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::{BridgeError, Result};
use crate::{DashboardConfig, LoggingConfig};

/// Trait for bridge configuration types.
///
/// Implement this trait for your bridge's configuration struct to get
/// automatic loading, validation, and access to common config fields.
///
/// # Example
///
/// ```ignore
/// use serde::Deserialize;
/// use fallsight_bridge_framework::{BridgeConfig, DashboardConfig, LoggingConfig};
///
/// #[derive(Debug, Deserialize)]
/// pub struct MyBridgeConfig {
///     #[serde(default)]
///     pub dashboard: DashboardConfig,
///     #[serde(default)]
///     pub logging: LoggingConfig,
/// }
///
/// impl BridgeConfig for MyBridgeConfig {
///     fn dashboard(&self) -> &DashboardConfig {
///         &self.dashboard
///     }
///
///     fn logging(&self) -> &LoggingConfig {
///         &self.logging
///     }
/// }
/// ```
pub trait BridgeConfig: Sized + DeserializeOwned {
    /// Get the dashboard connection configuration.
    fn dashboard(&self) -> &DashboardConfig;

    /// Get the logging configuration.
    fn logging(&self) -> &LoggingConfig;

    /// Upper bound on the orderly teardown after a stop signal.
    fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    /// Validate the configuration.
    ///
    /// Called automatically after loading. Override to add custom validation.
    fn validate(&self) -> Result<()> {
        validate_dashboard(self.dashboard())
    }

    /// Load configuration from a file path.
    ///
    /// Supports JSON5 format. Calls [`validate`](Self::validate) after loading.
    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BridgeError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_json5(&content)
    }

    /// Parse and validate configuration from a JSON5 string.
    fn from_json5(content: &str) -> Result<Self> {
        let config: Self = json5::from_str(content)?;

        config.validate()?;

        Ok(config)
    }

    /// Load from `path` when given, otherwise fall back to built-in defaults.
    fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Self::from_json5("{}"),
        }
    }
}

/// Checks shared by every bridge: the dashboard endpoint must be a plain
/// `ws://` URL (the outbound channel carries no TLS).
pub fn validate_dashboard(dashboard: &DashboardConfig) -> Result<()> {
    if !dashboard.url.starts_with("ws://") {
        return Err(BridgeError::validation(format!(
            "dashboard.url must be a ws:// URL, got '{}'",
            dashboard.url
        )));
    }
    if dashboard.retry_delay_secs == 0 {
        return Err(BridgeError::validation(
            "dashboard.retry_delay_secs must be greater than zero",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
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
    }

    #[test]
    fn test_config_not_found() {
        let result = TestConfig::load("/nonexistent/path.json5");
        assert!(matches!(result, Err(BridgeError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_load_or_default_without_path() {
        let config = TestConfig::load_or_default(None).unwrap();
        assert_eq!(config.dashboard.url, "ws://localhost:8080");
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_rejects_non_websocket_url() {
        let result = TestConfig::from_json5(r#"{ dashboard: { url: "http://localhost:8080" } }"#);
        assert!(matches!(result, Err(BridgeError::ConfigValidation(_))));
    }

    #[test]
    fn test_parse_error() {
        let result = TestConfig::from_json5("{ dashboard: ");
        assert!(matches!(result, Err(BridgeError::ConfigParse(_))));
    }
}
