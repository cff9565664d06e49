//! # Structured Logging
//!
//! The client only emits `tracing` events; installing a subscriber is left to
//! the host application. [`init_logging`] is a convenience for binaries and
//! scripts that have no subscriber of their own.
//!
//! With `debug` enabled, every HTTP attempt is logged at `trace` level with
//! method, URL, status and elapsed time.

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::ResolvedConfig;
use crate::secrets::{Result, SecretsError};

/// Subscriber options for [`init_logging`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default to `trace` for this crate instead of `info`.
    pub debug: bool,
    /// Emit one JSON object per line.
    pub json: bool,
}

impl LoggingConfig {
    pub fn from_client_config(config: &ResolvedConfig) -> Self {
        Self { debug: config.debug, json: false }
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    /// Filter directive used when `RUST_LOG` is unset.
    pub fn default_directive(&self) -> &'static str {
        if self.debug {
            "info,zvault_client=trace"
        } else {
            "info"
        }
    }
}

/// Create a tracing span around one client operation.
///
/// ```rust,ignore
/// let span = secrets_span!("get_all", env);
/// let span = secrets_span!("set", env, key = %key);
/// ```
#[macro_export]
macro_rules! secrets_span {
    ($operation:expr, $env:expr) => {
        tracing::debug_span!(
            "zvault_operation",
            operation = %$operation,
            env = %$env
        )
    };
    ($operation:expr, $env:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "zvault_operation",
            operation = %$operation,
            env = %$env,
            $($field)*
        )
    };
}

/// Install a global `fmt` subscriber honoring `RUST_LOG`.
///
/// # Errors
///
/// Returns [`SecretsError::ConfigError`] if the filter cannot be parsed or a
/// global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.is_empty() => EnvFilter::try_new(directives),
        _ => EnvFilter::try_new(config.default_directive()),
    }
    .map_err(|e| SecretsError::config_error(format!("Invalid log filter: {}", e)))?;

    let installed = if config.json {
        fmt().json().with_env_filter(filter).try_init()
    } else {
        fmt().with_env_filter(filter).try_init()
    };

    installed
        .map_err(|e| SecretsError::config_error(format!("Failed to install subscriber: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    #[test]
    fn test_macros_compile() {
        let env = "production";
        let key = "DATABASE_URL";
        let _span = secrets_span!("get_all", env);
        let _span = secrets_span!("set", env, key = %key);
    }

    #[test]
    fn test_default_directive_follows_debug() {
        assert_eq!(LoggingConfig::default().default_directive(), "info");
        let debug = LoggingConfig { debug: true, json: false };
        assert!(debug.default_directive().contains("zvault_client=trace"));
    }

    #[test]
    fn test_from_client_config() {
        let resolved = ClientConfig::new()
            .with_token("t")
            .with_debug(true)
            .resolve_with(|_| None)
            .unwrap();

        let config = LoggingConfig::from_client_config(&resolved).with_json(true);
        assert!(config.debug);
        assert!(config.json);
    }

    #[test]
    fn test_second_init_fails() {
        // Whichever call runs first may win; a second install is always rejected.
        let _ = init_logging(&LoggingConfig::default());
        assert!(init_logging(&LoggingConfig::default()).is_err());
    }
}
