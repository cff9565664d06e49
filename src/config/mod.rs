//! # Configuration Management
//!
//! Client settings resolve per field as: explicit argument, then `ZVAULT_*`
//! environment variable, then built-in default. The token has no default and
//! its absence is a [`ConfigError`](crate::SecretsError::ConfigError).

pub mod settings;

pub use settings::{ClientConfig, ResolvedConfig};

use std::time::Duration;

pub const ENV_TOKEN: &str = "ZVAULT_TOKEN";
pub const ENV_BASE_URL: &str = "ZVAULT_URL";
pub const ENV_ORG_ID: &str = "ZVAULT_ORG_ID";
pub const ENV_PROJECT_ID: &str = "ZVAULT_PROJECT_ID";
pub const ENV_DEFAULT_ENV: &str = "ZVAULT_ENV";
/// Cache TTL in whole seconds.
pub const ENV_CACHE_TTL: &str = "ZVAULT_CACHE_TTL";
/// Per-attempt request timeout in whole seconds.
pub const ENV_TIMEOUT: &str = "ZVAULT_TIMEOUT";
pub const ENV_MAX_RETRIES: &str = "ZVAULT_MAX_RETRIES";
pub const ENV_DEBUG: &str = "ZVAULT_DEBUG";

pub const DEFAULT_BASE_URL: &str = "https://api.zvault.cloud";
pub const DEFAULT_ENV: &str = "development";
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
/// Upper bound for the retry base delay.
pub const MAX_RETRY_BASE_DELAY: Duration = Duration::from_secs(60);
