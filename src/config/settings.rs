//! # Client Settings
//!
//! [`ClientConfig`] carries what the caller passed explicitly; every field is
//! optional. [`ClientConfig::resolve`] fills the gaps from `ZVAULT_*`
//! environment variables and built-in defaults, in that order, producing a
//! validated [`ResolvedConfig`].

use std::time::Duration;
use validator::{Validate, ValidationError};

use super::{
    DEFAULT_BASE_URL, DEFAULT_CACHE_TTL, DEFAULT_ENV, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BASE_DELAY,
    DEFAULT_TIMEOUT, ENV_BASE_URL, ENV_CACHE_TTL, ENV_DEBUG, ENV_DEFAULT_ENV, ENV_MAX_RETRIES,
    ENV_ORG_ID, ENV_PROJECT_ID, ENV_TIMEOUT, ENV_TOKEN, MAX_RETRY_BASE_DELAY,
};
use crate::secrets::{Result, SecretString, SecretsError};

/// Explicit client settings. Unset fields fall back to the environment, then defaults.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub token: Option<SecretString>,
    pub base_url: Option<String>,
    pub org_id: Option<String>,
    pub project_id: Option<String>,
    pub default_env: Option<String>,
    pub cache_ttl: Option<Duration>,
    pub timeout: Option<Duration>,
    pub max_retries: Option<u32>,
    pub retry_base_delay: Option<Duration>,
    pub debug: Option<bool>,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<SecretString>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_org_id(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_default_env(mut self, env: impl Into<String>) -> Self {
        self.default_env = Some(env.into());
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Delay before the first retry; later retries double it.
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = Some(delay);
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = Some(debug);
        self
    }

    /// Resolve against the process environment.
    pub fn resolve(self) -> Result<ResolvedConfig> {
        self.resolve_with(|name| std::env::var(name).ok())
    }

    /// Resolve against an arbitrary variable lookup.
    ///
    /// Empty strings, explicit or looked up, count as unset.
    pub fn resolve_with<F>(self, lookup: F) -> Result<ResolvedConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |name: &str| lookup(name).filter(|value| !value.is_empty());

        let token = self
            .token
            .filter(|token| !token.is_empty())
            .or_else(|| env(ENV_TOKEN).map(SecretString::from))
            .ok_or_else(|| {
                SecretsError::config_error(format!(
                    "Missing token: set {} or pass a token explicitly",
                    ENV_TOKEN
                ))
            })?;

        let base_url = non_empty(self.base_url)
            .or_else(|| env(ENV_BASE_URL))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let org_id = non_empty(self.org_id).or_else(|| env(ENV_ORG_ID)).unwrap_or_default();
        let project_id =
            non_empty(self.project_id).or_else(|| env(ENV_PROJECT_ID)).unwrap_or_default();
        let default_env = non_empty(self.default_env)
            .or_else(|| env(ENV_DEFAULT_ENV))
            .unwrap_or_else(|| DEFAULT_ENV.to_string());

        let cache_ttl = match self.cache_ttl {
            Some(ttl) => ttl,
            None => parse_var::<u64>(&env, ENV_CACHE_TTL)?
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_CACHE_TTL),
        };
        let timeout = match self.timeout {
            Some(timeout) => timeout,
            None => parse_var::<u64>(&env, ENV_TIMEOUT)?
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TIMEOUT),
        };
        let max_retries = match self.max_retries {
            Some(retries) => retries,
            None => parse_var::<u32>(&env, ENV_MAX_RETRIES)?.unwrap_or(DEFAULT_MAX_RETRIES),
        };
        let debug = match self.debug {
            Some(debug) => debug,
            None => env(ENV_DEBUG).map(|s| parse_flag(&s)).unwrap_or(false),
        };

        let resolved = ResolvedConfig {
            token,
            base_url,
            org_id,
            project_id,
            default_env,
            cache_ttl,
            timeout,
            max_retries,
            retry_base_delay: self.retry_base_delay.unwrap_or(DEFAULT_RETRY_BASE_DELAY),
            debug,
        };
        resolved.validate()?;
        Ok(resolved)
    }
}

/// Fully resolved client settings. Immutable once the client is built.
#[derive(Debug, Clone, Validate)]
pub struct ResolvedConfig {
    pub token: SecretString,

    #[validate(custom(function = "validate_base_url"))]
    pub base_url: String,

    /// May be empty; project-scoped operations check it at call time.
    pub org_id: String,

    /// May be empty; project-scoped operations check it at call time.
    pub project_id: String,

    #[validate(length(min = 1, message = "Default environment cannot be empty"))]
    pub default_env: String,

    #[validate(custom(function = "validate_cache_ttl"))]
    pub cache_ttl: Duration,

    #[validate(custom(function = "validate_timeout"))]
    pub timeout: Duration,

    #[validate(range(max = 10, message = "Max retries cannot exceed 10"))]
    pub max_retries: u32,

    #[validate(custom(function = "validate_retry_base_delay"))]
    pub retry_base_delay: Duration,

    pub debug: bool,
}

impl ResolvedConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(SecretsError::from)
    }

    /// Fails unless both org and project ids are set.
    pub fn require_project(&self) -> Result<()> {
        if self.org_id.is_empty() {
            return Err(SecretsError::config_error(format!(
                "Missing org_id: set {} or pass an org id explicitly",
                ENV_ORG_ID
            )));
        }
        if self.project_id.is_empty() {
            return Err(SecretsError::config_error(format!(
                "Missing project_id: set {} or pass a project id explicitly",
                ENV_PROJECT_ID
            )));
        }
        Ok(())
    }
}

fn validate_base_url(url: &str) -> std::result::Result<(), ValidationError> {
    if url.starts_with("https://") || url.starts_with("http://") {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_base_url")
            .with_message("Base URL must start with http:// or https://".into()))
    }
}

fn validate_cache_ttl(ttl: &Duration) -> std::result::Result<(), ValidationError> {
    if ttl.is_zero() {
        return Err(ValidationError::new("invalid_cache_ttl")
            .with_message("Cache TTL must be greater than zero".into()));
    }
    Ok(())
}

fn validate_timeout(timeout: &Duration) -> std::result::Result<(), ValidationError> {
    if timeout.is_zero() || *timeout > Duration::from_secs(300) {
        return Err(ValidationError::new("invalid_timeout")
            .with_message("Timeout must be between 1ms and 300 seconds".into()));
    }
    Ok(())
}

fn validate_retry_base_delay(delay: &Duration) -> std::result::Result<(), ValidationError> {
    if *delay > MAX_RETRY_BASE_DELAY {
        return Err(ValidationError::new("invalid_retry_base_delay")
            .with_message("Retry base delay cannot exceed 60 seconds".into()));
    }
    Ok(())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn parse_var<T: std::str::FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>> {
    match env(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| {
                SecretsError::config_error(format!("Invalid value for {}: '{}'", name, raw))
            }),
        None => Ok(None),
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
