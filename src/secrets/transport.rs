//! HTTP transport for the ZVault API.
//!
//! Every request goes through [`Transport::send`], which runs the retry state
//! machine:
//!
//! - **success**: any 2xx. A 204 or empty body decodes from JSON `null`.
//! - **fatal**: 401/403 ([`SecretsError::AuthenticationFailed`]), 404 and any
//!   other status the [`RetryPolicy`] does not consider transient
//!   ([`SecretsError::Api`]). Raised on the first attempt.
//! - **retryable**: the policy's status set (429, 500, 502, 503, 504 by
//!   default) and transport failures. Retried up to `max_retries` extra times,
//!   then the last error is raised.
//!
//! Timeouts apply per attempt. There is no deadline across attempts.

use rand::Rng;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};
use url::Url;

use super::error::{is_retryable_status, Result, SecretsError};
use super::types::{ApiErrorBody, SecretString};
use crate::config::ResolvedConfig;

/// API prefix shared by every endpoint.
const API_PREFIX: [&str; 2] = ["v1", "cloud"];

/// Retry behavior for transient failures.
///
/// The delay before retry `n` (0-indexed) is `base_delay * 2^n` plus a random
/// jitter of up to `jitter_ratio` of that value.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound of the jitter, as a fraction of the exponential delay.
    pub jitter_ratio: f64,
    /// Which HTTP statuses count as transient.
    pub retryable_status: fn(StatusCode) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            jitter_ratio: 0.3,
            retryable_status: is_retryable_status,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self { max_retries, base_delay, ..Self::default() }
    }

    /// Exponential delay for a retry index, without jitter.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor)
    }

    /// Delay for a retry index, with jitter drawn from the thread RNG.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let sample: f64 = rand::thread_rng().gen();
        self.jittered(attempt, sample)
    }

    /// Delay for a retry index given a jitter sample in `[0, 1)`.
    pub fn jittered(&self, attempt: u32, sample: f64) -> Duration {
        let backoff = self.backoff_for_attempt(attempt);
        let jitter = backoff.mul_f64(self.jitter_ratio * sample.clamp(0.0, 1.0));
        backoff.saturating_add(jitter)
    }

    /// Whether another attempt should follow `error` after `attempt` retries.
    pub fn should_retry(&self, error: &SecretsError, attempt: u32) -> bool {
        attempt < self.max_retries && error.is_transient(self.retryable_status)
    }
}

/// Authenticated HTTP session bound to one ZVault deployment.
#[derive(Debug)]
pub struct Transport {
    client: Client,
    base_url: Url,
    token: SecretString,
    retry: RetryPolicy,
    verbose: bool,
}

impl Transport {
    /// Build the HTTP session from resolved configuration.
    pub fn new(config: &ResolvedConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            SecretsError::config_error(format!("Invalid base URL '{}': {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(SecretsError::config_error(format!(
                "Base URL '{}' cannot carry a path",
                config.base_url
            )));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(crate::USER_AGENT)
            .build()
            .map_err(|e| {
                SecretsError::config_error(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url,
            token: config.token.clone(),
            retry: RetryPolicy::new(config.max_retries, config.retry_base_delay),
            verbose: config.debug,
        })
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Absolute URL for an API path given as raw segments.
    ///
    /// Each segment is percent-encoded on its own, so a key containing `/`
    /// or spaces stays a single path segment.
    pub fn url_for(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(API_PREFIX).extend(segments);
        }
        url
    }

    pub async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        self.send::<(), T>(Method::GET, segments, None).await
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> Result<T> {
        self.send(Method::PUT, segments, Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        self.send::<(), T>(Method::DELETE, segments, None).await
    }

    /// Send a request, retrying transient failures per the [`RetryPolicy`].
    pub async fn send<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<T> {
        let url = self.url_for(segments);
        let mut attempt = 0;

        loop {
            match self.attempt(method.clone(), &url, body).await {
                Ok(value) => return Ok(value),
                Err(err) if self.retry.should_retry(&err, attempt) => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        method = %method,
                        path = %url.path(),
                        attempt = attempt + 1,
                        max_retries = self.retry.max_retries,
                        backoff_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying ZVault request after backoff"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    debug!(
                        method = %method,
                        path = %url.path(),
                        attempts = attempt + 1,
                        error = %err,
                        "ZVault request failed"
                    );
                    return Err(err);
                }
            }
        }
    }

    /// Single authenticated GET of `segments`, no retry. `true` only on HTTP 200.
    pub async fn probe(&self, segments: &[&str]) -> bool {
        let url = self.url_for(segments);
        match self.client.get(url.clone()).bearer_auth(self.token.expose_secret()).send().await {
            Ok(response) => {
                let status = response.status();
                if self.verbose {
                    trace!(path = %url.path(), status = %status, "Health probe response");
                }
                status == StatusCode::OK
            }
            Err(e) => {
                debug!(path = %url.path(), error = %e, "Health probe failed");
                false
            }
        }
    }

    async fn attempt<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        url: &Url,
        body: Option<&B>,
    ) -> Result<T> {
        let started = Instant::now();
        let mut request = self
            .client
            .request(method.clone(), url.clone())
            .bearer_auth(self.token.expose_secret());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        if self.verbose {
            trace!(
                method = %method,
                path = %url.path(),
                status = %status,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "ZVault response"
            );
        }

        if status.is_success() {
            if status == StatusCode::NO_CONTENT || text.trim().is_empty() {
                return Ok(serde_json::from_value(serde_json::Value::Null)?);
            }
            return Ok(serde_json::from_str(&text)?);
        }

        let message = ApiErrorBody::message_from(&text)
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
        Err(SecretsError::from_status(status, message))
    }
}

/// Classify a reqwest failure that produced no usable HTTP response.
fn transport_error(error: reqwest::Error) -> SecretsError {
    if error.is_timeout() {
        SecretsError::timeout(error.to_string())
    } else {
        SecretsError::api(0, error.to_string())
    }
}
