//! The ZVault secrets client.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;
use tracing::{debug, info, warn, Instrument};

use super::cache::SecretCache;
use super::error::{Result, SecretsError};
use super::transport::Transport;
use super::types::{
    HealthStatus, PutSecretRequest, SecretEntry, SecretKey, SecretKeysResponse, SecretResponse,
};
use crate::config::{ClientConfig, ResolvedConfig};

/// Identity endpoint used by [`SecretsClient::healthy`].
const IDENTITY_PATH: [&str; 1] = ["me"];

/// Client for one ZVault org/project scope.
///
/// Owns its HTTP session, its per-environment cache, and its retry policy.
/// Share it across tasks behind an `Arc`; the cache is guarded by a single
/// lock and nothing else is mutable.
///
/// Call [`SecretsClient::close`] on shutdown. After closing, every operation
/// that needs the network returns [`SecretsError::Closed`].
///
/// # Example
///
/// ```rust,no_run
/// use zvault_client::{ClientConfig, SecretsClient};
///
/// # async fn run() -> zvault_client::Result<()> {
/// let client = SecretsClient::new(
///     ClientConfig::new().with_org_id("acme").with_project_id("billing"),
/// )?;
///
/// let secrets = client.get_all(Some("production")).await?;
/// let db_url = client.get("DATABASE_URL", Some("production")).await?;
/// # let _ = (secrets, db_url);
///
/// client.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SecretsClient {
    config: ResolvedConfig,
    transport: RwLock<Option<Arc<Transport>>>,
    cache: SecretCache,
}

impl SecretsClient {
    /// Build a client, filling unset fields from `ZVAULT_*` environment variables.
    ///
    /// # Errors
    ///
    /// - [`SecretsError::ConfigError`] if no token is available
    /// - [`SecretsError::Validation`] if a setting is out of range
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::from_resolved(config.resolve()?)
    }

    /// Build a client entirely from `ZVAULT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::default())
    }

    /// Build a client from already-resolved settings.
    pub fn from_resolved(config: ResolvedConfig) -> Result<Self> {
        let transport = Transport::new(&config)?;
        let cache = SecretCache::new(config.cache_ttl);

        info!(
            base_url = %config.base_url,
            org_id = %config.org_id,
            project_id = %config.project_id,
            default_env = %config.default_env,
            cache_ttl_secs = config.cache_ttl.as_secs(),
            max_retries = config.max_retries,
            "ZVault client initialized"
        );

        Ok(Self { config, transport: RwLock::new(Some(Arc::new(transport))), cache })
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn default_env(&self) -> &str {
        &self.config.default_env
    }

    /// Fetch every secret in an environment as a key → value map.
    ///
    /// Served from cache while the environment's last full fetch is unexpired.
    /// Otherwise lists the keys and fetches each value. Keys that fail with an
    /// API error (typically deleted between listing and fetch) are skipped.
    ///
    /// If the fetch fails and anything is cached for the environment, the
    /// cached map is returned even when expired.
    ///
    /// # Errors
    ///
    /// - [`SecretsError::ConfigError`] if org or project id is missing
    /// - the underlying fetch error when nothing is cached for `env`
    pub async fn get_all(&self, env: Option<&str>) -> Result<HashMap<String, String>> {
        let env = self.resolve_env(env);
        self.config.require_project()?;

        if let Some(secrets) = self.cache.get_complete(&env).await {
            return Ok(secrets);
        }

        match self.fetch_and_cache(&env).await {
            Ok(secrets) => Ok(secrets),
            Err(err) => match self.cache.get_stale(&env).await {
                Some(stale) => {
                    warn!(
                        env = %env,
                        count = stale.len(),
                        error = %err,
                        "ZVault unreachable, serving cached secrets"
                    );
                    Ok(stale)
                }
                None => Err(err),
            },
        }
    }

    /// Re-fetch an environment regardless of cache freshness.
    ///
    /// Unlike [`SecretsClient::get_all`], errors are returned, never masked
    /// by cached data.
    pub async fn refresh(&self, env: Option<&str>) -> Result<HashMap<String, String>> {
        let env = self.resolve_env(env);
        self.config.require_project()?;
        self.fetch_and_cache(&env).await
    }

    /// Fetch a single secret value.
    ///
    /// A value cached for an unexpired environment is returned without any
    /// network access.
    ///
    /// # Errors
    ///
    /// - [`SecretsError::NotFound`] if the service has no such key
    /// - [`SecretsError::AuthenticationFailed`] on 401/403
    /// - [`SecretsError::Api`] / [`SecretsError::Timeout`] once retries are exhausted
    pub async fn get(&self, key: &str, env: Option<&str>) -> Result<String> {
        let env = self.resolve_env(env);
        self.config.require_project()?;

        if let Some(value) = self.cache.get_key(&env, key).await {
            debug!(key = %key, env = %env, "Cache hit for secret");
            return Ok(value);
        }

        debug!(key = %key, env = %env, "Cache miss, fetching secret");
        let transport = self.transport().await?;
        let fetched = transport.get::<SecretResponse>(&self.secret_path(&env, key)).await;
        match fetched {
            Ok(resp) => {
                let value = resp.secret.value;
                self.store_key(&env, key, value.clone()).await;
                Ok(value)
            }
            Err(SecretsError::Api { status: 404, .. }) => Err(SecretsError::not_found(key, env)),
            Err(err) => Err(err),
        }
    }

    /// List key metadata for an environment, in service order. Never cached.
    pub async fn list_keys(&self, env: Option<&str>) -> Result<Vec<SecretKey>> {
        let env = self.resolve_env(env);
        self.config.require_project()?;

        let transport = self.transport().await?;
        let listing: SecretKeysResponse = transport.get(&self.secrets_path(&env)).await?;
        Ok(listing.keys)
    }

    /// Create or update a secret. Always written to the service.
    ///
    /// On success the value is merged into the environment's cache and the
    /// service's entry (with its assigned version and timestamps) is returned.
    pub async fn set(
        &self,
        key: &str,
        value: &str,
        env: Option<&str>,
        comment: Option<&str>,
    ) -> Result<SecretEntry> {
        let env = self.resolve_env(env);
        self.config.require_project()?;

        let transport = self.transport().await?;
        let body = PutSecretRequest { value, comment: comment.unwrap_or_default() };
        let resp: SecretResponse = transport.put(&self.secret_path(&env, key), &body).await?;

        self.store_key(&env, key, value.to_string()).await;
        info!(key = %key, env = %env, version = resp.secret.version, "Stored secret in ZVault");
        Ok(resp.secret)
    }

    /// Delete a secret from the service.
    ///
    /// The key is NOT evicted from the local cache: `get` may keep returning
    /// the old value until the environment's TTL runs out.
    pub async fn delete(&self, key: &str, env: Option<&str>) -> Result<()> {
        let env = self.resolve_env(env);
        self.config.require_project()?;

        let transport = self.transport().await?;
        transport.delete::<serde_json::Value>(&self.secret_path(&env, key)).await?;

        info!(key = %key, env = %env, "Deleted secret from ZVault");
        Ok(())
    }

    /// Copy every secret of an environment into the process environment.
    ///
    /// Variables that already exist are left alone unless `overwrite` is set.
    /// Keys that cannot be environment variable names (empty, or containing
    /// `=` or NUL) are skipped. Returns how many variables were written.
    pub async fn inject_into_env(&self, env: Option<&str>, overwrite: bool) -> Result<usize> {
        let secrets = self.get_all(env).await?;

        let mut written = 0;
        for (key, value) in &secrets {
            if !is_valid_env_name(key) || value.contains('\0') {
                warn!(key = %key, "Skipping secret that is not a valid environment variable");
                continue;
            }
            if !overwrite && std::env::var_os(key).is_some() {
                continue;
            }
            std::env::set_var(key, value);
            written += 1;
        }

        info!(
            written = written,
            total = secrets.len(),
            "Injected secrets into process environment"
        );
        Ok(written)
    }

    /// Probe the service and report cache state. Never fails.
    pub async fn healthy(&self) -> HealthStatus {
        let started = Instant::now();
        let reachable = match self.transport().await {
            Ok(transport) => {
                transport
                    .probe(&IDENTITY_PATH)
                    .instrument(tracing::debug_span!("health_probe"))
                    .await
            }
            Err(_) => false,
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        HealthStatus {
            reachable,
            latency_ms,
            cached_secrets: self.cache.fresh_secret_count().await,
            last_refresh: self.cache.last_refresh().await,
        }
    }

    /// Drop all cached secrets. The next read goes to the service.
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    /// Number of cached secrets across environments, expired ones included.
    pub async fn cache_size(&self) -> usize {
        self.cache.len().await
    }

    /// Release the HTTP session and clear the cache. Safe to call repeatedly.
    ///
    /// Requests already in flight still complete and return their result,
    /// but nothing they fetched is cached.
    pub async fn close(&self) {
        let released = self.transport.write().await.take().is_some();
        self.cache.clear().await;
        if released {
            info!("ZVault client closed");
        }
    }

    pub async fn is_closed(&self) -> bool {
        self.transport.read().await.is_none()
    }

    async fn fetch_and_cache(&self, env: &str) -> Result<HashMap<String, String>> {
        let span = crate::secrets_span!("get_all", env);
        let secrets = self.fetch_all(env).instrument(span).await?;

        self.store_environment(env, secrets.clone()).await;
        info!(env = %env, count = secrets.len(), "Fetched secrets from ZVault");
        Ok(secrets)
    }

    async fn fetch_all(&self, env: &str) -> Result<HashMap<String, String>> {
        let transport = self.transport().await?;
        let listing: SecretKeysResponse = transport.get(&self.secrets_path(env)).await?;

        let mut secrets = HashMap::with_capacity(listing.keys.len());
        for entry in &listing.keys {
            match transport.get::<SecretResponse>(&self.secret_path(env, &entry.key)).await {
                Ok(resp) => {
                    secrets.insert(resp.secret.key, resp.secret.value);
                }
                Err(err @ SecretsError::Api { .. }) => {
                    warn!(
                        key = %entry.key,
                        env = %env,
                        error = %err,
                        "Skipping secret that could not be fetched"
                    );
                }
                Err(err) => return Err(err),
            }
        }
        Ok(secrets)
    }

    // Cache writes hold the transport read lock so that a concurrent `close`
    // either precedes them (nothing is written) or clears them afterwards.

    async fn store_key(&self, env: &str, key: &str, value: String) {
        let transport = self.transport.read().await;
        if transport.is_some() {
            self.cache.merge_key(env, key, value).await;
        }
    }

    async fn store_environment(&self, env: &str, secrets: HashMap<String, String>) {
        let transport = self.transport.read().await;
        if transport.is_some() {
            self.cache.replace(env, secrets).await;
        }
    }

    async fn transport(&self) -> Result<Arc<Transport>> {
        self.transport.read().await.clone().ok_or(SecretsError::Closed)
    }

    fn resolve_env(&self, env: Option<&str>) -> String {
        match env {
            Some(env) if !env.is_empty() => env.to_string(),
            _ => self.config.default_env.clone(),
        }
    }

    fn secrets_path<'a>(&'a self, env: &'a str) -> Vec<&'a str> {
        vec![
            "orgs",
            &self.config.org_id,
            "projects",
            &self.config.project_id,
            "envs",
            env,
            "secrets",
        ]
    }

    fn secret_path<'a>(&'a self, env: &'a str, key: &'a str) -> Vec<&'a str> {
        let mut path = self.secrets_path(env);
        path.push(key);
        path
    }
}

fn is_valid_env_name(key: &str) -> bool {
    !key.is_empty() && !key.contains('=') && !key.contains('\0')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tracing_test::traced_test;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> SecretsClient {
        let config = ClientConfig::new()
            .with_token("zv_test")
            .with_base_url(server.uri())
            .with_org_id("acme")
            .with_project_id("billing")
            .with_default_env("production")
            .with_cache_ttl(Duration::from_millis(50))
            .with_max_retries(0)
            .resolve_with(|_| None)
            .unwrap();
        SecretsClient::from_resolved(config).unwrap()
    }

    #[test]
    fn test_secret_path_layout() {
        let config = ClientConfig::new()
            .with_token("t")
            .with_org_id("acme")
            .with_project_id("billing")
            .resolve_with(|_| None)
            .unwrap();
        let client = SecretsClient::from_resolved(config).unwrap();

        assert_eq!(
            client.secret_path("staging", "API_KEY"),
            vec!["orgs", "acme", "projects", "billing", "envs", "staging", "secrets", "API_KEY"]
        );
        assert_eq!(client.resolve_env(None), "development");
        assert_eq!(client.resolve_env(Some("")), "development");
        assert_eq!(client.resolve_env(Some("staging")), "staging");
    }

    #[test]
    fn test_env_name_validation() {
        assert!(is_valid_env_name("DATABASE_URL"));
        assert!(!is_valid_env_name(""));
        assert!(!is_valid_env_name("A=B"));
        assert!(!is_valid_env_name("A\0B"));
    }

    #[tokio::test]
    async fn test_client_debug_does_not_leak_token() {
        let server = MockServer::start().await;
        let client = client(&server);

        assert!(!format!("{:?}", client).contains("zv_test"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_stale_fallback_is_logged() {
        let server = MockServer::start().await;
        let client = client(&server);

        Mock::given(method("GET"))
            .and(path("/v1/cloud/orgs/acme/projects/billing/envs/production/secrets"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"keys": [{"key": "A", "version": 1}]})),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/cloud/orgs/acme/projects/billing/envs/production/secrets/A"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"secret": {"key": "A", "value": "1", "version": 1}}),
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/cloud/orgs/acme/projects/billing/envs/production/secrets"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        client.get_all(None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;

        let secrets = client.get_all(None).await.unwrap();
        assert_eq!(secrets.get("A").map(String::as_str), Some("1"));
        assert!(logs_contain("serving cached secrets"));
    }

    #[tokio::test]
    async fn test_operations_after_close_fail_with_closed() {
        let server = MockServer::start().await;
        let client = client(&server);

        client.close().await;
        client.close().await;

        assert!(client.is_closed().await);
        assert!(matches!(client.get("A", None).await, Err(SecretsError::Closed)));
        assert!(matches!(client.list_keys(None).await, Err(SecretsError::Closed)));
        assert!(matches!(client.get_all(None).await, Err(SecretsError::Closed)));
        assert!(!client.healthy().await.reachable);
    }
}
