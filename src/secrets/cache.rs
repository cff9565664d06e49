//! Per-environment secret cache.
//!
//! One [`CacheEntry`] per environment name, each with a single monotonic
//! deadline. Expiry is lazy: entries are checked at read time and never swept
//! in the background. Expired entries are kept so a failed refresh can still
//! serve the last known values.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// Cached secrets for one environment.
#[derive(Debug, Clone)]
struct CacheEntry {
    secrets: HashMap<String, String>,
    expires_at: Instant,
    /// Set when the entry came from a full environment fetch, as opposed to
    /// single keys merged in by `get` or `set`.
    complete: bool,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    last_refresh: Option<DateTime<Utc>>,
}

/// TTL cache keyed by environment name.
///
/// Cloning is cheap and shares the underlying storage. Every read or write
/// takes the lock for exactly one entry lookup or replacement.
#[derive(Debug, Clone)]
pub struct SecretCache {
    inner: Arc<RwLock<CacheState>>,
    ttl: Duration,
}

impl SecretCache {
    pub fn new(ttl: Duration) -> Self {
        Self { inner: Arc::new(RwLock::new(CacheState::default())), ttl }
    }

    /// Create a new cache with default TTL (5 minutes)
    pub fn with_default_ttl() -> Self {
        Self::new(Duration::from_secs(300))
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Full mapping for `env` if it came from a full fetch and has not expired.
    pub async fn get_complete(&self, env: &str) -> Option<HashMap<String, String>> {
        let state = self.inner.read().await;
        let entry = state.entries.get(env)?;
        if entry.complete && entry.is_fresh(Instant::now()) {
            debug!(env = %env, count = entry.secrets.len(), "Cache hit for environment");
            return Some(entry.secrets.clone());
        }
        None
    }

    /// Whatever is cached for `env`, expired or not.
    pub async fn get_stale(&self, env: &str) -> Option<HashMap<String, String>> {
        let state = self.inner.read().await;
        state.entries.get(env).map(|entry| entry.secrets.clone())
    }

    /// A single cached value, only while the environment's entry is unexpired.
    pub async fn get_key(&self, env: &str, key: &str) -> Option<String> {
        let state = self.inner.read().await;
        let entry = state.entries.get(env)?;
        if !entry.is_fresh(Instant::now()) {
            debug!(env = %env, "Cached environment expired");
            return None;
        }
        entry.secrets.get(key).cloned()
    }

    /// Replace the entry for `env` with a full fetch result and record the refresh time.
    pub async fn replace(&self, env: &str, secrets: HashMap<String, String>) {
        let mut state = self.inner.write().await;
        debug!(
            env = %env,
            count = secrets.len(),
            ttl_secs = self.ttl.as_secs(),
            "Caching environment"
        );
        state.entries.insert(
            env.to_string(),
            CacheEntry { secrets, expires_at: Instant::now() + self.ttl, complete: true },
        );
        state.last_refresh = Some(Utc::now());
    }

    /// Merge one key into the entry for `env`.
    ///
    /// A fresh entry keeps its deadline. A missing or expired entry is replaced
    /// by a partial entry expiring one TTL from now, so stale siblings are not
    /// revived.
    pub async fn merge_key(&self, env: &str, key: &str, value: String) {
        let mut state = self.inner.write().await;
        let now = Instant::now();

        match state.entries.get_mut(env) {
            Some(entry) if entry.is_fresh(now) => {
                entry.secrets.insert(key.to_string(), value);
            }
            _ => {
                let mut secrets = HashMap::new();
                secrets.insert(key.to_string(), value);
                state.entries.insert(
                    env.to_string(),
                    CacheEntry { secrets, expires_at: now + self.ttl, complete: false },
                );
            }
        }
        debug!(env = %env, key = %key, "Merged secret into cache");
    }

    /// Deadline of the entry for `env`, if one exists.
    pub async fn expires_at(&self, env: &str) -> Option<Instant> {
        self.inner.read().await.entries.get(env).map(|entry| entry.expires_at)
    }

    /// Number of secrets in unexpired entries, across all environments.
    pub async fn fresh_secret_count(&self) -> usize {
        let state = self.inner.read().await;
        let now = Instant::now();
        state
            .entries
            .values()
            .filter(|entry| entry.is_fresh(now))
            .map(|entry| entry.secrets.len())
            .sum()
    }

    /// Number of secrets held, expired or not.
    pub async fn len(&self) -> usize {
        self.inner.read().await.entries.values().map(|entry| entry.secrets.len()).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.inner.read().await.last_refresh
    }

    /// Clear all cache entries
    pub async fn clear(&self) {
        let mut state = self.inner.write().await;
        debug!(environments = state.entries.len(), "Clearing secret cache");
        state.entries.clear();
    }
}

impl Default for SecretCache {
    fn default() -> Self {
        Self::with_default_ttl()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secrets(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[tokio::test]
    async fn test_replace_and_get_complete() {
        let cache = SecretCache::new(Duration::from_secs(60));
        cache.replace("production", secrets(&[("A", "1"), ("B", "2")])).await;

        let cached = cache.get_complete("production").await.unwrap();
        assert_eq!(cached.len(), 2);
        assert_eq!(cache.get_key("production", "B").await.as_deref(), Some("2"));
        assert!(cache.get_complete("staging").await.is_none());
        assert!(cache.last_refresh().await.is_some());
    }

    #[tokio::test]
    async fn test_replace_sets_deadline_to_now_plus_ttl() {
        let ttl = Duration::from_secs(120);
        let cache = SecretCache::new(ttl);

        let before = Instant::now();
        cache.replace("production", secrets(&[("A", "1")])).await;
        let after = Instant::now();

        let deadline = cache.expires_at("production").await.unwrap();
        assert!(deadline >= before + ttl);
        assert!(deadline <= after + ttl);
    }

    #[tokio::test]
    async fn test_expired_entry_is_stale_but_retained() {
        let cache = SecretCache::new(Duration::from_millis(30));
        cache.replace("production", secrets(&[("A", "1")])).await;

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(cache.get_complete("production").await.is_none());
        assert!(cache.get_key("production", "A").await.is_none());
        assert_eq!(cache.get_stale("production").await.unwrap(), secrets(&[("A", "1")]));
        assert_eq!(cache.fresh_secret_count().await, 0);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_merge_key_creates_partial_entry() {
        let cache = SecretCache::new(Duration::from_secs(60));
        cache.merge_key("staging", "TOKEN", "abc".to_string()).await;

        assert_eq!(cache.get_key("staging", "TOKEN").await.as_deref(), Some("abc"));
        // A partial entry must not be mistaken for the whole environment.
        assert!(cache.get_complete("staging").await.is_none());
        assert!(cache.last_refresh().await.is_none());
    }

    #[tokio::test]
    async fn test_merge_key_into_fresh_full_entry_keeps_it_complete() {
        let cache = SecretCache::new(Duration::from_secs(60));
        cache.replace("production", secrets(&[("A", "1")])).await;
        cache.merge_key("production", "A", "2".to_string()).await;
        cache.merge_key("production", "B", "3".to_string()).await;

        let cached = cache.get_complete("production").await.unwrap();
        assert_eq!(cached, secrets(&[("A", "2"), ("B", "3")]));
    }

    #[tokio::test]
    async fn test_merge_key_does_not_extend_fresh_deadline() {
        let cache = SecretCache::new(Duration::from_millis(100));
        cache.replace("production", secrets(&[("A", "1")])).await;
        let deadline = cache.expires_at("production").await.unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;
        cache.merge_key("production", "B", "2".to_string()).await;
        assert_eq!(cache.expires_at("production").await, Some(deadline));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cache.get_complete("production").await.is_none());
        assert!(cache.get_key("production", "B").await.is_none());
    }

    #[tokio::test]
    async fn test_merge_key_into_expired_entry_drops_stale_values() {
        let cache = SecretCache::new(Duration::from_millis(30));
        cache.replace("production", secrets(&[("A", "1"), ("B", "2")])).await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        cache.merge_key("production", "A", "fresh".to_string()).await;

        assert_eq!(cache.get_key("production", "A").await.as_deref(), Some("fresh"));
        assert!(cache.get_key("production", "B").await.is_none());
    }

    #[tokio::test]
    async fn test_fresh_secret_count_spans_environments() {
        let cache = SecretCache::new(Duration::from_secs(60));
        cache.replace("production", secrets(&[("A", "1"), ("B", "2")])).await;
        cache.merge_key("staging", "C", "3".to_string()).await;

        assert_eq!(cache.fresh_secret_count().await, 3);
    }

    #[tokio::test]
    async fn test_clear_keeps_last_refresh() {
        let cache = SecretCache::new(Duration::from_secs(60));
        cache.replace("production", secrets(&[("A", "1")])).await;

        cache.clear().await;
        assert!(cache.is_empty().await);
        assert!(cache.get_stale("production").await.is_none());
        assert!(cache.last_refresh().await.is_some());
    }

    #[test]
    fn test_new_cache_is_empty() {
        let cache = SecretCache::new(Duration::from_secs(60));
        tokio_test::block_on(async {
            assert!(cache.is_empty().await);
            assert!(cache.get_stale("production").await.is_none());
            assert!(cache.expires_at("production").await.is_none());
        });
    }

    #[tokio::test]
    async fn test_clones_share_storage() {
        let cache = SecretCache::default();
        let other = cache.clone();
        other.merge_key("production", "A", "1".to_string()).await;

        assert_eq!(cache.get_key("production", "A").await.as_deref(), Some("1"));
        assert_eq!(cache.ttl(), Duration::from_secs(300));
    }
}
