//! Data types exchanged with the ZVault API.
//!
//! Also holds [`SecretString`], the redacting wrapper used for the bearer
//! token so it never reaches logs or `Debug` output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::Duration;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A string wrapper that redacts its contents in Debug, Display, and serialization.
///
/// - Debug output shows `SecretString([REDACTED])`
/// - Display output shows `[REDACTED]`
/// - Serialization outputs `"[REDACTED]"`; deserialization accepts real values
/// - Memory is zeroed when dropped (via `zeroize`)
///
/// The inner value is reachable only through [`SecretString::expose_secret`].
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretString(String);

impl Serialize for SecretString {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretString)
    }
}

impl SecretString {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Exposes the underlying value. Never log the result.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl PartialEq for SecretString {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SecretString {}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A secret with its value, as returned by the single-secret endpoints.
///
/// `version` and both timestamps are assigned by the service; the client
/// never generates or changes them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecretEntry {
    pub key: String,
    pub value: String,
    pub version: u64,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A secret without its value, as returned by the listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SecretKey {
    pub key: String,
    pub version: u64,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&SecretEntry> for SecretKey {
    fn from(entry: &SecretEntry) -> Self {
        Self {
            key: entry.key.clone(),
            version: entry.version,
            comment: entry.comment.clone(),
            updated_at: entry.updated_at,
        }
    }
}

/// Point-in-time health snapshot of a client.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct HealthStatus {
    /// Whether the identity probe returned 200.
    pub reachable: bool,
    /// Wall-clock round trip of the probe, in milliseconds.
    pub latency_ms: u64,
    /// Secrets held in cache entries that have not expired, across all environments.
    pub cached_secrets: usize,
    /// When the last successful full environment fetch completed.
    pub last_refresh: Option<DateTime<Utc>>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.reachable
    }

    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

// Response envelopes.

#[derive(Debug, Deserialize)]
pub(crate) struct SecretResponse {
    pub secret: SecretEntry,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SecretKeysResponse {
    #[serde(default)]
    pub keys: Vec<SecretKey>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PutSecretRequest<'a> {
    pub value: &'a str,
    pub comment: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorDetail {
    pub message: Option<String>,
}

impl ApiErrorBody {
    /// Extract `error.message` from a response body, if present.
    pub(crate) fn message_from(body: &str) -> Option<String> {
        serde_json::from_str::<ApiErrorBody>(body).ok()?.error?.message
    }
}
