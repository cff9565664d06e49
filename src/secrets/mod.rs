//! ZVault secrets access.
//!
//! [`SecretsClient`] is the entry point. It reads and writes secrets scoped to
//! one org and project, caches each environment's values for a TTL, retries
//! transient failures with exponential backoff, and falls back to cached
//! values when the service cannot be reached.
//!
//! # Layers
//!
//! - [`transport`]: authenticated HTTP session and the retry state machine
//! - [`cache`]: per-environment TTL cache with stale reads
//! - [`client`]: the public operations built on both
//!
//! # Failure model
//!
//! | Condition                      | Retried | Result                          |
//! |--------------------------------|---------|---------------------------------|
//! | 401 / 403                      | no      | [`SecretsError::AuthenticationFailed`] |
//! | 404                            | no      | [`SecretsError::NotFound`] / [`SecretsError::Api`] |
//! | 429, 500, 502, 503, 504        | yes     | [`SecretsError::Api`]           |
//! | per-attempt timeout            | yes     | [`SecretsError::Timeout`]       |
//! | connection failure             | yes     | [`SecretsError::Api`] with status 0 |
//!
//! `get_all` masks any of these with cached data when some exists for the
//! environment, expired or not.

pub mod cache;
pub mod client;
pub mod error;
pub mod transport;
pub mod types;

pub use cache::SecretCache;
pub use client::SecretsClient;
pub use error::{Result, SecretsError};
pub use transport::{RetryPolicy, Transport};
pub use types::{HealthStatus, SecretEntry, SecretKey, SecretString};
