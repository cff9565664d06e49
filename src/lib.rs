//! # zvault-client
//!
//! Async client for the ZVault secrets service.
//!
//! Secrets live under an org, a project and an environment (`development`,
//! `staging`, `production`, ...). The client fetches them over HTTPS with a
//! bearer token, keeps a per-environment cache, retries transient failures,
//! and serves cached values when the service is down.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use zvault_client::{ClientConfig, SecretsClient};
//!
//! #[tokio::main]
//! async fn main() -> zvault_client::Result<()> {
//!     // ZVAULT_TOKEN, ZVAULT_ORG_ID and ZVAULT_PROJECT_ID come from the environment.
//!     let client = SecretsClient::from_env()?;
//!
//!     let written = client.inject_into_env(Some("production"), false).await?;
//!     println!("injected {written} secrets");
//!
//!     let health = client.healthy().await;
//!     println!("reachable={} latency={}ms", health.reachable, health.latency_ms);
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod observability;
pub mod secrets;

pub use config::{ClientConfig, ResolvedConfig};
pub use secrets::{
    HealthStatus, Result, SecretEntry, SecretKey, SecretString, SecretsClient, SecretsError,
};

/// Library version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// `User-Agent` header sent with every request.
pub const USER_AGENT: &str = concat!("zvault-rust-client/", env!("CARGO_PKG_VERSION"));
