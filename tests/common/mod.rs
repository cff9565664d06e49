//! Shared wiremock fixtures for client integration tests.

#![allow(dead_code)]

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zvault_client::{ClientConfig, SecretsClient};

pub const TOKEN: &str = "zv_test_token";
pub const ORG: &str = "acme";
pub const PROJECT: &str = "billing";
pub const ENV: &str = "production";

/// URL path of the listing endpoint for `env`.
pub fn secrets_path(env: &str) -> String {
    format!("/v1/cloud/orgs/{ORG}/projects/{PROJECT}/envs/{env}/secrets")
}

/// URL path of a single secret, with `key` already percent-encoded.
pub fn secret_path(env: &str, key: &str) -> String {
    format!("{}/{key}", secrets_path(env))
}

/// Test defaults: fast retries, no process environment.
pub fn test_config(server: &MockServer) -> ClientConfig {
    ClientConfig::new()
        .with_token(TOKEN)
        .with_base_url(server.uri())
        .with_org_id(ORG)
        .with_project_id(PROJECT)
        .with_default_env(ENV)
        .with_retry_base_delay(Duration::from_millis(10))
}

pub fn build_client(config: ClientConfig) -> SecretsClient {
    let resolved = config.resolve_with(|_| None).expect("test config resolves");
    SecretsClient::from_resolved(resolved).expect("client builds")
}

pub fn test_client(server: &MockServer) -> SecretsClient {
    build_client(test_config(server))
}

pub fn listing_body(keys: &[&str]) -> serde_json::Value {
    let keys: Vec<_> = keys
        .iter()
        .map(|key| json!({"key": key, "version": 1, "comment": "", "updated_at": "2024-01-01T00:00:00Z"}))
        .collect();
    json!({ "keys": keys })
}

pub fn secret_body(key: &str, value: &str, version: u64) -> serde_json::Value {
    json!({
        "secret": {
            "key": key,
            "value": value,
            "version": version,
            "comment": "",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-02T00:00:00Z"
        }
    })
}

/// Mount the listing for `env` answering with `keys`.
pub async fn mount_listing(server: &MockServer, env: &str, keys: &[&str]) {
    Mock::given(method("GET"))
        .and(path(secrets_path(env)))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_body(keys)))
        .mount(server)
        .await;
}

/// Mount a single-secret GET for `key` in `env`.
pub async fn mount_secret(server: &MockServer, env: &str, key: &str, value: &str) {
    Mock::given(method("GET"))
        .and(path(secret_path(env, key)))
        .respond_with(ResponseTemplate::new(200).set_body_json(secret_body(key, value, 1)))
        .mount(server)
        .await;
}

/// Mount a full environment: listing plus one GET per key.
pub async fn mount_environment(server: &MockServer, env: &str, secrets: &[(&str, &str)]) {
    let keys: Vec<&str> = secrets.iter().map(|(key, _)| *key).collect();
    mount_listing(server, env, &keys).await;
    for (key, value) in secrets {
        mount_secret(server, env, key, value).await;
    }
}

/// Answer every request with `status` from now on.
pub async fn fail_everything(server: &MockServer, status: u16) {
    server.reset().await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Number of requests the server saw for `url_path`.
pub async fn hits(server: &MockServer, url_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == url_path)
        .count()
}
