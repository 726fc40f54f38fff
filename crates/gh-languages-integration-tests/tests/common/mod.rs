//! Common test utilities for gh-languages integration tests
//!
//! This module provides:
//! - A mock GitHub API (token exchange, repository listing, languages)
//! - Harvest configuration pointing at the mock
//! - Shared test data builders

use chrono::{Duration, Utc};
use gh_languages_sdk::auth::CredentialConfig;
use gh_languages_sdk::client::ClientConfig;
use gh_languages_sdk::HarvestConfig;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// RSA key generated for testing only.
pub const APP_KEY_PEM: &str =
    include_str!("../../../gh-languages-sdk/tests/fixtures/app_key_pkcs1.pem");

pub const APP_ID: i64 = 123;
pub const INSTALLATION_ID: i64 = 456;
pub const INSTALLATION_TOKEN: &str = "ghs_integration_token";

/// Harvest configuration for the `acme` organization served by `server`.
pub fn harvest_config(server: &MockServer) -> HarvestConfig {
    HarvestConfig {
        org: "acme".to_string(),
        credentials: CredentialConfig {
            app_id: Some(APP_ID.into()),
            installation_id: Some(INSTALLATION_ID.to_string().into()),
            private_key: Some(APP_KEY_PEM.to_string()),
            private_key_path: None,
        },
        client: ClientConfig::default().with_github_api_url(server.uri()),
        ..HarvestConfig::default()
    }
}

/// Serve a valid installation token, expecting exactly one exchange.
pub async fn mount_token_exchange(server: &MockServer) {
    mount_token_exchange_expiring_in(server, Duration::hours(1)).await;
}

/// Serve an installation token that expires after `lifetime`.
#[allow(dead_code)]
pub async fn mount_token_exchange_expiring_in(server: &MockServer, lifetime: Duration) {
    Mock::given(method("POST"))
        .and(path(format!(
            "/app/installations/{}/access_tokens",
            INSTALLATION_ID
        )))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "token": INSTALLATION_TOKEN,
            "expires_at": (Utc::now() + lifetime).to_rfc3339(),
        })))
        .expect(1)
        .mount(server)
        .await;
}

/// Serve `repos` as the single page of the `acme` repository listing.
pub async fn mount_repositories(server: &MockServer, repos: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/orgs/acme/repos"))
        .and(header(
            "authorization",
            format!("token {}", INSTALLATION_TOKEN).as_str(),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(repos))
        .mount(server)
        .await;
}

/// Serve a languages map for `acme/<repo>`, expecting `calls` requests.
pub async fn mount_languages(server: &MockServer, repo: &str, languages: Value, calls: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/repos/acme/{}/languages", repo)))
        .and(header(
            "authorization",
            format!("token {}", INSTALLATION_TOKEN).as_str(),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(languages))
        .expect(calls)
        .mount(server)
        .await;
}

pub fn repo(name: &str, archived: bool, topics: &[&str]) -> Value {
    json!({
        "name": name,
        "full_name": format!("acme/{}", name),
        "owner": { "login": "acme" },
        "archived": archived,
        "topics": topics,
    })
}
