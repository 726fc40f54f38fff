//! Tests for the streaming language harvest.

use super::*;
use crate::auth::{
    AuthenticationProvider, InstallationId, InstallationToken, JsonWebToken,
};
use crate::error::{AuthError, ConfigError};
use crate::test_keys::RSA_PKCS1_PEM;
use chrono::{Duration, Utc};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Helpers
// ============================================================================

struct MockAuthProvider;

#[async_trait::async_trait]
impl AuthenticationProvider for MockAuthProvider {
    async fn app_token(&self) -> Result<JsonWebToken, AuthError> {
        unreachable!("harvest tests build the installation client directly")
    }

    async fn installation_token(
        &self,
        _installation_id: InstallationId,
    ) -> Result<InstallationToken, AuthError> {
        unreachable!("harvest tests build the installation client directly")
    }
}

fn installation_client(server: &MockServer) -> InstallationClient {
    let github = GitHubClient::builder(MockAuthProvider)
        .config(ClientConfig::default().with_github_api_url(server.uri()))
        .build()
        .unwrap();
    InstallationClient::new(
        Arc::new(github),
        InstallationToken::new(
            "ghs_test".to_string(),
            InstallationId::new(1),
            Utc::now() + Duration::hours(1),
        ),
    )
}

fn repo_json(name: &str, archived: bool, topics: &[&str]) -> serde_json::Value {
    json!({
        "name": name,
        "full_name": format!("acme/{}", name),
        "owner": { "login": "acme" },
        "archived": archived,
        "topics": topics,
    })
}

async fn mount_repositories(server: &MockServer, repos: Vec<serde_json::Value>) {
    Mock::given(method("GET"))
        .and(path("/orgs/acme/repos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(repos))
        .mount(server)
        .await;
}

async fn mount_languages(server: &MockServer, repo: &str, languages: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/repos/acme/{}/languages", repo)))
        .respond_with(ResponseTemplate::new(200).set_body_json(languages))
        .mount(server)
        .await;
}

async fn language_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|request| request.url.path().ends_with("/languages"))
        .count()
}

fn harvest_config(server: &MockServer) -> HarvestConfig {
    HarvestConfig {
        org: "acme".to_string(),
        credentials: CredentialConfig {
            app_id: Some("123".into()),
            installation_id: Some("456".into()),
            private_key: Some(RSA_PKCS1_PEM.to_string()),
            private_key_path: None,
        },
        client: ClientConfig::default().with_github_api_url(server.uri()),
        channel_capacity: DEFAULT_CHANNEL_CAPACITY,
    }
}

async fn mount_token_exchange(server: &MockServer, expires_in: Duration) {
    Mock::given(method("POST"))
        .and(path("/app/installations/456/access_tokens"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "token": "ghs_run",
            "expires_at": (Utc::now() + expires_in).to_rfc3339(),
        })))
        .mount(server)
        .await;
}

// ============================================================================
// Report Projection
// ============================================================================

mod report_tests {
    use super::*;

    #[test]
    fn test_report_keeps_names_only() {
        let map = BTreeMap::from([
            ("Rust".to_string(), 120_000u64),
            ("Dockerfile".to_string(), 512),
            ("Shell".to_string(), 40),
        ]);

        let report = LanguageReport::from_language_map("acme", "svc", &map);

        assert_eq!(report.full_name, "acme/svc");
        assert_eq!(report.name, "svc");
        assert_eq!(report.languages, vec!["Dockerfile", "Rust", "Shell"]);
    }

    #[test]
    fn test_report_for_repository_without_code() {
        let report = LanguageReport::from_language_map("acme", "docs", &BTreeMap::new());

        assert!(report.languages.is_empty());
    }

    #[test]
    fn test_report_wire_shape() {
        let report = LanguageReport {
            full_name: "acme/a".to_string(),
            name: "a".to_string(),
            languages: vec!["Go".to_string()],
        };

        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({ "full_name": "acme/a", "name": "a", "languages": ["Go"] })
        );
    }
}

// ============================================================================
// Harvest Loop
// ============================================================================

mod harvest_loop_tests {
    use super::*;

    /// Given: four repositories of which two qualify
    /// When: the organization is harvested
    /// Then: one report per qualifying repository arrives, in listing order
    /// And: languages are never fetched for the others
    #[tokio::test]
    async fn test_reports_follow_enumeration_order() {
        let server = MockServer::start().await;
        mount_repositories(
            &server,
            vec![
                repo_json("zeta", false, &["production"]),
                repo_json("old", true, &["production"]),
                repo_json("alpha", false, &["production", "go"]),
                repo_json("scratch", false, &["experimental"]),
            ],
        )
        .await;
        mount_languages(&server, "zeta", json!({ "Rust": 10, "Python": 5 })).await;
        mount_languages(&server, "alpha", json!({ "Go": 7 })).await;

        Mock::given(method("GET"))
            .and(path_regex(r"^/repos/acme/(old|scratch)/languages$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let client = installation_client(&server);
        let (tx, mut rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
        let cancel = CancellationToken::new();

        let summary = harvest_languages(&client, "acme", &tx, &cancel)
            .await
            .unwrap();
        drop(tx);

        let mut reports = Vec::new();
        while let Some(report) = rx.recv().await {
            reports.push(report);
        }

        let names: Vec<_> = reports.iter().map(|r| r.full_name.as_str()).collect();
        assert_eq!(names, vec!["acme/zeta", "acme/alpha"]);
        assert_eq!(reports[0].languages, vec!["Python", "Rust"]);

        for report in &reports {
            let mut unique = report.languages.clone();
            unique.dedup();
            assert_eq!(unique.len(), report.languages.len());
        }

        assert_eq!(
            summary,
            HarvestSummary {
                pages_fetched: 1,
                repositories_seen: 4,
                repositories_accepted: 2,
                reports_emitted: 2,
            }
        );
    }

    /// The first failing repository ends the run with its name attached.
    #[tokio::test]
    async fn test_language_failure_aborts_run() {
        let server = MockServer::start().await;
        mount_repositories(
            &server,
            vec![
                repo_json("a", false, &["production"]),
                repo_json("b", false, &["production"]),
                repo_json("c", false, &["production"]),
            ],
        )
        .await;
        mount_languages(&server, "a", json!({ "Rust": 1 })).await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/b/languages"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/repos/acme/c/languages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(0)
            .mount(&server)
            .await;

        let client = installation_client(&server);
        let (tx, mut rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);

        let err = harvest_languages(&client, "acme", &tx, &CancellationToken::new())
            .await
            .unwrap_err();

        match &err {
            Error::Harvest(HarvestError { owner, name, source }) => {
                assert_eq!(owner, "acme");
                assert_eq!(name, "b");
                assert_eq!(source.status(), Some(500));
            }
            other => panic!("Expected HarvestError, got {:?}", other),
        }
        assert!(err.to_string().contains("acme/b"));

        // The report emitted before the failure is still delivered.
        assert_eq!(rx.recv().await.unwrap().full_name, "acme/a");
    }

    #[tokio::test]
    async fn test_enumeration_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&server)
            .await;

        let client = installation_client(&server);
        let (tx, _rx) = mpsc::channel(1);

        let err = harvest_languages(&client, "acme", &tx, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Enumeration(ref e) if e.page == 1 && e.org == "acme"));
    }

    /// A consumer that stops reading stalls further API calls.
    #[tokio::test]
    async fn test_slow_consumer_throttles_producer() {
        let server = MockServer::start().await;
        let repos: Vec<_> = (0..5)
            .map(|i| repo_json(&format!("r{}", i), false, &["production"]))
            .collect();
        mount_repositories(&server, repos).await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/repos/acme/r\d/languages$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "C": 1 })))
            .mount(&server)
            .await;

        let client = installation_client(&server);
        let (tx, mut rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();

        let producer = {
            let cancel = cancel.clone();
            tokio::spawn(async move { harvest_languages(&client, "acme", &tx, &cancel).await })
        };

        tokio::time::sleep(std::time::Duration::from_millis(300)).await;

        // One report buffered, one waiting to be pushed, nothing further.
        assert_eq!(language_requests(&server).await, 2);
        assert!(!producer.is_finished());

        let mut received = 0;
        while rx.recv().await.is_some() {
            received += 1;
        }

        let summary = producer.await.unwrap().unwrap();
        assert_eq!(received, 5);
        assert_eq!(summary.reports_emitted, 5);
        assert_eq!(language_requests(&server).await, 5);
    }

    #[tokio::test]
    async fn test_cancel_while_blocked_on_consumer() {
        let server = MockServer::start().await;
        mount_repositories(
            &server,
            vec![
                repo_json("a", false, &["production"]),
                repo_json("b", false, &["production"]),
            ],
        )
        .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/repos/acme/[ab]/languages$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "C": 1 })))
            .mount(&server)
            .await;

        let client = installation_client(&server);
        let (tx, _rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();

        let producer = {
            let cancel = cancel.clone();
            tokio::spawn(async move { harvest_languages(&client, "acme", &tx, &cancel).await })
        };

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        cancel.cancel();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), producer)
            .await
            .expect("cancelled harvest should stop promptly")
            .unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    /// An in-flight request is abandoned as soon as the run is cancelled.
    #[tokio::test]
    async fn test_cancel_aborts_in_flight_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orgs/acme/repos"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([]))
                    .set_delay(std::time::Duration::from_secs(10)),
            )
            .mount(&server)
            .await;

        let client = installation_client(&server);
        let (tx, _rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                cancel.cancel();
            })
        };

        let started = std::time::Instant::now();
        let result = harvest_languages(&client, "acme", &tx, &cancel).await;
        canceller.await.unwrap();

        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_dropped_receiver_stops_run() {
        let server = MockServer::start().await;
        mount_repositories(
            &server,
            vec![
                repo_json("a", false, &["production"]),
                repo_json("b", false, &["production"]),
            ],
        )
        .await;
        mount_languages(&server, "a", json!({ "Rust": 1 })).await;
        mount_languages(&server, "b", json!({ "Rust": 1 })).await;

        let client = installation_client(&server);
        let (tx, rx) = mpsc::channel(4);
        drop(rx);

        let result = harvest_languages(&client, "acme", &tx, &CancellationToken::new()).await;

        assert!(matches!(result, Err(Error::OutputClosed)));
        assert_eq!(language_requests(&server).await, 1);
    }
}

// ============================================================================
// Connect And Run
// ============================================================================

mod run_tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_org_fails_before_network() {
        let server = MockServer::start().await;
        let config = HarvestConfig {
            org: "  ".to_string(),
            ..harvest_config(&server)
        };

        let result = connect(&config, &CancellationToken::new()).await;

        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::Missing { field: "org" }))
        ));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_key_fails_before_network() {
        let server = MockServer::start().await;
        let mut config = harvest_config(&server);
        config.credentials.private_key = Some(
            RSA_PKCS1_PEM
                .lines()
                .filter(|line| !line.starts_with("-----END"))
                .collect::<Vec<_>>()
                .join("\n"),
        );

        let result = connect(&config, &CancellationToken::new()).await;

        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::MissingPemMarker { .. }))
        ));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_run_skips_token_exchange() {
        let server = MockServer::start().await;
        mount_token_exchange(&server, Duration::hours(1)).await;

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = connect(&harvest_config(&server), &cancel).await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_connect_exchanges_token() {
        let server = MockServer::start().await;
        mount_token_exchange(&server, Duration::hours(1)).await;

        let client = connect(&harvest_config(&server), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(client.installation_id(), InstallationId::new(456));
        assert_eq!(client.token().token(), "ghs_run");
    }

    /// A token close to expiry is still used; the run is not renewed.
    #[tokio::test]
    async fn test_connect_accepts_token_expiring_soon() {
        let server = MockServer::start().await;
        mount_token_exchange(&server, Duration::minutes(2)).await;

        let client = connect(&harvest_config(&server), &CancellationToken::new())
            .await
            .unwrap();

        assert!(token_expires_soon(client.token()));
    }

    #[test]
    fn test_token_expires_soon_uses_warning_threshold() {
        let token = |minutes| {
            InstallationToken::new(
                "ghs_t".to_string(),
                InstallationId::new(1),
                Utc::now() + Duration::minutes(minutes),
            )
        };

        assert!(token_expires_soon(&token(TOKEN_EXPIRY_WARNING_MINUTES - 1)));
        assert!(!token_expires_soon(&token(TOKEN_EXPIRY_WARNING_MINUTES + 1)));
        assert!(!token_expires_soon(&token(8)));
    }

    #[tokio::test]
    async fn test_connect_sends_configured_user_agent_everywhere() {
        let server = MockServer::start().await;
        mount_token_exchange(&server, Duration::hours(1)).await;
        mount_languages(&server, "a", json!({ "Go": 1 })).await;

        let config = harvest_config(&server);
        let client = connect(&config, &CancellationToken::new()).await.unwrap();
        client.list_languages("acme", "a").await.unwrap();

        let agents: Vec<String> = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .map(|r| r.headers.get("user-agent").unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(agents.len(), 2);
        assert!(agents.iter().all(|a| *a == config.client.user_agent));
    }

    #[tokio::test]
    async fn test_spawn_streams_reports_and_returns_summary() {
        let server = MockServer::start().await;
        mount_token_exchange(&server, Duration::hours(1)).await;
        mount_repositories(&server, vec![repo_json("a", false, &["production"])]).await;
        mount_languages(&server, "a", json!({ "TypeScript": 99, "CSS": 1 })).await;

        let (mut rx, handle) = spawn(harvest_config(&server), CancellationToken::new());

        let report = rx.recv().await.unwrap();
        assert_eq!(report.full_name, "acme/a");
        assert_eq!(report.languages, vec!["CSS", "TypeScript"]);
        assert!(rx.recv().await.is_none());

        let summary = handle.await.unwrap().unwrap();
        assert_eq!(summary.reports_emitted, 1);
    }

    #[tokio::test]
    async fn test_lookup_single_repository() {
        let server = MockServer::start().await;
        mount_token_exchange(&server, Duration::hours(1)).await;
        mount_languages(&server, "tool", json!({ "Rust": 3 })).await;

        let report = lookup_languages(
            &harvest_config(&server),
            "acme",
            "tool",
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.full_name, "acme/tool");
        assert_eq!(report.languages, vec!["Rust"]);
    }
}
