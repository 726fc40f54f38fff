//! Streaming language harvest.
//!
//! A run authenticates once, walks the organization's production
//! repositories one at a time and pushes a [`LanguageReport`] per repository
//! into a bounded channel as soon as it is known. A slow consumer blocks the
//! push, which in turn delays the next API call.
//!
//! # Examples
//!
//! ```no_run
//! use gh_languages_sdk::auth::CredentialConfig;
//! use gh_languages_sdk::harvest::{self, HarvestConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), gh_languages_sdk::Error> {
//! let config = HarvestConfig {
//!     org: "acme".to_string(),
//!     credentials: CredentialConfig {
//!         app_id: Some("123".into()),
//!         installation_id: Some("456".into()),
//!         private_key_path: Some("/keys/app.pem".into()),
//!         ..CredentialConfig::default()
//!     },
//!     ..HarvestConfig::default()
//! };
//!
//! let (mut reports, handle) = harvest::spawn(config, CancellationToken::new());
//! while let Some(report) = reports.recv().await {
//!     println!("{}: {:?}", report.full_name, report.languages);
//! }
//! let summary = handle.await.expect("harvest task panicked")?;
//! println!("{} repositories harvested", summary.reports_emitted);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::{Credential, CredentialConfig, GitHubAppAuth, InstallationToken};
use crate::client::{ClientConfig, GitHubClient, InstallationClient, LanguageMap, Repository};
use crate::error::{ConfigError, Error, HarvestError};

/// Default number of reports that may wait for the consumer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// Remaining token lifetime below which a run start is logged as risky.
pub const TOKEN_EXPIRY_WARNING_MINUTES: i64 = 5;

/// Languages used by one repository.
///
/// This is the record emitted downstream. `languages` holds names only, with
/// no byte counts and no duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageReport {
    /// `owner/name`
    pub full_name: String,
    pub name: String,
    pub languages: Vec<String>,
}

impl LanguageReport {
    /// Project GitHub's byte-count map onto a report.
    ///
    /// Names come out in the map's order (sorted), each once.
    ///
    /// ```
    /// use gh_languages_sdk::harvest::LanguageReport;
    /// use std::collections::BTreeMap;
    ///
    /// let map = BTreeMap::from([("Rust".to_string(), 9000), ("Go".to_string(), 10)]);
    /// let report = LanguageReport::from_language_map("acme", "svc", &map);
    ///
    /// assert_eq!(report.full_name, "acme/svc");
    /// assert_eq!(report.languages, vec!["Go", "Rust"]);
    /// ```
    pub fn from_language_map(owner: &str, name: &str, languages: &LanguageMap) -> Self {
        Self {
            full_name: format!("{}/{}", owner, name),
            name: name.to_string(),
            languages: languages.keys().cloned().collect(),
        }
    }
}

/// Everything a harvesting run needs, passed in explicitly.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Organization whose repositories are harvested
    pub org: String,
    /// Raw GitHub App credentials
    pub credentials: CredentialConfig,
    /// HTTP client settings
    pub client: ClientConfig,
    /// Capacity of the report channel used by [`spawn`]
    pub channel_capacity: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            org: String::new(),
            credentials: CredentialConfig::default(),
            client: ClientConfig::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Counters describing a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarvestSummary {
    pub pages_fetched: u32,
    pub repositories_seen: u64,
    pub repositories_accepted: u64,
    pub reports_emitted: u64,
}

/// Await `future` unless `cancel` fires first.
async fn cancellable<F, T>(cancel: &CancellationToken, future: F) -> Result<T, Error>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        output = future => Ok(output),
    }
}

/// Validate configuration, exchange credentials and return the
/// authenticated transport for the run.
///
/// Configuration problems are reported before any network call. The token
/// exchange is skipped entirely when `cancel` has already fired.
///
/// # Errors
///
/// `Error::Config` for missing or malformed settings, `Error::Auth` when the
/// key is unusable or GitHub refuses the exchange, `Error::Cancelled` when the
/// run is cancelled first.
pub async fn connect(
    config: &HarvestConfig,
    cancel: &CancellationToken,
) -> Result<InstallationClient, Error> {
    if config.org.trim().is_empty() {
        return Err(ConfigError::Missing { field: "org" }.into());
    }

    let credential = Credential::from_config(&config.credentials)?;
    let installation_id = credential.installation_id();

    // One connection pool for the token exchange and every API call
    let http_client = config.client.http_client()?;
    let auth = GitHubAppAuth::from_credential(
        &credential,
        config.client.auth_config(),
        http_client.clone(),
    )?;
    let github = GitHubClient::builder(auth)
        .config(config.client.clone())
        .http_client(http_client)
        .build()?;

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }

    let client = cancellable(cancel, github.installation_by_id(installation_id)).await??;

    if token_expires_soon(client.token()) {
        warn!(
            installation_id = %installation_id,
            expires_at = %client.token_expires_at(),
            "Installation token expires within {} minutes; the run will fail if it outlasts it",
            TOKEN_EXPIRY_WARNING_MINUTES
        );
    }

    Ok(client)
}

/// Whether `token` will expire within [`TOKEN_EXPIRY_WARNING_MINUTES`].
pub fn token_expires_soon(token: &InstallationToken) -> bool {
    token.expires_soon(chrono::Duration::minutes(TOKEN_EXPIRY_WARNING_MINUTES))
}

/// Fetch the languages of one accepted repository.
///
/// # Errors
///
/// Returns `Error::Harvest` naming the repository when GitHub rejects the
/// request.
pub async fn harvest_repository(
    client: &InstallationClient,
    repository: &Repository,
    cancel: &CancellationToken,
) -> Result<LanguageReport, Error> {
    let owner = repository.owner.login.as_str();
    let name = repository.name.as_str();

    let languages = cancellable(cancel, client.list_languages(owner, name))
        .await?
        .map_err(|source| HarvestError {
            owner: owner.to_string(),
            name: name.to_string(),
            source,
        })?;

    Ok(LanguageReport::from_language_map(owner, name, &languages))
}

/// Enumerate `org` and push one report per accepted repository into `tx`.
///
/// Repositories are processed strictly one after another, in the order
/// GitHub lists them. The first failure ends the run; reports already sent
/// stay valid.
///
/// # Errors
///
/// `Error::Enumeration` or `Error::Harvest` for API failures,
/// `Error::Cancelled` when `cancel` fires, `Error::OutputClosed` when the
/// receiver is dropped.
pub async fn harvest_languages(
    client: &InstallationClient,
    org: &str,
    tx: &mpsc::Sender<LanguageReport>,
    cancel: &CancellationToken,
) -> Result<HarvestSummary, Error> {
    let mut repositories = client.enumerate_repositories(org);
    let mut reports_emitted = 0u64;

    while let Some(repository) = cancellable(cancel, repositories.next()).await?? {
        let report = harvest_repository(client, &repository, cancel).await?;
        debug!(
            repository = %report.full_name,
            languages = report.languages.len(),
            "Harvested repository languages"
        );

        cancellable(cancel, tx.send(report))
            .await?
            .map_err(|_| Error::OutputClosed)?;
        reports_emitted += 1;
    }

    let summary = HarvestSummary {
        pages_fetched: repositories.pages_fetched(),
        repositories_seen: repositories.repositories_seen(),
        repositories_accepted: repositories.repositories_accepted(),
        reports_emitted,
    };

    info!(
        org = %org,
        pages = summary.pages_fetched,
        seen = summary.repositories_seen,
        accepted = summary.repositories_accepted,
        emitted = summary.reports_emitted,
        "Harvest complete"
    );

    Ok(summary)
}

/// Run a complete harvest: connect, then stream reports into `tx`.
pub async fn run(
    config: HarvestConfig,
    tx: mpsc::Sender<LanguageReport>,
    cancel: CancellationToken,
) -> Result<HarvestSummary, Error> {
    let client = connect(&config, &cancel).await?;
    harvest_languages(&client, config.org.trim(), &tx, &cancel).await
}

/// Start a harvest on the tokio runtime.
///
/// Returns the receiving end of a channel bounded by
/// `config.channel_capacity` and the handle of the producing task. The
/// channel closes when the run ends, successfully or not; the handle carries
/// the outcome.
pub fn spawn(
    config: HarvestConfig,
    cancel: CancellationToken,
) -> (
    mpsc::Receiver<LanguageReport>,
    JoinHandle<Result<HarvestSummary, Error>>,
) {
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    let handle = tokio::spawn(run(config, tx, cancel));
    (rx, handle)
}

/// Fetch the report for a single repository, bypassing enumeration.
///
/// Uses the same credential chain as a full run.
pub async fn lookup_languages(
    config: &HarvestConfig,
    owner: &str,
    name: &str,
    cancel: &CancellationToken,
) -> Result<LanguageReport, Error> {
    let config = HarvestConfig {
        org: owner.to_string(),
        ..config.clone()
    };
    let client = connect(&config, cancel).await?;

    let repository = Repository {
        name: name.to_string(),
        full_name: format!("{}/{}", owner, name),
        owner: crate::client::RepositoryOwner {
            login: owner.to_string(),
        },
        archived: None,
        topics: None,
    };
    harvest_repository(&client, &repository, cancel).await
}

#[cfg(test)]
#[path = "harvest_tests.rs"]
mod tests;
