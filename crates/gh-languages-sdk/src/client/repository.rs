//! Repository listing and language lookup.
//!
//! Repositories of an organization are listed page by page and filtered to
//! the production candidates: not archived and tagged with the `production`
//! topic. Each page is requested only when the previous one has been
//! consumed.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, info};

use crate::client::pagination::{parse_link_header, PagedResponse};
use crate::client::InstallationClient;
use crate::error::{ApiError, EnumerationError};

/// Topic a repository must carry to be harvested.
pub const PRODUCTION_TOPIC: &str = "production";

/// Bytes of code per language, as returned by GitHub.
pub type LanguageMap = BTreeMap<String, u64>;

/// GitHub repository, reduced to the fields the harvest needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    pub owner: RepositoryOwner,

    /// `None` when GitHub omitted the flag.
    #[serde(default)]
    pub archived: Option<bool>,

    /// `None` when GitHub omitted the list or sent `null`.
    #[serde(default)]
    pub topics: Option<Vec<String>>,
}

/// Repository owner (user or organization).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryOwner {
    pub login: String,
}

impl Repository {
    /// Topics attached to the repository. Missing topics read as none.
    pub fn topics(&self) -> &[String] {
        self.topics.as_deref().unwrap_or(&[])
    }

    /// Whether the repository carries `topic`.
    pub fn has_topic(&self, topic: &str) -> bool {
        self.topics().iter().any(|t| t == topic)
    }

    /// Not archived and tagged `production`.
    ///
    /// A repository whose archived flag is unknown is excluded.
    pub fn is_production_candidate(&self) -> bool {
        self.archived == Some(false) && self.has_topic(PRODUCTION_TOPIC)
    }
}

impl InstallationClient {
    /// List one page of an organization's repositories.
    ///
    /// # Arguments
    ///
    /// * `org` - Organization login
    /// * `page` - 1-based page number
    ///
    /// # Errors
    ///
    /// Returns `ApiError::HttpError` with GitHub's status and body when the
    /// request is rejected.
    pub async fn list_org_repositories(
        &self,
        org: &str,
        page: u32,
    ) -> Result<PagedResponse<Repository>, ApiError> {
        let path = format!("/orgs/{}/repos", org);
        let query = [
            ("per_page", self.client().config().per_page.to_string()),
            ("page", page.to_string()),
        ];

        let response = self.get_with_query(&path, &query).await?;
        let response = super::installation::error_for_status(response).await?;

        let pagination = parse_link_header(
            response
                .headers()
                .get(reqwest::header::LINK)
                .and_then(|value| value.to_str().ok()),
        );
        let items: Vec<Repository> = response.json().await?;

        debug!(org = %org, page, count = items.len(), has_next = pagination.has_next(), "Fetched repository page");

        Ok(PagedResponse {
            items,
            page,
            pagination,
        })
    }

    /// Enumerate the production candidates of an organization.
    ///
    /// Each call starts again from page 1.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use gh_languages_sdk::client::InstallationClient;
    /// # async fn example(client: &InstallationClient) -> Result<(), Box<dyn std::error::Error>> {
    /// let mut repositories = client.enumerate_repositories("acme");
    /// while let Some(repository) = repositories.next().await? {
    ///     println!("{}", repository.full_name);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn enumerate_repositories(&self, org: &str) -> RepositoryEnumerator {
        RepositoryEnumerator::new(self.clone(), org)
    }

    /// Get the language breakdown of a repository.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::HttpError` with GitHub's status and body when the
    /// request is rejected.
    pub async fn list_languages(&self, owner: &str, repo: &str) -> Result<LanguageMap, ApiError> {
        let path = format!("/repos/{}/{}/languages", owner, repo);
        self.get_json(&path, &[]).await
    }
}

/// Lazy, forward-only sequence of production candidates.
///
/// Pages are fetched on demand in ascending order. Within a page, GitHub's
/// order is preserved.
#[derive(Debug)]
pub struct RepositoryEnumerator {
    client: InstallationClient,
    org: String,
    next_page: Option<u32>,
    buffered: VecDeque<Repository>,
    pages_fetched: u32,
    repositories_seen: u64,
    repositories_accepted: u64,
}

impl RepositoryEnumerator {
    fn new(client: InstallationClient, org: &str) -> Self {
        Self {
            client,
            org: org.to_string(),
            next_page: Some(1),
            buffered: VecDeque::new(),
            pages_fetched: 0,
            repositories_seen: 0,
            repositories_accepted: 0,
        }
    }

    /// Next accepted repository, or `None` once every page has been read.
    ///
    /// # Errors
    ///
    /// Returns `EnumerationError` naming the organization and page when a
    /// page request fails. The enumerator must not be used afterwards.
    pub async fn next(&mut self) -> Result<Option<Repository>, EnumerationError> {
        loop {
            if let Some(repository) = self.buffered.pop_front() {
                return Ok(Some(repository));
            }

            let Some(page) = self.next_page else {
                return Ok(None);
            };

            let response = self
                .client
                .list_org_repositories(&self.org, page)
                .await
                .map_err(|source| EnumerationError {
                    org: self.org.clone(),
                    page,
                    source,
                })?;

            self.pages_fetched += 1;
            self.next_page = response.next_page_number();
            self.repositories_seen += response.items.len() as u64;

            let accepted: Vec<Repository> = response
                .items
                .into_iter()
                .filter(Repository::is_production_candidate)
                .collect();
            self.repositories_accepted += accepted.len() as u64;

            info!(
                org = %self.org,
                page,
                accepted = accepted.len(),
                accepted_total = self.repositories_accepted,
                "Counted production repositories so far"
            );

            self.buffered.extend(accepted);
        }
    }

    /// Organization being enumerated.
    pub fn org(&self) -> &str {
        &self.org
    }

    /// Pages requested so far.
    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    /// Repositories listed so far, accepted or not.
    pub fn repositories_seen(&self) -> u64 {
        self.repositories_seen
    }

    /// Repositories that passed the production filter so far.
    pub fn repositories_accepted(&self) -> u64 {
        self.repositories_accepted
    }
}

#[cfg(test)]
#[path = "repository_tests.rs"]
mod tests;
