//! Installation-scoped access to the GitHub API.
//!
//! An `InstallationClient` holds the installation token obtained once at the
//! start of a run and attaches it to every outgoing request. It never renews
//! the token: once GitHub stops accepting it, requests fail with GitHub's own
//! rejection.

use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

use crate::auth::{InstallationId, InstallationToken};
use crate::client::{GitHubClient, GITHUB_ACCEPT_HEADER};
use crate::error::{ApiError, AuthError};

/// Installation-scoped GitHub API client.
///
/// Holds a reference to the parent `GitHubClient` for the shared HTTP client
/// and configuration. Cloning is cheap; the token is shared read-only.
#[derive(Debug, Clone)]
pub struct InstallationClient {
    /// Parent GitHub client (shared HTTP client and configuration)
    client: Arc<GitHubClient>,
    /// Token attached to every request
    token: Arc<InstallationToken>,
}

impl InstallationClient {
    /// Create a new installation client around an already issued token.
    ///
    /// # Arguments
    ///
    /// * `client` - Parent GitHubClient
    /// * `token` - Installation token to attach to every request
    pub fn new(client: Arc<GitHubClient>, token: InstallationToken) -> Self {
        Self {
            client,
            token: Arc::new(token),
        }
    }

    /// Get the installation ID this client is bound to.
    pub fn installation_id(&self) -> InstallationId {
        self.token.installation_id()
    }

    /// The token this client authenticates with.
    pub fn token(&self) -> &InstallationToken {
        &self.token
    }

    /// When the installation token stops being accepted.
    pub fn token_expires_at(&self) -> DateTime<Utc> {
        self.token.expires_at()
    }

    /// Parent client.
    pub fn client(&self) -> &GitHubClient {
        &self.client
    }

    fn url_for(&self, path: &str) -> String {
        // Normalize path - remove leading slash if present for consistent URL building
        let normalized_path = path.strip_prefix('/').unwrap_or(path);
        format!(
            "{}/{}",
            self.client.config().github_api_url.trim_end_matches('/'),
            normalized_path
        )
    }

    /// Make an authenticated GET request to the GitHub API.
    ///
    /// # Arguments
    ///
    /// * `path` - API path (e.g., "/repos/owner/repo" or "repos/owner/repo")
    ///
    /// # Returns
    ///
    /// Returns the raw `reqwest::Response`. Non-2xx statuses are not treated
    /// as errors here; see [`get_json`](Self::get_json).
    ///
    /// # Errors
    ///
    /// Returns `ApiError` for network failures and timeouts.
    pub async fn get(&self, path: &str) -> Result<reqwest::Response, ApiError> {
        self.get_with_query(path, &[]).await
    }

    /// Make an authenticated GET request with query parameters.
    pub async fn get_with_query(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<reqwest::Response, ApiError> {
        let url = self.url_for(path);
        debug!(url = %url, "GET");

        let response = self
            .client
            .http_client()
            .get(&url)
            .query(query)
            .header(AUTHORIZATION, format!("token {}", self.token.token()))
            .header(ACCEPT, GITHUB_ACCEPT_HEADER)
            .send()
            .await?;

        Ok(response)
    }

    /// GET a path and decode a successful JSON body.
    ///
    /// # Errors
    ///
    /// A non-2xx status is returned as `ApiError::HttpError` carrying GitHub's
    /// status code and response body unchanged, including the 401 GitHub
    /// sends once the installation token has expired.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let response = self.get_with_query(path, query).await?;
        let response = error_for_status(response).await?;
        Ok(response.json().await?)
    }
}

/// Turn a non-2xx response into `ApiError::HttpError`.
pub(crate) async fn error_for_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(ApiError::HttpError {
        status: status.as_u16(),
        message,
    })
}

impl GitHubClient {
    /// Create an installation-scoped client.
    ///
    /// Performs the token exchange for `installation_id` once. The returned
    /// client uses that token for the rest of its life.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` if the App assertion cannot be minted or GitHub
    /// refuses the exchange.
    pub async fn installation_by_id(
        &self,
        installation_id: InstallationId,
    ) -> Result<InstallationClient, AuthError> {
        let token = self
            .auth_provider()
            .installation_token(installation_id)
            .await?;

        Ok(InstallationClient::new(Arc::new(self.clone()), token))
    }
}

#[cfg(test)]
#[path = "installation_tests.rs"]
mod tests;
