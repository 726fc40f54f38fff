//! GitHub API client for authenticated operations.
//!
//! `GitHubClient` owns the shared HTTP client and the authentication provider.
//! It performs the single installation token exchange of a run and hands out
//! an [`InstallationClient`], the authenticated transport every repository and
//! language request goes through.

mod installation;
mod pagination;
mod repository;

use std::sync::Arc;
use std::time::Duration;

use crate::auth::AuthenticationProvider;
use crate::error::ApiError;

pub use installation::InstallationClient;
pub use pagination::{extract_page_number, parse_link_header, PagedResponse, Pagination};
pub use repository::{
    LanguageMap, Repository, RepositoryEnumerator, RepositoryOwner, PRODUCTION_TOPIC,
};

/// Media type sent in the `Accept` header of every GitHub request.
pub const GITHUB_ACCEPT_HEADER: &str = "application/vnd.github+json";

/// Largest page size GitHub accepts for list endpoints.
pub const MAX_PER_PAGE: u32 = 100;

/// Configuration for GitHub API client behavior.
///
/// Controls timeouts, page size and the API endpoint.
///
/// # Examples
///
/// ```
/// use gh_languages_sdk::client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::default()
///     .with_timeout(Duration::from_secs(60))
///     .with_github_api_url("https://github.example.com/api/v3");
///
/// assert_eq!(config.per_page, 100);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// User agent string for API requests (required by GitHub)
    pub user_agent: String,
    /// Request timeout duration
    pub timeout: Duration,
    /// GitHub API base URL
    pub github_api_url: String,
    /// Page size for list endpoints (1 to 100)
    pub per_page: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("gh-languages/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout: Duration::from_secs(30),
            github_api_url: "https://api.github.com".to_string(),
            per_page: MAX_PER_PAGE,
        }
    }
}

impl ClientConfig {
    /// Set the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the GitHub API base URL.
    pub fn with_github_api_url(mut self, url: impl Into<String>) -> Self {
        self.github_api_url = url.into();
        self
    }

    /// Set the page size, clamped to what GitHub accepts.
    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.clamp(1, MAX_PER_PAGE);
        self
    }

    /// Build the HTTP client shared by the token exchange and API calls.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Configuration` if the client cannot be created.
    pub fn http_client(&self) -> Result<reqwest::Client, ApiError> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(&self.user_agent)
            .build()
            .map_err(|e| ApiError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })
    }

    /// Authentication settings matching this client configuration.
    pub fn auth_config(&self) -> crate::auth::AuthConfig {
        crate::auth::AuthConfig {
            github_api_url: self.github_api_url.clone(),
            user_agent: self.user_agent.clone(),
            exchange_timeout: self.timeout,
        }
    }
}

/// GitHub API client for authenticated operations.
///
/// # Examples
///
/// ```no_run
/// # use gh_languages_sdk::client::{GitHubClient, ClientConfig};
/// # use gh_languages_sdk::auth::{AuthenticationProvider, InstallationId};
/// # async fn example(auth: impl AuthenticationProvider + 'static) -> Result<(), Box<dyn std::error::Error>> {
/// let client = GitHubClient::builder(auth)
///     .config(ClientConfig::default())
///     .build()?;
///
/// let installation = client.installation_by_id(InstallationId::new(42)).await?;
/// let languages = installation.list_languages("octocat", "Hello-World").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct GitHubClient {
    auth: Arc<dyn AuthenticationProvider>,
    http_client: reqwest::Client,
    config: ClientConfig,
}

impl GitHubClient {
    /// Create a new builder for constructing a GitHub client.
    ///
    /// # Arguments
    ///
    /// * `auth` - Authentication provider for obtaining tokens
    pub fn builder(auth: impl AuthenticationProvider + 'static) -> GitHubClientBuilder {
        GitHubClientBuilder::new(Arc::new(auth))
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the authentication provider.
    pub fn auth_provider(&self) -> &dyn AuthenticationProvider {
        self.auth.as_ref()
    }

    /// Get the HTTP client (internal use by InstallationClient).
    pub(crate) fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }
}

impl std::fmt::Debug for GitHubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubClient")
            .field("config", &self.config)
            .field("auth", &"<AuthenticationProvider>")
            .finish()
    }
}

/// Builder for constructing `GitHubClient` instances.
pub struct GitHubClientBuilder {
    auth: Arc<dyn AuthenticationProvider>,
    config: Option<ClientConfig>,
    http_client: Option<reqwest::Client>,
}

impl GitHubClientBuilder {
    fn new(auth: Arc<dyn AuthenticationProvider>) -> Self {
        Self {
            auth,
            config: None,
            http_client: None,
        }
    }

    /// Set the client configuration.
    ///
    /// If not set, uses `ClientConfig::default()`.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Reuse an existing HTTP client instead of building one from the config.
    pub fn http_client(mut self, http_client: reqwest::Client) -> Self {
        self.http_client = Some(http_client);
        self
    }

    /// Build the GitHub client.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Configuration` if the HTTP client cannot be created.
    pub fn build(self) -> Result<GitHubClient, ApiError> {
        let config = self.config.unwrap_or_default();

        let http_client = match self.http_client {
            Some(http_client) => http_client,
            None => config.http_client()?,
        };

        Ok(GitHubClient {
            auth: self.auth,
            http_client,
            config,
        })
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
