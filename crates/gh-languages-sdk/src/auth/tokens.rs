//! GitHub App token management and AuthenticationProvider implementation.
//!
//! Presents a freshly minted App JWT to GitHub and receives an installation
//! token in exchange. Tokens are never cached or refreshed: each call to
//! [`AuthenticationProvider::installation_token`] performs a new exchange.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{
    AuthenticationProvider, Credential, GitHubAppId, InstallationId, InstallationToken,
    JsonWebToken, JwtGenerator, RS256JwtGenerator,
};
use crate::client::GITHUB_ACCEPT_HEADER;
use crate::error::AuthError;

/// Configuration for authentication behavior.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// GitHub API endpoint (for GitHub Enterprise support)
    pub github_api_url: String,

    /// User agent for GitHub API requests
    pub user_agent: String,

    /// Upper bound on a single token exchange, independent of cancellation
    pub exchange_timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            github_api_url: "https://api.github.com".to_string(),
            user_agent: concat!("gh-languages/", env!("CARGO_PKG_VERSION")).to_string(),
            exchange_timeout: Duration::from_secs(30),
        }
    }
}

/// Body of `POST /app/installations/{id}/access_tokens`.
#[derive(Debug, Deserialize)]
struct AccessTokenResponse {
    token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

/// Main GitHub App authentication provider.
///
/// Owns the JWT generator (and through it the App's private key) and
/// performs the installation token exchange over the HTTP client it is
/// given, normally the one shared with [`GitHubClient`](crate::client::GitHubClient).
pub struct GitHubAppAuth<J = RS256JwtGenerator>
where
    J: JwtGenerator,
{
    jwt_generator: Arc<J>,
    http_client: reqwest::Client,
    config: AuthConfig,
}

impl GitHubAppAuth<RS256JwtGenerator> {
    /// Create a provider that signs with the credential's RSA key.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeyParse` or `AuthError::Signing` if the key is not
    /// usable.
    pub fn from_credential(
        credential: &Credential,
        config: AuthConfig,
        http_client: reqwest::Client,
    ) -> Result<Self, AuthError> {
        let generator = RS256JwtGenerator::from_credential(credential)?;
        Ok(Self::new(generator, config, http_client))
    }
}

impl<J> GitHubAppAuth<J>
where
    J: JwtGenerator,
{
    /// Create a new GitHub App authentication provider.
    pub fn new(jwt_generator: J, config: AuthConfig, http_client: reqwest::Client) -> Self {
        Self {
            jwt_generator: Arc::new(jwt_generator),
            http_client,
            config,
        }
    }

    /// Get configuration.
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// The App this provider authenticates as.
    pub fn app_id(&self) -> GitHubAppId {
        self.jwt_generator.app_id()
    }

    async fn exchange(
        &self,
        jwt: &JsonWebToken,
        installation_id: InstallationId,
    ) -> Result<InstallationToken, AuthError> {
        let app_id = jwt.app_id();
        let exchange_error = |status: Option<u16>, message: String| AuthError::TokenExchange {
            app_id,
            installation_id,
            status,
            message,
        };

        let url = format!(
            "{}/app/installations/{}/access_tokens",
            self.config.github_api_url.trim_end_matches('/'),
            installation_id.as_u64()
        );

        debug!(app_id = %app_id, installation_id = %installation_id, "Requesting installation token");

        let response = self
            .http_client
            .post(&url)
            .header(AUTHORIZATION, format!("Bearer {}", jwt.token()))
            .header(ACCEPT, GITHUB_ACCEPT_HEADER)
            .header(USER_AGENT, &self.config.user_agent)
            .timeout(self.config.exchange_timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    exchange_error(
                        None,
                        format!(
                            "request timed out after {}s",
                            self.config.exchange_timeout.as_secs()
                        ),
                    )
                } else {
                    exchange_error(None, format!("HTTP request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            return Err(exchange_error(Some(status.as_u16()), error_text));
        }

        let body = response
            .json::<AccessTokenResponse>()
            .await
            .map_err(|e| {
                exchange_error(
                    Some(status.as_u16()),
                    format!("Failed to parse access token response: {}", e),
                )
            })?;

        let token = match body.token {
            Some(token) if !token.is_empty() => token,
            _ => {
                return Err(AuthError::EmptyToken {
                    app_id,
                    installation_id,
                })
            }
        };

        let expires_at = match body.expires_at {
            Some(expires_at) => expires_at,
            None => {
                warn!(
                    installation_id = %installation_id,
                    "Access token response has no expires_at; assuming one hour"
                );
                Utc::now() + chrono::Duration::hours(1)
            }
        };

        if expires_at <= Utc::now() {
            return Err(exchange_error(
                Some(status.as_u16()),
                format!("Installation token already expired at {}", expires_at),
            ));
        }

        info!(
            app_id = %app_id,
            installation_id = %installation_id,
            expires_at = %expires_at,
            "Created installation token"
        );

        Ok(InstallationToken::new(token, installation_id, expires_at))
    }
}

#[async_trait]
impl<J> AuthenticationProvider for GitHubAppAuth<J>
where
    J: JwtGenerator + 'static,
{
    async fn app_token(&self) -> Result<JsonWebToken, AuthError> {
        Ok(self.jwt_generator.generate_jwt()?)
    }

    async fn installation_token(
        &self,
        installation_id: InstallationId,
    ) -> Result<InstallationToken, AuthError> {
        // A new assertion per exchange; it is dropped once the exchange completes.
        let jwt = self.app_token().await?;
        self.exchange(&jwt, installation_id).await
    }
}

impl<J> std::fmt::Debug for GitHubAppAuth<J>
where
    J: JwtGenerator,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubAppAuth")
            .field("app_id", &self.jwt_generator.app_id())
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
#[path = "tokens_tests.rs"]
mod tests;
