//! GitHub App authentication types and interfaces.
//!
//! This module provides the authentication chain used by a harvesting run:
//! - ID types (GitHubAppId, InstallationId)
//! - Credential building from raw configuration ([`credentials`])
//! - App-level JWT minting ([`jwt`])
//! - Installation token exchange ([`tokens`])

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{AuthError, ConfigError};

pub mod credentials;
pub mod jwt;
pub mod tokens;

pub use credentials::{Credential, CredentialConfig, IdValue};
pub use jwt::{JwtGenerator, RS256JwtGenerator};
pub use tokens::{AuthConfig, GitHubAppAuth};

// ============================================================================
// Core ID Types
// ============================================================================

/// GitHub App identifier assigned during app registration.
///
/// Used as the `iss` claim of every App-level JWT.
///
/// # Examples
///
/// ```
/// use gh_languages_sdk::auth::GitHubAppId;
///
/// let app_id = GitHubAppId::new(123456);
/// assert_eq!(app_id.as_u64(), 123456);
/// assert_eq!(app_id.to_string(), "123456");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GitHubAppId(u64);

impl GitHubAppId {
    /// Create a new GitHub App ID.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw u64 value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for GitHubAppId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GitHubAppId {
    type Err = ConfigError;

    /// Parse an App ID, ignoring surrounding whitespace.
    ///
    /// ```
    /// use gh_languages_sdk::auth::GitHubAppId;
    ///
    /// let app_id: GitHubAppId = "  12345  ".parse().unwrap();
    /// assert_eq!(app_id, GitHubAppId::new(12345));
    /// ```
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        credentials::parse_positive_id("app_id", s).map(Self::new)
    }
}

/// GitHub App installation identifier for one organization.
///
/// # Examples
///
/// ```
/// use gh_languages_sdk::auth::InstallationId;
///
/// let installation = InstallationId::new(98765);
/// assert_eq!(installation.as_u64(), 98765);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstallationId(u64);

impl InstallationId {
    /// Create a new installation ID.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw u64 value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for InstallationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for InstallationId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        credentials::parse_positive_id("installation_id", s).map(Self::new)
    }
}

// ============================================================================
// Token Types
// ============================================================================

/// JWT token for GitHub App authentication.
///
/// This is the App-level assertion: it proves the identity of the App but is
/// not scoped to any installation. It is single use, created right before a
/// token exchange.
///
/// The token string is never exposed in Debug output for security.
///
/// # Examples
///
/// ```
/// use gh_languages_sdk::auth::{JsonWebToken, GitHubAppId};
/// use chrono::{Utc, Duration};
///
/// let app_id = GitHubAppId::new(123);
/// let issued_at = Utc::now() - Duration::seconds(60);
/// let expires_at = issued_at + Duration::minutes(10);
/// let jwt = JsonWebToken::new("encoded.jwt.token".to_string(), app_id, issued_at, expires_at);
///
/// assert!(!jwt.is_expired());
/// assert_eq!(jwt.app_id(), app_id);
/// ```
#[derive(Clone)]
pub struct JsonWebToken {
    token: String,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    app_id: GitHubAppId,
}

impl JsonWebToken {
    /// Create a new JWT token.
    ///
    /// # Arguments
    ///
    /// * `token` - The encoded JWT string
    /// * `app_id` - The GitHub App ID this token represents
    /// * `issued_at` - Value of the `iat` claim
    /// * `expires_at` - Value of the `exp` claim
    pub fn new(
        token: String,
        app_id: GitHubAppId,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token,
            issued_at,
            expires_at,
            app_id,
        }
    }

    /// Get the token string for use in API requests.
    ///
    /// This should be included in the Authorization header as:
    /// `Authorization: Bearer <token>`
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Get the GitHub App ID this token represents.
    pub fn app_id(&self) -> GitHubAppId {
        self.app_id
    }

    /// Get the `iat` timestamp (backdated to tolerate clock skew).
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Get when this token expires.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Check if the token is currently expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

// Security: Don't expose token in debug output
impl std::fmt::Debug for JsonWebToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonWebToken")
            .field("app_id", &self.app_id)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

/// Installation-scoped access token for GitHub API operations.
///
/// Installation tokens act on behalf of one installation and expire after
/// about an hour. A run never renews its token: once it expires, GitHub
/// rejects further calls and the run fails.
///
/// The token string is never exposed in Debug output for security.
///
/// # Examples
///
/// ```
/// use gh_languages_sdk::auth::{InstallationToken, InstallationId};
/// use chrono::{Utc, Duration};
///
/// let installation_id = InstallationId::new(456);
/// let expires_at = Utc::now() + Duration::hours(1);
///
/// let token = InstallationToken::new("ghs_token".to_string(), installation_id, expires_at);
///
/// assert_eq!(token.installation_id(), installation_id);
/// assert!(!token.is_expired());
/// ```
#[derive(Clone)]
pub struct InstallationToken {
    token: String,
    installation_id: InstallationId,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl InstallationToken {
    /// Create a new installation token.
    ///
    /// # Arguments
    ///
    /// * `token` - The token string from GitHub API
    /// * `installation_id` - The installation this token is for
    /// * `expires_at` - When the token expires (typically 1 hour)
    pub fn new(token: String, installation_id: InstallationId, expires_at: DateTime<Utc>) -> Self {
        Self {
            token,
            installation_id,
            issued_at: Utc::now(),
            expires_at,
        }
    }

    /// Get the token string for use in API requests.
    ///
    /// This should be included in the Authorization header as:
    /// `Authorization: token <token>`
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Get the installation ID this token is for.
    pub fn installation_id(&self) -> InstallationId {
        self.installation_id
    }

    /// Get when this token was received.
    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    /// Get when this token expires.
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Check if the token is currently expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Check if the token will expire within `margin`.
    pub fn expires_soon(&self, margin: Duration) -> bool {
        Utc::now() + margin >= self.expires_at
    }
}

// Security: Redact token in debug output
impl std::fmt::Debug for InstallationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstallationToken")
            .field("installation_id", &self.installation_id)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("token", &"<REDACTED>")
            .finish()
    }
}

/// JWT claims structure for GitHub App authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Issuer (GitHub App ID)
    pub iss: GitHubAppId,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp, at most 10 minutes after iat)
    pub exp: i64,
}

// ============================================================================
// Trait Definitions
// ============================================================================

/// Interface for obtaining GitHub App credentials.
///
/// The harvesting pipeline depends on this trait rather than on
/// [`GitHubAppAuth`] so that the token exchange can be substituted in tests.
#[async_trait::async_trait]
pub trait AuthenticationProvider: Send + Sync {
    /// Generate a fresh JWT for App-level authentication.
    async fn app_token(&self) -> Result<JsonWebToken, AuthError>;

    /// Exchange an App JWT for an installation token.
    async fn installation_token(
        &self,
        installation_id: InstallationId,
    ) -> Result<InstallationToken, AuthError>;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
