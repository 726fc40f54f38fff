//! # gh-languages SDK
//!
//! Harvests the programming languages used by an organization's production
//! repositories, authenticating as a GitHub App.
//!
//! This SDK provides:
//! - GitHub App authentication: credential building, RS256 JWT minting and
//!   installation token exchange
//! - An installation-scoped API client that attaches the token to every request
//! - Paginated, filtered repository enumeration
//! - A streaming harvest that emits one [`LanguageReport`] per repository
//!   through a bounded channel
//!
//! # Examples
//!
//! ## Building a credential
//!
//! ```rust,no_run
//! use gh_languages_sdk::auth::{Credential, CredentialConfig};
//!
//! let config = CredentialConfig {
//!     app_id: Some("123456".into()),
//!     installation_id: Some(" 789012 ".into()),
//!     private_key_path: Some("/keys/app.pem".into()),
//!     ..CredentialConfig::default()
//! };
//!
//! let credential = Credential::from_config(&config)?;
//! assert_eq!(credential.installation_id().as_u64(), 789012);
//! # Ok::<(), gh_languages_sdk::error::ConfigError>(())
//! ```
//!
//! ## Checking token lifetime
//!
//! ```rust
//! use gh_languages_sdk::auth::{InstallationToken, InstallationId};
//! use chrono::{Utc, Duration};
//!
//! let token = InstallationToken::new(
//!     "ghs_token".to_string(),
//!     InstallationId::new(1),
//!     Utc::now() + Duration::minutes(3),
//! );
//!
//! if token.expires_soon(Duration::minutes(5)) {
//!     println!("Token expires soon; long runs will fail");
//! }
//! ```

// Public modules
pub mod auth;
pub mod client;
pub mod error;
pub mod harvest;

#[cfg(test)]
mod test_keys;

// Re-export commonly used types at crate root for convenience
pub use auth::{
    AuthenticationProvider, Credential, CredentialConfig, GitHubAppAuth, GitHubAppId,
    InstallationId, InstallationToken, JsonWebToken,
};
pub use client::{ClientConfig, GitHubClient, InstallationClient, Repository};
pub use error::Error;
pub use harvest::{HarvestConfig, HarvestSummary, LanguageReport};
