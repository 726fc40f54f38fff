//! Error types for the language harvesting pipeline.
//!
//! Every stage of the pipeline has its own error type so that a failure can be
//! traced back to the ID, repository or HTTP status that caused it. None of
//! these errors are retried internally; the first one encountered ends the run.

use thiserror::Error;

use crate::auth::{GitHubAppId, InstallationId};

/// Configuration errors raised by the credential builder.
///
/// These are detected before any network call is made.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required configuration field is absent or blank.
    #[error("Required configuration field missing: {field}")]
    Missing { field: &'static str },

    /// A numeric ID could not be parsed.
    #[error("Failed to parse {field} '{value}' as integer: {source}")]
    InvalidId {
        field: &'static str,
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// A numeric ID parsed but is zero or negative.
    #[error("{field} must be a positive integer, got {value}")]
    NonPositiveId { field: &'static str, value: i64 },

    /// Neither inline key material nor a key path was supplied.
    #[error("GitHub App private key is required (either private_key or private_key_path)")]
    MissingPrivateKey,

    /// The private key file could not be read.
    #[error("Failed to read private key from file {path}: {source}")]
    KeyFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The key material lacks a `-----BEGIN` or `-----END` delimiter.
    #[error("Private key must be in PEM format: missing {marker} marker")]
    MissingPemMarker { marker: &'static str },

    /// The key is neither PEM nor base64-wrapped PEM.
    #[error("Private key is not PEM and could not be decoded as base64 PEM: {message}")]
    UndecodableKey { message: String },
}

/// Errors while turning PEM key material into an RSA signing key.
#[derive(Debug, Error)]
pub enum KeyParseError {
    /// The key is far too short to hold an RSA private key.
    #[error("Private key appears too short ({length} chars) - ensure the full key is provided")]
    TooShort { length: usize },

    /// The key material could not be decoded as a PEM block.
    #[error("Private key is not a valid PEM block: {message}")]
    NotPem { message: String },

    /// The PEM block decoded but does not hold a supported RSA key.
    #[error("PEM block '{label}' is not a supported RSA private key (expected PKCS#1 or PKCS#8): {message}")]
    UnsupportedKey { label: String, message: String },
}

/// Errors during JWT signing operations.
#[derive(Debug, Error)]
pub enum SigningError {
    /// The parsed key could not be re-encoded for the signer.
    #[error("Invalid signing key: {message}")]
    InvalidKey { message: String },

    /// Failed to encode the JWT token.
    #[error("Token encoding failed: {message}")]
    EncodingFailed { message: String },
}

/// Errors while authenticating as the GitHub App installation.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The private key could not be parsed.
    #[error(transparent)]
    KeyParse(#[from] KeyParseError),

    /// The App assertion could not be signed.
    #[error("JWT signing failed: {0}")]
    Signing(#[from] SigningError),

    /// GitHub rejected the assertion or the installation, or the request failed.
    #[error(
        "Failed to create installation token{}: {message} - verify App ID ({app_id}) and Installation ID ({installation_id}) are correct",
        .status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
    )]
    TokenExchange {
        app_id: GitHubAppId,
        installation_id: InstallationId,
        status: Option<u16>,
        message: String,
    },

    /// GitHub reported success but returned no token.
    #[error("Received empty installation token for installation {installation_id} (App ID {app_id})")]
    EmptyToken {
        app_id: GitHubAppId,
        installation_id: InstallationId,
    },
}

impl AuthError {
    /// HTTP status returned by GitHub during token exchange, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::TokenExchange { status, .. } => *status,
            _ => None,
        }
    }
}

/// Errors during installation-scoped GitHub API calls.
///
/// A non-success response keeps GitHub's status code and body untouched so
/// that an expired or revoked token surfaces exactly as GitHub reported it.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP error response from GitHub API.
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    /// Request to GitHub API timed out.
    #[error("Request timeout")]
    Timeout,

    /// Failed to parse JSON response from GitHub API.
    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// HTTP client error (network, TLS, etc.).
    #[error("HTTP client error: {0}")]
    HttpClientError(reqwest::Error),

    /// The HTTP client or a request could not be built.
    #[error("Client configuration error: {message}")]
    Configuration { message: String },
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Configuration {
                message: format!("Failed to decode response body: {}", e),
            }
        } else {
            Self::HttpClientError(e)
        }
    }
}

impl ApiError {
    /// HTTP status code for responses GitHub rejected.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Listing the organisation's repositories failed.
#[derive(Debug, Error)]
#[error("Failed to list repositories for organization '{org}' (page {page}): {source}")]
pub struct EnumerationError {
    pub org: String,
    pub page: u32,
    #[source]
    pub source: ApiError,
}

/// Fetching one repository's languages failed.
#[derive(Debug, Error)]
#[error("Failed to fetch languages for {owner}/{name}: {source}")]
pub struct HarvestError {
    pub owner: String,
    pub name: String,
    #[source]
    pub source: ApiError,
}

/// Top-level error for a harvesting run.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Enumeration(#[from] EnumerationError),

    #[error(transparent)]
    Harvest(#[from] HarvestError),

    /// The shared HTTP client could not be created.
    #[error("HTTP client error: {0}")]
    Client(#[from] ApiError),

    /// The run was cancelled before it completed.
    #[error("Harvest cancelled")]
    Cancelled,

    /// The consumer dropped its end of the output channel.
    #[error("Output channel closed by consumer")]
    OutputClosed,
}

impl From<KeyParseError> for Error {
    fn from(e: KeyParseError) -> Self {
        Self::Auth(AuthError::KeyParse(e))
    }
}

impl From<SigningError> for Error {
    fn from(e: SigningError) -> Self {
        Self::Auth(AuthError::Signing(e))
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
