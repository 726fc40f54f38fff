//! JWT (JSON Web Token) generation for GitHub App authentication.
//!
//! JWTs authenticate as the GitHub App itself and are exchanged for
//! installation tokens.
//!
//! # GitHub Requirements
//!
//! - JWTs must use RS256 algorithm (RSA Signature with SHA-256)
//! - Expiration may be at most 10 minutes after issuance
//! - Claims must include `iss` (app ID), `iat` (issued at), and `exp` (expiration)
//!
//! `iat` is backdated by 60 seconds to tolerate clock drift between this
//! host and GitHub.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::DecodePrivateKey;
use rsa::RsaPrivateKey;
use tracing::debug;

use crate::auth::{Credential, GitHubAppId, JsonWebToken, JwtClaims};
use crate::error::{AuthError, KeyParseError, SigningError};

/// Keys shorter than this cannot hold an RSA private key in PEM form.
const MIN_PLAUSIBLE_KEY_LENGTH: usize = 100;

/// How far `iat` is moved into the past, in seconds.
const CLOCK_SKEW_ALLOWANCE_SECS: i64 = 60;

const PKCS1_LABEL: &str = "RSA PRIVATE KEY";
const PKCS8_LABEL: &str = "PRIVATE KEY";

/// Interface for JWT token generation and signing.
///
/// This trait abstracts JWT generation to allow for different implementations
/// (production RSA signing, fixed tokens for testing, etc.).
pub trait JwtGenerator: Send + Sync {
    /// Generate a signed JWT for the App this generator is bound to.
    ///
    /// # Errors
    ///
    /// Returns `SigningError` if the token cannot be encoded.
    fn generate_jwt(&self) -> Result<JsonWebToken, SigningError>;

    /// The App ID placed in the `iss` claim.
    fn app_id(&self) -> GitHubAppId;

    /// Duration from `iat` to `exp`. Never exceeds 10 minutes.
    fn expiration_duration(&self) -> Duration;
}

/// RS256 JWT generator using RSA private keys.
///
/// # Examples
///
/// ```no_run
/// # use gh_languages_sdk::auth::{Credential, GitHubAppId, InstallationId, JwtGenerator, RS256JwtGenerator};
/// # let key_pem = std::fs::read("app.pem").unwrap();
/// let credential = Credential::new(GitHubAppId::new(123), InstallationId::new(456), key_pem);
/// let generator = RS256JwtGenerator::from_credential(&credential).unwrap();
///
/// let jwt = generator.generate_jwt().unwrap();
/// assert_eq!(jwt.app_id(), GitHubAppId::new(123));
/// ```
pub struct RS256JwtGenerator {
    app_id: GitHubAppId,
    encoding_key: EncodingKey,
    expiration_duration: Duration,
}

impl RS256JwtGenerator {
    /// Create a generator from a validated credential.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeyParse` if the key is not a usable RSA key, or
    /// `AuthError::Signing` if it cannot be prepared for signing.
    pub fn from_credential(credential: &Credential) -> Result<Self, AuthError> {
        let private_key = parse_rsa_private_key(credential.private_key_pem())?;

        let der = private_key
            .to_pkcs1_der()
            .map_err(|e| SigningError::InvalidKey {
                message: format!("Failed to encode RSA key: {}", e),
            })?;

        Ok(Self {
            app_id: credential.app_id(),
            encoding_key: EncodingKey::from_rsa_der(der.as_bytes()),
            expiration_duration: Duration::minutes(10), // GitHub's maximum
        })
    }

    /// Build JWT claims for a token issued at `issued_at`.
    fn build_claims(&self, issued_at: DateTime<Utc>) -> (JwtClaims, DateTime<Utc>) {
        let expires_at = issued_at + self.expiration_duration;

        let claims = JwtClaims {
            iss: self.app_id,
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };
        (claims, expires_at)
    }
}

impl JwtGenerator for RS256JwtGenerator {
    fn generate_jwt(&self) -> Result<JsonWebToken, SigningError> {
        let issued_at = Utc::now() - Duration::seconds(CLOCK_SKEW_ALLOWANCE_SECS);
        let (claims, expires_at) = self.build_claims(issued_at);

        let header = Header::new(Algorithm::RS256);
        let token_string =
            encode(&header, &claims, &self.encoding_key).map_err(|e| {
                SigningError::EncodingFailed {
                    message: format!("Failed to encode JWT: {}", e),
                }
            })?;

        debug!(
            app_id = %self.app_id,
            iat = claims.iat,
            exp = claims.exp,
            "Generated GitHub App JWT"
        );

        Ok(JsonWebToken::new(
            token_string,
            self.app_id,
            issued_at,
            expires_at,
        ))
    }

    fn app_id(&self) -> GitHubAppId {
        self.app_id
    }

    fn expiration_duration(&self) -> Duration {
        self.expiration_duration
    }
}

impl std::fmt::Debug for RS256JwtGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RS256JwtGenerator")
            .field("app_id", &self.app_id)
            .field("expiration_duration", &self.expiration_duration)
            .field("encoding_key", &"<REDACTED>")
            .finish()
    }
}

/// Decode a PEM block and parse it as an RSA private key.
///
/// Accepts PKCS#1 (`RSA PRIVATE KEY`) and PKCS#8 (`PRIVATE KEY`) blocks. The
/// three failure modes are kept apart: key material that is implausibly
/// short, text that is not PEM at all, and PEM that holds something other
/// than an RSA private key (EC, Ed25519, public keys, ...).
pub fn parse_rsa_private_key(pem_bytes: &[u8]) -> Result<RsaPrivateKey, KeyParseError> {
    let text = std::str::from_utf8(pem_bytes).map_err(|e| KeyParseError::NotPem {
        message: format!("key is not valid UTF-8: {}", e),
    })?;
    let text = text.trim();

    if text.len() < MIN_PLAUSIBLE_KEY_LENGTH {
        return Err(KeyParseError::TooShort { length: text.len() });
    }

    let block = pem::parse(text).map_err(|e| KeyParseError::NotPem {
        message: e.to_string(),
    })?;

    match block.tag() {
        PKCS1_LABEL => RsaPrivateKey::from_pkcs1_der(block.contents()).map_err(|e| {
            KeyParseError::UnsupportedKey {
                label: PKCS1_LABEL.to_string(),
                message: e.to_string(),
            }
        }),
        PKCS8_LABEL => RsaPrivateKey::from_pkcs8_der(block.contents()).map_err(|e| {
            KeyParseError::UnsupportedKey {
                label: PKCS8_LABEL.to_string(),
                message: format!("{} - ensure key is RSA and not EC/Ed25519", e),
            }
        }),
        other => Err(KeyParseError::UnsupportedKey {
            label: other.to_string(),
            message: "only RSA private keys can sign GitHub App JWTs".to_string(),
        }),
    }
}

#[cfg(test)]
#[path = "jwt_tests.rs"]
mod tests;
