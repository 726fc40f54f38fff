//! Credential building from raw configuration.
//!
//! Turns the loosely typed configuration surface (IDs as strings or numbers,
//! key material inline or on disk) into a validated [`Credential`]. Nothing in
//! this module touches the network; at most one file is read.
//!
//! When both an inline key and a key path are configured the inline key wins
//! and the ignored path is logged.

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

use super::{GitHubAppId, InstallationId};
use crate::error::ConfigError;

const PEM_BEGIN: &str = "-----BEGIN";
const PEM_END: &str = "-----END";

/// A numeric ID as it appears in configuration.
///
/// Config files and environment variables may carry IDs either as numbers or
/// as strings, so both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdValue {
    Number(i64),
    Text(String),
}

impl From<&str> for IdValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for IdValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for IdValue {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

/// Raw GitHub App credential configuration.
///
/// # Examples
///
/// ```
/// use gh_languages_sdk::auth::CredentialConfig;
///
/// let config: CredentialConfig = serde_json::from_str(
///     r#"{"app_id": 123, "installation_id": "456", "private_key_path": "/keys/app.pem"}"#,
/// ).unwrap();
///
/// assert!(config.private_key.is_none());
/// ```
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CredentialConfig {
    /// GitHub App ID.
    #[serde(default)]
    pub app_id: Option<IdValue>,

    /// Installation ID of the App in the target organization.
    #[serde(default)]
    pub installation_id: Option<IdValue>,

    /// Inline PEM key material. Takes precedence over `private_key_path`.
    #[serde(default)]
    pub private_key: Option<String>,

    /// Path to a PEM key file.
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,
}

// Security: Don't expose key material in debug output
impl std::fmt::Debug for CredentialConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialConfig")
            .field("app_id", &self.app_id)
            .field("installation_id", &self.installation_id)
            .field(
                "private_key",
                &self.private_key.as_ref().map(|_| "<REDACTED>"),
            )
            .field("private_key_path", &self.private_key_path)
            .finish()
    }
}

/// Validated credential set for one run.
///
/// Constructed once from configuration and immutable afterwards. The key is
/// known to be PEM framed but has not yet been parsed as RSA; that happens in
/// [`RS256JwtGenerator::from_credential`](super::RS256JwtGenerator::from_credential).
#[derive(Clone)]
pub struct Credential {
    app_id: GitHubAppId,
    installation_id: InstallationId,
    private_key_pem: Vec<u8>,
}

impl Credential {
    /// Build a credential from raw configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an ID is missing, malformed or not positive, if
    /// no key material is configured, if the key file cannot be read, or if
    /// the key lacks PEM `-----BEGIN` / `-----END` delimiters.
    pub fn from_config(config: &CredentialConfig) -> Result<Self, ConfigError> {
        let app_id = GitHubAppId::new(parse_id_value("app_id", config.app_id.as_ref())?);
        let installation_id = InstallationId::new(parse_id_value(
            "installation_id",
            config.installation_id.as_ref(),
        )?);

        let raw_key = load_key_material(config)?;
        let private_key = normalize_key_material(&raw_key)?;

        info!(
            app_id = %app_id,
            installation_id = %installation_id,
            "GitHub App credential configured"
        );

        Ok(Self {
            app_id,
            installation_id,
            private_key_pem: private_key.into_bytes(),
        })
    }

    /// Create a credential from already validated parts.
    pub fn new(
        app_id: GitHubAppId,
        installation_id: InstallationId,
        private_key_pem: Vec<u8>,
    ) -> Self {
        Self {
            app_id,
            installation_id,
            private_key_pem,
        }
    }

    pub fn app_id(&self) -> GitHubAppId {
        self.app_id
    }

    pub fn installation_id(&self) -> InstallationId {
        self.installation_id
    }

    /// PEM encoded private key bytes.
    pub fn private_key_pem(&self) -> &[u8] {
        &self.private_key_pem
    }
}

// Security: Don't expose key data in debug output
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("app_id", &self.app_id)
            .field("installation_id", &self.installation_id)
            .field("private_key_pem", &"<REDACTED>")
            .finish()
    }
}

fn parse_id_value(field: &'static str, value: Option<&IdValue>) -> Result<u64, ConfigError> {
    match value {
        None => Err(ConfigError::Missing { field }),
        Some(IdValue::Number(n)) if *n > 0 => Ok(*n as u64),
        Some(IdValue::Number(n)) => Err(ConfigError::NonPositiveId { field, value: *n }),
        Some(IdValue::Text(s)) => parse_positive_id(field, s),
    }
}

/// Parse a positive 64-bit ID from a string, ignoring surrounding whitespace.
pub(crate) fn parse_positive_id(field: &'static str, raw: &str) -> Result<u64, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Missing { field });
    }

    if trimmed.starts_with("${file:") && trimmed.ends_with('}') {
        warn!(
            field,
            "ID contains unexpanded file interpolation syntax - it must be resolved before use"
        );
    }

    let id = trimmed
        .parse::<i64>()
        .map_err(|source| ConfigError::InvalidId {
            field,
            value: raw.to_string(),
            source,
        })?;

    if id <= 0 {
        return Err(ConfigError::NonPositiveId { field, value: id });
    }

    Ok(id as u64)
}

fn load_key_material(config: &CredentialConfig) -> Result<String, ConfigError> {
    let inline = config
        .private_key
        .as_deref()
        .filter(|key| !key.trim().is_empty());
    let key_path = config
        .private_key_path
        .as_ref()
        .filter(|path| !path.as_os_str().is_empty());

    if let Some(key) = inline {
        if let Some(path) = key_path {
            warn!(
                key_path = %path.display(),
                "Both private_key and private_key_path are set; using inline private_key"
            );
        }
        info!("Using private key from config");
        return Ok(key.to_string());
    }

    if let Some(path) = key_path {
        let key = std::fs::read_to_string(path).map_err(|source| ConfigError::KeyFileRead {
            path: path.display().to_string(),
            source,
        })?;
        info!(key_path = %path.display(), "Loaded private key from file");
        return Ok(key);
    }

    Err(ConfigError::MissingPrivateKey)
}

/// Normalise raw key material into PEM text.
///
/// Accepts keys with literal `\n` escapes (as produced by some secret stores)
/// and base64-wrapped PEM. The result always contains both PEM delimiters.
pub fn normalize_key_material(raw: &str) -> Result<String, ConfigError> {
    let mut key = raw.trim().to_string();
    if key.is_empty() {
        return Err(ConfigError::MissingPrivateKey);
    }

    if !key.contains(PEM_BEGIN) && !key.contains(PEM_END) {
        key = decode_base64_pem(&key)?;
    }

    let key = key.replace("\\n", "\n").trim().to_string();

    if !key.contains(PEM_BEGIN) {
        return Err(ConfigError::MissingPemMarker { marker: PEM_BEGIN });
    }
    if !key.contains(PEM_END) {
        return Err(ConfigError::MissingPemMarker { marker: PEM_END });
    }

    Ok(key)
}

fn decode_base64_pem(key: &str) -> Result<String, ConfigError> {
    let compact: String = key.chars().filter(|c| !c.is_whitespace()).collect();
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| ConfigError::UndecodableKey {
            message: e.to_string(),
        })?;
    let decoded = String::from_utf8(decoded).map_err(|e| ConfigError::UndecodableKey {
        message: e.to_string(),
    })?;

    if !decoded.contains(PEM_BEGIN) {
        return Err(ConfigError::MissingPemMarker { marker: PEM_BEGIN });
    }

    info!("Decoded base64-wrapped private key");
    Ok(decoded)
}

#[cfg(test)]
#[path = "credentials_tests.rs"]
mod tests;
