//! # gh-languages CLI
//!
//! Command-line front end for the language harvest.
//!
//! This module provides CLI commands for:
//! - Harvesting an organization and writing one row per repository to stdout
//! - Checking that the GitHub App credentials can obtain an installation token
//! - Looking up the languages of a single repository
//!
//! Settings are layered: an optional config file, then `GH_LANGUAGES__*`
//! environment variables, then command-line flags (which also read the
//! `GITHUB_*` variables). Logs go to stderr so stdout carries only rows.

use clap::{Args, Parser, Subcommand};
use gh_languages_sdk::auth::{CredentialConfig, IdValue};
use gh_languages_sdk::client::ClientConfig;
use gh_languages_sdk::harvest::{self, HarvestConfig, LanguageReport, DEFAULT_CHANNEL_CAPACITY};
use serde::Deserialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ============================================================================
// CLI Structure
// ============================================================================

/// gh-languages - list the languages of an organization's production repositories
#[derive(Parser)]
#[command(name = "gh-languages")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Harvest repository languages as a GitHub App")]
#[command(
    long_about = "Authenticates as a GitHub App installation, lists the organization's unarchived repositories tagged 'production' and prints the languages each one uses"
)]
pub struct Cli {
    /// Configuration file path (TOML, YAML or JSON)
    #[arg(short, long, env = "GH_LANGUAGES_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Logging level, used when RUST_LOG is not set
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(flatten)]
    pub github: GitHubArgs,

    /// Subcommand to execute (defaults to `harvest`)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// GitHub App and organization settings.
#[derive(Clone, Default, Args)]
pub struct GitHubArgs {
    /// Organization to harvest
    #[arg(long, env = "GITHUB_ORG", global = true)]
    pub org: Option<String>,

    /// GitHub App ID
    #[arg(long, env = "GITHUB_APP_ID", global = true)]
    pub app_id: Option<String>,

    /// Installation ID of the App in the organization
    #[arg(long, env = "GITHUB_INSTALLATION_ID", global = true)]
    pub installation_id: Option<String>,

    /// Inline PEM private key; wins over --private-key-path
    #[arg(long, env = "GITHUB_PRIVATE_KEY", hide_env_values = true, global = true)]
    pub private_key: Option<String>,

    /// Path to the PEM private key file
    #[arg(long, env = "GITHUB_PRIVATE_KEY_PATH", global = true)]
    pub private_key_path: Option<PathBuf>,

    /// GitHub API base URL (GitHub Enterprise)
    #[arg(long, env = "GITHUB_API_URL", global = true)]
    pub api_url: Option<String>,
}

// Security: Don't expose key material in debug output
impl std::fmt::Debug for GitHubArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubArgs")
            .field("org", &self.org)
            .field("app_id", &self.app_id)
            .field("installation_id", &self.installation_id)
            .field("private_key", &self.private_key.as_ref().map(|_| "<REDACTED>"))
            .field("private_key_path", &self.private_key_path)
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Available CLI commands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Stream one row per production repository to stdout
    Harvest {
        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,

        /// Reports buffered ahead of the writer
        #[arg(long)]
        channel_capacity: Option<usize>,
    },

    /// Exchange the App credentials for an installation token and report its expiry
    CheckAuth,

    /// Print the languages of a single repository
    Languages {
        /// Repository owner (defaults to the configured organization)
        #[arg(long)]
        owner: Option<String>,

        /// Repository name
        #[arg(long)]
        repo: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        format: OutputFormat,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Self::Harvest {
            format: OutputFormat::Json,
            channel_capacity: None,
        }
    }
}

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// One JSON object per line
    Json,
    /// `owner/name<TAB>lang1,lang2`
    Text,
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-level errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Failed to load configuration: {0}")]
    Configuration(#[from] config::ConfigError),

    #[error(transparent)]
    Harvest(#[from] gh_languages_sdk::Error),

    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to initialize logging: {message}")]
    Logging { message: String },

    #[error("Harvest task failed: {message}")]
    TaskFailed { message: String },
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        use gh_languages_sdk::Error;

        match self {
            Self::Configuration(_) => 2,
            Self::Harvest(Error::Config(_)) => 2,
            Self::Harvest(Error::Auth(_)) => 3,
            Self::Harvest(Error::Enumeration(_) | Error::Harvest(_) | Error::Client(_)) => 4,
            Self::Harvest(Error::OutputClosed) | Self::Io(_) | Self::Serialization(_) => 5,
            Self::Harvest(Error::Cancelled) => 130,
            Self::Logging { .. } | Self::TaskFailed { .. } => 1,
        }
    }
}

// ============================================================================
// Configuration Types
// ============================================================================

/// Settings read from the config file and `GH_LANGUAGES__*` variables.
///
/// Every field is optional; flags fill or override them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Organization to harvest
    pub org: Option<String>,

    /// GitHub App credentials
    pub credentials: CredentialConfig,

    /// API client settings
    pub github: GitHubSettings,

    /// Reports buffered ahead of the writer
    pub channel_capacity: Option<usize>,
}

/// API client section of [`CliConfig`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GitHubSettings {
    pub api_url: Option<String>,
    pub user_agent: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub per_page: Option<u32>,
}

/// Load the config file (if any) and `GH_LANGUAGES__*` environment variables.
///
/// Environment variables use `__` for nesting, e.g.
/// `GH_LANGUAGES__CREDENTIALS__APP_ID=123`.
///
/// # Errors
///
/// A named file that is missing or malformed is an error.
pub fn load_config(path: Option<&Path>) -> Result<CliConfig, CliError> {
    let mut builder = config::Config::builder();

    if let Some(path) = path {
        info!(path = %path.display(), "Loading configuration from file");
        builder = builder.add_source(config::File::from(path).required(true));
    }

    let config = builder
        .add_source(config::Environment::with_prefix("GH_LANGUAGES").separator("__"))
        .build()?;

    Ok(config.try_deserialize()?)
}

impl CliConfig {
    /// Overlay command-line flags and produce the library configuration.
    ///
    /// Flags win over file and environment settings. The two key sources are
    /// taken together: if either key flag is given, both key settings come
    /// from the flags.
    pub fn into_harvest_config(self, args: &GitHubArgs) -> HarvestConfig {
        let file_credentials = self.credentials;
        let (private_key, private_key_path) =
            if args.private_key.is_some() || args.private_key_path.is_some() {
                (args.private_key.clone(), args.private_key_path.clone())
            } else {
                (file_credentials.private_key, file_credentials.private_key_path)
            };

        let credentials = CredentialConfig {
            app_id: args
                .app_id
                .clone()
                .map(IdValue::from)
                .or(file_credentials.app_id),
            installation_id: args
                .installation_id
                .clone()
                .map(IdValue::from)
                .or(file_credentials.installation_id),
            private_key,
            private_key_path,
        };

        let mut client = ClientConfig::default();
        if let Some(url) = args.api_url.clone().or(self.github.api_url) {
            client = client.with_github_api_url(url);
        }
        if let Some(user_agent) = self.github.user_agent {
            client = client.with_user_agent(user_agent);
        }
        if let Some(seconds) = self.github.timeout_seconds {
            client = client.with_timeout(Duration::from_secs(seconds));
        }
        if let Some(per_page) = self.github.per_page {
            client = client.with_per_page(per_page);
        }

        HarvestConfig {
            org: args.org.clone().or(self.org).unwrap_or_default(),
            credentials,
            client,
            channel_capacity: self.channel_capacity.unwrap_or(DEFAULT_CHANNEL_CAPACITY),
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Parse arguments, set up logging and run the selected command.
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    initialize_logging(&cli.log_level, cli.json_logs)?;

    let file_config = load_config(cli.config.as_deref())?;
    let config = file_config.into_harvest_config(&cli.github);
    let command = cli.command.unwrap_or_default();

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    execute_command(command, config, &mut out, cancel).await
}

/// Run one command, writing rows to `out`.
pub async fn execute_command<W: Write>(
    command: Commands,
    mut config: HarvestConfig,
    out: &mut W,
    cancel: CancellationToken,
) -> Result<(), CliError> {
    match command {
        Commands::Harvest {
            format,
            channel_capacity,
        } => {
            if let Some(capacity) = channel_capacity {
                config.channel_capacity = capacity;
            }
            execute_harvest_command(config, format, out, cancel).await
        }
        Commands::CheckAuth => execute_check_auth_command(config, out, cancel).await,
        Commands::Languages {
            owner,
            repo,
            format,
        } => {
            let owner = owner.unwrap_or_else(|| config.org.clone());
            let report = harvest::lookup_languages(&config, &owner, &repo, &cancel).await?;
            writeln!(out, "{}", format_report(&report, format)?)?;
            Ok(())
        }
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn execute_harvest_command<W: Write>(
    config: HarvestConfig,
    format: OutputFormat,
    out: &mut W,
    cancel: CancellationToken,
) -> Result<(), CliError> {
    info!(org = %config.org, "Starting language harvest");

    let (rx, handle) = harvest::spawn(config, cancel.clone());

    let written = match write_reports(rx, out, format).await {
        Ok(written) => written,
        Err(e) => {
            // Stop the producer; its result no longer matters.
            cancel.cancel();
            let _ = handle.await;
            return Err(e);
        }
    };

    let summary = handle
        .await
        .map_err(|e| CliError::TaskFailed {
            message: e.to_string(),
        })??;

    info!(
        pages = summary.pages_fetched,
        seen = summary.repositories_seen,
        accepted = summary.repositories_accepted,
        written,
        "Language harvest finished"
    );

    Ok(())
}

async fn execute_check_auth_command<W: Write>(
    config: HarvestConfig,
    out: &mut W,
    cancel: CancellationToken,
) -> Result<(), CliError> {
    // connect() already warns when the token is close to expiry
    let client = harvest::connect(&config, &cancel).await?;
    let token = client.token();

    let status = serde_json::json!({
        "installation_id": token.installation_id().as_u64(),
        "expires_at": token.expires_at().to_rfc3339(),
        "expires_soon": harvest::token_expires_soon(token),
    });
    writeln!(out, "{}", status)?;
    Ok(())
}

/// Write every report from `rx` to `out`, one per line.
///
/// Returns the number of rows written once the channel closes.
pub async fn write_reports<W: Write>(
    mut rx: mpsc::Receiver<LanguageReport>,
    out: &mut W,
    format: OutputFormat,
) -> Result<u64, CliError> {
    let mut written = 0;
    while let Some(report) = rx.recv().await {
        writeln!(out, "{}", format_report(&report, format)?)?;
        out.flush()?;
        written += 1;
    }
    Ok(written)
}

/// Render one report as a single output line (without the newline).
pub fn format_report(report: &LanguageReport, format: OutputFormat) -> Result<String, CliError> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string(report)?,
        OutputFormat::Text => format!("{}\t{}", report.full_name, report.languages.join(",")),
    })
}

// ============================================================================
// Runtime Plumbing
// ============================================================================

fn initialize_logging(level: &str, json: bool) -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| CliError::Logging {
            message: e.to_string(),
        })?;

    let json_layer = json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr));
    let text_layer = (!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| CliError::Logging {
            message: e.to_string(),
        })
}

fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received; cancelling harvest");
                cancel.cancel();
            }
            Err(e) => warn!(error = %e, "Failed to install Ctrl+C handler"),
        }
    });
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
