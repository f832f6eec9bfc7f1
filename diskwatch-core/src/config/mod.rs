//! Configuration loading and validation for `diskwatch`
//!
//! The monitor is driven by a single YAML file declaring the utilization
//! threshold, SSH connection settings, alert channel credentials, and the
//! list of servers to check. The file is loaded once at startup and is
//! read-only for the process lifetime.

use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::Deserialize;

/// Errors raised while loading or validating the configuration file.
///
/// All of these are fatal at startup; none of them is retried.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file does not exist
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The configuration file could not be read
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid YAML or is missing required keys
    #[error("Failed to parse configuration file: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// The configuration parsed but describes an unusable setup
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Default utilization threshold (percent)
const fn default_threshold() -> u8 {
    80
}

/// Default per-attempt SSH connection timeout (seconds)
const fn default_ssh_timeout_secs() -> u64 {
    10
}

/// Default number of connection attempts per host
const fn default_retry_attempts() -> u32 {
    3
}

fn default_slack_channel() -> String {
    "#alerts".to_string()
}

/// Top-level monitor configuration, loaded from YAML
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Utilization percentage at or above which a filesystem is alert-worthy
    #[serde(default = "default_threshold")]
    pub threshold: u8,
    /// SSH connection settings shared by all servers
    #[serde(default)]
    pub ssh: SshSettings,
    /// Alert channel configuration
    #[serde(default)]
    pub alerts: AlertSettings,
    /// Servers to check, processed in declaration order
    #[serde(default)]
    pub servers: Vec<ServerTarget>,
}

/// SSH connection settings (`ssh:` block)
#[derive(Debug, Clone, Deserialize)]
pub struct SshSettings {
    /// Per-attempt connection timeout in seconds
    #[serde(default = "default_ssh_timeout_secs")]
    pub timeout: u64,
    /// Number of connection attempts before a host is declared unreachable
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            timeout: default_ssh_timeout_secs(),
            retry_attempts: default_retry_attempts(),
        }
    }
}

/// Alert channel configuration (`alerts:` block)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertSettings {
    /// Email channel; absent means disabled
    #[serde(default)]
    pub email: Option<EmailSettings>,
    /// Slack webhook channel; absent means disabled
    #[serde(default)]
    pub slack: Option<SlackSettings>,
}

/// SMTP email channel settings (`alerts.email:` block)
#[derive(Debug, Clone, Deserialize)]
pub struct EmailSettings {
    /// Whether the channel is active
    #[serde(default)]
    pub enabled: bool,
    /// SMTP relay hostname
    pub smtp_server: String,
    /// SMTP relay port
    pub smtp_port: u16,
    /// Sender address, also used as the SMTP login
    pub sender: String,
    /// SMTP password
    pub password: SecretString,
    /// Alert recipients
    pub recipients: Vec<String>,
}

/// Slack webhook channel settings (`alerts.slack:` block)
#[derive(Debug, Clone, Deserialize)]
pub struct SlackSettings {
    /// Whether the channel is active
    #[serde(default)]
    pub enabled: bool,
    /// Incoming-webhook URL
    pub webhook_url: String,
    /// Channel to post into
    #[serde(default = "default_slack_channel")]
    pub channel: String,
}

/// A single server to check (`servers[]` entry)
#[derive(Debug, Clone, Deserialize)]
pub struct ServerTarget {
    /// Hostname or IP address
    pub host: String,
    /// SSH username
    pub user: String,
    /// Path to an SSH private key; `~` is expanded at use time
    #[serde(default)]
    pub key_file: Option<String>,
    /// SSH password, used only when no key file is configured
    #[serde(default)]
    pub password: Option<SecretString>,
    /// Per-server override of `ssh.timeout` (seconds)
    #[serde(default)]
    pub timeout: Option<u64>,
}

/// Authentication method resolved from a [`ServerTarget`]
#[derive(Debug, Clone)]
pub enum AuthMethod {
    /// Key-based authentication with an expanded key path
    KeyFile(String),
    /// Password authentication
    Password(SecretString),
}

impl ServerTarget {
    /// Resolves the authentication method for this server.
    ///
    /// A key file takes precedence over a password. Returns `None` when
    /// neither is configured, which the caller must treat as a
    /// configuration error rather than a retryable connection failure.
    pub fn auth_method(&self) -> Option<AuthMethod> {
        if let Some(key_file) = &self.key_file {
            let expanded = shellexpand::tilde(key_file).into_owned();
            return Some(AuthMethod::KeyFile(expanded));
        }
        self.password
            .as_ref()
            .map(|pw| AuthMethod::Password(pw.clone()))
    }

    /// Effective connection timeout, falling back to the global SSH setting
    pub fn effective_timeout_secs(&self, default_secs: u64) -> u64 {
        self.timeout.unwrap_or(default_secs)
    }
}

impl MonitorConfig {
    /// Loads and validates the configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] when the file does not exist,
    /// [`ConfigError::Parse`] for malformed YAML, and
    /// [`ConfigError::Invalid`] when the parsed configuration cannot be
    /// used (see [`MonitorConfig::validate`]).
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::Io(e)
            }
        })?;
        let config: Self = serde_yaml::from_str(&contents)?;
        config.validate()?;
        tracing::info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Validates cross-field constraints that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the server list is empty, the
    /// threshold exceeds 100, a server has no authentication method, or an
    /// enabled alert channel is missing its delivery targets.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.servers.is_empty() {
            return Err(ConfigError::Invalid("No servers configured".into()));
        }
        if self.threshold > 100 {
            return Err(ConfigError::Invalid(format!(
                "Threshold must be 0-100, got {}",
                self.threshold
            )));
        }
        for server in &self.servers {
            if server.auth_method().is_none() {
                return Err(ConfigError::Invalid(format!(
                    "Server {} has neither key_file nor password",
                    server.host
                )));
            }
        }
        if let Some(email) = &self.alerts.email {
            if email.enabled && email.recipients.is_empty() {
                return Err(ConfigError::Invalid(
                    "Email alerts enabled but no recipients configured".into(),
                ));
            }
        }
        if let Some(slack) = &self.alerts.slack {
            if slack.enabled && slack.webhook_url.is_empty() {
                return Err(ConfigError::Invalid(
                    "Slack alerts enabled but webhook_url is empty".into(),
                ));
            }
        }
        Ok(())
    }
}
