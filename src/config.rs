//! Configuration types, built from environment variables.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Name of the interaction channel SMS pipeline activity is logged to.
pub const DEFAULT_INTERACTION_CHANNEL: &str = "SMS Pipeline";

/// Organization details used in consent confirmations.
#[derive(Debug, Clone)]
pub struct OrganizationConfig {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl OrganizationConfig {
    /// Contact shown in the opt-out confirmation: phone first, then email.
    pub fn contact(&self) -> Option<&str> {
        self.phone
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .or_else(|| self.email.as_deref().filter(|e| !e.trim().is_empty()))
    }
}

impl Default for OrganizationConfig {
    fn default() -> Self {
        Self {
            name: "our".to_string(),
            phone: None,
            email: None,
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct ResponderConfig {
    /// libSQL database file.
    pub db_path: PathBuf,
    /// Webhook listen port.
    pub port: u16,
    pub organization: OrganizationConfig,
    /// Interaction channel name used by the interaction logger.
    pub interaction_channel: String,
    /// Shared secret the gateway must pass as `?token=`. Unchecked when unset.
    pub webhook_token: Option<SecretString>,
    /// JSON file with pipelines and numbers to load on startup.
    pub seed_file: Option<PathBuf>,
    /// Directory for daily rolling log files.
    pub log_dir: Option<PathBuf>,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/sms-responder.db"),
            port: 8080,
            organization: OrganizationConfig::default(),
            interaction_channel: DEFAULT_INTERACTION_CHANNEL.to_string(),
            webhook_token: None,
            seed_file: None,
            log_dir: None,
        }
    }
}

impl ResponderConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match non_empty("SMS_PORT") {
            Some(raw) => raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
                key: "SMS_PORT".into(),
                message: format!("{e}"),
            })?,
            None => defaults.port,
        };

        let organization = OrganizationConfig {
            name: non_empty("SMS_ORGANIZATION_NAME").unwrap_or(defaults.organization.name),
            phone: non_empty("SMS_ORGANIZATION_PHONE"),
            email: non_empty("SMS_ORGANIZATION_EMAIL"),
        };

        Ok(Self {
            db_path: non_empty("SMS_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            port,
            organization,
            interaction_channel: non_empty("SMS_INTERACTION_CHANNEL")
                .unwrap_or(defaults.interaction_channel),
            webhook_token: non_empty("SMS_WEBHOOK_TOKEN").map(SecretString::from),
            seed_file: non_empty("SMS_SEED_FILE").map(PathBuf::from),
            log_dir: non_empty("SMS_LOG_DIR").map(PathBuf::from),
        })
    }
}
