//! Configuration loading and config file resolution
//!
//! FallGuard reads a single TOML bootstrap file. Values are treated as
//! constants for the lifetime of the process.
//!
//! Config file resolution priority:
//! 1. Command-line argument (highest priority)
//! 2. `FALLGUARD_CONFIG` environment variable
//! 3. User config file (`~/.config/fallguard/config.toml`)
//! 4. System config file (`/etc/fallguard/config.toml`)
//! 5. Compiled defaults (fallback)
//!
//! A missing file at steps 3-4 is not an error: the service starts with
//! compiled defaults and logs a warning. A file named explicitly at steps 1-2
//! must exist and parse.

use crate::time::secs_to_duration;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "FALLGUARD_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Address the HTTP server binds to
    pub bind_address: String,

    /// HTTP server port (default 5001)
    pub port: u16,

    /// Fall detection and confirmation timing
    pub detection: DetectionConfig,

    /// Notification recipients and provider
    pub notifications: NotificationConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 5001,
            detection: DetectionConfig::default(),
            notifications: NotificationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Detection and confirmation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Dwell time in the fallen pose before a confirmation is requested
    pub confirmation_duration_secs: f64,

    /// A box is fallen when `width > height * fall_aspect_ratio`
    pub fall_aspect_ratio: f64,

    /// Minimum spacing between a resolved decision and the next prompt (0 disables)
    pub alert_cooldown_secs: f64,

    /// How long an absent entity keeps its timer and alert state
    pub absence_grace_secs: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            confirmation_duration_secs: 1.0,
            fall_aspect_ratio: 1.25,
            alert_cooldown_secs: 0.0,
            absence_grace_secs: 2.0,
        }
    }
}

/// Notification provider selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Log notifications instead of delivering them
    #[default]
    Log,
    /// Twilio REST API (messages + voice calls)
    Twilio,
}

/// Notification configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    pub provider: ProviderKind,

    /// Recipient of the text alert (e.g. `whatsapp:+15550000000`)
    pub alert_recipient: Option<String>,

    /// Caregiver phone numbers called in rotation
    pub caregivers: Vec<String>,

    /// Bounded queue between the decision path and the dispatch worker
    pub dispatch_queue_capacity: usize,

    /// Provider credentials (required when `provider = "twilio"`)
    pub twilio: TwilioConfig,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Log,
            alert_recipient: None,
            caregivers: Vec::new(),
            dispatch_queue_capacity: 32,
            twilio: TwilioConfig::default(),
        }
    }
}

/// Twilio account settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwilioConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    /// Caller id for voice calls
    pub from_number: Option<String>,
    /// Sender for text alerts (e.g. `whatsapp:+15550009999`)
    pub messaging_from: Option<String>,
    pub api_base: String,
}

impl Default for TwilioConfig {
    fn default() -> Self {
        Self {
            account_sid: None,
            auth_token: None,
            from_number: None,
            messaging_from: None,
            api_base: "https://api.twilio.com".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Where the active configuration came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    CommandLine(PathBuf),
    Environment(PathBuf),
    UserFile(PathBuf),
    SystemFile(PathBuf),
    Defaults,
}

impl ConfigSource {
    /// Path of the file that was read, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigSource::CommandLine(p)
            | ConfigSource::Environment(p)
            | ConfigSource::UserFile(p)
            | ConfigSource::SystemFile(p) => Some(p),
            ConfigSource::Defaults => None,
        }
    }
}

/// Locate the config file following the documented priority order
pub fn locate_config_file(cli_arg: Option<&Path>) -> ConfigSource {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return ConfigSource::CommandLine(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.is_empty() {
            return ConfigSource::Environment(PathBuf::from(path));
        }
    }

    // Priority 3: User config directory
    if let Some(path) = dirs::config_dir().map(|d| d.join("fallguard").join("config.toml")) {
        if path.exists() {
            return ConfigSource::UserFile(path);
        }
    }

    // Priority 4: System-wide config (unix only)
    if cfg!(unix) {
        let system = PathBuf::from("/etc/fallguard/config.toml");
        if system.exists() {
            return ConfigSource::SystemFile(system);
        }
    }

    ConfigSource::Defaults
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Failed to parse TOML: {e}")))
    }

    /// Read and parse a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Resolve, load and validate the configuration
    ///
    /// Returns the configuration together with the source it was read from.
    pub fn load(cli_arg: Option<&Path>) -> Result<(Self, ConfigSource)> {
        let source = locate_config_file(cli_arg);
        let config = match source.path() {
            Some(path) => {
                let config = Self::from_file(path)?;
                info!("Loaded configuration from {}", path.display());
                config
            }
            None => {
                warn!("No config file found, using compiled defaults");
                Self::default()
            }
        };

        config.validate()?;
        Ok((config, source))
    }

    /// Validate value ranges and provider requirements
    ///
    /// An empty caregiver list is accepted; the dispatcher reports it and
    /// skips calls.
    pub fn validate(&self) -> Result<()> {
        let d = &self.detection;

        let confirmation = secs_to_duration(d.confirmation_duration_secs)
            .map_err(|e| Error::Config(format!("detection.confirmation_duration_secs: {e}")))?;
        if confirmation.is_zero() {
            return Err(Error::Config(
                "detection.confirmation_duration_secs must be greater than zero".to_string(),
            ));
        }
        secs_to_duration(d.alert_cooldown_secs)
            .map_err(|e| Error::Config(format!("detection.alert_cooldown_secs: {e}")))?;
        secs_to_duration(d.absence_grace_secs)
            .map_err(|e| Error::Config(format!("detection.absence_grace_secs: {e}")))?;

        if !d.fall_aspect_ratio.is_finite() || d.fall_aspect_ratio <= 0.0 {
            return Err(Error::Config(format!(
                "detection.fall_aspect_ratio must be a positive number, got {}",
                d.fall_aspect_ratio
            )));
        }

        let n = &self.notifications;
        if n.dispatch_queue_capacity == 0 {
            return Err(Error::Config(
                "notifications.dispatch_queue_capacity must be at least 1".to_string(),
            ));
        }

        if n.provider == ProviderKind::Twilio {
            let t = &n.twilio;
            let missing: Vec<&str> = [
                ("account_sid", &t.account_sid),
                ("auth_token", &t.auth_token),
                ("from_number", &t.from_number),
                ("messaging_from", &t.messaging_from),
            ]
            .into_iter()
            .filter(|(_, v)| v.as_deref().map_or(true, str::is_empty))
            .map(|(k, _)| k)
            .collect();

            if !missing.is_empty() {
                return Err(Error::Config(format!(
                    "notifications.twilio is missing: {}",
                    missing.join(", ")
                )));
            }
        }

        Ok(())
    }
}
