//! Notification delivery
//!
//! The dispatcher talks to two collaborators, a messaging channel for the
//! text alert and a voice channel for the emergency call. Both return a
//! provider receipt or a `DeliveryError`; neither error ever propagates past
//! the dispatcher.

pub mod dispatcher;
pub mod twilio;
pub mod worker;

pub use dispatcher::{DispatchReport, Incident, NotificationDispatcher};
pub use twilio::TwilioClient;
pub use worker::{DispatchHandle, DispatchWorker};

use async_trait::async_trait;
use fallguard_common::config::{NotificationConfig, ProviderKind};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Text of the alert sent to the alert recipient
pub const ALERT_MESSAGE: &str =
    "INFO: A fall incident has been confirmed by the admin.\nPlease check immediately.";

/// Text spoken to the caregiver on the emergency call
pub const CALL_MESSAGE: &str =
    "Warning, the system has detected that someone has fallen. Please check the location immediately.";

/// Collaborator failure
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Request did not reach the provider or timed out
    #[error("Network error: {0}")]
    Network(String),

    /// Provider answered with a non-success status
    #[error("Provider rejected request ({status}): {body}")]
    Rejected { status: u16, body: String },

    /// Provider response could not be understood
    #[error("Parse error: {0}")]
    Parse(String),

    /// Channel cannot be used with the current configuration
    #[error("Channel misconfigured: {0}")]
    Misconfigured(String),
}

/// Sends a text message to one recipient
#[async_trait]
pub trait MessagingChannel: Send + Sync {
    /// Channel identifier for logs (e.g. "twilio", "log")
    fn name(&self) -> &'static str;

    /// Send `body` to `recipient`, returning the provider receipt
    async fn send_message(&self, recipient: &str, body: &str) -> Result<String, DeliveryError>;
}

/// Places a voice call that speaks a fixed message
#[async_trait]
pub trait VoiceChannel: Send + Sync {
    /// Channel identifier for logs
    fn name(&self) -> &'static str;

    /// Call `recipient` and speak `message`, returning the provider receipt
    async fn place_call(&self, recipient: &str, message: &str) -> Result<String, DeliveryError>;
}

/// Channel that only logs what it would have delivered
#[derive(Debug, Default, Clone, Copy)]
pub struct LogChannel;

#[async_trait]
impl MessagingChannel for LogChannel {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send_message(&self, recipient: &str, body: &str) -> Result<String, DeliveryError> {
        info!(recipient, body, "Alert message (log provider)");
        Ok("logged".to_string())
    }
}

#[async_trait]
impl VoiceChannel for LogChannel {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn place_call(&self, recipient: &str, message: &str) -> Result<String, DeliveryError> {
        info!(recipient, message, "Emergency call (log provider)");
        Ok("logged".to_string())
    }
}

/// Messaging and voice channels selected by configuration
pub struct Channels {
    pub messaging: Arc<dyn MessagingChannel>,
    pub voice: Arc<dyn VoiceChannel>,
}

impl Channels {
    /// Build the configured provider
    ///
    /// Expects a validated config; Twilio credentials are checked there.
    pub fn from_config(config: &NotificationConfig) -> Result<Self, DeliveryError> {
        match config.provider {
            ProviderKind::Log => Ok(Self {
                messaging: Arc::new(LogChannel),
                voice: Arc::new(LogChannel),
            }),
            ProviderKind::Twilio => {
                let client = Arc::new(TwilioClient::from_config(&config.twilio)?);
                Ok(Self {
                    messaging: client.clone(),
                    voice: client,
                })
            }
        }
    }
}
