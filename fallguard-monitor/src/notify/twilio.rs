//! Twilio REST client
//!
//! Sends the text alert through the Messages resource and places the
//! emergency call through the Calls resource with inline TwiML.

use super::{DeliveryError, MessagingChannel, VoiceChannel};
use async_trait::async_trait;
use fallguard_common::config::TwilioConfig;
use serde::Deserialize;
use std::time::Duration;

const USER_AGENT: &str = concat!("fallguard-monitor/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 15;

/// Resource creation response; only the SID is used
#[derive(Debug, Deserialize)]
struct ResourceResponse {
    sid: String,
}

/// Twilio API client implementing both notification channels
pub struct TwilioClient {
    http_client: reqwest::Client,
    api_base: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
    messaging_from: String,
}

impl TwilioClient {
    pub fn from_config(config: &TwilioConfig) -> Result<Self, DeliveryError> {
        let required = |name: &str, value: &Option<String>| {
            value
                .clone()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| DeliveryError::Misconfigured(format!("twilio.{name} is not set")))
        };

        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| DeliveryError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            account_sid: required("account_sid", &config.account_sid)?,
            auth_token: required("auth_token", &config.auth_token)?,
            from_number: required("from_number", &config.from_number)?,
            messaging_from: required("messaging_from", &config.messaging_from)?,
        })
    }

    fn resource_url(&self, resource: &str) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/{}.json",
            self.api_base, self.account_sid, resource
        )
    }

    async fn create(&self, resource: &str, form: &[(&str, &str)]) -> Result<String, DeliveryError> {
        let response = self
            .http_client
            .post(self.resource_url(resource))
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(form)
            .send()
            .await
            .map_err(|e| DeliveryError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let created: ResourceResponse = response
            .json()
            .await
            .map_err(|e| DeliveryError::Parse(e.to_string()))?;
        Ok(created.sid)
    }
}

/// Wrap `message` in a TwiML `<Say>` document
pub fn twiml_say(message: &str) -> String {
    let escaped = message
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;");
    format!(r#"<Response><Say language="en-US">{escaped}</Say></Response>"#)
}

#[async_trait]
impl MessagingChannel for TwilioClient {
    fn name(&self) -> &'static str {
        "twilio"
    }

    async fn send_message(&self, recipient: &str, body: &str) -> Result<String, DeliveryError> {
        let form = [
            ("From", self.messaging_from.as_str()),
            ("To", recipient),
            ("Body", body),
        ];
        self.create("Messages", &form).await
    }
}

#[async_trait]
impl VoiceChannel for TwilioClient {
    fn name(&self) -> &'static str {
        "twilio"
    }

    async fn place_call(&self, recipient: &str, message: &str) -> Result<String, DeliveryError> {
        let twiml = twiml_say(message);
        let form = [
            ("From", self.from_number.as_str()),
            ("To", recipient),
            ("Twiml", twiml.as_str()),
        ];
        self.create("Calls", &form).await
    }
}
