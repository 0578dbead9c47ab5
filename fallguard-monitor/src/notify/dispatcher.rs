//! Notification dispatcher
//!
//! On each confirmed incident sends one alert message to the fixed alert
//! recipient and places one emergency call to the caregiver at the rotation
//! pointer. The pointer advances after every call attempt, successful or
//! not, so consecutive incidents reach consecutive caregivers.

use super::{MessagingChannel, VoiceChannel, ALERT_MESSAGE, CALL_MESSAGE};
use chrono::{DateTime, Utc};
use fallguard_common::events::{DeliveryOutcome, TrackId};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};
use uuid::Uuid;

/// A confirmed fall
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Incident {
    pub incident_id: Uuid,
    pub track_id: TrackId,
    pub confirmed_at: DateTime<Utc>,
}

impl Incident {
    pub fn new(track_id: TrackId) -> Self {
        Self {
            incident_id: Uuid::new_v4(),
            track_id,
            confirmed_at: Utc::now(),
        }
    }
}

/// Outcomes of both notification attempts for one incident
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub alert: DeliveryOutcome,
    pub call: DeliveryOutcome,
}

/// Sends the alert message and places the rotating emergency call
pub struct NotificationDispatcher {
    messaging: Arc<dyn MessagingChannel>,
    voice: Arc<dyn VoiceChannel>,
    alert_recipient: Option<String>,
    caregivers: Vec<String>,
    next_caregiver: Mutex<usize>,
    empty_list_reported: AtomicBool,
}

impl NotificationDispatcher {
    pub fn new(
        messaging: Arc<dyn MessagingChannel>,
        voice: Arc<dyn VoiceChannel>,
        alert_recipient: Option<String>,
        caregivers: Vec<String>,
    ) -> Self {
        Self {
            messaging,
            voice,
            alert_recipient: alert_recipient.filter(|r| !r.is_empty()),
            caregivers,
            next_caregiver: Mutex::new(0),
            empty_list_reported: AtomicBool::new(false),
        }
    }

    /// Index the next emergency call will use
    pub fn next_caregiver_index(&self) -> usize {
        *self
            .next_caregiver
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn caregiver_count(&self) -> usize {
        self.caregivers.len()
    }

    /// Run both notification attempts; a failed alert does not stop the call
    pub async fn dispatch(&self, incident: &Incident) -> DispatchReport {
        let alert = self.send_alert(incident).await;
        let call = self.place_emergency_call(incident).await;
        DispatchReport { alert, call }
    }

    /// Send the fixed alert message to the alert recipient
    pub async fn send_alert(&self, incident: &Incident) -> DeliveryOutcome {
        let Some(recipient) = self.alert_recipient.clone() else {
            warn!(
                incident_id = %incident.incident_id,
                "No alert recipient configured, skipping alert message"
            );
            return DeliveryOutcome::Skipped {
                reason: "no alert recipient configured".to_string(),
            };
        };

        match self.messaging.send_message(&recipient, ALERT_MESSAGE).await {
            Ok(receipt) => {
                info!(
                    incident_id = %incident.incident_id,
                    channel = self.messaging.name(),
                    receipt = %receipt,
                    "Alert message sent"
                );
                DeliveryOutcome::Delivered { recipient, receipt }
            }
            Err(e) => {
                error!(
                    incident_id = %incident.incident_id,
                    channel = self.messaging.name(),
                    "Alert message failed: {}",
                    e
                );
                DeliveryOutcome::Failed {
                    recipient,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Call the caregiver at the rotation pointer
    pub async fn place_emergency_call(&self, incident: &Incident) -> DeliveryOutcome {
        if self.caregivers.is_empty() {
            if !self.empty_list_reported.swap(true, Ordering::Relaxed) {
                error!("Caregiver list is empty, emergency calls are disabled");
            }
            return DeliveryOutcome::Skipped {
                reason: "caregiver list is empty".to_string(),
            };
        }

        let (index, recipient) = self.claim_caregiver();

        match self.voice.place_call(&recipient, CALL_MESSAGE).await {
            Ok(receipt) => {
                info!(
                    incident_id = %incident.incident_id,
                    caregiver_index = index,
                    channel = self.voice.name(),
                    receipt = %receipt,
                    "Emergency call placed"
                );
                DeliveryOutcome::Delivered { recipient, receipt }
            }
            Err(e) => {
                error!(
                    incident_id = %incident.incident_id,
                    caregiver_index = index,
                    channel = self.voice.name(),
                    "Emergency call failed: {}",
                    e
                );
                DeliveryOutcome::Failed {
                    recipient,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Take the current caregiver and advance the pointer
    ///
    /// Caller guarantees the list is non-empty.
    fn claim_caregiver(&self) -> (usize, String) {
        let mut next = self
            .next_caregiver
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let index = *next % self.caregivers.len();
        *next = (index + 1) % self.caregivers.len();
        (index, self.caregivers[index].clone())
    }
}
