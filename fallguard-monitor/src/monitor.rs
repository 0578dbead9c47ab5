//! Shared fall monitor
//!
//! Wraps the `Coordinator` in a single async mutex held across the whole
//! classify, time, arbitrate and respond sequence of one frame or one
//! decision. Events go out on the `EventBus` from inside the lock; confirmed
//! incidents are queued for dispatch only after it is released.

use crate::confirm::{
    Coordinator, CoordinatorSettings, CoordinatorSnapshot, Decision, EntityReport, Resolution,
};
use crate::detection::{FrameInput, TrackId};
use crate::error::Result;
use crate::notify::{DispatchHandle, DispatchWorker, Incident, NotificationDispatcher};
use fallguard_common::events::{EventBus, FallguardEvent};
use fallguard_common::time;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Per-frame response for the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    pub detections: Vec<EntityReport>,
    pub pending_id: Option<TrackId>,
}

/// Result of an accepted human decision
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionOutcome {
    pub track_id: TrackId,
    pub resolution: Resolution,
    /// Incident queued for notification (confirmations only)
    pub incident: Option<Incident>,
}

/// Diagnostics view served by `GET /api/status`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorSnapshot {
    #[serde(flatten)]
    pub coordinator: CoordinatorSnapshot,
    pub next_caregiver_index: usize,
    pub caregiver_count: usize,
}

/// Fall monitor shared between request handlers
pub struct FallMonitor {
    coordinator: Mutex<Coordinator>,
    dispatcher: Arc<NotificationDispatcher>,
    dispatch: DispatchHandle,
    events: EventBus,
}

impl FallMonitor {
    pub fn new(
        settings: CoordinatorSettings,
        dispatcher: Arc<NotificationDispatcher>,
        dispatch: DispatchHandle,
        events: EventBus,
    ) -> Self {
        Self {
            coordinator: Mutex::new(Coordinator::new(settings)),
            dispatcher,
            dispatch,
            events,
        }
    }

    /// Build a monitor together with its dispatch worker
    pub fn spawn(
        settings: CoordinatorSettings,
        dispatcher: Arc<NotificationDispatcher>,
        events: EventBus,
        queue_capacity: usize,
    ) -> (Self, DispatchWorker) {
        let (dispatch, worker) =
            DispatchWorker::spawn(Arc::clone(&dispatcher), events.clone(), queue_capacity);
        (Self::new(settings, dispatcher, dispatch, events), worker)
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Process one frame at the current instant
    pub async fn process_frame(&self, frame: FrameInput) -> FrameReport {
        self.process_frame_at(frame, Instant::now()).await
    }

    /// Process one frame observed at `now`
    pub async fn process_frame_at(&self, frame: FrameInput, now: Instant) -> FrameReport {
        let mut coordinator = self.coordinator.lock().await;

        let detections = match frame {
            FrameInput::Detections(detections) => detections,
            FrameInput::Unavailable { reason } => {
                debug!(reason = %reason, "Frame unavailable, state unchanged");
                return FrameReport {
                    detections: Vec::new(),
                    pending_id: coordinator.pending(),
                };
            }
        };

        let outcome = coordinator.step(&detections, now);

        if let Some((track_id, reason)) = outcome.withdrawn {
            info!(track_id, reason = ?reason, "Pending confirmation withdrawn");
            self.events.emit_lossy(FallguardEvent::ConfirmationWithdrawn {
                track_id,
                reason,
                timestamp: time::now(),
            });
        }
        if !outcome.evicted.is_empty() {
            debug!(evicted = ?outcome.evicted, "Expired absent entities");
        }
        if let Some(track_id) = outcome.promoted {
            info!(track_id, "Fall detected, awaiting confirmation");
            self.events.emit_lossy(FallguardEvent::ConfirmationRequested {
                track_id,
                timestamp: time::now(),
            });
        }

        FrameReport {
            detections: outcome.entities,
            pending_id: outcome.pending_id,
        }
    }

    /// Apply a human decision at the current instant
    pub async fn decide(&self, track_id: TrackId, decision: Decision) -> Result<DecisionOutcome> {
        self.decide_at(track_id, decision, Instant::now()).await
    }

    /// Apply a human decision received at `now`
    ///
    /// Decisions for any id other than the pending one are rejected with
    /// `Error::StaleDecision` and change nothing.
    pub async fn decide_at(
        &self,
        track_id: TrackId,
        decision: Decision,
        now: Instant,
    ) -> Result<DecisionOutcome> {
        let outcome = {
            let mut coordinator = self.coordinator.lock().await;
            let resolution = match coordinator.resolve(track_id, decision, now) {
                Ok(resolution) => resolution,
                Err(e) => {
                    warn!(track_id, decision = ?decision, "Rejected decision: {}", e);
                    return Err(e);
                }
            };

            let incident = match resolution {
                Resolution::Confirmed => {
                    let incident = Incident::new(track_id);
                    info!(track_id, incident_id = %incident.incident_id, "Fall confirmed");
                    self.events.emit_lossy(FallguardEvent::IncidentConfirmed {
                        incident_id: incident.incident_id,
                        track_id,
                        timestamp: incident.confirmed_at,
                    });
                    Some(incident)
                }
                Resolution::Denied => {
                    info!(track_id, "Fall denied");
                    self.events.emit_lossy(FallguardEvent::IncidentDenied {
                        track_id,
                        timestamp: time::now(),
                    });
                    None
                }
            };

            DecisionOutcome {
                track_id,
                resolution,
                incident,
            }
        };

        if let Some(incident) = outcome.incident.clone() {
            // The incident stays alerted even if it never reaches the worker
            if let Err(e) = self.dispatch.submit(incident).await {
                error!(track_id, "Failed to queue notifications: {}", e);
            }
        }

        Ok(outcome)
    }

    /// Current pending id
    pub async fn pending(&self) -> Option<TrackId> {
        self.coordinator.lock().await.pending()
    }

    /// Diagnostics snapshot
    pub async fn snapshot(&self) -> MonitorSnapshot {
        let coordinator = self.coordinator.lock().await.snapshot(Instant::now());
        MonitorSnapshot {
            coordinator,
            next_caregiver_index: self.dispatcher.next_caregiver_index(),
            caregiver_count: self.dispatcher.caregiver_count(),
        }
    }
}
