//! Background dispatch worker
//!
//! Confirmed incidents are queued on a bounded channel and dispatched one at
//! a time by a single task, so provider latency never holds the coordinator
//! lock and the caregiver rotation sees incidents in confirmation order.

use super::dispatcher::{DispatchReport, Incident, NotificationDispatcher};
use crate::error::{Error, Result};
use fallguard_common::events::{EventBus, FallguardEvent, NotificationChannel};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Sending side of the dispatch queue
#[derive(Debug, Clone)]
pub struct DispatchHandle {
    sender: mpsc::Sender<Incident>,
}

impl DispatchHandle {
    /// Queue an incident for notification
    ///
    /// Waits for queue space when the worker is behind.
    pub async fn submit(&self, incident: Incident) -> Result<()> {
        debug!(
            incident_id = %incident.incident_id,
            track_id = incident.track_id,
            "Queueing incident for dispatch"
        );
        self.sender
            .send(incident)
            .await
            .map_err(|e| Error::Dispatch(format!("worker stopped, incident {} dropped", e.0.incident_id)))
    }

    /// True once the worker has exited
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Task that drains the dispatch queue
pub struct DispatchWorker {
    handle: JoinHandle<()>,
}

impl DispatchWorker {
    /// Spawn the worker on the current runtime
    ///
    /// The worker exits once every `DispatchHandle` has been dropped and the
    /// queue is empty.
    pub fn spawn(
        dispatcher: Arc<NotificationDispatcher>,
        events: EventBus,
        capacity: usize,
    ) -> (DispatchHandle, DispatchWorker) {
        let (sender, receiver) = mpsc::channel::<Incident>(capacity.max(1));
        info!(capacity, "Starting notification dispatch worker");

        let handle = tokio::spawn(dispatch_worker(receiver, dispatcher, events));
        (DispatchHandle { sender }, DispatchWorker { handle })
    }

    /// Wait for queued incidents to finish
    ///
    /// Every `DispatchHandle` must be dropped first or this never returns.
    pub async fn shutdown(self) {
        if let Err(e) = self.handle.await {
            warn!("Dispatch worker ended abnormally: {}", e);
        }
        info!("Dispatch worker shut down");
    }
}

async fn dispatch_worker(
    mut receiver: mpsc::Receiver<Incident>,
    dispatcher: Arc<NotificationDispatcher>,
    events: EventBus,
) {
    while let Some(incident) = receiver.recv().await {
        let report = dispatcher.dispatch(&incident).await;
        publish(&events, &incident, report);
    }
    debug!("Dispatch queue closed");
}

fn publish(events: &EventBus, incident: &Incident, report: DispatchReport) {
    for (channel, outcome) in [
        (NotificationChannel::Message, report.alert),
        (NotificationChannel::Call, report.call),
    ] {
        events.emit_lossy(FallguardEvent::NotificationAttempted {
            incident_id: incident.incident_id,
            track_id: incident.track_id,
            channel,
            outcome,
            timestamp: fallguard_common::time::now(),
        });
    }
}
