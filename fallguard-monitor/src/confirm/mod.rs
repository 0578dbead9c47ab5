//! Event-confirmation coordinator
//!
//! Turns per-frame classifications into at most one pending human
//! confirmation at a time:
//! - `entity`: per-entity state machine with pure transitions
//! - `registry`: per-entity debounce timers (fall timer map + alerted set)
//! - `arbiter`: single pending-confirmation slot
//!
//! `Coordinator` ties them together for one frame or one decision. It is
//! synchronous and takes `now` explicitly; locking and dispatch belong to
//! `FallMonitor`.

pub mod arbiter;
pub mod entity;
pub mod registry;

pub use arbiter::ConfirmationArbiter;
pub use entity::{Decision, EntityPhase, Resolution};
pub use registry::{EntityRecord, EntityRegistry};

use crate::detection::{BoundingBox, Detection, FallHeuristic, TrackId};
use crate::error::{Error, Result};
use fallguard_common::config::DetectionConfig;
use fallguard_common::events::WithdrawReason;
use fallguard_common::time::secs_to_duration;
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

/// Timing and classification parameters for the coordinator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinatorSettings {
    pub heuristic: FallHeuristic,
    pub confirmation_duration: Duration,
    pub alert_cooldown: Duration,
    pub absence_grace: Duration,
}

impl CoordinatorSettings {
    /// Build settings from the `[detection]` config table
    pub fn from_config(config: &DetectionConfig) -> Result<Self> {
        let to_duration = |name: &str, secs: f64| {
            secs_to_duration(secs).map_err(|e| Error::Config(format!("detection.{name}: {e}")))
        };

        Ok(Self {
            heuristic: FallHeuristic::new(config.fall_aspect_ratio),
            confirmation_duration: to_duration(
                "confirmation_duration_secs",
                config.confirmation_duration_secs,
            )?,
            alert_cooldown: to_duration("alert_cooldown_secs", config.alert_cooldown_secs)?,
            absence_grace: to_duration("absence_grace_secs", config.absence_grace_secs)?,
        })
    }
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            heuristic: FallHeuristic::default(),
            confirmation_duration: Duration::from_secs(1),
            alert_cooldown: Duration::ZERO,
            absence_grace: Duration::from_secs(2),
        }
    }
}

/// Per-entity status exposed to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    /// Tracked, not fallen
    Tracking,
    /// Fallen (dwelling, waiting for the slot, or already resolved)
    Fallen,
    /// Holds the pending confirmation slot
    ConfirmNeeded,
}

/// One detection with its status after arbitration
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EntityReport {
    pub track_id: TrackId,
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    pub status: EntityStatus,
}

/// Everything that changed while processing one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutcome {
    pub entities: Vec<EntityReport>,
    pub pending_id: Option<TrackId>,
    /// Id promoted into the slot during this frame
    pub promoted: Option<TrackId>,
    /// Previous occupant that left the slot during this frame
    pub withdrawn: Option<(TrackId, WithdrawReason)>,
    /// Ids whose state expired after the absence grace period
    pub evicted: Vec<TrackId>,
}

/// Fall timer with its current dwell
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimerView {
    pub track_id: TrackId,
    pub elapsed_secs: f64,
}

/// Read-only view of coordinator state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinatorSnapshot {
    pub pending_id: Option<TrackId>,
    pub timers: Vec<TimerView>,
    pub alerted: Vec<TrackId>,
}

/// Fall confirmation coordinator
#[derive(Debug)]
pub struct Coordinator {
    settings: CoordinatorSettings,
    registry: EntityRegistry,
    arbiter: ConfirmationArbiter,
}

impl Coordinator {
    pub fn new(settings: CoordinatorSettings) -> Self {
        Self {
            settings,
            registry: EntityRegistry::new(),
            arbiter: ConfirmationArbiter::new(
                settings.confirmation_duration,
                settings.alert_cooldown,
            ),
        }
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn pending(&self) -> Option<TrackId> {
        self.arbiter.pending()
    }

    /// Record one classification
    ///
    /// Returns `Recovered` when a not-fallen observation emptied the slot.
    pub fn observe(&mut self, id: TrackId, fallen: bool, now: Instant) -> Option<WithdrawReason> {
        self.registry.observe(id, fallen, now);
        if !fallen && self.arbiter.withdraw(id) {
            return Some(WithdrawReason::Recovered);
        }
        None
    }

    /// Process one frame of detections
    ///
    /// Order: classify and observe every detection, clear the slot if its
    /// occupant is absent, expire long-absent entities, then promote at most
    /// one eligible entity.
    pub fn step(&mut self, detections: &[Detection], now: Instant) -> StepOutcome {
        let mut outcome = StepOutcome::default();
        let mut active = BTreeSet::new();
        let mut classified = Vec::with_capacity(detections.len());

        for detection in detections {
            let fallen = self.settings.heuristic.is_fallen(&detection.bbox);
            active.insert(detection.track_id);
            if let Some(reason) = self.observe(detection.track_id, fallen, now) {
                outcome.withdrawn = Some((detection.track_id, reason));
            }
            classified.push((detection, fallen));
        }

        if let Some(id) = self.arbiter.withdraw_absent(&mut self.registry, &active) {
            outcome.withdrawn = Some((id, WithdrawReason::Lost));
        }

        outcome.evicted = self
            .registry
            .evict_absent(&active, now, self.settings.absence_grace);

        outcome.promoted = self
            .arbiter
            .promote_eligible(&mut self.registry, &active, now);
        let pending_id = self.arbiter.pending();
        outcome.pending_id = pending_id;

        outcome.entities = classified
            .into_iter()
            .map(|(detection, fallen)| {
                let status = if !fallen {
                    EntityStatus::Tracking
                } else if pending_id == Some(detection.track_id) {
                    EntityStatus::ConfirmNeeded
                } else {
                    EntityStatus::Fallen
                };
                EntityReport {
                    track_id: detection.track_id,
                    bbox: detection.bbox,
                    status,
                }
            })
            .collect();

        debug_assert!(self.slot_consistent());
        outcome
    }

    /// Apply a human decision for `id`
    pub fn resolve(&mut self, id: TrackId, decision: Decision, now: Instant) -> Result<Resolution> {
        let resolution = self
            .arbiter
            .resolve(&mut self.registry, id, decision, now)?;
        debug_assert!(self.slot_consistent());
        Ok(resolution)
    }

    /// Snapshot of timers, alerted ids and the pending slot
    pub fn snapshot(&self, now: Instant) -> CoordinatorSnapshot {
        CoordinatorSnapshot {
            pending_id: self.arbiter.pending(),
            timers: self
                .registry
                .iter()
                .filter_map(|(track_id, record)| {
                    record.phase.dwell(now).map(|d| TimerView {
                        track_id,
                        elapsed_secs: d.as_secs_f64(),
                    })
                })
                .collect(),
            alerted: self.registry.alerted_ids(),
        }
    }

    /// The slot and the awaiting phase always name the same single entity
    pub fn slot_consistent(&self) -> bool {
        let awaiting: Vec<TrackId> = self
            .registry
            .iter()
            .filter(|(_, r)| r.phase.is_awaiting())
            .map(|(id, _)| id)
            .collect();

        match self.arbiter.pending() {
            Some(id) => awaiting == [id],
            None => awaiting.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fallen_box() -> BoundingBox {
        BoundingBox::new(10.0, 10.0, 110.0, 60.0)
    }

    fn upright_box() -> BoundingBox {
        BoundingBox::new(10.0, 10.0, 60.0, 110.0)
    }

    #[test]
    fn test_settings_from_config() {
        let settings = CoordinatorSettings::from_config(&DetectionConfig::default()).unwrap();
        assert_eq!(settings, CoordinatorSettings::default());

        let bad = DetectionConfig {
            absence_grace_secs: -1.0,
            ..DetectionConfig::default()
        };
        assert!(CoordinatorSettings::from_config(&bad).is_err());
    }

    #[test]
    fn test_statuses_follow_arbitration() {
        let mut coordinator = Coordinator::new(CoordinatorSettings::default());
        let t0 = Instant::now();
        let frame = [
            Detection::new(1, fallen_box()),
            Detection::new(2, upright_box()),
        ];

        let first = coordinator.step(&frame, t0);
        assert_eq!(first.entities[0].status, EntityStatus::Fallen);
        assert_eq!(first.entities[1].status, EntityStatus::Tracking);
        assert_eq!(first.pending_id, None);

        let later = coordinator.step(&frame, t0 + Duration::from_millis(1200));
        assert_eq!(later.promoted, Some(1));
        assert_eq!(later.entities[0].status, EntityStatus::ConfirmNeeded);

        // Still reported as needing confirmation on following frames
        let again = coordinator.step(&frame, t0 + Duration::from_millis(1300));
        assert_eq!(again.promoted, None);
        assert_eq!(again.entities[0].status, EntityStatus::ConfirmNeeded);
    }

    #[test]
    fn test_recovery_withdraws_pending() {
        let mut coordinator = Coordinator::new(CoordinatorSettings::default());
        let t0 = Instant::now();

        coordinator.step(&[Detection::new(4, fallen_box())], t0);
        coordinator.step(&[Detection::new(4, fallen_box())], t0 + Duration::from_secs(1));
        assert_eq!(coordinator.pending(), Some(4));

        let outcome = coordinator.step(
            &[Detection::new(4, upright_box())],
            t0 + Duration::from_millis(1100),
        );
        assert_eq!(outcome.withdrawn, Some((4, WithdrawReason::Recovered)));
        assert_eq!(outcome.pending_id, None);
        assert!(coordinator.registry().is_empty());
    }

    #[test]
    fn test_lost_entity_frees_slot_for_next() {
        let mut coordinator = Coordinator::new(CoordinatorSettings::default());
        let t0 = Instant::now();
        let both = [
            Detection::new(1, fallen_box()),
            Detection::new(2, fallen_box()),
        ];

        coordinator.step(&both, t0);
        let outcome = coordinator.step(&both, t0 + Duration::from_secs(1));
        assert_eq!(outcome.pending_id, Some(1));

        let outcome = coordinator.step(
            &[Detection::new(2, fallen_box())],
            t0 + Duration::from_millis(1100),
        );
        assert_eq!(outcome.withdrawn, Some((1, WithdrawReason::Lost)));
        assert_eq!(outcome.promoted, Some(2));
        assert!(coordinator.slot_consistent());
    }

    #[test]
    fn test_snapshot_reports_timers_and_alerted() {
        let mut coordinator = Coordinator::new(CoordinatorSettings::default());
        let t0 = Instant::now();

        coordinator.step(&[Detection::new(8, fallen_box())], t0);
        coordinator.step(&[Detection::new(8, fallen_box())], t0 + Duration::from_secs(1));
        coordinator
            .resolve(8, Decision::Confirm, t0 + Duration::from_secs(1))
            .unwrap();

        let snapshot = coordinator.snapshot(t0 + Duration::from_secs(3));
        assert_eq!(snapshot.pending_id, None);
        assert_eq!(snapshot.alerted, vec![8]);
        assert_eq!(snapshot.timers.len(), 1);
        assert_eq!(snapshot.timers[0].track_id, 8);
        assert!((snapshot.timers[0].elapsed_secs - 3.0).abs() < 1e-9);
    }
}
