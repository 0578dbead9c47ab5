//! Per-entity debounce timer registry
//!
//! Holds one `EntityRecord` per tracked id that is not idle. The fall timer
//! map and the alerted set are views over these records.

use super::entity::EntityPhase;
use crate::detection::TrackId;
use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

/// State kept for one non-idle entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityRecord {
    pub phase: EntityPhase,
    /// Instant of the entity's latest detection
    pub last_seen: Instant,
}

/// Registry of entity phases, ordered by id
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: BTreeMap<TrackId, EntityRecord>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one classification for `id` and return the previous phase
    ///
    /// Fallen starts a timer if none is running. Not fallen drops the
    /// timer and any alerted mark by returning the entity to idle.
    pub fn observe(&mut self, id: TrackId, fallen: bool, now: Instant) -> EntityPhase {
        if !fallen {
            return self
                .entities
                .remove(&id)
                .map(|r| r.phase)
                .unwrap_or(EntityPhase::Idle);
        }

        let record = self.entities.entry(id).or_insert(EntityRecord {
            phase: EntityPhase::Idle,
            last_seen: now,
        });
        let previous = record.phase;
        record.phase = previous.observe(true, now);
        record.last_seen = now;
        previous
    }

    /// Time since the fallen timer for `id` started
    pub fn elapsed(&self, id: TrackId, now: Instant) -> Option<Duration> {
        self.entities.get(&id).and_then(|r| r.phase.dwell(now))
    }

    /// Current phase of `id` (idle when unknown)
    pub fn phase(&self, id: TrackId) -> EntityPhase {
        self.entities
            .get(&id)
            .map(|r| r.phase)
            .unwrap_or(EntityPhase::Idle)
    }

    /// Replace the phase of a known entity
    ///
    /// Setting `Idle` removes the record. Unknown ids are ignored.
    pub(crate) fn set_phase(&mut self, id: TrackId, phase: EntityPhase) {
        if phase == EntityPhase::Idle {
            self.entities.remove(&id);
        } else if let Some(record) = self.entities.get_mut(&id) {
            record.phase = phase;
        }
    }

    pub fn is_alerted(&self, id: TrackId) -> bool {
        self.phase(id).is_alerted()
    }

    /// Ids with a running fallen timer, ascending
    pub fn timer_ids(&self) -> Vec<TrackId> {
        self.entities
            .iter()
            .filter(|(_, r)| r.phase.timer_start().is_some())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Ids with a decision already made, ascending
    pub fn alerted_ids(&self) -> Vec<TrackId> {
        self.entities
            .iter()
            .filter(|(_, r)| r.phase.is_alerted())
            .map(|(id, _)| *id)
            .collect()
    }

    /// Drop records of ids absent from `active` for at least `grace`
    ///
    /// Returns the evicted ids in ascending order.
    pub fn evict_absent(
        &mut self,
        active: &BTreeSet<TrackId>,
        now: Instant,
        grace: Duration,
    ) -> Vec<TrackId> {
        let expired: Vec<TrackId> = self
            .entities
            .iter()
            .filter(|(id, r)| {
                !active.contains(*id) && now.saturating_duration_since(r.last_seen) >= grace
            })
            .map(|(id, _)| *id)
            .collect();

        for id in &expired {
            self.entities.remove(id);
        }
        expired
    }

    /// Iterate records in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = (TrackId, &EntityRecord)> {
        self.entities.iter().map(|(id, r)| (*id, r))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confirm::entity::{Decision, Resolution};

    #[test]
    fn test_observe_starts_and_keeps_timer() {
        let mut registry = EntityRegistry::new();
        let t0 = Instant::now();

        assert_eq!(registry.observe(1, true, t0), EntityPhase::Idle);
        registry.observe(1, true, t0 + Duration::from_millis(400));

        assert_eq!(
            registry.elapsed(1, t0 + Duration::from_millis(900)),
            Some(Duration::from_millis(900))
        );
        assert_eq!(registry.timer_ids(), vec![1]);
    }

    #[test]
    fn test_not_fallen_removes_record() {
        let mut registry = EntityRegistry::new();
        let t0 = Instant::now();

        registry.observe(2, true, t0);
        let previous = registry.observe(2, false, t0 + Duration::from_millis(100));

        assert!(matches!(previous, EntityPhase::FallingDwell { .. }));
        assert_eq!(registry.elapsed(2, t0), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unknown_id_has_no_elapsed() {
        let registry = EntityRegistry::new();
        assert_eq!(registry.elapsed(9, Instant::now()), None);
        assert_eq!(registry.phase(9), EntityPhase::Idle);
    }

    #[test]
    fn test_alerted_view_and_recovery_eviction() {
        let mut registry = EntityRegistry::new();
        let t0 = Instant::now();

        registry.observe(3, true, t0);
        let awaiting = registry.phase(3).promote().unwrap();
        registry.set_phase(3, awaiting);
        registry.set_phase(3, awaiting.resolve(Decision::Deny).unwrap());

        assert_eq!(registry.alerted_ids(), vec![3]);
        assert!(registry.timer_ids().is_empty());
        assert_eq!(
            registry.phase(3),
            EntityPhase::Resolved {
                resolution: Resolution::Denied,
                since: None
            }
        );

        registry.observe(3, false, t0 + Duration::from_secs(2));
        assert!(!registry.is_alerted(3));
        assert!(registry.alerted_ids().is_empty());
    }

    #[test]
    fn test_evict_absent_after_grace() {
        let mut registry = EntityRegistry::new();
        let t0 = Instant::now();
        let grace = Duration::from_secs(2);

        registry.observe(1, true, t0);
        registry.observe(2, true, t0);

        let active: BTreeSet<TrackId> = [2].into_iter().collect();
        registry.observe(2, true, t0 + Duration::from_secs(1));

        // Inside the grace period nothing is evicted
        assert!(registry
            .evict_absent(&active, t0 + Duration::from_secs(1), grace)
            .is_empty());

        // Id 1 last seen at t0, now 2s later: evicted; id 2 is active
        let evicted = registry.evict_absent(&active, t0 + Duration::from_secs(2), grace);
        assert_eq!(evicted, vec![1]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_set_phase_ignores_unknown_ids() {
        let mut registry = EntityRegistry::new();
        registry.set_phase(
            5,
            EntityPhase::FallingDwell {
                since: Instant::now(),
            },
        );
        assert!(registry.is_empty());
    }
}
