//! Confirmation arbiter
//!
//! Owns the single pending-confirmation slot. At most one entity awaits a
//! human decision at any time; later falls wait until the slot is free.

use super::entity::{Decision, Resolution};
use super::registry::EntityRegistry;
use crate::detection::TrackId;
use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tracing::debug;

/// Single-slot confirmation arbiter
#[derive(Debug)]
pub struct ConfirmationArbiter {
    pending: Option<TrackId>,
    confirmation_duration: Duration,
    cooldown: Duration,
    last_resolved_at: Option<Instant>,
}

impl ConfirmationArbiter {
    pub fn new(confirmation_duration: Duration, cooldown: Duration) -> Self {
        Self {
            pending: None,
            confirmation_duration,
            cooldown,
            last_resolved_at: None,
        }
    }

    /// Id currently awaiting confirmation
    pub fn pending(&self) -> Option<TrackId> {
        self.pending
    }

    /// Clear the slot if `id` holds it; returns true when cleared
    ///
    /// Used when the occupant was reclassified not fallen (its record is
    /// already idle).
    pub fn withdraw(&mut self, id: TrackId) -> bool {
        if self.pending == Some(id) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Clear the slot if its occupant is not in `active`
    ///
    /// The entity keeps its timer and drops back to dwelling.
    pub fn withdraw_absent(
        &mut self,
        registry: &mut EntityRegistry,
        active: &BTreeSet<TrackId>,
    ) -> Option<TrackId> {
        let id = self.pending?;
        if active.contains(&id) {
            return None;
        }
        self.pending = None;
        let released = registry.phase(id).release();
        registry.set_phase(id, released);
        Some(id)
    }

    /// Promote the lowest eligible id into an empty slot
    ///
    /// Eligible means present in `active`, dwelling (so not alerted) and
    /// fallen for at least the confirmation duration. At most one promotion
    /// per call.
    pub fn promote_eligible(
        &mut self,
        registry: &mut EntityRegistry,
        active: &BTreeSet<TrackId>,
        now: Instant,
    ) -> Option<TrackId> {
        if self.pending.is_some() || self.cooling_down(now) {
            return None;
        }

        let (id, promoted) = registry.iter().find_map(|(id, record)| {
            if !active.contains(&id) {
                return None;
            }
            let dwell = record.phase.dwell(now)?;
            if dwell < self.confirmation_duration {
                return None;
            }
            record.phase.promote().map(|next| (id, next))
        })?;

        registry.set_phase(id, promoted);
        self.pending = Some(id);
        debug!(track_id = id, "Promoted into pending confirmation");
        Some(id)
    }

    /// Apply a human decision to the pending id
    ///
    /// Rejects decisions for any other id without touching state.
    pub fn resolve(
        &mut self,
        registry: &mut EntityRegistry,
        id: TrackId,
        decision: Decision,
        now: Instant,
    ) -> Result<Resolution> {
        if self.pending != Some(id) {
            return Err(Error::StaleDecision {
                track_id: id,
                pending: self.pending,
            });
        }

        let next = registry
            .phase(id)
            .resolve(decision)
            .ok_or(Error::StaleDecision {
                track_id: id,
                pending: self.pending,
            })?;

        registry.set_phase(id, next);
        self.pending = None;
        self.last_resolved_at = Some(now);
        Ok(decision.into())
    }

    fn cooling_down(&self, now: Instant) -> bool {
        match self.last_resolved_at {
            Some(at) if !self.cooldown.is_zero() => {
                now.saturating_duration_since(at) < self.cooldown
            }
            _ => false,
        }
    }
}
