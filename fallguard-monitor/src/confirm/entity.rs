//! Per-entity confirmation state machine
//!
//! ```text
//!            fallen                 dwell reached, slot free
//!   Idle ─────────────▶ FallingDwell ─────────────────────▶ AwaitingConfirmation
//!    ▲                      ▲   │                                 │      │
//!    │ not fallen (any)     │   └─ lost while pending ◀───────────┘      │ confirm / deny
//!    └──────────────────────┴──────────────────── Resolved(Confirmed|Denied) ◀┘
//! ```
//!
//! Transitions are pure: they take the current phase by value and return the
//! next one, so they can be tested without a clock or lock.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Human decision on a pending confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Confirm,
    Deny,
}

/// Final outcome of a confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Confirmed,
    Denied,
}

impl From<Decision> for Resolution {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Confirm => Resolution::Confirmed,
            Decision::Deny => Resolution::Denied,
        }
    }
}

/// Phase of one tracked entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntityPhase {
    /// Not fallen, no timer
    #[default]
    Idle,
    /// Fallen since `since`, waiting out the dwell duration
    FallingDwell { since: Instant },
    /// Holds the pending confirmation slot
    AwaitingConfirmation { since: Instant },
    /// Decision made; suppresses re-prompting until the entity recovers
    ///
    /// `since` is the running fallen timer: kept across a confirm, cleared by
    /// a deny and restarted by the next fallen observation.
    Resolved {
        resolution: Resolution,
        since: Option<Instant>,
    },
}

impl EntityPhase {
    /// Apply one classification
    ///
    /// Not fallen always returns to `Idle`. Fallen starts a timer if none is
    /// running and never moves an existing start time.
    pub fn observe(self, fallen: bool, now: Instant) -> Self {
        if !fallen {
            return EntityPhase::Idle;
        }
        match self {
            EntityPhase::Idle => EntityPhase::FallingDwell { since: now },
            EntityPhase::Resolved {
                resolution,
                since: None,
            } => EntityPhase::Resolved {
                resolution,
                since: Some(now),
            },
            other => other,
        }
    }

    /// Move a dwelling entity into the pending slot
    pub fn promote(self) -> Option<Self> {
        match self {
            EntityPhase::FallingDwell { since } => {
                Some(EntityPhase::AwaitingConfirmation { since })
            }
            _ => None,
        }
    }

    /// Give up the pending slot without a decision, keeping the timer
    pub fn release(self) -> Self {
        match self {
            EntityPhase::AwaitingConfirmation { since } => EntityPhase::FallingDwell { since },
            other => other,
        }
    }

    /// Apply a human decision; only valid while awaiting confirmation
    pub fn resolve(self, decision: Decision) -> Option<Self> {
        match self {
            EntityPhase::AwaitingConfirmation { since } => Some(match decision {
                Decision::Confirm => EntityPhase::Resolved {
                    resolution: Resolution::Confirmed,
                    since: Some(since),
                },
                Decision::Deny => EntityPhase::Resolved {
                    resolution: Resolution::Denied,
                    since: None,
                },
            }),
            _ => None,
        }
    }

    /// Start of the running fallen timer, if any
    pub fn timer_start(&self) -> Option<Instant> {
        match *self {
            EntityPhase::Idle => None,
            EntityPhase::FallingDwell { since } | EntityPhase::AwaitingConfirmation { since } => {
                Some(since)
            }
            EntityPhase::Resolved { since, .. } => since,
        }
    }

    /// Time spent fallen as of `now`
    pub fn dwell(&self, now: Instant) -> Option<Duration> {
        self.timer_start()
            .map(|since| now.saturating_duration_since(since))
    }

    /// True once a decision has been made for the current fallen run
    pub fn is_alerted(&self) -> bool {
        matches!(self, EntityPhase::Resolved { .. })
    }

    pub fn is_awaiting(&self) -> bool {
        matches!(self, EntityPhase::AwaitingConfirmation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> Instant {
        Instant::now()
    }

    #[test]
    fn test_idle_starts_timer_on_fall() {
        let now = t0();
        assert_eq!(
            EntityPhase::Idle.observe(true, now),
            EntityPhase::FallingDwell { since: now }
        );
        assert_eq!(EntityPhase::Idle.observe(false, now), EntityPhase::Idle);
    }

    #[test]
    fn test_start_time_is_immutable() {
        let start = t0();
        let later = start + Duration::from_millis(500);
        let phase = EntityPhase::FallingDwell { since: start }.observe(true, later);
        assert_eq!(phase.timer_start(), Some(start));
        assert_eq!(phase.dwell(later), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_recovery_resets_every_phase() {
        let now = t0();
        let phases = [
            EntityPhase::FallingDwell { since: now },
            EntityPhase::AwaitingConfirmation { since: now },
            EntityPhase::Resolved {
                resolution: Resolution::Confirmed,
                since: Some(now),
            },
            EntityPhase::Resolved {
                resolution: Resolution::Denied,
                since: None,
            },
        ];
        for phase in phases {
            assert_eq!(phase.observe(false, now), EntityPhase::Idle);
        }
    }

    #[test]
    fn test_promote_only_from_dwell() {
        let now = t0();
        assert_eq!(
            EntityPhase::FallingDwell { since: now }.promote(),
            Some(EntityPhase::AwaitingConfirmation { since: now })
        );
        assert_eq!(EntityPhase::Idle.promote(), None);
        assert_eq!(EntityPhase::AwaitingConfirmation { since: now }.promote(), None);
        assert_eq!(
            EntityPhase::Resolved {
                resolution: Resolution::Denied,
                since: Some(now)
            }
            .promote(),
            None
        );
    }

    #[test]
    fn test_confirm_keeps_timer_deny_clears_it() {
        let now = t0();
        let awaiting = EntityPhase::AwaitingConfirmation { since: now };

        let confirmed = awaiting.resolve(Decision::Confirm).unwrap();
        assert!(confirmed.is_alerted());
        assert_eq!(confirmed.timer_start(), Some(now));

        let denied = awaiting.resolve(Decision::Deny).unwrap();
        assert!(denied.is_alerted());
        assert_eq!(denied.timer_start(), None);
    }

    #[test]
    fn test_denied_timer_restarts_but_stays_alerted() {
        let now = t0();
        let later = now + Duration::from_secs(3);
        let denied = EntityPhase::Resolved {
            resolution: Resolution::Denied,
            since: None,
        };

        let phase = denied.observe(true, later);
        assert!(phase.is_alerted());
        assert_eq!(phase.timer_start(), Some(later));
        assert_eq!(phase.promote(), None);
    }

    #[test]
    fn test_resolve_requires_awaiting() {
        let now = t0();
        assert_eq!(EntityPhase::Idle.resolve(Decision::Confirm), None);
        assert_eq!(
            EntityPhase::FallingDwell { since: now }.resolve(Decision::Deny),
            None
        );
    }

    #[test]
    fn test_release_returns_to_dwell() {
        let now = t0();
        assert_eq!(
            EntityPhase::AwaitingConfirmation { since: now }.release(),
            EntityPhase::FallingDwell { since: now }
        );
        assert_eq!(EntityPhase::Idle.release(), EntityPhase::Idle);
    }
}
