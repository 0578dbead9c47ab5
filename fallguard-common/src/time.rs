//! Timestamp utilities

use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Convert a non-negative, finite number of seconds into a Duration
///
/// Configuration values arrive as floating point seconds (e.g. `1.0`,
/// `0.25`); negative, NaN and infinite inputs are rejected.
pub fn secs_to_duration(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|e| Error::InvalidInput(format!("invalid duration {secs}s: {e}")))
}
