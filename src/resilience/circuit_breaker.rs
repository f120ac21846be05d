//! Circuit breaker for downstream protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: service assumed down, requests fail fast
//!
//! # State Transitions
//! ```text
//! Closed → Open:   consecutive_failures reaches trip_threshold
//! Open → Closed:   first check after the cool-down has elapsed (lazy, no timer)
//! any → Closed:    a single success
//! ```
//!
//! # Design Decisions
//! - Per-service breaker stored on the registry record (one source of truth)
//! - No half-open state: the first call after cool-down is an ordinary call
//! - Probe failures and call failures feed the same counter
//! - Pure functions over `ServiceRecord`; the caller supplies `now`

use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::registry::clock::to_delta;
use crate::registry::record::ServiceRecord;

/// What a breaker update did to the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerTransition {
    /// State unchanged.
    Unchanged,
    /// Closed → Open on reaching the threshold.
    Tripped,
    /// Open → Closed because a success arrived.
    Healed,
    /// Open → Closed because the cool-down elapsed.
    CooledDown,
}

/// Threshold and cool-down shared by every breaker in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerPolicy {
    pub trip_threshold: u32,
    pub cooldown: Duration,
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self {
            trip_threshold: 3,
            cooldown: Duration::from_secs(30),
        }
    }
}

impl BreakerPolicy {
    pub fn new(trip_threshold: u32, cooldown: Duration) -> Self {
        Self {
            trip_threshold: trip_threshold.max(1),
            cooldown,
        }
    }

    /// Count a failure, opening the breaker when the threshold is reached.
    pub fn record_failure(&self, record: &mut ServiceRecord, now: DateTime<Utc>) -> BreakerTransition {
        record.consecutive_failures = record.consecutive_failures.saturating_add(1);

        if !record.breaker_open && record.consecutive_failures >= self.trip_threshold {
            record.breaker_open = true;
            record.breaker_opened_at = Some(now);
            return BreakerTransition::Tripped;
        }
        BreakerTransition::Unchanged
    }

    /// A single success fully heals the breaker.
    pub fn record_success(&self, record: &mut ServiceRecord, now: DateTime<Utc>) -> BreakerTransition {
        let was_open = record.breaker_open;
        record.consecutive_failures = 0;
        record.breaker_open = false;
        record.breaker_opened_at = None;
        record.last_seen = now;

        if was_open {
            BreakerTransition::Healed
        } else {
            BreakerTransition::Unchanged
        }
    }

    /// Evaluate the breaker at `now`, closing it if the cool-down has elapsed.
    ///
    /// Returns whether the breaker is open after evaluation.
    pub fn check(&self, record: &mut ServiceRecord, now: DateTime<Utc>) -> (bool, BreakerTransition) {
        if !record.breaker_open {
            return (false, BreakerTransition::Unchanged);
        }

        let cooled_down = match record.breaker_opened_at {
            Some(opened_at) => now - opened_at > to_delta(self.cooldown),
            // Open without a timestamp only comes from a hand-edited file.
            None => true,
        };

        if cooled_down {
            record.consecutive_failures = 0;
            record.breaker_open = false;
            record.breaker_opened_at = None;
            (false, BreakerTransition::CooledDown)
        } else {
            (true, BreakerTransition::Unchanged)
        }
    }
}
