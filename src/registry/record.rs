//! Registered service metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::registry::clock::to_delta;

/// One entry per registered service name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRecord {
    pub name: String,
    pub base_url: String,
    pub registered_at: DateTime<Utc>,
    /// Last successful health signal (probe, proxied response or heartbeat).
    pub last_seen: DateTime<Utc>,
    pub consecutive_failures: u32,
    pub breaker_open: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breaker_opened_at: Option<DateTime<Utc>>,
}

impl ServiceRecord {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            registered_at: now,
            last_seen: now,
            consecutive_failures: 0,
            breaker_open: false,
            breaker_opened_at: None,
        }
    }

    /// Time since registration, zero if the clock went backwards.
    pub fn uptime(&self, now: DateTime<Utc>) -> Duration {
        (now - self.registered_at).to_std().unwrap_or_default()
    }

    /// True when `last_seen` precedes `now - max_age`.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now.checked_sub_signed(to_delta(max_age))
            .is_some_and(|cutoff| self.last_seen < cutoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staleness_boundary() {
        let now = Utc::now();
        let mut record = ServiceRecord::new("item-service", "http://h:3002", now);
        let max_age = Duration::from_secs(90);

        record.last_seen = now - to_delta(max_age);
        assert!(!record.is_stale(now, max_age), "exactly max_age old is kept");

        record.last_seen = now - to_delta(max_age) - chrono::TimeDelta::milliseconds(1);
        assert!(record.is_stale(now, max_age));
    }

    #[test]
    fn test_serializes_camel_case() {
        let record = ServiceRecord::new("user-service", "http://h:3001", Utc::now());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["baseUrl"], "http://h:3001");
        assert_eq!(json["consecutiveFailures"], 0);
        assert!(json.get("breakerOpenedAt").is_none());
    }
}
