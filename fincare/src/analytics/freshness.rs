//! Rules for whether a cached snapshot may be served without recomputing.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};

use super::AnalyticsSnapshot;

pub trait FreshnessPolicy: Send + Sync + std::fmt::Debug {
    fn is_fresh(&self, snapshot: &AnalyticsSnapshot, now: DateTime<Utc>) -> bool;
}

/// Snapshots younger than the given age are fresh.
///
/// A snapshot stamped in the future (clock skew between app servers and the database) is
/// treated as fresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxAge(Duration);

impl MaxAge {
    pub fn new(max_age: Duration) -> Self {
        Self(max_age)
    }
}

impl FreshnessPolicy for MaxAge {
    fn is_fresh(&self, snapshot: &AnalyticsSnapshot, now: DateTime<Utc>) -> bool {
        match now.signed_duration_since(snapshot.computed_at).to_std() {
            Ok(age) => age < self.0,
            // Negative age
            Err(_) => true,
        }
    }
}

/// Any existing snapshot is fresh; snapshots are only replaced by a forced refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlwaysFresh;

impl FreshnessPolicy for AlwaysFresh {
    fn is_fresh(&self, _snapshot: &AnalyticsSnapshot, _now: DateTime<Utc>) -> bool {
        true
    }
}

/// Build the policy for a configured maximum age. No maximum age means [`AlwaysFresh`].
pub fn from_max_age(max_age: Option<Duration>) -> Arc<dyn FreshnessPolicy> {
    match max_age {
        Some(max_age) => Arc::new(MaxAge::new(max_age)),
        None => Arc::new(AlwaysFresh),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AnalyticsSubject;
    use chrono::Duration as ChronoDuration;
    use serde_json::json;

    fn snapshot_at(computed_at: DateTime<Utc>) -> AnalyticsSnapshot {
        AnalyticsSnapshot {
            id: 1,
            subject: AnalyticsSubject::payer(1).unwrap(),
            computed_at,
            body: json!({}),
        }
    }

    #[test]
    fn test_max_age_boundary() {
        let policy = MaxAge::new(Duration::from_secs(60));
        let now = Utc::now();

        assert!(policy.is_fresh(&snapshot_at(now), now));
        assert!(policy.is_fresh(&snapshot_at(now - ChronoDuration::seconds(59)), now));
        assert!(!policy.is_fresh(&snapshot_at(now - ChronoDuration::seconds(60)), now));
        assert!(!policy.is_fresh(&snapshot_at(now - ChronoDuration::days(3)), now));
    }

    #[test]
    fn test_future_snapshot_is_fresh() {
        let policy = MaxAge::new(Duration::from_secs(60));
        let now = Utc::now();
        assert!(policy.is_fresh(&snapshot_at(now + ChronoDuration::minutes(5)), now));
    }

    #[test]
    fn test_from_max_age() {
        let now = Utc::now();
        let ancient = snapshot_at(now - ChronoDuration::days(365 * 10));

        assert!(from_max_age(None).is_fresh(&ancient, now));
        assert!(!from_max_age(Some(Duration::from_secs(3600))).is_fresh(&ancient, now));
    }
}
