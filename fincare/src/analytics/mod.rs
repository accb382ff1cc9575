//! Cached analytics for payers and providers.
//!
//! [`AnalyticsCacheRefresher`] implements the read-through contract behind the analytics
//! endpoints: a read either returns the current snapshot for a subject, or recomputes the
//! analytics from claims, persists them as a new snapshot and returns that. A forced read skips
//! the lookup and always recomputes.
//!
//! ```text
//!   get_or_refresh(subject, force)
//!          │
//!          ├── force ──────────────────────────────┐
//!          │                                       │
//!          ↓                                       ↓
//!   store.get_cached ── fresh ──> return     recompute (single-flight per subject)
//!          │                                       │
//!          └── none / stale ──────────────────────>├── store.compute
//!                                                  └── store.save_snapshot ──> return
//! ```
//!
//! The refresher owns no storage. Everything it reads and writes goes through an
//! [`AnalyticsStore`], and whether a cached snapshot may be served is decided by a
//! [`FreshnessPolicy`](freshness::FreshnessPolicy).
//!
//! Snapshots are append-only: each successful recompute inserts one row that supersedes the
//! previous one. A failed recompute persists nothing, so the prior snapshot stays current.

pub mod body;
pub mod freshness;
pub mod postgres;
pub mod single_flight;

use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::{
    db::{
        errors::DbError,
        models::{payers::Payer, providers::Provider},
    },
    types::{AnalyticsSubject, SnapshotId, SubjectKind},
};
use freshness::FreshnessPolicy;
use single_flight::{Aborted, SingleFlight};

/// Errors surfaced by the analytics cache.
///
/// `Clone` so that one recompute result can be handed to every caller waiting on it.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalyticsError {
    /// The id was not a positive integer. Raised before any storage access.
    #[error("Invalid {kind} id '{raw}': expected a positive integer")]
    InvalidSubject { kind: SubjectKind, raw: String },

    /// The payer or provider does not exist
    #[error("{} {id} not found", .kind.display_name())]
    NotFound { kind: SubjectKind, id: i64 },

    /// Aggregation or persistence failed. Nothing was written.
    #[error("Failed to compute analytics for {subject}: {message}")]
    ComputeFailure { subject: AnalyticsSubject, message: String },

    /// Reading entities or cached snapshots failed
    #[error("Analytics storage error: {message}")]
    Storage { message: String },
}

impl AnalyticsError {
    fn not_found(subject: AnalyticsSubject) -> Self {
        AnalyticsError::NotFound {
            kind: subject.kind(),
            id: subject.id(),
        }
    }

    fn storage(err: DbError) -> Self {
        AnalyticsError::Storage { message: err.to_string() }
    }
}

/// A persisted analytics result for one subject
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsSnapshot {
    pub id: SnapshotId,
    pub subject: AnalyticsSubject,
    pub computed_at: DateTime<Utc>,
    /// Opaque aggregate document, see [`body::AnalyticsBody`] for what the postgres store writes
    pub body: serde_json::Value,
}

/// The entity row behind a resolved subject
#[derive(Debug, Clone, PartialEq)]
pub enum SubjectRecord {
    Payer(Payer),
    Provider(Provider),
}

impl SubjectRecord {
    pub fn kind(&self) -> SubjectKind {
        match self {
            SubjectRecord::Payer(_) => SubjectKind::Payer,
            SubjectRecord::Provider(_) => SubjectKind::Provider,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            SubjectRecord::Payer(payer) => payer.id,
            SubjectRecord::Provider(provider) => provider.id,
        }
    }
}

/// Storage collaborator of the refresher.
///
/// `compute` followed by `save_snapshot` is one recompute. Implementations report a subject that
/// vanished during a recompute with an error for which [`DbError::is_missing_entity`] holds.
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// Load the payer or provider row, `None` when it does not exist
    async fn get_entity(&self, subject: AnalyticsSubject) -> Result<Option<SubjectRecord>, DbError>;

    /// The current (latest) snapshot for a subject
    async fn get_cached(&self, subject: AnalyticsSubject) -> Result<Option<AnalyticsSnapshot>, DbError>;

    /// Aggregate claims into a fresh analytics body. Writes nothing.
    async fn compute(&self, subject: AnalyticsSubject) -> Result<serde_json::Value, DbError>;

    /// Persist a body as the new current snapshot
    async fn save_snapshot(&self, subject: AnalyticsSubject, body: serde_json::Value) -> Result<AnalyticsSnapshot, DbError>;
}

type RecomputeResult = Result<AnalyticsSnapshot, AnalyticsError>;

/// Read-through analytics cache shared by the payer and provider endpoints.
pub struct AnalyticsCacheRefresher {
    store: Arc<dyn AnalyticsStore>,
    freshness: Arc<dyn FreshnessPolicy>,
    in_flight: Option<SingleFlight<FlightKey, RecomputeResult>>,
}

/// Forced and unforced recomputes of a subject fly separately: a forced caller must never be
/// handed a snapshot that was merely re-read from the cache.
type FlightKey = (AnalyticsSubject, bool);

impl AnalyticsCacheRefresher {
    /// Create a refresher that deduplicates concurrent recomputes of the same subject
    pub fn new(store: Arc<dyn AnalyticsStore>, freshness: Arc<dyn FreshnessPolicy>) -> Self {
        Self {
            store,
            freshness,
            in_flight: Some(recompute_flights()),
        }
    }

    /// Turn per-subject deduplication on or off
    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.in_flight = enabled.then(recompute_flights);
        self
    }

    /// Look up the payer or provider a subject refers to.
    #[instrument(skip(self), fields(subject = %subject), err)]
    pub async fn resolve(&self, subject: AnalyticsSubject) -> Result<SubjectRecord, AnalyticsError> {
        match self.store.get_entity(subject).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(AnalyticsError::not_found(subject)),
            Err(err) => Err(AnalyticsError::storage(err)),
        }
    }

    /// Return the current snapshot for `subject`, recomputing it when there is none, when it is
    /// stale, or when `force` is set.
    ///
    /// The subject is assumed to exist (see [`Self::resolve`]). If it disappears while being
    /// recomputed the result is [`AnalyticsError::NotFound`].
    #[instrument(skip(self), fields(subject = %subject), err)]
    pub async fn get_or_refresh(&self, subject: AnalyticsSubject, force: bool) -> Result<AnalyticsSnapshot, AnalyticsError> {
        let kind = subject.kind().as_str();

        if force {
            debug!("Forced refresh, skipping snapshot lookup");
        } else {
            let cached = self.store.get_cached(subject).await.map_err(AnalyticsError::storage)?;
            match cached {
                Some(snapshot) if self.freshness.is_fresh(&snapshot, Utc::now()) => {
                    counter!("fincare_analytics_cache_hits_total", "kind" => kind).increment(1);
                    debug!(snapshot_id = snapshot.id, computed_at = %snapshot.computed_at, "Serving cached analytics");
                    return Ok(snapshot);
                }
                Some(snapshot) => {
                    debug!(snapshot_id = snapshot.id, computed_at = %snapshot.computed_at, "Cached analytics are stale");
                }
                None => debug!("No cached analytics"),
            }
            counter!("fincare_analytics_cache_misses_total", "kind" => kind).increment(1);
        }

        self.recompute(subject, force).await
    }

    async fn recompute(&self, subject: AnalyticsSubject, force: bool) -> RecomputeResult {
        let store = Arc::clone(&self.store);
        let Some(in_flight) = &self.in_flight else {
            return recompute_and_save(store, subject).await;
        };

        let freshness = Arc::clone(&self.freshness);
        let flight = in_flight
            .run((subject, force), move || async move {
                // A flight that ended between the caller's lookup and this point has already
                // stored a fresh snapshot.
                if !force && let Some(snapshot) = fresh_snapshot(store.as_ref(), freshness.as_ref(), subject).await? {
                    debug!(snapshot_id = snapshot.id, "Snapshot stored by a finished recompute");
                    return Ok(snapshot);
                }
                recompute_and_save(store, subject).await
            })
            .await;
        if flight.joined {
            counter!("fincare_analytics_recompute_joined_total", "kind" => subject.kind().as_str()).increment(1);
            debug!("Joined in-flight recompute");
        }
        flight.value
    }
}

fn recompute_flights() -> SingleFlight<FlightKey, RecomputeResult> {
    SingleFlight::new(|aborted: Aborted<FlightKey>| {
        let (subject, _) = aborted.key;
        Err(AnalyticsError::ComputeFailure {
            subject,
            message: format!("recompute aborted: {}", aborted.reason),
        })
    })
}

async fn fresh_snapshot(
    store: &dyn AnalyticsStore,
    freshness: &dyn FreshnessPolicy,
    subject: AnalyticsSubject,
) -> Result<Option<AnalyticsSnapshot>, AnalyticsError> {
    let cached = store.get_cached(subject).await.map_err(AnalyticsError::storage)?;
    Ok(cached.filter(|snapshot| freshness.is_fresh(snapshot, Utc::now())))
}

async fn recompute_and_save(store: Arc<dyn AnalyticsStore>, subject: AnalyticsSubject) -> RecomputeResult {
    let kind = subject.kind().as_str();
    counter!("fincare_analytics_recomputes_total", "kind" => kind).increment(1);
    let started = Instant::now();

    let result = match store.compute(subject).await {
        Ok(body) => store.save_snapshot(subject, body).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(snapshot) => {
            info!(
                subject = %subject,
                snapshot_id = snapshot.id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Recomputed analytics"
            );
            Ok(snapshot)
        }
        Err(err) if err.is_missing_entity() => {
            counter!("fincare_analytics_recompute_failures_total", "kind" => kind).increment(1);
            debug!(subject = %subject, "Subject disappeared during recompute");
            Err(AnalyticsError::not_found(subject))
        }
        Err(err) => {
            counter!("fincare_analytics_recompute_failures_total", "kind" => kind).increment(1);
            warn!(subject = %subject, error = %err, "Analytics recompute failed");
            Err(AnalyticsError::ComputeFailure {
                subject,
                message: err.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::freshness::{AlwaysFresh, MaxAge};
    use crate::test_utils::MemoryStore;
    use chrono::Duration as ChronoDuration;
    use serde_json::json;
    use std::time::Duration;

    fn refresher(store: &Arc<MemoryStore>) -> AnalyticsCacheRefresher {
        AnalyticsCacheRefresher::new(store.clone(), Arc::new(MaxAge::new(Duration::from_secs(3600))))
    }

    #[test_log::test(tokio::test)]
    async fn test_unknown_subject_is_not_found_without_recompute() {
        let store = Arc::new(MemoryStore::new());
        let refresher = refresher(&store);
        let subject = AnalyticsSubject::payer(99).unwrap();

        let err = refresher.resolve(subject).await.unwrap_err();

        assert_eq!(err, AnalyticsError::NotFound { kind: SubjectKind::Payer, id: 99 });
        assert_eq!(store.compute_calls(), 0);
        assert_eq!(store.snapshot_count(subject), 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_resolve_returns_entity_record() {
        let store = Arc::new(MemoryStore::new());
        let provider = store.add_provider(7, "Lakeside Clinic");
        let record = refresher(&store).resolve(AnalyticsSubject::provider(7).unwrap()).await.unwrap();

        assert_eq!(record, SubjectRecord::Provider(provider));
        assert_eq!(record.kind(), SubjectKind::Provider);
        assert_eq!(record.id(), 7);
    }

    #[test_log::test(tokio::test)]
    async fn test_miss_recomputes_exactly_once() {
        let store = Arc::new(MemoryStore::new());
        store.add_payer(1, "Acme Health");
        let subject = AnalyticsSubject::payer(1).unwrap();
        let refresher = refresher(&store);

        let snapshot = refresher.get_or_refresh(subject, false).await.unwrap();

        assert_eq!(store.compute_calls(), 1);
        assert_eq!(snapshot.subject, subject);
        assert_eq!(store.snapshot_count(subject), 1);

        // The new snapshot is now fresh and served as-is
        let again = refresher.get_or_refresh(subject, false).await.unwrap();
        assert_eq!(again, snapshot);
        assert_eq!(store.compute_calls(), 1);
    }

    #[test_log::test(tokio::test)]
    async fn test_fresh_snapshot_is_returned_unchanged() {
        let store = Arc::new(MemoryStore::new());
        store.add_payer(1, "Acme Health");
        let subject = AnalyticsSubject::payer(1).unwrap();
        let seeded = store.seed_snapshot(subject, Utc::now() - ChronoDuration::minutes(5), json!({"claim_count": 12}));

        let snapshot = refresher(&store).get_or_refresh(subject, false).await.unwrap();

        assert_eq!(snapshot, seeded);
        assert_eq!(store.compute_calls(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_force_recomputes_even_when_fresh() {
        let store = Arc::new(MemoryStore::new());
        store.add_provider(3, "Hillside Hospital");
        let subject = AnalyticsSubject::provider(3).unwrap();
        let seeded = store.seed_snapshot(subject, Utc::now() - ChronoDuration::seconds(1), json!({"claim_count": 1}));

        let snapshot = refresher(&store).get_or_refresh(subject, true).await.unwrap();

        assert_eq!(store.compute_calls(), 1);
        assert_eq!(store.get_cached_calls(), 0);
        assert!(snapshot.computed_at > seeded.computed_at);
        assert_ne!(snapshot.id, seeded.id);
        assert_eq!(store.snapshot_count(subject), 2);
    }

    #[test_log::test(tokio::test)]
    async fn test_stale_snapshot_triggers_recompute() {
        let store = Arc::new(MemoryStore::new());
        store.add_payer(1, "Acme Health");
        let subject = AnalyticsSubject::payer(1).unwrap();
        let seeded = store.seed_snapshot(subject, Utc::now() - ChronoDuration::hours(2), json!({"claim_count": 1}));

        let snapshot = refresher(&store).get_or_refresh(subject, false).await.unwrap();

        assert_eq!(store.compute_calls(), 1);
        assert!(snapshot.computed_at > seeded.computed_at);
    }

    #[test_log::test(tokio::test)]
    async fn test_always_fresh_never_expires() {
        let store = Arc::new(MemoryStore::new());
        store.add_payer(1, "Acme Health");
        let subject = AnalyticsSubject::payer(1).unwrap();
        let seeded = store.seed_snapshot(subject, Utc::now() - ChronoDuration::days(400), json!({}));
        let refresher = AnalyticsCacheRefresher::new(store.clone(), Arc::new(AlwaysFresh));

        assert_eq!(refresher.get_or_refresh(subject, false).await.unwrap(), seeded);
        assert_eq!(store.compute_calls(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_failed_recompute_keeps_prior_snapshot() {
        let store = Arc::new(MemoryStore::new());
        store.add_payer(1, "Acme Health");
        let subject = AnalyticsSubject::payer(1).unwrap();
        let seeded = store.seed_snapshot(subject, Utc::now(), json!({"claim_count": 4}));
        let refresher = refresher(&store);

        store.fail_compute(true);
        let err = refresher.get_or_refresh(subject, true).await.unwrap_err();
        match err {
            AnalyticsError::ComputeFailure { subject: failed, message } => {
                assert_eq!(failed, subject);
                assert!(message.contains("injected compute failure"), "message was {message}");
            }
            other => panic!("expected ComputeFailure, got {other:?}"),
        }
        assert_eq!(store.snapshot_count(subject), 1);

        store.fail_compute(false);
        assert_eq!(refresher.get_or_refresh(subject, false).await.unwrap(), seeded);
    }

    #[test_log::test(tokio::test)]
    async fn test_failed_save_persists_nothing() {
        let store = Arc::new(MemoryStore::new());
        store.add_payer(1, "Acme Health");
        let subject = AnalyticsSubject::payer(1).unwrap();
        store.fail_save(true);

        let err = refresher(&store).get_or_refresh(subject, false).await.unwrap_err();

        assert!(matches!(err, AnalyticsError::ComputeFailure { .. }));
        assert_eq!(store.snapshot_count(subject), 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_lookup_failure_is_storage_error_without_recompute() {
        let store = Arc::new(MemoryStore::new());
        store.add_payer(1, "Acme Health");
        store.fail_lookup(true);

        let err = refresher(&store).get_or_refresh(AnalyticsSubject::payer(1).unwrap(), false).await.unwrap_err();

        assert!(matches!(err, AnalyticsError::Storage { .. }));
        assert_eq!(store.compute_calls(), 0);
    }

    #[test_log::test(tokio::test)]
    async fn test_subject_deleted_mid_recompute_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        // Never registered: compute sees no entity
        let subject = AnalyticsSubject::provider(5).unwrap();

        let err = refresher(&store).get_or_refresh(subject, true).await.unwrap_err();

        assert_eq!(err, AnalyticsError::NotFound { kind: SubjectKind::Provider, id: 5 });
    }

    #[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
    async fn test_concurrent_callers_share_one_recompute() {
        let store = Arc::new(MemoryStore::new());
        store.add_payer(1, "Acme Health");
        store.set_compute_delay(Duration::from_millis(100));
        let subject = AnalyticsSubject::payer(1).unwrap();
        let refresher = Arc::new(refresher(&store));

        let calls = (0..8).map(|_| {
            let refresher = refresher.clone();
            tokio::spawn(async move { refresher.get_or_refresh(subject, false).await })
        });
        let results = futures::future::join_all(calls).await;

        let snapshots: Vec<_> = results.into_iter().map(|r| r.unwrap().unwrap()).collect();
        assert_eq!(store.compute_calls(), 1);
        assert_eq!(store.snapshot_count(subject), 1);
        assert!(snapshots.iter().all(|s| s.id == snapshots[0].id));
    }

    #[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
    async fn test_without_single_flight_each_caller_recomputes() {
        let store = Arc::new(MemoryStore::new());
        store.add_payer(1, "Acme Health");
        store.set_compute_delay(Duration::from_millis(50));
        let subject = AnalyticsSubject::payer(1).unwrap();
        let refresher = Arc::new(refresher(&store).with_single_flight(false));

        let calls = (0..3).map(|_| {
            let refresher = refresher.clone();
            tokio::spawn(async move { refresher.get_or_refresh(subject, true).await })
        });
        for result in futures::future::join_all(calls).await {
            result.unwrap().unwrap();
        }

        assert_eq!(store.compute_calls(), 3);
        assert_eq!(store.snapshot_count(subject), 3);
    }

    #[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
    async fn test_payer_and_provider_with_same_id_are_independent() {
        let store = Arc::new(MemoryStore::new());
        store.add_payer(1, "Acme Health");
        store.add_provider(1, "Lakeside Clinic");
        store.set_compute_delay(Duration::from_millis(50));
        let refresher = Arc::new(refresher(&store));

        let payer = AnalyticsSubject::payer(1).unwrap();
        let provider = AnalyticsSubject::provider(1).unwrap();
        let (a, b) = tokio::join!(refresher.get_or_refresh(payer, false), refresher.get_or_refresh(provider, false));

        assert_eq!(a.unwrap().subject, payer);
        assert_eq!(b.unwrap().subject, provider);
        assert_eq!(store.compute_calls(), 2);
    }

    #[test_log::test(tokio::test)]
    async fn test_panicking_recompute_becomes_compute_failure() {
        let store = Arc::new(MemoryStore::new());
        store.add_payer(1, "Acme Health");
        store.panic_on_compute(true);
        let subject = AnalyticsSubject::payer(1).unwrap();
        let refresher = refresher(&store);

        let err = refresher.get_or_refresh(subject, false).await.unwrap_err();
        assert!(matches!(err, AnalyticsError::ComputeFailure { .. }), "got {err:?}");

        // The failed flight is gone, the next call starts a new one
        store.panic_on_compute(false);
        refresher.get_or_refresh(subject, false).await.unwrap();
        assert_eq!(store.snapshot_count(subject), 1);
    }

    /// Holds the result of the third `get_cached` call until released. With one recompute in
    /// flight that is the second caller's lookup: the first two belong to the first caller and
    /// to the flight it started.
    struct HeldLookupStore {
        inner: Arc<MemoryStore>,
        lookups: std::sync::atomic::AtomicUsize,
        release: tokio::sync::Notify,
    }

    #[async_trait]
    impl AnalyticsStore for HeldLookupStore {
        async fn get_entity(&self, subject: AnalyticsSubject) -> Result<Option<SubjectRecord>, DbError> {
            self.inner.get_entity(subject).await
        }

        async fn get_cached(&self, subject: AnalyticsSubject) -> Result<Option<AnalyticsSnapshot>, DbError> {
            let call = self.lookups.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
            let result = self.inner.get_cached(subject).await;
            if call == 3 {
                self.release.notified().await;
            }
            result
        }

        async fn compute(&self, subject: AnalyticsSubject) -> Result<serde_json::Value, DbError> {
            self.inner.compute(subject).await
        }

        async fn save_snapshot(&self, subject: AnalyticsSubject, body: serde_json::Value) -> Result<AnalyticsSnapshot, DbError> {
            self.inner.save_snapshot(subject, body).await
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_caller_that_missed_during_a_finished_flight_reuses_its_snapshot() {
        let inner = Arc::new(MemoryStore::new());
        inner.add_payer(1, "Acme Health");
        inner.set_compute_delay(Duration::from_millis(100));
        let store = Arc::new(HeldLookupStore {
            inner: inner.clone(),
            lookups: Default::default(),
            release: tokio::sync::Notify::new(),
        });
        let refresher = Arc::new(AnalyticsCacheRefresher::new(
            store.clone(),
            Arc::new(MaxAge::new(Duration::from_secs(3600))),
        ));
        let subject = AnalyticsSubject::payer(1).unwrap();

        // First caller misses and starts the recompute
        let first = tokio::spawn({
            let refresher = refresher.clone();
            async move { refresher.get_or_refresh(subject, false).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Second caller misses too, but only acts on it once the first recompute has finished
        let second = tokio::spawn({
            let refresher = refresher.clone();
            async move { refresher.get_or_refresh(subject, false).await }
        });
        let first = first.await.unwrap().unwrap();
        store.release.notify_one();
        let second = second.await.unwrap().unwrap();

        assert_eq!(inner.compute_calls(), 1);
        assert_eq!(inner.snapshot_count(subject), 1);
        assert_eq!(second.id, first.id);
    }

    #[test_log::test(tokio::test)]
    async fn test_forced_refresh_does_not_reuse_snapshot_from_unforced_flight() {
        let store = Arc::new(MemoryStore::new());
        store.add_payer(1, "Acme Health");
        store.set_compute_delay(Duration::from_millis(50));
        let subject = AnalyticsSubject::payer(1).unwrap();
        let refresher = refresher(&store);

        let (unforced, forced) = tokio::join!(refresher.get_or_refresh(subject, false), refresher.get_or_refresh(subject, true));

        assert_ne!(unforced.unwrap().id, forced.unwrap().id);
        assert_eq!(store.compute_calls(), 2);
    }
}
