//! Test utilities: an in-memory analytics store, a test server over it, and row builders for
//! tests that run against PostgreSQL.

use crate::analytics::{AnalyticsSnapshot, AnalyticsStore, SubjectRecord};
use crate::config::{Config, PoolSettings};
use crate::db::errors::DbError;
use crate::db::models::{payers::Payer, providers::Provider};
use crate::types::{AnalyticsSubject, PayerId, ProviderId, SnapshotId, SubjectKind};
use crate::{AppState, build_refresher, build_router};
use async_trait::async_trait;
use axum_test::TestServer;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub fn create_test_config() -> Config {
    Config {
        database: crate::config::DatabaseConfig {
            pool: PoolSettings {
                max_connections: 1,
                min_connections: 0,
                ..Default::default()
            },
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Serve the full router over `store`, without a database
pub fn create_test_server(store: Arc<MemoryStore>) -> TestServer {
    let config = create_test_config();
    let state = AppState::builder()
        .refresher(Arc::new(build_refresher(&config, store)))
        .config(config)
        .build();
    let router = build_router(&state).expect("Failed to build router");
    TestServer::new(router).expect("Failed to create test server")
}

#[derive(Default)]
struct MemoryState {
    payers: HashMap<PayerId, Payer>,
    providers: HashMap<ProviderId, Provider>,
    snapshots: Vec<AnalyticsSnapshot>,
    next_snapshot_id: SnapshotId,
}

impl MemoryState {
    fn exists(&self, subject: AnalyticsSubject) -> bool {
        match subject.kind() {
            SubjectKind::Payer => self.payers.contains_key(&subject.id()),
            SubjectKind::Provider => self.providers.contains_key(&subject.id()),
        }
    }

    fn push_snapshot(&mut self, subject: AnalyticsSubject, computed_at: DateTime<Utc>, body: serde_json::Value) -> AnalyticsSnapshot {
        self.next_snapshot_id += 1;
        let snapshot = AnalyticsSnapshot {
            id: self.next_snapshot_id,
            subject,
            computed_at,
            body,
        };
        self.snapshots.push(snapshot.clone());
        snapshot
    }
}

/// In-memory [`AnalyticsStore`] with call counters and failure injection.
///
/// Every recompute gets a `computed_at` strictly after any snapshot already stored, so a forced
/// refresh is always observably newer.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    compute_calls: AtomicUsize,
    get_cached_calls: AtomicUsize,
    get_entity_calls: AtomicUsize,
    compute_delay_ms: AtomicU64,
    fail_compute: AtomicBool,
    fail_save: AtomicBool,
    fail_lookup: AtomicBool,
    panic_on_compute: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_payer(&self, id: PayerId, name: &str) -> Payer {
        let payer = Payer {
            id,
            name: name.to_string(),
            payer_type: "commercial".to_string(),
            state: None,
            created_at: Utc::now(),
        };
        self.state.lock().unwrap().payers.insert(id, payer.clone());
        payer
    }

    pub fn add_provider(&self, id: ProviderId, name: &str) -> Provider {
        let provider = Provider {
            id,
            name: name.to_string(),
            npi: (1_000_000_000 + id).to_string(),
            specialty: None,
            state: None,
            created_at: Utc::now(),
        };
        self.state.lock().unwrap().providers.insert(id, provider.clone());
        provider
    }

    /// Store a snapshot directly, as if an earlier recompute had produced it
    pub fn seed_snapshot(&self, subject: AnalyticsSubject, computed_at: DateTime<Utc>, body: serde_json::Value) -> AnalyticsSnapshot {
        self.state.lock().unwrap().push_snapshot(subject, computed_at, body)
    }

    pub fn compute_calls(&self) -> usize {
        self.compute_calls.load(Ordering::SeqCst)
    }

    pub fn get_cached_calls(&self) -> usize {
        self.get_cached_calls.load(Ordering::SeqCst)
    }

    pub fn get_entity_calls(&self) -> usize {
        self.get_entity_calls.load(Ordering::SeqCst)
    }

    pub fn snapshot_count(&self, subject: AnalyticsSubject) -> usize {
        self.state
            .lock()
            .unwrap()
            .snapshots
            .iter()
            .filter(|s| s.subject == subject)
            .count()
    }

    pub fn fail_compute(&self, fail: bool) {
        self.fail_compute.store(fail, Ordering::SeqCst);
    }

    pub fn fail_save(&self, fail: bool) {
        self.fail_save.store(fail, Ordering::SeqCst);
    }

    /// Make `get_entity` and `get_cached` fail
    pub fn fail_lookup(&self, fail: bool) {
        self.fail_lookup.store(fail, Ordering::SeqCst);
    }

    pub fn set_compute_delay(&self, delay: Duration) {
        self.compute_delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn panic_on_compute(&self, panic: bool) {
        self.panic_on_compute.store(panic, Ordering::SeqCst);
    }

    fn check_lookup(&self) -> Result<(), DbError> {
        if self.fail_lookup.load(Ordering::SeqCst) {
            return Err(DbError::Other(anyhow::anyhow!("injected lookup failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl AnalyticsStore for MemoryStore {
    async fn get_entity(&self, subject: AnalyticsSubject) -> Result<Option<SubjectRecord>, DbError> {
        self.get_entity_calls.fetch_add(1, Ordering::SeqCst);
        self.check_lookup()?;

        let state = self.state.lock().unwrap();
        let record = match subject.kind() {
            SubjectKind::Payer => state.payers.get(&subject.id()).cloned().map(SubjectRecord::Payer),
            SubjectKind::Provider => state.providers.get(&subject.id()).cloned().map(SubjectRecord::Provider),
        };
        Ok(record)
    }

    async fn get_cached(&self, subject: AnalyticsSubject) -> Result<Option<AnalyticsSnapshot>, DbError> {
        self.get_cached_calls.fetch_add(1, Ordering::SeqCst);
        self.check_lookup()?;

        let state = self.state.lock().unwrap();
        let latest = state
            .snapshots
            .iter()
            .filter(|s| s.subject == subject)
            .max_by_key(|s| (s.computed_at, s.id))
            .cloned();
        Ok(latest)
    }

    async fn compute(&self, subject: AnalyticsSubject) -> Result<serde_json::Value, DbError> {
        let call = self.compute_calls.fetch_add(1, Ordering::SeqCst) + 1;

        let delay = self.compute_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.panic_on_compute.load(Ordering::SeqCst) {
            panic!("injected compute panic");
        }
        if self.fail_compute.load(Ordering::SeqCst) {
            return Err(DbError::Other(anyhow::anyhow!("injected compute failure")));
        }
        if !self.state.lock().unwrap().exists(subject) {
            return Err(DbError::NotFound);
        }

        Ok(json!({ "claim_count": 0, "computation": call }))
    }

    async fn save_snapshot(&self, subject: AnalyticsSubject, body: serde_json::Value) -> Result<AnalyticsSnapshot, DbError> {
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(DbError::Other(anyhow::anyhow!("injected save failure")));
        }

        let mut state = self.state.lock().unwrap();
        if !state.exists(subject) {
            return Err(DbError::ForeignKeyViolation {
                constraint: None,
                table: Some("analytics_snapshots".to_string()),
                message: format!("{subject} does not exist"),
            });
        }

        let now = Utc::now();
        let computed_at = match state.snapshots.iter().map(|s| s.computed_at).max() {
            Some(last) if last >= now => last + chrono::Duration::microseconds(1),
            _ => now,
        };
        Ok(state.push_snapshot(subject, computed_at, body))
    }
}

#[cfg(feature = "postgres-tests")]
pub use pg::*;

#[cfg(feature = "postgres-tests")]
mod pg {
    use crate::db::handlers::{Claims, Payers, Providers};
    use crate::db::models::claims::{Claim, ClaimCreateDBRequest, ClaimStatus};
    use crate::db::models::payers::{Payer, PayerCreateDBRequest};
    use crate::db::models::providers::{Provider, ProviderCreateDBRequest};
    use crate::types::{PayerId, ProviderId};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use sqlx::PgPool;
    use std::sync::atomic::{AtomicU64, Ordering};

    static CLAIM_SEQUENCE: AtomicU64 = AtomicU64::new(1);

    pub async fn insert_payer(pool: &PgPool, name: &str) -> Payer {
        let mut conn = pool.acquire().await.expect("Failed to acquire connection");
        Payers::new(&mut conn)
            .create(&PayerCreateDBRequest {
                name: name.to_string(),
                payer_type: "commercial".to_string(),
                state: Some("OH".to_string()),
            })
            .await
            .expect("Failed to create test payer")
    }

    pub async fn insert_provider(pool: &PgPool, name: &str, npi: &str) -> Provider {
        let mut conn = pool.acquire().await.expect("Failed to acquire connection");
        Providers::new(&mut conn)
            .create(&ProviderCreateDBRequest {
                name: name.to_string(),
                npi: npi.to_string(),
                specialty: None,
                state: Some("OH".to_string()),
            })
            .await
            .expect("Failed to create test provider")
    }

    pub async fn insert_claim(
        pool: &PgPool,
        payer_id: PayerId,
        provider_id: ProviderId,
        service_date: NaiveDate,
        billed: &str,
        paid: &str,
        status: ClaimStatus,
    ) -> Claim {
        let sequence = CLAIM_SEQUENCE.fetch_add(1, Ordering::SeqCst);
        let mut conn = pool.acquire().await.expect("Failed to acquire connection");
        Claims::new(&mut conn)
            .create(&ClaimCreateDBRequest {
                claim_number: format!("CLM-{sequence:06}"),
                payer_id,
                provider_id,
                service_date,
                billed_amount: billed.parse::<Decimal>().expect("billed amount"),
                allowed_amount: None,
                paid_amount: paid.parse::<Decimal>().expect("paid amount"),
                status,
            })
            .await
            .expect("Failed to create test claim")
    }
}
