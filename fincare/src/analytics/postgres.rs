//! [`AnalyticsStore`] backed by PostgreSQL.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use super::{AnalyticsSnapshot, AnalyticsStore, SubjectRecord, body::AnalyticsBody, body::TOP_COUNTERPARTIES};
use crate::{
    db::{
        errors::DbError,
        handlers::{Claims, Payers, Providers, Snapshots},
        models::snapshots::AnalyticsSnapshotRow,
    },
    types::{AnalyticsSubject, SubjectKind},
};

#[derive(Clone)]
pub struct PgAnalyticsStore {
    db: PgPool,
}

impl PgAnalyticsStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

fn into_snapshot(subject: AnalyticsSubject, row: AnalyticsSnapshotRow) -> AnalyticsSnapshot {
    AnalyticsSnapshot {
        id: row.id,
        subject,
        computed_at: row.computed_at,
        body: row.body.0,
    }
}

#[async_trait]
impl AnalyticsStore for PgAnalyticsStore {
    #[instrument(skip(self), fields(subject = %subject), err)]
    async fn get_entity(&self, subject: AnalyticsSubject) -> Result<Option<SubjectRecord>, DbError> {
        let mut conn = self.db.acquire().await?;
        let record = match subject.kind() {
            SubjectKind::Payer => Payers::new(&mut conn).get_by_id(subject.id()).await?.map(SubjectRecord::Payer),
            SubjectKind::Provider => Providers::new(&mut conn).get_by_id(subject.id()).await?.map(SubjectRecord::Provider),
        };
        Ok(record)
    }

    #[instrument(skip(self), fields(subject = %subject), err)]
    async fn get_cached(&self, subject: AnalyticsSubject) -> Result<Option<AnalyticsSnapshot>, DbError> {
        let mut conn = self.db.acquire().await?;
        let row = Snapshots::new(&mut conn).get_current(subject.kind(), subject.id()).await?;
        Ok(row.map(|row| into_snapshot(subject, row)))
    }

    #[instrument(skip(self), fields(subject = %subject), err)]
    async fn compute(&self, subject: AnalyticsSubject) -> Result<serde_json::Value, DbError> {
        // One read-only transaction so all aggregates see the same claims
        let mut tx = self.db.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let exists = match subject.kind() {
            SubjectKind::Payer => Payers::new(&mut tx).get_by_id(subject.id()).await?.is_some(),
            SubjectKind::Provider => Providers::new(&mut tx).get_by_id(subject.id()).await?.is_some(),
        };
        if !exists {
            return Err(DbError::NotFound);
        }

        let mut claims = Claims::new(&mut tx);
        let totals = claims.totals(subject.kind(), subject.id()).await?;
        let monthly = claims.monthly(subject.kind(), subject.id()).await?;
        let top = claims.top_counterparties(subject.kind(), subject.id(), TOP_COUNTERPARTIES).await?;
        tx.commit().await?;

        let body = AnalyticsBody::from_rows(totals, monthly, top);
        serde_json::to_value(&body).map_err(|e| DbError::Other(e.into()))
    }

    #[instrument(skip(self, body), fields(subject = %subject), err)]
    async fn save_snapshot(&self, subject: AnalyticsSubject, body: serde_json::Value) -> Result<AnalyticsSnapshot, DbError> {
        let mut conn = self.db.acquire().await?;
        let row = Snapshots::new(&mut conn).create(subject.kind(), subject.id(), &body).await?;
        Ok(into_snapshot(subject, row))
    }
}
