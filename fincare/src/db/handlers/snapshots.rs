//! Database repository for analytics snapshots.
//!
//! Snapshots are append-only. The current snapshot for a subject is the row with the latest
//! `computed_at` (ties broken by id); older rows are history and are never updated or deleted
//! here.

use crate::{
    db::{errors::Result, models::snapshots::AnalyticsSnapshotRow},
    types::SubjectKind,
};
use sqlx::{PgConnection, types::Json};
use tracing::instrument;

pub struct Snapshots<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Snapshots<'c> {
    /// Create a new Snapshots repository instance
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Get the current snapshot for a subject, if one was ever computed
    #[instrument(skip(self), err)]
    pub async fn get_current(&mut self, kind: SubjectKind, subject_id: i64) -> Result<Option<AnalyticsSnapshotRow>> {
        let row = sqlx::query_as::<_, AnalyticsSnapshotRow>(
            r#"
            SELECT id, subject_kind, subject_id, computed_at, body
            FROM analytics_snapshots
            WHERE subject_kind = $1 AND subject_id = $2
            ORDER BY computed_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(kind.as_str())
        .bind(subject_id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(row)
    }

    /// Append a new snapshot, which becomes the current one.
    ///
    /// Fails with a foreign key violation when the subject row does not exist.
    #[instrument(skip(self, body), err)]
    pub async fn create(&mut self, kind: SubjectKind, subject_id: i64, body: &serde_json::Value) -> Result<AnalyticsSnapshotRow> {
        let row = sqlx::query_as::<_, AnalyticsSnapshotRow>(
            r#"
            INSERT INTO analytics_snapshots (subject_kind, subject_id, body)
            VALUES ($1, $2, $3)
            RETURNING id, subject_kind, subject_id, computed_at, body
            "#,
        )
        .bind(kind.as_str())
        .bind(subject_id)
        .bind(Json(body))
        .fetch_one(&mut *self.db)
        .await?;

        Ok(row)
    }
}
