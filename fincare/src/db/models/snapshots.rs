//! Database models for analytics snapshots.

use crate::types::SnapshotId;
use chrono::{DateTime, Utc};
use sqlx::types::Json;

/// Database representation of an analytics snapshot row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AnalyticsSnapshotRow {
    pub id: SnapshotId,
    pub subject_kind: String,
    pub subject_id: i64,
    pub computed_at: DateTime<Utc>,
    pub body: Json<serde_json::Value>,
}
