//! API request/response models for payer and provider analytics.

use crate::analytics::{AnalyticsSnapshot, body::AnalyticsBody};
use crate::db::models::{payers::Payer, providers::Provider};
use crate::errors::Error;
use crate::types::{PayerId, ProviderId, SnapshotId, SubjectKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Query parameters for the analytics endpoints
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct AnalyticsQuery {
    /// Recompute the analytics even if a fresh snapshot exists (`true`, `false`, `1` or `0`)
    #[param(example = "false")]
    pub refresh: Option<String>,
}

impl AnalyticsQuery {
    /// Whether the caller asked for a forced recompute
    pub fn force(&self) -> Result<bool, Error> {
        let Some(raw) = self.refresh.as_deref() else {
            return Ok(false);
        };
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(Error::BadRequest {
                message: format!("Invalid refresh value '{raw}': expected true, false, 1 or 0"),
            }),
        }
    }
}

/// Payer details shown on the payer analytics page
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PayerResponse {
    pub id: PayerId,
    #[schema(example = "Acme Health")]
    pub name: String,
    /// Line of business, e.g. commercial, medicare, medicaid
    #[schema(example = "commercial")]
    pub payer_type: String,
    #[schema(example = "OH")]
    pub state: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Payer> for PayerResponse {
    fn from(payer: Payer) -> Self {
        Self {
            id: payer.id,
            name: payer.name,
            payer_type: payer.payer_type,
            state: payer.state,
            created_at: payer.created_at,
        }
    }
}

/// Provider details shown on the provider analytics page
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProviderResponse {
    pub id: ProviderId,
    #[schema(example = "Lakeside Clinic")]
    pub name: String,
    /// National Provider Identifier
    #[schema(example = "1234567893")]
    pub npi: String,
    pub specialty: Option<String>,
    pub state: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Provider> for ProviderResponse {
    fn from(provider: Provider) -> Self {
        Self {
            id: provider.id,
            name: provider.name,
            npi: provider.npi,
            specialty: provider.specialty,
            state: provider.state,
            created_at: provider.created_at,
        }
    }
}

/// A computed analytics snapshot
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AnalyticsSnapshotResponse {
    pub snapshot_id: SnapshotId,
    pub subject_kind: SubjectKind,
    pub subject_id: i64,
    /// When these analytics were computed
    pub computed_at: DateTime<Utc>,
    #[schema(value_type = AnalyticsBody)]
    pub metrics: serde_json::Value,
}

impl From<AnalyticsSnapshot> for AnalyticsSnapshotResponse {
    fn from(snapshot: AnalyticsSnapshot) -> Self {
        Self {
            snapshot_id: snapshot.id,
            subject_kind: snapshot.subject.kind(),
            subject_id: snapshot.subject.id(),
            computed_at: snapshot.computed_at,
            metrics: snapshot.body,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PayerAnalyticsData {
    pub payer: PayerResponse,
    pub analytics: AnalyticsSnapshotResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProviderAnalyticsData {
    pub provider: ProviderResponse,
    pub analytics: AnalyticsSnapshotResponse,
}
