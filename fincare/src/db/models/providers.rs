//! Database models for providers.

use crate::types::ProviderId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Database representation of a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Provider {
    pub id: ProviderId,
    pub name: String,
    /// National Provider Identifier (10 digits)
    pub npi: String,
    pub specialty: Option<String>,
    pub state: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request to create a new provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderCreateDBRequest {
    pub name: String,
    pub npi: String,
    pub specialty: Option<String>,
    pub state: Option<String>,
}

pub type ProviderDBResponse = Provider;
