//! Database models for payers.

use crate::types::PayerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Database representation of a payer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payer {
    pub id: PayerId,
    pub name: String,
    pub payer_type: String,
    pub state: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request to create a new payer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayerCreateDBRequest {
    pub name: String,
    pub payer_type: String,
    pub state: Option<String>,
}

pub type PayerDBResponse = Payer;
