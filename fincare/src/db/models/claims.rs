//! Database models for claims and claim aggregates.

use crate::types::{PayerId, ProviderId};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Adjudication status of a claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Paid,
    Denied,
    Pending,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Paid => "paid",
            ClaimStatus::Denied => "denied",
            ClaimStatus::Pending => "pending",
        }
    }
}

/// Database representation of a claim
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Claim {
    pub id: i64,
    pub claim_number: String,
    pub payer_id: PayerId,
    pub provider_id: ProviderId,
    pub service_date: NaiveDate,
    pub billed_amount: Decimal,
    pub allowed_amount: Option<Decimal>,
    pub paid_amount: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Request to insert a claim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimCreateDBRequest {
    pub claim_number: String,
    pub payer_id: PayerId,
    pub provider_id: ProviderId,
    pub service_date: NaiveDate,
    pub billed_amount: Decimal,
    pub allowed_amount: Option<Decimal>,
    pub paid_amount: Decimal,
    pub status: ClaimStatus,
}

/// Claim totals for one payer or provider
#[derive(Debug, Clone, Default, sqlx::FromRow)]
pub struct ClaimTotalsRow {
    pub claim_count: i64,
    pub paid_count: i64,
    pub denied_count: i64,
    pub pending_count: i64,
    pub total_billed: Decimal,
    pub total_paid: Decimal,
    pub first_service_date: Option<NaiveDate>,
    pub last_service_date: Option<NaiveDate>,
}

/// Claim totals for one calendar month
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MonthlyClaimsRow {
    pub month: NaiveDate,
    pub claim_count: i64,
    pub total_billed: Decimal,
    pub total_paid: Decimal,
}

/// Claim totals against one counterparty (a provider for a payer, a payer for a provider)
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CounterpartyRow {
    pub id: i64,
    pub name: String,
    pub claim_count: i64,
    pub total_paid: Decimal,
}
