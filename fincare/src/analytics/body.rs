//! The analytics document stored in each snapshot.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::db::models::claims::{ClaimTotalsRow, CounterpartyRow, MonthlyClaimsRow};

/// Rates are rounded to this many decimal places
const RATE_SCALE: u32 = 4;

/// How many counterparties a snapshot lists
pub const TOP_COUNTERPARTIES: i64 = 5;

/// Claim aggregates for one payer or provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnalyticsBody {
    pub claim_count: i64,
    pub paid_count: i64,
    pub denied_count: i64,
    pub pending_count: i64,
    #[schema(value_type = String, example = "12500.00")]
    pub total_billed: Decimal,
    #[schema(value_type = String, example = "9800.00")]
    pub total_paid: Decimal,
    /// Denied claims over all claims, 0 when there are no claims
    #[schema(value_type = String, example = "0.0625")]
    pub denial_rate: Decimal,
    /// Paid amount over billed amount, 0 when nothing was billed
    #[schema(value_type = String, example = "0.7840")]
    pub collection_rate: Decimal,
    pub first_service_date: Option<NaiveDate>,
    pub last_service_date: Option<NaiveDate>,
    /// One entry per month with claims, oldest first
    pub monthly: Vec<MonthlyClaims>,
    /// Providers for a payer, payers for a provider; largest paid amount first
    pub top_counterparties: Vec<Counterparty>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct MonthlyClaims {
    /// First day of the month
    pub month: NaiveDate,
    pub claim_count: i64,
    #[schema(value_type = String)]
    pub total_billed: Decimal,
    #[schema(value_type = String)]
    pub total_paid: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Counterparty {
    pub id: i64,
    pub name: String,
    pub claim_count: i64,
    #[schema(value_type = String)]
    pub total_paid: Decimal,
}

impl AnalyticsBody {
    pub fn from_rows(totals: ClaimTotalsRow, monthly: Vec<MonthlyClaimsRow>, top: Vec<CounterpartyRow>) -> Self {
        let denial_rate = ratio(Decimal::from(totals.denied_count), Decimal::from(totals.claim_count));
        let collection_rate = ratio(totals.total_paid, totals.total_billed);

        Self {
            claim_count: totals.claim_count,
            paid_count: totals.paid_count,
            denied_count: totals.denied_count,
            pending_count: totals.pending_count,
            total_billed: totals.total_billed,
            total_paid: totals.total_paid,
            denial_rate,
            collection_rate,
            first_service_date: totals.first_service_date,
            last_service_date: totals.last_service_date,
            monthly: monthly
                .into_iter()
                .map(|row| MonthlyClaims {
                    month: row.month,
                    claim_count: row.claim_count,
                    total_billed: row.total_billed,
                    total_paid: row.total_paid,
                })
                .collect(),
            top_counterparties: top
                .into_iter()
                .map(|row| Counterparty {
                    id: row.id,
                    name: row.name,
                    claim_count: row.claim_count,
                    total_paid: row.total_paid,
                })
                .collect(),
        }
    }
}

fn ratio(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator.is_zero() {
        return Decimal::ZERO;
    }
    (numerator / denominator).round_dp(RATE_SCALE)
}
