//! Database repository for claims and the aggregations analytics are built from.
//!
//! Every aggregate is scoped to one subject: `payer_id = $1` for payers, `provider_id = $1`
//! for providers. Column and table names are chosen from [`SubjectKind`], never from input.

use crate::{
    db::{
        errors::Result,
        models::claims::{Claim, ClaimCreateDBRequest, ClaimTotalsRow, CounterpartyRow, MonthlyClaimsRow},
    },
    types::SubjectKind,
};
use sqlx::PgConnection;
use tracing::instrument;

/// Claim column holding the id of a subject of this kind
fn subject_column(kind: SubjectKind) -> &'static str {
    match kind {
        SubjectKind::Payer => "payer_id",
        SubjectKind::Provider => "provider_id",
    }
}

/// Entity table for a subject of this kind
fn subject_table(kind: SubjectKind) -> &'static str {
    match kind {
        SubjectKind::Payer => "payers",
        SubjectKind::Provider => "providers",
    }
}

pub struct Claims<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Claims<'c> {
    /// Create a new Claims repository instance
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Insert a claim
    #[instrument(skip(self, request), fields(claim_number = %request.claim_number), err)]
    pub async fn create(&mut self, request: &ClaimCreateDBRequest) -> Result<Claim> {
        let claim = sqlx::query_as::<_, Claim>(
            r#"
            INSERT INTO claims (
                claim_number, payer_id, provider_id, service_date,
                billed_amount, allowed_amount, paid_amount, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, claim_number, payer_id, provider_id, service_date,
                      billed_amount, allowed_amount, paid_amount, status, created_at
            "#,
        )
        .bind(&request.claim_number)
        .bind(request.payer_id)
        .bind(request.provider_id)
        .bind(request.service_date)
        .bind(request.billed_amount)
        .bind(request.allowed_amount)
        .bind(request.paid_amount)
        .bind(request.status.as_str())
        .fetch_one(&mut *self.db)
        .await?;

        Ok(claim)
    }

    /// Claim counts, amounts and service date range for one subject
    #[instrument(skip(self), err)]
    pub async fn totals(&mut self, kind: SubjectKind, subject_id: i64) -> Result<ClaimTotalsRow> {
        let query = format!(
            r#"
            SELECT
                COUNT(*)::bigint AS claim_count,
                COUNT(*) FILTER (WHERE status = 'paid')::bigint AS paid_count,
                COUNT(*) FILTER (WHERE status = 'denied')::bigint AS denied_count,
                COUNT(*) FILTER (WHERE status = 'pending')::bigint AS pending_count,
                COALESCE(SUM(billed_amount), 0)::numeric AS total_billed,
                COALESCE(SUM(paid_amount), 0)::numeric AS total_paid,
                MIN(service_date) AS first_service_date,
                MAX(service_date) AS last_service_date
            FROM claims
            WHERE {column} = $1
            "#,
            column = subject_column(kind)
        );

        let totals = sqlx::query_as::<_, ClaimTotalsRow>(&query)
            .bind(subject_id)
            .fetch_one(&mut *self.db)
            .await?;

        Ok(totals)
    }

    /// Per-month claim counts and amounts, oldest month first
    #[instrument(skip(self), err)]
    pub async fn monthly(&mut self, kind: SubjectKind, subject_id: i64) -> Result<Vec<MonthlyClaimsRow>> {
        let query = format!(
            r#"
            SELECT
                date_trunc('month', service_date)::date AS month,
                COUNT(*)::bigint AS claim_count,
                COALESCE(SUM(billed_amount), 0)::numeric AS total_billed,
                COALESCE(SUM(paid_amount), 0)::numeric AS total_paid
            FROM claims
            WHERE {column} = $1
            GROUP BY 1
            ORDER BY 1 ASC
            "#,
            column = subject_column(kind)
        );

        let rows = sqlx::query_as::<_, MonthlyClaimsRow>(&query)
            .bind(subject_id)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(rows)
    }

    /// The counterparties this subject has been paid the most with, largest first
    #[instrument(skip(self), err)]
    pub async fn top_counterparties(&mut self, kind: SubjectKind, subject_id: i64, limit: i64) -> Result<Vec<CounterpartyRow>> {
        let other = kind.counterparty();
        let query = format!(
            r#"
            SELECT
                t.id,
                t.name,
                COUNT(*)::bigint AS claim_count,
                COALESCE(SUM(c.paid_amount), 0)::numeric AS total_paid
            FROM claims c
            JOIN {other_table} t ON t.id = c.{other_column}
            WHERE c.{column} = $1
            GROUP BY t.id, t.name
            ORDER BY total_paid DESC, t.id ASC
            LIMIT $2
            "#,
            other_table = subject_table(other),
            other_column = subject_column(other),
            column = subject_column(kind)
        );

        let rows = sqlx::query_as::<_, CounterpartyRow>(&query)
            .bind(subject_id)
            .bind(limit)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(rows)
    }
}
