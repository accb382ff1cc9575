//! Database repository for payers.

use crate::{
    db::{
        errors::Result,
        models::payers::{PayerCreateDBRequest, PayerDBResponse},
    },
    types::PayerId,
};
use sqlx::PgConnection;
use tracing::instrument;

pub struct Payers<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Payers<'c> {
    /// Create a new Payers repository instance
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Create a new payer
    #[instrument(skip(self, request), fields(name = %request.name), err)]
    pub async fn create(&mut self, request: &PayerCreateDBRequest) -> Result<PayerDBResponse> {
        let payer = sqlx::query_as::<_, PayerDBResponse>(
            r#"
            INSERT INTO payers (name, payer_type, state)
            VALUES ($1, $2, $3)
            RETURNING id, name, payer_type, state, created_at
            "#,
        )
        .bind(&request.name)
        .bind(&request.payer_type)
        .bind(&request.state)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(payer)
    }

    /// Get a payer by ID
    #[instrument(skip(self), err)]
    pub async fn get_by_id(&mut self, id: PayerId) -> Result<Option<PayerDBResponse>> {
        let payer = sqlx::query_as::<_, PayerDBResponse>(
            r#"
            SELECT id, name, payer_type, state, created_at
            FROM payers
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(payer)
    }
}
