//! Database repository for providers.

use crate::{
    db::{
        errors::Result,
        models::providers::{ProviderCreateDBRequest, ProviderDBResponse},
    },
    types::ProviderId,
};
use sqlx::PgConnection;
use tracing::instrument;

pub struct Providers<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Providers<'c> {
    /// Create a new Providers repository instance
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    /// Create a new provider
    #[instrument(skip(self, request), fields(npi = %request.npi), err)]
    pub async fn create(&mut self, request: &ProviderCreateDBRequest) -> Result<ProviderDBResponse> {
        let provider = sqlx::query_as::<_, ProviderDBResponse>(
            r#"
            INSERT INTO providers (name, npi, specialty, state)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, npi, specialty, state, created_at
            "#,
        )
        .bind(&request.name)
        .bind(&request.npi)
        .bind(&request.specialty)
        .bind(&request.state)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(provider)
    }

    /// Get a provider by ID
    #[instrument(skip(self), err)]
    pub async fn get_by_id(&mut self, id: ProviderId) -> Result<Option<ProviderDBResponse>> {
        let provider = sqlx::query_as::<_, ProviderDBResponse>(
            r#"
            SELECT id, name, npi, specialty, state, created_at
            FROM providers
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(provider)
    }
}
