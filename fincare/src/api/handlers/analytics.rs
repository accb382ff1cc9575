use crate::AppState;
use crate::analytics::{AnalyticsSnapshot, SubjectRecord};
use crate::api::models::ApiResponse;
use crate::api::models::analytics::{AnalyticsQuery, PayerAnalyticsData, ProviderAnalyticsData};
use crate::errors::{Error, ErrorBody, Result};
use crate::types::{AnalyticsSubject, SubjectKind};
use axum::{
    Json,
    extract::{Path, Query, State},
};

/// Validate the request, check the subject exists, then read through the analytics cache.
///
/// The id and refresh flag are validated before anything touches storage.
async fn load_analytics(
    state: &AppState,
    kind: SubjectKind,
    raw_id: &str,
    query: &AnalyticsQuery,
) -> Result<(SubjectRecord, AnalyticsSnapshot)> {
    let subject = AnalyticsSubject::parse(kind, raw_id)?;
    let force = query.force()?;

    let record = state.refresher.resolve(subject).await?;
    let snapshot = state.refresher.get_or_refresh(subject, force).await?;
    Ok((record, snapshot))
}

fn mismatched(record: &SubjectRecord, expected: SubjectKind) -> Error {
    Error::Internal {
        operation: format!("resolve {expected}: store returned a {} record", record.kind()),
    }
}

#[utoipa::path(
    get,
    path = "/payers/{id}/analytics",
    tag = "analytics",
    summary = "Get payer analytics",
    description = "Returns the current analytics snapshot for a payer. A snapshot is computed and stored when none exists or the cached one is stale; `refresh=true` always recomputes.",
    params(
        ("id" = i64, Path, description = "Payer ID"),
        AnalyticsQuery
    ),
    responses(
        (status = 200, description = "Payer and analytics", body = ApiResponse<PayerAnalyticsData>),
        (status = 400, description = "Non-numeric or non-positive id, or invalid refresh flag", body = ErrorBody),
        (status = 404, description = "Payer not found", body = ErrorBody),
        (status = 500, description = "Analytics could not be computed or read", body = ErrorBody)
    )
)]
#[tracing::instrument(skip_all, fields(payer_id = %id))]
pub async fn get_payer_analytics(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<ApiResponse<PayerAnalyticsData>>> {
    let (record, snapshot) = load_analytics(&state, SubjectKind::Payer, &id, &query).await?;
    let SubjectRecord::Payer(payer) = record else {
        return Err(mismatched(&record, SubjectKind::Payer));
    };

    Ok(Json(ApiResponse::ok(PayerAnalyticsData {
        payer: payer.into(),
        analytics: snapshot.into(),
    })))
}

#[utoipa::path(
    get,
    path = "/providers/{id}/analytics",
    tag = "analytics",
    summary = "Get provider analytics",
    description = "Returns the current analytics snapshot for a provider. A snapshot is computed and stored when none exists or the cached one is stale; `refresh=true` always recomputes.",
    params(
        ("id" = i64, Path, description = "Provider ID"),
        AnalyticsQuery
    ),
    responses(
        (status = 200, description = "Provider and analytics", body = ApiResponse<ProviderAnalyticsData>),
        (status = 400, description = "Non-numeric or non-positive id, or invalid refresh flag", body = ErrorBody),
        (status = 404, description = "Provider not found", body = ErrorBody),
        (status = 500, description = "Analytics could not be computed or read", body = ErrorBody)
    )
)]
#[tracing::instrument(skip_all, fields(provider_id = %id))]
pub async fn get_provider_analytics(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<Json<ApiResponse<ProviderAnalyticsData>>> {
    let (record, snapshot) = load_analytics(&state, SubjectKind::Provider, &id, &query).await?;
    let SubjectRecord::Provider(provider) = record else {
        return Err(mismatched(&record, SubjectKind::Provider));
    };

    Ok(Json(ApiResponse::ok(ProviderAnalyticsData {
        provider: provider.into(),
        analytics: snapshot.into(),
    })))
}
