//! OpenAPI documentation for the API at `/api/v1/*`.
//!
//! The document is served as JSON at `/openapi.json` and rendered with Scalar at `/docs`.

use utoipa::OpenApi;

use crate::{analytics, api, errors, mappings, types};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "fincare",
        description = "Payer and provider claim analytics. Analytics are served from stored snapshots and recomputed from claims when a snapshot is missing or stale."
    ),
    servers(
        (url = "/api/v1", description = "Analytics API")
    ),
    paths(
        api::handlers::analytics::get_payer_analytics,
        api::handlers::analytics::get_provider_analytics,
        api::handlers::mappings::validate_claim_mapping,
    ),
    components(
        schemas(
            errors::ErrorBody,
            types::SubjectKind,
            analytics::body::AnalyticsBody,
            analytics::body::MonthlyClaims,
            analytics::body::Counterparty,
            api::models::analytics::PayerResponse,
            api::models::analytics::ProviderResponse,
            api::models::analytics::AnalyticsSnapshotResponse,
            api::models::analytics::PayerAnalyticsData,
            api::models::analytics::ProviderAnalyticsData,
            api::models::mappings::ValidateMappingRequest,
            mappings::MappingValidation,
        )
    ),
    tags(
        (name = "analytics", description = "Cached payer and provider analytics"),
        (name = "claims", description = "Claim upload helpers"),
    )
)]
pub struct ApiDoc;
