//! HTTP handler for checking claim upload column mappings.

use axum::Json;

use crate::api::models::ApiResponse;
use crate::api::models::mappings::ValidateMappingRequest;
use crate::errors::{ErrorBody, Result};
use crate::mappings::{MappingValidation, validate_mapping};

#[utoipa::path(
    post,
    path = "/claims/mappings/validate",
    tag = "claims",
    summary = "Validate a column mapping",
    description = "Checks a source column → claim field mapping before a claims file is imported. An incomplete mapping is not an error: the response lists what is missing, unknown or duplicated.",
    request_body = ValidateMappingRequest,
    responses(
        (status = 200, description = "Validation result", body = ApiResponse<MappingValidation>),
        (status = 400, description = "Empty mapping or blank source column", body = ErrorBody),
    )
)]
#[tracing::instrument(skip_all, fields(columns = request.mapping.len()))]
pub async fn validate_claim_mapping(
    Json(request): Json<ValidateMappingRequest>,
) -> Result<Json<ApiResponse<MappingValidation>>> {
    let validation = validate_mapping(&request.mapping)?;
    if !validation.valid {
        tracing::debug!(
            missing = ?validation.missing_fields,
            unknown = ?validation.unknown_fields,
            "Column mapping is incomplete"
        );
    }
    Ok(Json(ApiResponse::ok(validation)))
}
