//! API request models for claim upload column mappings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Request body for validating a column mapping
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ValidateMappingRequest {
    /// Source column name in the uploaded file → claim field
    #[schema(example = json!({"Claim #": "claim_number", "DOS": "service_date", "Status": "status"}))]
    pub mapping: BTreeMap<String, String>,
}
