//! Column mappings for claim uploads.
//!
//! An uploaded claims file names its columns however the submitter likes. Before import, the
//! user maps each source column to a claim field. [`validate_mapping`] checks that mapping
//! against the fields a claim needs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Claim fields every upload must provide, in the order they are reported
pub const REQUIRED_CLAIM_FIELDS: [&str; 7] = [
    "claim_number",
    "payer_id",
    "provider_id",
    "service_date",
    "billed_amount",
    "paid_amount",
    "status",
];

/// Claim fields an upload may provide
pub const OPTIONAL_CLAIM_FIELDS: [&str; 1] = ["allowed_amount"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    #[error("Column mapping is empty")]
    Empty,

    #[error("Column mapping contains a blank source column name")]
    BlankSourceColumn,
}

/// Outcome of checking a column mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MappingValidation {
    /// True when nothing is missing, unknown or duplicated
    pub valid: bool,
    /// Required claim fields no column maps to
    pub missing_fields: Vec<String>,
    /// Mapped targets that are not claim fields
    pub unknown_fields: Vec<String>,
    /// Claim fields more than one column maps to
    pub duplicate_targets: Vec<String>,
}

fn is_claim_field(field: &str) -> bool {
    REQUIRED_CLAIM_FIELDS.contains(&field) || OPTIONAL_CLAIM_FIELDS.contains(&field)
}

/// Check a source column → claim field mapping.
///
/// Targets are compared after trimming and ASCII-lowercasing, so `" Status"` maps to `status`.
pub fn validate_mapping(mapping: &BTreeMap<String, String>) -> Result<MappingValidation, MappingError> {
    if mapping.is_empty() {
        return Err(MappingError::Empty);
    }

    let mut target_counts: BTreeMap<String, usize> = BTreeMap::new();
    for (column, target) in mapping {
        if column.trim().is_empty() {
            return Err(MappingError::BlankSourceColumn);
        }
        *target_counts.entry(target.trim().to_ascii_lowercase()).or_default() += 1;
    }

    let missing_fields: Vec<String> = REQUIRED_CLAIM_FIELDS
        .iter()
        .filter(|field| !target_counts.contains_key(**field))
        .map(|field| field.to_string())
        .collect();

    let unknown_fields: Vec<String> = target_counts
        .keys()
        .filter(|target| !is_claim_field(target))
        .cloned()
        .collect();

    let duplicate_targets: Vec<String> = target_counts
        .iter()
        .filter(|(target, count)| **count > 1 && is_claim_field(target))
        .map(|(target, _)| target.clone())
        .collect();

    Ok(MappingValidation {
        valid: missing_fields.is_empty() && unknown_fields.is_empty() && duplicate_targets.is_empty(),
        missing_fields,
        unknown_fields,
        duplicate_targets,
    })
}
