//! API request and response models.
//!
//! Models are kept separate from database records so the wire format can change
//! independently of the schema.

pub mod analytics;
pub mod mappings;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Envelope for successful responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiResponse<T> {
    /// Always true
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data }
    }
}
