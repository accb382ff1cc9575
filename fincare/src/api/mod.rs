//! API layer for HTTP request handling and data models.
//!
//! - **[`handlers`]**: Axum route handlers for all API endpoints
//! - **[`models`]**: Request/response data structures for API communication
//!
//! # API Structure
//!
//! All routes are nested under `/api/v1`:
//!
//! - **Payer analytics** (`/payers/{id}/analytics`): cached payer 360 analytics
//! - **Provider analytics** (`/providers/{id}/analytics`): cached provider 360 analytics
//! - **Claim mappings** (`/claims/mappings/validate`): upload column mapping checks
//!
//! Successful responses are wrapped as `{"success": true, "data": ...}`; failures as
//! `{"success": false, "error": <code>, "message": ...}` (see [`crate::errors`]).
//!
//! # OpenAPI Documentation
//!
//! All endpoints are documented with `utoipa`. The document is served at `/openapi.json` and
//! rendered at `/docs`.

pub mod handlers;
pub mod models;
