//! Database record models matching table schemas.
//!
//! Each struct corresponds to a table row (or an aggregate row) and derives
//! `sqlx::FromRow`. Database models are kept apart from the API models in
//! [`crate::api::models`] so storage and wire formats can evolve independently.
//!
//! - [`payers`]: insurers and plans
//! - [`providers`]: practices and facilities, keyed by NPI
//! - [`claims`]: claim rows plus the aggregate rows produced by analytics queries
//! - [`snapshots`]: persisted analytics snapshots

pub mod claims;
pub mod payers;
pub mod providers;
pub mod snapshots;
