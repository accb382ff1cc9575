//! Repository implementations for database access.
//!
//! Each repository wraps a borrowed SQLx connection (or transaction) and exposes
//! strongly-typed queries over one table:
//!
//! - [`Payers`]: payer lookup and creation
//! - [`Providers`]: provider lookup and creation
//! - [`Claims`]: claim inserts and the per-subject aggregations analytics are built from
//! - [`Snapshots`]: append-only analytics snapshot storage
//!
//! # Common Pattern
//!
//! ```ignore
//! use fincare::db::handlers::Payers;
//!
//! async fn example(pool: &sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut conn = pool.acquire().await?;
//!     let mut repo = Payers::new(&mut conn);
//!     if let Some(payer) = repo.get_by_id(42).await? {
//!         println!("Found payer: {}", payer.name);
//!     }
//!     Ok(())
//! }
//! ```

pub mod claims;
pub mod payers;
pub mod providers;
pub mod snapshots;

pub use claims::Claims;
pub use payers::Payers;
pub use providers::Providers;
pub use snapshots::Snapshots;
