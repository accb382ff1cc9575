//! Database layer for data persistence and access.
//!
//! Data access uses SQLx with PostgreSQL and follows the repository pattern:
//!
//! ```text
//! ┌──────────────────────┐
//! │  AnalyticsStore      │  (analytics::postgres - orchestration)
//! └──────────┬───────────┘
//!            │
//!            ↓
//! ┌──────────────────────┐
//! │  Repositories        │  (db::handlers - queries)
//! └──────────┬───────────┘
//!            │
//!            ↓
//! ┌──────────────────────┐
//! │  Models              │  (db::models - database records)
//! └──────────┬───────────┘
//!            │
//!            ↓
//! ┌──────────────────────┐
//! │  PostgreSQL          │
//! └──────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`handlers`]: Repository implementations
//! - [`models`]: Database record structures matching table schemas
//! - [`errors`]: Database-specific error types
//!
//! # Migrations
//!
//! Migrations live in the crate's `migrations/` directory and are embedded at build time.
//! [`crate::migrator`] runs them:
//!
//! ```ignore
//! fincare::migrator().run(&pool).await?;
//! ```

pub mod errors;
pub mod handlers;
pub mod models;
