//! Common type definitions for analytics subjects.
//!
//! # ID Types
//!
//! Payers and providers are keyed by positive `BIGSERIAL` ids, wrapped in type aliases:
//!
//! - [`PayerId`]: payer (insurer / plan) identifier
//! - [`ProviderId`]: provider (practice / facility) identifier
//! - [`SnapshotId`]: analytics snapshot row identifier
//!
//! # Subjects
//!
//! An [`AnalyticsSubject`] names the entity whose analytics are requested: a [`SubjectKind`]
//! plus a positive id. Construction validates the id, so a subject value in hand is always
//! well formed (it may still refer to a row that does not exist).

use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

use crate::analytics::AnalyticsError;

// Type aliases for IDs
pub type PayerId = i64;
pub type ProviderId = i64;
pub type SnapshotId = i64;

/// The kind of entity analytics are computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    Payer,
    Provider,
}

impl SubjectKind {
    /// Stable lowercase name, used in the `analytics_snapshots.subject_kind` column, metric
    /// labels and JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectKind::Payer => "payer",
            SubjectKind::Provider => "provider",
        }
    }

    /// Capitalized name for user-facing messages
    pub fn display_name(&self) -> &'static str {
        match self {
            SubjectKind::Payer => "Payer",
            SubjectKind::Provider => "Provider",
        }
    }

    /// The opposite side of a claim (a payer's counterparties are providers and vice versa)
    pub fn counterparty(&self) -> SubjectKind {
        match self {
            SubjectKind::Payer => SubjectKind::Provider,
            SubjectKind::Provider => SubjectKind::Payer,
        }
    }
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validated reference to a payer or provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnalyticsSubject {
    kind: SubjectKind,
    id: i64,
}

impl AnalyticsSubject {
    /// Build a subject from a numeric id. Ids must be positive.
    pub fn new(kind: SubjectKind, id: i64) -> Result<Self, AnalyticsError> {
        if id <= 0 {
            return Err(AnalyticsError::InvalidSubject {
                kind,
                raw: id.to_string(),
            });
        }
        Ok(Self { kind, id })
    }

    /// Parse a subject id from a raw path segment.
    pub fn parse(kind: SubjectKind, raw: &str) -> Result<Self, AnalyticsError> {
        let id = raw.trim().parse::<i64>().map_err(|_| AnalyticsError::InvalidSubject {
            kind,
            raw: raw.to_string(),
        })?;
        Self::new(kind, id).map_err(|_| AnalyticsError::InvalidSubject {
            kind,
            raw: raw.to_string(),
        })
    }

    pub fn payer(id: PayerId) -> Result<Self, AnalyticsError> {
        Self::new(SubjectKind::Payer, id)
    }

    pub fn provider(id: ProviderId) -> Result<Self, AnalyticsError> {
        Self::new(SubjectKind::Provider, id)
    }

    pub fn kind(&self) -> SubjectKind {
        self.kind
    }

    pub fn id(&self) -> i64 {
        self.id
    }
}

impl fmt::Display for AnalyticsSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}
