//! HTTP request handlers, one module per resource.
//!
//! - [`analytics`]: payer and provider analytics pages, read through the snapshot cache
//! - [`mappings`]: column mapping checks for claim uploads
//!
//! Handlers return [`crate::errors::Error`], which converts to a status code and a JSON
//! [`crate::errors::ErrorBody`].

pub mod analytics;
pub mod mappings;
