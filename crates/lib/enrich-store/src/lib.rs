//! Document models and field schema for enrich-hook.
//!
//! This crate defines the document shape shared by the pipeline, the
//! document store backends, and the webhook server.

pub mod models;
pub mod schema;

pub use models::*;
