//! Core services for enrich-hook.
//!
//! This crate owns the enrichment pipeline, the Google service clients it
//! calls (Cloud Vision labels, Gemini captions), and the document store
//! backends (`SurrealDB` and Firestore REST).

pub mod auth;
pub mod control;
pub mod services;
pub mod store;
