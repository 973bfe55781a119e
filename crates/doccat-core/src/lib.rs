//! # doccat core
//!
//! Shared, runtime-agnostic logic for doccat: catalog data models, content
//! digests, the similar-name heuristic, extraction-response parsing, ingest
//! progress math, the application event bus, and the store abstractions.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! native-only dependencies. Backends live in the `doccat` crate.

pub mod digest;
pub mod error;
pub mod events;
pub mod extraction;
pub mod models;
pub mod progress;
pub mod similarity;
pub mod store;
