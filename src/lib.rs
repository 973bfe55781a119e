//! # doccat
//!
//! A catalog for engineering documents (manuals, datasheets, drawings,
//! norms) with content-hash duplicate detection and batched bulk ingest.
//!
//! Every catalog entry pairs a metadata row with one stored object. Before
//! a file is catalogued its SHA-256 digest is compared with the owner's
//! existing entries; identical content is never stored twice per owner.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────────┐   ┌─────────────┐
//! │  Files   │──▶│  Duplicate   │──▶│  Resolution  │──▶│   Catalog   │
//! │ (upload/ │   │   checker    │   │  workflow /  │   │ SQLite rows │
//! │  ingest) │   │ digest+name  │   │ bulk ingest  │   │ + objects   │
//! └──────────┘   └──────────────┘   └──────────────┘   └──────┬──────┘
//!                                                             │
//!                                               fs / S3 object store
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! doccat init                                   # create database + storage
//! doccat upload pump.pdf --doc-type manual      # single file, stops on conflicts
//! doccat ingest ./manuals --doc-type manual     # bulk, skips exact duplicates
//! doccat list
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`app`] | Application root wiring stores, services, event bus |
//! | [`catalog`] | Row + object lifecycle (create, replace, delete) |
//! | [`duplicates`] | Exact and similar-name duplicate queries |
//! | [`resolution`] | Single-upload conflict workflow |
//! | [`ingest`] | Batched bulk ingest pipeline |
//! | [`extractor`] | Metadata extraction collaborators |
//! | [`extract`] | PDF/DOCX/text extraction |
//! | [`storage`] | Filesystem and S3 object stores |
//! | [`sqlite_store`] | SQLite catalog store |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`upload`], [`entries`] | Single-file and catalog browsing commands |

pub mod app;
pub mod catalog;
pub mod config;
pub mod db;
pub mod duplicates;
pub mod entries;
pub mod export;
pub mod extract;
pub mod extractor;
pub mod files;
pub mod ingest;
pub mod migrate;
pub mod progress;
pub mod resolution;
pub mod session;
pub mod sqlite_store;
pub mod stats;
pub mod storage;
pub mod upload;
