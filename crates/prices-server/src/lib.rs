//! Prices Server Library
//!
//! HTTP service for bulk price-record ingest and export.
//!
//! # Overview
//!
//! - **Ingest**: `POST /api/v0/prices` takes a multipart zip of CSV files,
//!   persists every valid row inside one transaction, and answers with the
//!   cumulative aggregate totals.
//! - **Export**: `GET /api/v0/prices` streams the full table back as a CSV
//!   snapshot wrapped in a zip archive.
//!
//! # Architecture
//!
//! Feature slices follow a CQRS layout: `commands/` hold write operations,
//! `queries/` hold reads, `routes.rs` maps both onto HTTP. Row-level errors
//! during ingest are soft failures isolated with savepoints; batch-level
//! failures (aggregate computation, transaction errors) roll everything
//! back.
//!
//! ## Framework Stack
//!
//! - **Axum**: web framework and multipart handling
//! - **SQLx**: PostgreSQL pool, transactions, migrations
//! - **zip / csv**: the archive wire formats

pub mod api;
pub mod archive;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod middleware;

// Re-export commonly used types
pub use error::AppError;
