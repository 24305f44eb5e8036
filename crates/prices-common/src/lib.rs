//! Prices Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared plumbing for the prices workspace members:
//!
//! - **Error Handling**: the crate-wide [`PricesError`] type
//! - **Logging**: `tracing` subscriber configuration and initialization

pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{PricesError, Result};
