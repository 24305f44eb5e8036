//! Prices feature module
//!
//! Bulk ingest of zip-compressed CSV price records, full-table CSV export,
//! and cumulative aggregate totals.

pub mod commands;
pub mod parser;
pub mod queries;
pub mod routes;


pub use parser::{PriceRecord, RowRejection};
pub use routes::prices_routes;
