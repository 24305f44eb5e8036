pub mod aggregates;
pub mod export;

pub use aggregates::{Aggregates, GetAggregatesError, GetAggregatesQuery};
pub use export::{ExportArchive, ExportPricesError, ExportPricesQuery};
