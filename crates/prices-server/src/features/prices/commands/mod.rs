pub mod ingest;

pub use ingest::{IngestPricesCommand, IngestPricesError, IngestSummary};
