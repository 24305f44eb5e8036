//! Full-table CSV export
//!
//! Reads every persisted record in natural storage order, serializes one
//! CSV snapshot and wraps it as a single zip entry. The archive is fully
//! assembled before the response starts, so a failure never produces a
//! partial body.

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::archive::{self, ArchiveError};
use crate::features::prices::parser::PriceRecord;

/// Download filename sent in the Content-Disposition header.
pub const EXPORT_ARCHIVE_NAME: &str = "data.zip";

/// Name of the CSV entry inside the archive.
pub const EXPORT_ENTRY_NAME: &str = "data.csv";

/// Fixed CSV header, matching the canonical ingest column order.
const CSV_HEADER: [&str; 5] = ["id", "created_at", "name", "category", "price"];

/// Query to export all price records as CSV-in-zip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportPricesQuery;

/// Assembled export archive
#[derive(Debug, Clone)]
pub struct ExportArchive {
    pub filename: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExportPricesError {
    #[error("failed to read price records: {0}")]
    Read(#[from] sqlx::Error),

    #[error("failed to serialize CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to flush CSV: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to assemble export archive: {0}")]
    Write(#[from] ArchiveError),
}

impl Request<Result<ExportArchive, ExportPricesError>> for ExportPricesQuery {}

#[tracing::instrument(skip(pool))]
pub async fn handle(
    pool: PgPool,
    _query: ExportPricesQuery,
) -> Result<ExportArchive, ExportPricesError> {
    let records = sqlx::query_as::<_, PriceRecord>(
        "SELECT id, created_at, name, category, price FROM prices",
    )
    .fetch_all(&pool)
    .await?;

    let csv_bytes = serialize_csv(&records)?;
    let bytes = archive::build_csv_zip(EXPORT_ENTRY_NAME, &csv_bytes)?;

    tracing::debug!(
        records = records.len(),
        archive_bytes = bytes.len(),
        "Export archive assembled"
    );

    Ok(ExportArchive {
        filename: EXPORT_ARCHIVE_NAME,
        bytes,
    })
}

/// Serialize records with the fixed header; prices render with two decimals,
/// dates in their wire format.
fn serialize_csv(records: &[PriceRecord]) -> Result<Vec<u8>, ExportPricesError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record(CSV_HEADER)?;
    for record in records {
        let created_at = record.created_at.format("%Y-%m-%d").to_string();
        let price = format!("{:.2}", record.price);
        writer.write_record([
            record.id.as_str(),
            created_at.as_str(),
            record.name.as_str(),
            record.category.as_str(),
            price.as_str(),
        ])?;
    }

    writer.flush()?;
    Ok(writer.into_inner().map_err(|e| e.into_error())?)
}
