//! Row-level parsing of price records
//!
//! Turns one raw CSV row into a typed [`PriceRecord`] or a [`RowRejection`].
//! Rejections are ordinary values: the ingest loop logs and skips them, so
//! parsing never aborts a batch.
//!
//! Canonical column order: `id, created_at, name, category, price`.

use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

/// Number of columns a price row must carry.
pub const EXPECTED_FIELDS: usize = 5;

/// Calendar-date wire format for `created_at`.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// A fully validated price record, ready for insertion.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct PriceRecord {
    /// Caller-supplied label; opaque, not unique.
    pub id: String,
    pub created_at: NaiveDate,
    pub name: String,
    pub category: String,
    /// Non-negative finite amount; displayed with two decimals on export.
    pub price: f64,
}

/// Why a row was not accepted
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RowRejection {
    #[error("expected {EXPECTED_FIELDS} fields, found {found}")]
    WrongColumnCount { found: usize },

    #[error("price '{value}' is not a non-negative number")]
    InvalidPrice { value: String },

    #[error("date '{value}' is not a valid YYYY-MM-DD date")]
    InvalidDate { value: String },
}

/// Parse one raw row into a [`PriceRecord`].
///
/// All fields are whitespace-trimmed before validation and storage. Rows
/// with fewer than [`EXPECTED_FIELDS`] fields are rejected; extra trailing
/// fields are tolerated and ignored.
pub fn parse_row(fields: &[String]) -> Result<PriceRecord, RowRejection> {
    if fields.len() < EXPECTED_FIELDS {
        return Err(RowRejection::WrongColumnCount {
            found: fields.len(),
        });
    }

    let id = fields[0].trim();
    let created_at_raw = fields[1].trim();
    let name = fields[2].trim();
    let category = fields[3].trim();
    let price_raw = fields[4].trim();

    // Parse, then require the canonical rendering to match: chrono accepts
    // unpadded components like "2024-1-2", which are not valid on the wire.
    let created_at = NaiveDate::parse_from_str(created_at_raw, DATE_FORMAT)
        .ok()
        .filter(|date| date.format(DATE_FORMAT).to_string() == created_at_raw)
        .ok_or_else(|| RowRejection::InvalidDate {
            value: created_at_raw.to_string(),
        })?;

    let price = price_raw
        .parse::<f64>()
        .ok()
        .filter(|price| price.is_finite() && *price >= 0.0)
        .ok_or_else(|| RowRejection::InvalidPrice {
            value: price_raw.to_string(),
        })?;

    Ok(PriceRecord {
        id: id.to_string(),
        created_at,
        name: name.to_string(),
        category: category.to_string(),
        price,
    })
}
