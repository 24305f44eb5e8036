//! Bulk price ingest command
//!
//! Drives one upload through a single transaction: extract the archive's
//! CSV entries, parse and insert every data row, compute the cumulative
//! aggregates, commit. Row-level problems are soft failures isolated with
//! savepoints; an aggregate failure rolls the whole batch back.
//!
//! The first row of EACH CSV entry is dropped as that file's header. (An
//! earlier revision of this service dropped only the first row of the whole
//! upload, feeding the headers of second and later files through the row
//! parser; see the release notes for the change.)

use mediator::Request;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::archive::{self, ArchiveError};
use crate::features::prices::parser::{self, PriceRecord, RowRejection};
use crate::features::prices::queries::aggregates::{fetch_aggregates, Aggregates};

/// Command to ingest one uploaded archive of price records
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestPricesCommand {
    /// Raw bytes of the uploaded zip archive
    #[serde(skip)]
    pub archive: Vec<u8>,
    /// Abort the whole upload on the first bad row instead of skipping it
    pub strict: bool,
}

/// Outcome of a committed ingest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSummary {
    /// Cumulative totals over the entire table, post-commit
    pub totals: Aggregates,
    /// Rows inserted by this upload
    pub inserted: u64,
    /// Rows skipped by this upload (parse rejections and insert failures)
    pub skipped: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestPricesError {
    #[error("upload contains no file data")]
    EmptyUpload,

    #[error("archive contains no CSV entries")]
    NoCsvEntries,

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Strict mode only: a row failed validation
    #[error("row {row} rejected: {rejection}")]
    RowRejected { row: usize, rejection: RowRejection },

    /// Strict mode only: a row failed to insert
    #[error("row {row} could not be stored: {source}")]
    RowInsert { row: usize, source: sqlx::Error },

    #[error("aggregate computation failed: {0}")]
    Aggregate(#[source] sqlx::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Request<Result<IngestSummary, IngestPricesError>> for IngestPricesCommand {}

impl IngestPricesCommand {
    pub fn validate(&self) -> Result<(), IngestPricesError> {
        if self.archive.is_empty() {
            return Err(IngestPricesError::EmptyUpload);
        }
        Ok(())
    }
}

/// Handles the ingest command.
///
/// Guarantee: either every accepted row from this upload is durably
/// persisted and the returned totals reflect them, or none are. A single
/// bad row never aborts the batch (unless `strict`); a failed aggregate
/// computation always does.
#[tracing::instrument(skip(pool, command), fields(archive_bytes = command.archive.len(), strict = command.strict))]
pub async fn handle(
    pool: PgPool,
    command: IngestPricesCommand,
) -> Result<IngestSummary, IngestPricesError> {
    command.validate()?;

    let entries = archive::extract_csv_entries(&command.archive)?;
    if entries.is_empty() {
        return Err(IngestPricesError::NoCsvEntries);
    }

    let mut tx = pool.begin().await?;

    let mut inserted = 0u64;
    let mut skipped = 0u64;
    let mut row_num = 0usize;

    for entry in &entries {
        for (index, fields) in entry.rows.iter().enumerate() {
            row_num += 1;

            // Each entry's first row is its header
            if index == 0 {
                continue;
            }

            let record = match parser::parse_row(fields) {
                Ok(record) => record,
                Err(rejection) => {
                    if command.strict {
                        tx.rollback().await?;
                        return Err(IngestPricesError::RowRejected {
                            row: row_num,
                            rejection,
                        });
                    }
                    warn!(entry = %entry.name, row = row_num, %rejection, "Skipping unparseable row");
                    skipped += 1;
                    continue;
                },
            };

            match insert_record_tx(&mut tx, &record).await {
                Ok(()) => inserted += 1,
                Err(e) => {
                    if command.strict {
                        tx.rollback().await?;
                        return Err(IngestPricesError::RowInsert {
                            row: row_num,
                            source: e,
                        });
                    }
                    warn!(entry = %entry.name, row = row_num, error = %e, "Skipping unstorable row");
                    skipped += 1;
                },
            }
        }
    }

    // Totals come from the table, inside the same transaction, so the
    // response reflects cumulative state across all prior uploads.
    let totals = fetch_aggregates(&mut *tx)
        .await
        .map_err(IngestPricesError::Aggregate)?;

    tx.commit().await?;

    info!(
        inserted,
        skipped,
        total_items = totals.total_items,
        total_categories = totals.total_categories,
        "Ingest committed"
    );

    Ok(IngestSummary {
        totals,
        inserted,
        skipped,
    })
}

/// Insert one record inside a per-row savepoint so a failure leaves the
/// surrounding transaction usable instead of poisoning the whole batch.
async fn insert_record_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    record: &PriceRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query("SAVEPOINT price_row").execute(&mut **tx).await?;

    let insert = sqlx::query(
        r#"
        INSERT INTO prices (id, created_at, name, category, price)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(&record.id)
    .bind(record.created_at)
    .bind(&record.name)
    .bind(&record.category)
    .bind(record.price)
    .execute(&mut **tx)
    .await;

    match insert {
        Ok(_) => {
            sqlx::query("RELEASE SAVEPOINT price_row")
                .execute(&mut **tx)
                .await?;
            Ok(())
        },
        Err(e) => {
            sqlx::query("ROLLBACK TO SAVEPOINT price_row")
                .execute(&mut **tx)
                .await?;
            Err(e)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::build_csv_zip;

    const HEADER: &str = "id,created_at,name,category,price\n";

    fn zip_of(csv: &str) -> Vec<u8> {
        build_csv_zip("data.csv", csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_validate_rejects_empty_upload() {
        let cmd = IngestPricesCommand {
            archive: Vec::new(),
            strict: false,
        };
        assert!(matches!(cmd.validate(), Err(IngestPricesError::EmptyUpload)));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_ingest_skips_bad_rows_and_reports_totals(pool: PgPool) {
        let csv = format!(
            "{HEADER}\
             1,2024-01-15,Teapot,kitchen,9.99\n\
             2,2024-01-16,Lamp,lighting,20.01\n\
             3,not-a-date,Broken,kitchen,5.00\n"
        );
        let cmd = IngestPricesCommand {
            archive: zip_of(&csv),
            strict: false,
        };

        let summary = handle(pool.clone(), cmd).await.unwrap();

        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.totals.total_items, 2);
        assert_eq!(summary.totals.total_categories, 2);
        assert!((summary.totals.total_price - 30.0).abs() < 1e-9);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_totals_are_cumulative_across_uploads(pool: PgPool) {
        let first = format!("{HEADER}1,2024-01-15,Teapot,kitchen,10.00\n");
        let second = format!("{HEADER}2,2024-01-16,Lamp,lighting,5.50\n");

        let summary = handle(
            pool.clone(),
            IngestPricesCommand {
                archive: zip_of(&first),
                strict: false,
            },
        )
        .await
        .unwrap();
        assert_eq!(summary.totals.total_items, 1);

        let summary = handle(
            pool.clone(),
            IngestPricesCommand {
                archive: zip_of(&second),
                strict: false,
            },
        )
        .await
        .unwrap();

        assert_eq!(summary.inserted, 1);
        assert_eq!(summary.totals.total_items, 2);
        assert_eq!(summary.totals.total_categories, 2);
        assert!((summary.totals.total_price - 15.5).abs() < 1e-9);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_each_entry_header_is_skipped(pool: PgPool) {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        for (name, csv) in [
            ("a.csv", format!("{HEADER}1,2024-01-15,Teapot,kitchen,1.00\n")),
            ("b.csv", format!("{HEADER}2,2024-01-16,Lamp,lighting,2.00\n")),
        ] {
            use std::io::Write;
            writer.start_file(name, options).unwrap();
            writer.write_all(csv.as_bytes()).unwrap();
        }
        let archive = writer.finish().unwrap().into_inner();

        let summary = handle(
            pool.clone(),
            IngestPricesCommand {
                archive,
                strict: false,
            },
        )
        .await
        .unwrap();

        // Both headers dropped, both data rows stored, nothing skipped.
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.totals.total_items, 2);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_strict_mode_aborts_on_first_bad_row(pool: PgPool) {
        let csv = format!(
            "{HEADER}\
             1,2024-01-15,Teapot,kitchen,9.99\n\
             2,bogus,Broken,kitchen,5.00\n"
        );
        let cmd = IngestPricesCommand {
            archive: zip_of(&csv),
            strict: true,
        };

        let result = handle(pool.clone(), cmd).await;
        assert!(matches!(result, Err(IngestPricesError::RowRejected { row: 3, .. })));

        // The valid row before the bad one must not persist either.
        let totals = fetch_aggregates(&pool).await.unwrap();
        assert_eq!(totals.total_items, 0);
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_aggregate_failure_rolls_back_batch(pool: PgPool) {
        sqlx::query("DROP TABLE prices").execute(&pool).await.unwrap();

        let csv = format!("{HEADER}1,2024-01-15,Teapot,kitchen,9.99\n");
        let cmd = IngestPricesCommand {
            archive: zip_of(&csv),
            strict: false,
        };

        // Inserts soft-fail row by row, then the aggregate query hard-fails
        // and the batch is rolled back.
        let result = handle(pool.clone(), cmd).await;
        assert!(matches!(result, Err(IngestPricesError::Aggregate(_))));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_archive_without_csv_entries_rejected(pool: PgPool) {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        {
            use std::io::Write;
            writer.start_file("readme.txt", options).unwrap();
            writer.write_all(b"no data here").unwrap();
        }
        let archive = writer.finish().unwrap().into_inner();

        let result = handle(
            pool.clone(),
            IngestPricesCommand {
                archive,
                strict: false,
            },
        )
        .await;
        assert!(matches!(result, Err(IngestPricesError::NoCsvEntries)));
    }

    #[sqlx::test(migrations = "../../migrations")]
    async fn test_unreadable_archive_rejected(pool: PgPool) {
        let result = handle(
            pool.clone(),
            IngestPricesCommand {
                archive: b"not a zip at all".to_vec(),
                strict: false,
            },
        )
        .await;
        assert!(matches!(
            result,
            Err(IngestPricesError::Archive(ArchiveError::Unreadable(_)))
        ));
    }
}
