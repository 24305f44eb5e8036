//! Zip/CSV archive codec
//!
//! Shared codec for the two wire formats the service speaks: zip containers
//! and the CSV rows inside them. Extraction yields the raw rows of every
//! `.csv` entry in directory-listing order; header stripping and field
//! validation are the caller's concern, keeping this module format-agnostic.
//!
//! All processing is in-memory over `Cursor`; request-scoped buffers are
//! dropped on every exit path.

use std::io::{Cursor, Read, Write};
use thiserror::Error;
use tracing::debug;

/// Entry-name suffix selecting CSV files inside an archive.
const CSV_SUFFIX: &str = ".csv";

/// Errors raised by the archive codec
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The input bytes are not a readable zip container
    #[error("not a readable zip archive: {0}")]
    Unreadable(#[source] zip::result::ZipError),

    /// A matched CSV entry could not be opened or decoded
    #[error("archive entry '{name}' is unreadable: {reason}")]
    EntryUnreadable { name: String, reason: String },

    /// Writing the output archive failed
    #[error("failed to write archive: {0}")]
    Write(String),
}

/// One CSV file extracted from an uploaded archive
#[derive(Debug, Clone)]
pub struct CsvEntry {
    /// Entry name as recorded in the zip directory
    pub name: String,
    /// Raw rows, header included, in file order
    pub rows: Vec<Vec<String>>,
}

/// Extract the rows of every `.csv` entry from a zip archive.
///
/// Entries are returned in directory-listing order. Directories and entries
/// without the `.csv` suffix (case-insensitive) are skipped. Rows are NOT
/// header-stripped and may be ragged; the row parser decides what is valid.
pub fn extract_csv_entries(data: &[u8]) -> Result<Vec<CsvEntry>, ArchiveError> {
    let cursor = Cursor::new(data);
    let mut archive = zip::ZipArchive::new(cursor).map_err(ArchiveError::Unreadable)?;
    let mut entries = Vec::new();

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| ArchiveError::EntryUnreadable {
                name: format!("#{}", i),
                reason: e.to_string(),
            })?;

        if file.is_dir() {
            continue;
        }

        let name = file.name().to_string();
        if !name.to_ascii_lowercase().ends_with(CSV_SUFFIX) {
            debug!(entry = %name, "Skipping non-CSV entry");
            continue;
        }

        let mut contents = Vec::new();
        file.read_to_end(&mut contents)
            .map_err(|e| ArchiveError::EntryUnreadable {
                name: name.clone(),
                reason: e.to_string(),
            })?;

        let rows = read_csv_rows(&contents).map_err(|e| ArchiveError::EntryUnreadable {
            name: name.clone(),
            reason: e.to_string(),
        })?;

        debug!(entry = %name, rows = rows.len(), "Extracted CSV entry");
        entries.push(CsvEntry { name, rows });
    }

    Ok(entries)
}

/// Package a single CSV payload as one entry inside a new zip archive.
pub fn build_csv_zip(entry_name: &str, csv_bytes: &[u8]) -> Result<Vec<u8>, ArchiveError> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();

    writer
        .start_file(entry_name, options)
        .map_err(|e| ArchiveError::Write(e.to_string()))?;
    writer
        .write_all(csv_bytes)
        .map_err(|e| ArchiveError::Write(e.to_string()))?;

    let cursor = writer
        .finish()
        .map_err(|e| ArchiveError::Write(e.to_string()))?;

    Ok(cursor.into_inner())
}

/// Decode CSV bytes into raw string rows.
///
/// `flexible` parsing lets short and long rows through so the row parser can
/// reject them individually instead of the whole entry failing. Structural
/// problems (broken quoting, invalid UTF-8) still fail the entry.
fn read_csv_rows(bytes: &[u8]) -> Result<Vec<Vec<String>>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|field| field.to_string()).collect());
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zip_with_entries(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        for (name, contents) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(contents).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_extract_single_csv_entry() {
        let data = zip_with_entries(&[("data.csv", b"a,b,c\n1,2,3\n")]);
        let entries = extract_csv_entries(&data).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "data.csv");
        assert_eq!(entries[0].rows.len(), 2);
        assert_eq!(entries[0].rows[1], vec!["1", "2", "3"]);
    }

    #[test]
    fn test_non_csv_entries_are_skipped() {
        let data = zip_with_entries(&[
            ("readme.txt", b"not csv"),
            ("data.csv", b"h\nv\n"),
            ("notes.md", b"# nope"),
        ]);
        let entries = extract_csv_entries(&data).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "data.csv");
    }

    #[test]
    fn test_entries_keep_listing_order() {
        let data = zip_with_entries(&[
            ("b.csv", b"h\nfrom-b\n"),
            ("a.csv", b"h\nfrom-a\n"),
        ]);
        let entries = extract_csv_entries(&data).unwrap();

        assert_eq!(entries[0].name, "b.csv");
        assert_eq!(entries[1].name, "a.csv");
    }

    #[test]
    fn test_csv_suffix_is_case_insensitive() {
        let data = zip_with_entries(&[("DATA.CSV", b"h\nv\n")]);
        let entries = extract_csv_entries(&data).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_ragged_rows_are_preserved() {
        let data = zip_with_entries(&[("data.csv", b"a,b\n1,2,3,4\nx\n")]);
        let entries = extract_csv_entries(&data).unwrap();

        assert_eq!(entries[0].rows[0].len(), 2);
        assert_eq!(entries[0].rows[1].len(), 4);
        assert_eq!(entries[0].rows[2].len(), 1);
    }

    #[test]
    fn test_not_a_zip_fails_unreadable() {
        let result = extract_csv_entries(b"definitely not a zip");
        assert!(matches!(result, Err(ArchiveError::Unreadable(_))));
    }

    #[test]
    fn test_invalid_utf8_entry_fails_entry_unreadable() {
        let data = zip_with_entries(&[("data.csv", &[0x61, 0x2c, 0xff, 0xfe, 0x0a])]);
        let result = extract_csv_entries(&data);
        assert!(matches!(result, Err(ArchiveError::EntryUnreadable { .. })));
    }

    #[test]
    fn test_build_csv_zip_roundtrip() {
        let archive = build_csv_zip("data.csv", b"id,price\n1,9.99\n").unwrap();
        let entries = extract_csv_entries(&archive).unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "data.csv");
        assert_eq!(entries[0].rows[1], vec!["1", "9.99"]);
    }
}
