//! Shared CSV input helpers

use anyhow::{Context, Result, bail};
use std::io;

/// Input column holding product URLs
pub const URL_COLUMN: &str = "URL";

/// Position of the header named `name`, ignoring surrounding whitespace
///
/// # Errors
///
/// Fails when no header matches.
pub fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    match headers.iter().position(|h| h.trim() == name) {
        Some(column) => Ok(column),
        None => bail!("CSV has no {name} column"),
    }
}

/// Trimmed, non-blank values of the `URL` column in input order
///
/// # Errors
///
/// Fails up front on an unreadable header or a missing `URL` column; each
/// malformed row yields its own error.
pub fn url_rows<R: io::Read>(reader: R) -> Result<impl Iterator<Item = Result<String>>> {
    let mut csv = csv::Reader::from_reader(reader);
    let column = column_index(csv.headers().context("Failed to read CSV header")?, URL_COLUMN)?;

    Ok(csv.into_records().filter_map(move |row| match row {
        Ok(row) => row
            .get(column)
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(|url| Ok(url.to_string())),
        Err(e) => Some(Err(anyhow::Error::new(e).context("Failed to read CSV row"))),
    }))
}
