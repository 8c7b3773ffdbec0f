//! Stored records to CSV, and batch output counting

use anyhow::{Context, Result, bail};
use serde_json::Value;
use std::io;

use crate::batch::{BatchRow, OUTPUT_FIELDS};
use crate::fetcher::ProductRecord;
use crate::utils::column_index;

/// Columns of an export, [`OUTPUT_FIELDS`] without `ERROR`
#[must_use]
pub fn product_fields() -> Vec<&'static str> {
    OUTPUT_FIELDS
        .iter()
        .copied()
        .filter(|f| *f != "ERROR")
        .collect()
}

/// Parse a comma-separated field list, validating each name
///
/// # Errors
///
/// Fails on an empty list or an unknown column.
pub fn parse_fields(spec: &str) -> Result<Vec<String>> {
    let known = product_fields();
    let fields: Vec<String> = spec
        .split(',')
        .map(|f| f.trim().to_ascii_uppercase())
        .filter(|f| !f.is_empty())
        .collect();
    if fields.is_empty() {
        bail!("Field list is empty");
    }
    if let Some(unknown) = fields.iter().find(|f| !known.contains(&f.as_str())) {
        bail!("Unknown field {unknown}; expected one of {}", known.join(","));
    }
    Ok(fields)
}

/// Write `records` as CSV, restricted to `fields` when given
///
/// Returns the number of rows written.
pub fn write_records<W: io::Write>(
    records: &[ProductRecord],
    fields: Option<&[String]>,
    output: W,
) -> Result<usize> {
    let columns: Vec<String> = match fields {
        Some(fields) => fields.to_vec(),
        None => product_fields().into_iter().map(str::to_string).collect(),
    };

    let mut writer = csv::Writer::from_writer(output);
    writer.write_record(&columns).context("Failed to write header")?;

    for record in records {
        let row = serde_json::to_value(BatchRow::from_record(record))
            .context("Failed to convert record")?;
        writer
            .write_record(columns.iter().map(|c| match row.get(c) {
                Some(Value::String(s)) => s.clone(),
                _ => String::new(),
            }))
            .context("Failed to write row")?;
    }

    writer.flush().context("Failed to flush output")?;
    Ok(records.len())
}

/// Row totals of a batch output file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowCounts {
    pub total: usize,
    pub ok: usize,
}

impl RowCounts {
    #[must_use]
    pub fn errors(&self) -> usize {
        self.total - self.ok
    }
}

/// Count rows of a batch output; a row is OK when `error_field` is blank
///
/// # Errors
///
/// Fails on malformed CSV or a missing `error_field` column.
pub fn count_rows<R: io::Read>(reader: R, error_field: &str) -> Result<RowCounts> {
    let mut csv = csv::Reader::from_reader(reader);
    let column = column_index(csv.headers().context("Failed to read CSV header")?, error_field)?;

    let mut counts = RowCounts::default();
    for row in csv.records() {
        let row = row.context("Failed to read CSV row")?;
        counts.total += 1;
        if row.get(column).is_none_or(|e| e.trim().is_empty()) {
            counts.ok += 1;
        }
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> ProductRecord {
        ProductRecord {
            item_id: id.into(),
            title: format!("Item {id}"),
            images: vec![format!("https://img/{id}.jpg")],
            want_count: Some(2),
            url: format!("https://x/item?id={id}"),
            ..ProductRecord::default()
        }
    }

    #[test]
    fn test_export_all_fields() {
        let mut out = Vec::new();
        assert_eq!(write_records(&[record("1")], None, &mut out).unwrap(), 1);
        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), product_fields().join(","));
        let row = lines.next().unwrap();
        assert!(row.starts_with("1,,Item 1,"));
        assert!(row.ends_with(",https://x/item?id=1"));
    }

    #[test]
    fn test_export_selected_fields() {
        let fields = parse_fields("item_id, TITLE ,WANT_COUNT").unwrap();
        let mut out = Vec::new();
        write_records(&[record("7")], Some(&fields), &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "ITEM_ID,TITLE,WANT_COUNT\n7,Item 7,2\n"
        );
    }

    #[test]
    fn test_parse_fields_rejects_unknown() {
        assert!(parse_fields("ITEM_ID,PRICE").is_err());
        assert!(parse_fields(" , ").is_err());
    }

    #[test]
    fn test_count_rows() {
        let csv = "ITEM_ID,URL,ERROR\n1,u1,\n,u2,REQUEST_TIMEOUT\n3,u3,  \n";
        let counts = count_rows(csv.as_bytes(), "ERROR").unwrap();
        assert_eq!(counts, RowCounts { total: 3, ok: 2 });
        assert_eq!(counts.errors(), 1);
        assert!(count_rows(csv.as_bytes(), "STATUS").is_err());
    }
}
