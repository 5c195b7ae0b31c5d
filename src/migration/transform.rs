// ABOUTME: Per-page row fixes applied between fetch and import
// ABOUTME: Restores text columns returned as blobs and enforces declared length bounds

use crate::drivers::Dialect;
use crate::error::CopyError;
use crate::schema::TableSchema;
use crate::value::{RowPage, Value};
use anyhow::{bail, Result};

/// Columns whose blob values must be turned back into strings.
///
/// Only sources that report TEXT columns as binary need this; for them every
/// column whose declared type mentions `text` qualifies.
pub fn incorrect_blobs(source: Dialect, table: &TableSchema) -> Vec<String> {
    if !source.conflates_text_and_blob() {
        return Vec::new();
    }
    table
        .columns
        .iter()
        .filter(|c| c.db_type.to_ascii_lowercase().contains("text"))
        .map(|c| c.name.clone())
        .collect()
}

struct ColumnRule<'a> {
    coerce_text: bool,
    max_length: Option<usize>,
    db_type: &'a str,
}

/// Coerce blobs and validate lengths for every row of `page`.
///
/// `table` is the source schema; its declared bounds decide what is too
/// long. The first offending value fails with [`CopyError::InvalidData`].
pub fn format_page(page: RowPage, table: &TableSchema, text_columns: &[String]) -> Result<RowPage> {
    let rules: Vec<ColumnRule<'_>> = page
        .header
        .iter()
        .map(|name| {
            let column = table.column(name);
            ColumnRule {
                coerce_text: text_columns.iter().any(|c| c == name),
                max_length: column.and_then(|c| c.column_type().max_length()),
                db_type: column.map(|c| c.db_type.as_str()).unwrap_or(""),
            }
        })
        .collect();

    let RowPage { header, rows } = page;
    let mut formatted = Vec::with_capacity(rows.len());

    for row in rows {
        if row.len() != header.len() {
            bail!(
                "Row from table '{}' has {} values but the header has {} columns",
                table.name,
                row.len(),
                header.len()
            );
        }

        let mut out = Vec::with_capacity(row.len());
        for ((value, rule), name) in row.into_iter().zip(&rules).zip(&header) {
            let value = if rule.coerce_text {
                value.blob_to_string()
            } else {
                value
            };

            if let Some(limit) = rule.max_length {
                check_length(&value, limit, &table.name, name, rule.db_type)?;
            }
            out.push(value);
        }
        formatted.push(out);
    }

    Ok(RowPage {
        header,
        rows: formatted,
    })
}

fn check_length(value: &Value, limit: usize, table: &str, column: &str, db_type: &str) -> Result<()> {
    if value.is_null() || value.char_len() <= limit {
        return Ok(());
    }
    Err(CopyError::InvalidData {
        table: table.to_string(),
        column: column.to_string(),
        db_type: db_type.to_string(),
        value: value.to_string(),
    }
    .into())
}
